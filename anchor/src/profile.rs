//! Orchestrator profiles.
//!
//! A profile bundles the prompt template, the enabled tools, the artifacts
//! that must exist before the loop may stop, and the default turn budget.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tools::ToolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Scan, generate files, push secrets and deploy interactively.
    #[default]
    Deploy,
    /// Scan and generate deployment files only.
    Generate,
}

/// Static description of a profile.
#[derive(Debug, Clone, Copy)]
pub struct ProfileSpec {
    pub template: &'static str,
    pub tools: &'static [ToolKind],
    pub required_artifacts: &'static [&'static str],
    pub max_turns: u32,
}

const DEPLOY: ProfileSpec = ProfileSpec {
    template: "deploy",
    tools: &[
        ToolKind::ListDirectory,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::RunCommand,
        ToolKind::AskUser,
        ToolKind::PushSecrets,
    ],
    required_artifacts: &["deploy.sh"],
    max_turns: 80,
};

const GENERATE: ProfileSpec = ProfileSpec {
    template: "generate",
    tools: &[
        ToolKind::ListDirectory,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
    ],
    required_artifacts: &["Dockerfile", "deploy.sh"],
    max_turns: 40,
};

impl Profile {
    pub fn spec(self) -> &'static ProfileSpec {
        match self {
            Profile::Deploy => &DEPLOY,
            Profile::Generate => &GENERATE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Deploy => "deploy",
            Profile::Generate => "generate",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
