//! Tool registry: names, schemas and typed invocations.
//!
//! The set of tools is closed. A model-issued [`ToolCall`] is resolved into a
//! [`ToolInvocation`] carrying a typed argument record, or into a
//! [`DispatchError`] that becomes an `ERROR:` tool result.

pub mod dispatch;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::core::types::ToolCall;
use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    ListDirectory,
    ReadFile,
    WriteFile,
    RunCommand,
    AskUser,
    PushSecrets,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::ListDirectory,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::RunCommand,
        ToolKind::AskUser,
        ToolKind::PushSecrets,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListDirectory => "list_directory",
            ToolKind::ReadFile => "read_file",
            ToolKind::WriteFile => "write_file",
            ToolKind::RunCommand => "run_command",
            ToolKind::AskUser => "ask_user",
            ToolKind::PushSecrets => "push_secrets",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ToolKind::ListDirectory => {
                "List files and directories at a path. Use recursive=true to see the full project tree."
            }
            ToolKind::ReadFile => "Read the contents of a text file.",
            ToolKind::WriteFile => {
                "Write a file to disk, creating parent directories. Use only for deployment files: \
                 Dockerfile, deploy.sh, .gcloudignore, DEPLOY_README.md, .github/workflows/deploy.yml \
                 and the secrets template."
            }
            ToolKind::RunCommand => {
                "Execute a shell command in the project directory. Set interactive=true only for \
                 commands that need terminal input (e.g. gcloud auth login); output is then not captured."
            }
            ToolKind::AskUser => {
                "Ask the user for a NON-SECRET value in the terminal (project id, app name, yes/no). \
                 Never use for API keys, passwords or tokens; use push_secrets for those."
            }
            ToolKind::PushSecrets => {
                "Read a KEY=VALUE file the user filled in and store each value in Secret Manager. \
                 Values never pass through the model. Returns the --set-secrets string for the deploy command."
            }
        }
    }

    fn parameters(self) -> Value {
        match self {
            ToolKind::ListDirectory => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute directory path"},
                    "recursive": {"type": "boolean", "default": false}
                },
                "required": ["path"]
            }),
            ToolKind::ReadFile => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute file path"}
                },
                "required": ["path"]
            }),
            ToolKind::WriteFile => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute file path"},
                    "content": {"type": "string"}
                },
                "required": ["path", "content"]
            }),
            ToolKind::RunCommand => json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "The shell command to run"},
                    "interactive": {
                        "type": "boolean",
                        "description": "Set true only for commands that prompt in the terminal",
                        "default": false
                    }
                },
                "required": ["command"]
            }),
            ToolKind::AskUser => json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "The question to display"}
                },
                "required": ["question"]
            }),
            ToolKind::PushSecrets => json!({
                "type": "object",
                "properties": {
                    "env_file": {
                        "type": "string",
                        "description": "Absolute path to the KEY=VALUE secrets file"
                    },
                    "project_id": {
                        "type": "string",
                        "description": "Cloud project id to store the secrets in"
                    }
                },
                "required": ["env_file", "project_id"]
            }),
        }
    }

    pub fn schema(self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}

/// Tool description shown to the model. Advisory only; [`Registry::resolve`]
/// is what enforces argument shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDirectoryArgs {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFileArgs {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFileArgs {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunCommandArgs {
    pub command: String,
    #[serde(default)]
    pub interactive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AskUserArgs {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushSecretsArgs {
    pub env_file: String,
    pub project_id: String,
}

/// A resolved, validated tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    ListDirectory(ListDirectoryArgs),
    ReadFile(ReadFileArgs),
    WriteFile(WriteFileArgs),
    RunCommand(RunCommandArgs),
    AskUser(AskUserArgs),
    PushSecrets(PushSecretsArgs),
}

impl ToolInvocation {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolInvocation::ListDirectory(_) => ToolKind::ListDirectory,
            ToolInvocation::ReadFile(_) => ToolKind::ReadFile,
            ToolInvocation::WriteFile(_) => ToolKind::WriteFile,
            ToolInvocation::RunCommand(_) => ToolKind::RunCommand,
            ToolInvocation::AskUser(_) => ToolKind::AskUser,
            ToolInvocation::PushSecrets(_) => ToolKind::PushSecrets,
        }
    }
}

/// Why a tool call could not be turned into an invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Bad arguments for {name}: {reason}")]
    BadArguments { name: String, reason: String },
}

impl DispatchError {
    /// Text fed back to the model.
    pub fn to_tool_text(&self) -> String {
        format!("ERROR: {self}")
    }
}

/// Tools enabled for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    tools: Vec<ToolKind>,
}

impl Registry {
    pub fn new(tools: impl IntoIterator<Item = ToolKind>) -> Self {
        let mut tools: Vec<ToolKind> = tools.into_iter().collect();
        tools.sort();
        tools.dedup();
        Self { tools }
    }

    pub fn for_profile(profile: Profile) -> Self {
        Self::new(profile.spec().tools.iter().copied())
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains(&kind)
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|kind| kind.schema()).collect()
    }

    /// Resolve a model-issued call. Disabled tools are reported as unknown.
    pub fn resolve(&self, call: &ToolCall) -> Result<ToolInvocation, DispatchError> {
        let kind = ToolKind::from_name(&call.name)
            .filter(|kind| self.contains(*kind))
            .ok_or_else(|| DispatchError::UnknownTool(call.name.clone()))?;

        let raw = call.arguments.trim();
        let raw = if raw.is_empty() { "{}" } else { raw };
        let invocation = match kind {
            ToolKind::ListDirectory => ToolInvocation::ListDirectory(parse_args(kind, raw)?),
            ToolKind::ReadFile => ToolInvocation::ReadFile(parse_args(kind, raw)?),
            ToolKind::WriteFile => ToolInvocation::WriteFile(parse_args(kind, raw)?),
            ToolKind::RunCommand => ToolInvocation::RunCommand(parse_args(kind, raw)?),
            ToolKind::AskUser => ToolInvocation::AskUser(parse_args(kind, raw)?),
            ToolKind::PushSecrets => ToolInvocation::PushSecrets(parse_args(kind, raw)?),
        };
        Ok(invocation)
    }
}

fn parse_args<T: DeserializeOwned>(kind: ToolKind, raw: &str) -> Result<T, DispatchError> {
    serde_json::from_str(raw).map_err(|e| DispatchError::BadArguments {
        name: kind.name().to_string(),
        reason: e.to_string(),
    })
}
