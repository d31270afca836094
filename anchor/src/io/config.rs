//! Agent configuration stored in `.anchor/config.toml`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::profile::Profile;

/// Config location relative to the project root when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = ".anchor/config.toml";

/// Agent configuration (TOML).
///
/// Every field has a default so a missing file or a partial file both work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AnchorConfig {
    pub profile: Profile,

    /// Overrides the profile's turn budget.
    pub max_turns: Option<u32>,

    /// Write `.anchor/transcript.json` when the loop ends.
    pub transcript: bool,

    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub artifacts: ArtifactsConfig,
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// First rate-limit wait; doubles on each consecutive rate limit.
    pub backoff_base_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 4096,
            request_timeout_secs: 300,
            backoff_base_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Files above this size are truncated when read.
    pub max_file_bytes: u64,
    /// Ceiling for captured shell commands.
    pub command_timeout_secs: u64,
    /// Captured stdout/stderr beyond this many bytes is dropped.
    pub output_limit_bytes: usize,
    /// Directory names never listed or descended into.
    pub skip_dirs: BTreeSet<String>,
    /// File extensions (without the dot) treated as binary/media.
    pub skip_extensions: BTreeSet<String>,
    /// Dot-files and dot-directories that are still listed.
    pub dotfile_allow: BTreeSet<String>,
    /// File names that get execute permission when written.
    pub executable_names: BTreeSet<String>,
    /// Refuse writes to file names outside `artifacts.whitelist`.
    pub restrict_writes: bool,
}

impl ToolsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 60_000,
            command_timeout_secs: 600,
            output_limit_bytes: 200_000,
            skip_dirs: set(&[
                ".git",
                "__pycache__",
                "node_modules",
                ".venv",
                "venv",
                "env",
                "dist",
                "build",
                ".next",
                ".nuxt",
                "target",
                "vendor",
                ".tox",
                ".mypy_cache",
                ".pytest_cache",
                "coverage",
                "htmlcov",
                ".turbo",
                ".cargo",
                "pkg",
                ".serverless",
                "cdk.out",
                ".terraform",
            ]),
            skip_extensions: set(&[
                "pyc", "pyo", "pyd", "so", "dylib", "dll", "exe", "jpg", "jpeg", "png", "gif",
                "ico", "svg", "webp", "avif", "mp4", "mp3", "wav", "ogg", "zip", "tar", "gz",
                "tgz", "pdf", "woff", "woff2", "ttf", "eot", "bin", "db", "sqlite",
            ]),
            dotfile_allow: set(&[
                ".env",
                ".env.example",
                ".env.sample",
                ".gitignore",
                ".gcloudignore",
                ".github",
            ]),
            executable_names: set(&["deploy.sh"]),
            restrict_writes: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// File names recorded as produced artifacts when written.
    pub whitelist: BTreeSet<String>,
    /// Overrides the profile's required artifacts.
    pub required: Option<BTreeSet<String>>,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            whitelist: set(&[
                "Dockerfile",
                "deploy.sh",
                ".gcloudignore",
                "DEPLOY_README.md",
                "deploy.yml",
            ]),
            required: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecretsConfig {
    /// Secrets files under the project root whose values are redacted from
    /// every tool result. The first one is the template the agent writes.
    pub file_names: Vec<String>,
    /// Also redact every `.env` / `.env.*` file found under the project root.
    pub scan_dotenv: bool,
    /// Dotenv-style names that hold placeholders, not values.
    pub dotenv_templates: BTreeSet<String>,
    /// Remove the secrets file once every key in it was pushed.
    pub delete_after_push: bool,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            file_names: vec![".env.anchor".to_string(), ".env".to_string()],
            scan_dotenv: true,
            dotenv_templates: set(&[".env.example", ".env.sample", ".env.template"]),
            delete_after_push: false,
        }
    }
}

impl AnchorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == Some(0) {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(anyhow!("llm.model must not be empty"));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(anyhow!("llm.base_url must not be empty"));
        }
        if self.llm.api_key_env.trim().is_empty() {
            return Err(anyhow!("llm.api_key_env must not be empty"));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be > 0"));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(anyhow!("llm.request_timeout_secs must be > 0"));
        }
        if self.tools.max_file_bytes == 0 {
            return Err(anyhow!("tools.max_file_bytes must be > 0"));
        }
        if self.tools.command_timeout_secs == 0 {
            return Err(anyhow!("tools.command_timeout_secs must be > 0"));
        }
        if self.tools.output_limit_bytes == 0 {
            return Err(anyhow!("tools.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Turn budget: explicit override, else the profile default.
    pub fn effective_max_turns(&self) -> u32 {
        self.max_turns
            .unwrap_or_else(|| self.profile.spec().max_turns)
    }

    /// Required artifacts: explicit override, else the profile default.
    pub fn effective_required(&self) -> BTreeSet<String> {
        match &self.artifacts.required {
            Some(required) => required.clone(),
            None => self
                .profile
                .spec()
                .required_artifacts
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }

    /// Absolute paths of the configured secrets files under `root`.
    pub fn secret_files(&self, root: &Path) -> Vec<PathBuf> {
        self.secrets
            .file_names
            .iter()
            .map(|name| root.join(name))
            .collect()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AnchorConfig::default()`.
pub fn load_config(path: &Path) -> Result<AnchorConfig> {
    if !path.exists() {
        let cfg = AnchorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AnchorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}
