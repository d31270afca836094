//! The `push_secrets` tool and the secret store it talks to.
//!
//! Values are read from disk here, handed to the store over stdin and
//! returned to the caller only as [`SecretValue`]s for redaction. The text
//! result carries key names and references, never values.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::secrets::{PushReport, SecretValue, parse_secrets};
use crate::io::config::ToolsConfig;
use crate::io::process::run_command_with_timeout;

/// External secret storage.
pub trait SecretStore {
    /// Create `key` with `value` as its first version.
    fn create(&mut self, project_id: &str, key: &str, value: &SecretValue) -> Result<()>;

    /// Add `value` as a new version of an existing `key`.
    fn add_version(&mut self, project_id: &str, key: &str, value: &SecretValue) -> Result<()>;

    /// Reference that resolves to the newest version of `key`.
    fn latest_reference(&self, key: &str) -> String {
        format!("{key}:latest")
    }
}

impl<S: SecretStore + ?Sized> SecretStore for &mut S {
    fn create(&mut self, project_id: &str, key: &str, value: &SecretValue) -> Result<()> {
        (**self).create(project_id, key, value)
    }

    fn add_version(&mut self, project_id: &str, key: &str, value: &SecretValue) -> Result<()> {
        (**self).add_version(project_id, key, value)
    }

    fn latest_reference(&self, key: &str) -> String {
        (**self).latest_reference(key)
    }
}

/// Google Secret Manager through the `gcloud` CLI.
#[derive(Debug, Clone)]
pub struct GcloudSecretStore {
    program: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl GcloudSecretStore {
    pub fn new(config: &ToolsConfig) -> Self {
        Self::with_program("gcloud", config)
    }

    pub fn with_program(program: impl Into<String>, config: &ToolsConfig) -> Self {
        Self {
            program: program.into(),
            timeout: config.command_timeout(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    fn run(&self, args: &[&str], project_id: &str, value: &SecretValue) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .arg("--data-file=-")
            .arg(format!("--project={project_id}"));
        let output = run_command_with_timeout(
            cmd,
            Some(value.expose().as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )?;
        if output.success() {
            return Ok(());
        }
        if output.timed_out {
            bail!("timed out after {} seconds", self.timeout.as_secs());
        }
        let stderr = output.stderr_text();
        if stderr.is_empty() {
            bail!("exit code {:?}", output.exit_code());
        }
        bail!("{stderr}")
    }
}

impl SecretStore for GcloudSecretStore {
    fn create(&mut self, project_id: &str, key: &str, value: &SecretValue) -> Result<()> {
        self.run(&["secrets", "create", key], project_id, value)
    }

    fn add_version(&mut self, project_id: &str, key: &str, value: &SecretValue) -> Result<()> {
        self.run(&["secrets", "versions", "add", key], project_id, value)
    }
}

/// What `push_secrets` produced.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    /// Text returned to the model.
    pub text: String,
    /// Every non-empty value read from the file, for redaction.
    pub values: Vec<SecretValue>,
}

/// Push every non-empty `KEY=VALUE` from `env_file` into `store`.
///
/// A failed `create` falls back to `add_version`. Failures and empty values
/// are collected; one bad key never stops the others.
#[instrument(skip_all, fields(env_file = %env_file.display(), project_id))]
pub fn push_secrets<S: SecretStore>(
    store: &mut S,
    env_file: &Path,
    project_id: &str,
    delete_after_push: bool,
) -> PushOutcome {
    let display = env_file.display();
    if !env_file.is_file() {
        return PushOutcome {
            text: format!("ERROR: {display} not found. Create it with your secret values first."),
            values: Vec::new(),
        };
    }
    let contents = match fs::read_to_string(env_file) {
        Ok(contents) => contents,
        Err(err) => {
            return PushOutcome {
                text: format!("ERROR reading {display}: {err}"),
                values: Vec::new(),
            };
        }
    };

    let records = parse_secrets(&contents);
    let mut report = PushReport::default();
    let mut values = Vec::new();
    for record in records {
        if record.key.is_empty() || record.value.is_empty() {
            let key = if record.key.is_empty() {
                "(empty key)".to_string()
            } else {
                record.key
            };
            debug!(key = %key, "skipping empty secret");
            report.skipped.push(key);
            continue;
        }
        values.push(record.value.clone());

        let stored = match store.create(project_id, &record.key, &record.value) {
            Ok(()) => Ok(()),
            Err(create_err) => {
                debug!(key = %record.key, err = %create_err, "create failed, adding version");
                store.add_version(project_id, &record.key, &record.value)
            }
        };
        match stored {
            Ok(()) => {
                info!(key = %record.key, "secret stored");
                report
                    .references
                    .push((record.key.clone(), store.latest_reference(&record.key)));
                report.pushed.push(record.key);
            }
            Err(err) => {
                warn!(key = %record.key, "failed to store secret");
                report.failed.push((record.key, format!("{err:#}")));
            }
        }
    }

    report.file_note = if delete_after_push && report.is_complete() && !report.pushed.is_empty() {
        match fs::remove_file(env_file) {
            Ok(()) => format!("File deleted: {display}"),
            Err(err) => format!("File kept at: {display} (delete failed: {err})"),
        }
    } else {
        format!("File kept at: {display} (keep it out of version control and deploy uploads)")
    };

    PushOutcome {
        text: report.render(),
        values,
    }
}
