//! Tool dispatch.
//!
//! [`Toolbox`] owns the collaborators tools need (terminal prompter, secret
//! store) and the settings that shape their output. [`dispatch`] turns one
//! [`ToolCall`] into exactly one [`ToolResult`] with the same id.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::core::secrets::{Redactor, SecretValue, parse_secrets};
use crate::core::types::{ToolCall, ToolResult};
use crate::io::config::{AnchorConfig, ToolsConfig};
use crate::io::fs_tools::{find_dotenv_files, list_directory, read_file, resolve_path, write_file};
use crate::io::secret_store::{SecretStore, push_secrets};
use crate::io::shell::{run_captured, run_interactive};
use crate::io::terminal::Prompter;
use crate::io::wait::Interrupted;
use crate::tools::{Registry, ToolInvocation};

/// Settings shared by every tool in a run.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Project root; relative paths and shell commands start here.
    pub root: PathBuf,
    pub tools: ToolsConfig,
    /// File names recorded as artifacts when written.
    pub artifact_whitelist: BTreeSet<String>,
    /// Files whose values are redacted from every tool result.
    pub secret_files: Vec<PathBuf>,
    /// Also redact dotenv files discovered under `root`.
    pub scan_dotenv: bool,
    pub dotenv_templates: BTreeSet<String>,
    pub delete_after_push: bool,
}

impl ToolSettings {
    pub fn from_config(root: &Path, config: &AnchorConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            tools: config.tools.clone(),
            artifact_whitelist: config.artifacts.whitelist.clone(),
            secret_files: config.secret_files(root),
            scan_dotenv: config.secrets.scan_dotenv,
            dotenv_templates: config.secrets.dotenv_templates.clone(),
            delete_after_push: config.secrets.delete_after_push,
        }
    }
}

/// Result of one dispatched call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub result: ToolResult,
    /// Path of a file that was written successfully.
    pub wrote: Option<PathBuf>,
}

struct Executed {
    text: String,
    wrote: Option<PathBuf>,
}

impl Executed {
    fn text(text: String) -> Self {
        Self { text, wrote: None }
    }
}

/// Executes resolved invocations.
pub struct Toolbox<P, S> {
    settings: ToolSettings,
    prompter: P,
    store: S,
    /// Values pushed during this run; the file may be gone by now.
    pushed_values: Vec<SecretValue>,
}

impl<P: Prompter, S: SecretStore> Toolbox<P, S> {
    pub fn new(settings: ToolSettings, prompter: P, store: S) -> Self {
        Self {
            settings,
            prompter,
            store,
            pushed_values: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    fn execute(&mut self, invocation: ToolInvocation) -> Result<Executed, Interrupted> {
        let root = &self.settings.root;
        let tools = &self.settings.tools;
        let executed = match invocation {
            ToolInvocation::ListDirectory(args) => {
                let path = resolve_path(root, &args.path);
                Executed::text(list_directory(&path, args.recursive, tools))
            }
            ToolInvocation::ReadFile(args) => {
                let path = resolve_path(root, &args.path);
                Executed::text(read_file(&path, tools))
            }
            ToolInvocation::WriteFile(args) => {
                let path = resolve_path(root, &args.path);
                if let Some(refusal) = self.refuse_write(&path) {
                    return Ok(Executed::text(refusal));
                }
                let outcome = write_file(&path, &args.content, tools);
                Executed {
                    text: outcome.text,
                    wrote: outcome.written.then_some(path),
                }
            }
            ToolInvocation::RunCommand(args) => {
                let text = if args.interactive {
                    run_interactive(&args.command, root)
                } else {
                    run_captured(&args.command, root, tools)
                };
                Executed::text(text)
            }
            ToolInvocation::AskUser(args) => Executed::text(self.prompter.ask(&args.question)?),
            ToolInvocation::PushSecrets(args) => {
                let path = resolve_path(root, &args.env_file);
                let outcome = push_secrets(
                    &mut self.store,
                    &path,
                    &args.project_id,
                    self.settings.delete_after_push,
                );
                self.pushed_values.extend(outcome.values);
                Executed::text(outcome.text)
            }
        };
        Ok(executed)
    }

    fn refuse_write(&self, path: &Path) -> Option<String> {
        if !self.settings.tools.restrict_writes {
            return None;
        }
        let name = path.file_name()?.to_string_lossy();
        let allowed = self.settings.artifact_whitelist.contains(name.as_ref())
            || self.settings.secret_files.iter().any(|secret| secret == path);
        (!allowed).then(|| {
            format!(
                "ERROR: Writing {} is not allowed. Allowed files: {}",
                path.display(),
                self.settings
                    .artifact_whitelist
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    /// Configured secrets files plus dotenv files currently under the root.
    fn secret_sources(&self) -> BTreeSet<PathBuf> {
        let mut files: BTreeSet<PathBuf> = self.settings.secret_files.iter().cloned().collect();
        if self.settings.scan_dotenv {
            files.extend(find_dotenv_files(
                &self.settings.root,
                &self.settings.tools,
                &self.settings.dotenv_templates,
            ));
        }
        files
    }

    /// Redactor over the secrets files as they are now, plus every value
    /// pushed earlier in the run.
    fn redactor(&self) -> Redactor {
        let mut values: Vec<SecretValue> = self.pushed_values.clone();
        for file in &self.secret_sources() {
            match fs::read_to_string(file) {
                Ok(contents) => values.extend(
                    parse_secrets(&contents)
                        .into_iter()
                        .map(|record| record.value)
                        .filter(|value| !value.is_empty()),
                ),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!(file = %file.display(), err = %err, "cannot read secrets file"),
            }
        }
        Redactor::new(&values)
    }
}

/// Dispatch one call: resolve, execute, redact.
///
/// Every outcome except [`Interrupted`] becomes a result carrying `call.id`.
#[instrument(skip_all, fields(tool = %call.name, id = %call.id))]
pub fn dispatch<P: Prompter, S: SecretStore>(
    registry: &Registry,
    toolbox: &mut Toolbox<P, S>,
    call: &ToolCall,
) -> Result<Dispatched, Interrupted> {
    let executed = match registry.resolve(call) {
        Ok(invocation) => toolbox.execute(invocation)?,
        Err(err) => {
            warn!(err = %err, "tool call rejected");
            Executed::text(err.to_tool_text())
        }
    };
    let content = toolbox.redactor().redact(&executed.text);
    debug!(bytes = content.len(), "tool finished");
    Ok(Dispatched {
        result: ToolResult {
            tool_call_id: call.id.clone(),
            content,
        },
        wrote: executed.wrote,
    })
}
