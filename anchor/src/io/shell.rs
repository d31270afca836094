//! The `run_command` tool: shell commands in captured or interactive mode.

use std::path::Path;

use tracing::info;

use crate::io::config::ToolsConfig;
use crate::io::process::{CommandOutput, run_command_interactive, run_command_with_timeout, shell_command};

/// Run `command` through the shell in `cwd`, capturing its output.
pub fn run_captured(command: &str, cwd: &Path, config: &ToolsConfig) -> String {
    info!(command, "running captured command");
    let mut cmd = shell_command(command);
    cmd.current_dir(cwd);
    match run_command_with_timeout(cmd, None, config.command_timeout(), config.output_limit_bytes) {
        Ok(output) => format_captured(&output, config.command_timeout_secs),
        Err(err) => format!("ERROR: {err:#}"),
    }
}

/// Run `command` attached to the terminal. Only the exit status is reported.
pub fn run_interactive(command: &str, cwd: &Path) -> String {
    info!(command, "running interactive command");
    let mut cmd = shell_command(command);
    cmd.current_dir(cwd);
    match run_command_interactive(cmd) {
        Ok(status) => match status.code() {
            Some(code) => format!("Exited with code {code}"),
            None => "Exited without a code (terminated by signal)".to_string(),
        },
        Err(err) => format!("ERROR: {err:#}"),
    }
}

/// Combine captured output into the text returned to the model.
pub fn format_captured(output: &CommandOutput, timeout_secs: u64) -> String {
    let mut parts = Vec::new();
    if output.timed_out {
        parts.push(format!("ERROR: Command timed out after {timeout_secs} seconds"));
    }
    let stdout = output.stdout_text();
    if !stdout.is_empty() {
        parts.push(stdout);
    }
    let stderr = output.stderr_text();
    if !stderr.is_empty() {
        parts.push(format!("[stderr] {stderr}"));
    }
    if !output.timed_out {
        match output.exit_code() {
            Some(0) => {}
            Some(code) => parts.push(format!("[exit code] {code}")),
            None => parts.push("[exit code] none (terminated by signal)".to_string()),
        }
    }
    let notice = output.truncated_notice();
    if !notice.is_empty() {
        parts.push(notice.trim().to_string());
    }
    if parts.is_empty() {
        "(no output)".to_string()
    } else {
        parts.join("\n")
    }
}
