//! User-facing progress output on stdout.
//!
//! Diagnostics go through `tracing`; this is the running commentary a user
//! watches while the agent works.

use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::core::types::ToolCall;
use crate::looping::{LoopOutcome, LoopStop};
use crate::profile::Profile;
use crate::step::LoopEvent;

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// One-line description of a tool call, or `None` for tools that print
/// their own output (the terminal prompt).
pub fn describe_call(call: &ToolCall) -> Option<String> {
    let args: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
    let field = |name: &str| args.get(name).and_then(Value::as_str).unwrap_or("").to_string();
    let flag = |name: &str| args.get(name).and_then(Value::as_bool).unwrap_or(false);
    let line = match call.name.as_str() {
        "list_directory" => {
            let recursive = if flag("recursive") { " (recursive)" } else { "" };
            format!("list_directory: {}{recursive}", field("path"))
        }
        "read_file" => format!("read_file: {}", field("path")),
        "write_file" => format!("write_file: {}", field("path")),
        "run_command" => {
            let mode = if flag("interactive") { " (interactive)" } else { "" };
            format!("$ {}{mode}", field("command"))
        }
        "ask_user" => return None,
        "push_secrets" => format!("push_secrets: {} -> Secret Manager", field("env_file")),
        other => other.to_string(),
    };
    Some(line)
}

/// Prints loop events as they happen.
#[derive(Debug, Default)]
pub struct Console;

impl Console {
    pub fn banner(&self, root: &Path, model: &str, profile: Profile) {
        println!("\n{}", rule());
        println!("  Anchor   |  project: {}", root.display());
        println!("  Model    |  {model}");
        println!("  Profile  |  {profile}");
        println!("{}\n", rule());
    }

    pub fn on_event(&mut self, event: &LoopEvent<'_>) {
        match event {
            LoopEvent::TurnStarted { turn, .. } => {
                print!("\n[{turn:02}] Thinking... ");
                let _ = std::io::stdout().flush();
            }
            LoopEvent::AssistantText(text) => println!("\n{text}"),
            LoopEvent::ToolCallsReceived(count) => println!("{count} action(s)"),
            LoopEvent::ToolStarted(call) => {
                if let Some(line) = describe_call(call) {
                    println!("     {line}");
                }
            }
            LoopEvent::ToolFinished { result, .. } => {
                if result.content.starts_with("ERROR") {
                    let first = result.content.lines().next().unwrap_or("");
                    println!("     ! {first}");
                }
            }
            LoopEvent::ArtifactRecorded(name) => println!("     + artifact: {name}"),
            LoopEvent::Nudged { missing } => {
                println!(
                    "\n[nudge] Agent stopped early (missing: {}), pushing it to continue...",
                    missing.join(", ")
                );
            }
        }
    }

    pub fn summary(&self, outcome: &LoopOutcome) {
        match &outcome.stop {
            LoopStop::Done => println!("\nDone after {} turn(s).", outcome.turns_used),
            LoopStop::Aborted { max_turns } => {
                println!("\nReached max turns ({max_turns}).");
            }
        }
        if !outcome.artifacts.is_empty() {
            let names: Vec<&str> = outcome.artifacts.iter().map(String::as_str).collect();
            println!("Artifacts: {}", names.join(", "));
        }
        println!("\n{}\n", rule());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_calls_by_tool() {
        let call = ToolCall::new("1", "list_directory", r#"{"path": "/p", "recursive": true}"#);
        assert_eq!(describe_call(&call).as_deref(), Some("list_directory: /p (recursive)"));

        let call = ToolCall::new("2", "run_command", r#"{"command": "gcloud auth login", "interactive": true}"#);
        assert_eq!(
            describe_call(&call).as_deref(),
            Some("$ gcloud auth login (interactive)")
        );

        let call = ToolCall::new("3", "ask_user", r#"{"question": "?"}"#);
        assert_eq!(describe_call(&call), None);
    }

    #[test]
    fn malformed_arguments_still_describe() {
        let call = ToolCall::new("1", "read_file", "{oops");
        assert_eq!(describe_call(&call).as_deref(), Some("read_file: "));
    }
}
