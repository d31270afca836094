//! The `ask_user` tool: one line of terminal input.

use std::io::{BufRead, IsTerminal};

use dialoguer::Input;
use tracing::warn;

use crate::io::wait::Interrupted;

/// Source of human answers.
///
/// Cancellation is not a tool result: implementations return [`Interrupted`]
/// and the run ends.
pub trait Prompter {
    fn ask(&mut self, question: &str) -> Result<String, Interrupted>;
}

impl<P: Prompter + ?Sized> Prompter for &mut P {
    fn ask(&mut self, question: &str) -> Result<String, Interrupted> {
        (**self).ask(question)
    }
}

/// Reads answers from the controlling terminal, or from stdin when it is
/// not a terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> Result<String, Interrupted> {
        println!("\n{}", "-".repeat(60));
        println!("  Anchor needs input:");
        let answer = if std::io::stdin().is_terminal() {
            Input::<String>::new()
                .with_prompt(format!("  {question}"))
                .allow_empty(true)
                .interact_text()
                .map_err(|err| {
                    warn!(err = %err, "terminal prompt cancelled");
                    Interrupted
                })?
        } else {
            read_piped_line(question)?
        };
        println!("{}", "-".repeat(60));
        Ok(answer.trim().to_string())
    }
}

fn read_piped_line(question: &str) -> Result<String, Interrupted> {
    println!("  {question}: ");
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) => {
            warn!("stdin closed while waiting for input");
            Err(Interrupted)
        }
        Ok(_) => Ok(line),
        Err(err) => {
            warn!(err = %err, "failed to read stdin");
            Err(Interrupted)
        }
    }
}
