//! Write-only run transcript at `.anchor/transcript.json`.
//!
//! The transcript is for humans. It is never read back.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::Message;
use crate::looping::{LoopOutcome, LoopStop};
use crate::profile::Profile;

#[derive(Debug, Clone, Serialize)]
struct Transcript<'a> {
    profile: Profile,
    model: &'a str,
    turns_used: u32,
    stop: &'static str,
    artifacts: &'a BTreeSet<String>,
    messages: &'a [Message],
}

pub fn transcript_path(root: &Path) -> PathBuf {
    root.join(".anchor").join("transcript.json")
}

/// Write the transcript of a finished loop. Returns the path written.
pub fn write_transcript(
    root: &Path,
    profile: Profile,
    model: &str,
    outcome: &LoopOutcome,
) -> Result<PathBuf> {
    let path = transcript_path(root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let transcript = Transcript {
        profile,
        model,
        turns_used: outcome.turns_used,
        stop: match outcome.stop {
            LoopStop::Done => "done",
            LoopStop::Aborted { .. } => "aborted",
        },
        artifacts: &outcome.artifacts,
        messages: outcome.conversation.messages(),
    };
    let mut payload = serde_json::to_string_pretty(&transcript).context("serialize transcript")?;
    payload.push('\n');
    fs::write(&path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::Conversation;
    use serde_json::Value;

    #[test]
    fn writes_pretty_json_with_messages() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = LoopOutcome {
            turns_used: 3,
            stop: LoopStop::Aborted { max_turns: 3 },
            artifacts: BTreeSet::from(["Dockerfile".to_string()]),
            conversation: Conversation::seeded("task"),
        };

        let path = write_transcript(temp.path(), Profile::Generate, "gpt-4o", &outcome)
            .expect("write");

        assert_eq!(path, temp.path().join(".anchor/transcript.json"));
        let value: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value["profile"], "generate");
        assert_eq!(value["stop"], "aborted");
        assert_eq!(value["artifacts"][0], "Dockerfile");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "task");
    }
}
