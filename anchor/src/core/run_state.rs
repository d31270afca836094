//! In-memory bookkeeping for a single loop invocation.

use std::collections::BTreeSet;
use std::path::Path;

/// Terminal state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Required artifacts exist and the model stopped calling tools.
    Done,
    /// The turn budget ran out first.
    Aborted,
}

/// Mutable state for one run. Created at loop start and dropped at loop end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    /// Current turn, 1-indexed.
    pub turn: u32,
    pub max_turns: u32,
    /// Canonical file names of artifacts written so far.
    pub artifacts_produced: BTreeSet<String>,
    pub terminal: Option<Terminal>,
}

impl RunState {
    pub fn new(max_turns: u32) -> Self {
        Self {
            turn: 1,
            max_turns,
            artifacts_produced: BTreeSet::new(),
            terminal: None,
        }
    }

    pub fn budget_left(&self) -> bool {
        self.terminal.is_none() && self.turn <= self.max_turns
    }

    pub fn advance(&mut self) {
        self.turn += 1;
    }

    /// Record `path` when its file name is one of the expected artifacts.
    ///
    /// Returns the canonical name that was recorded.
    pub fn record_artifact(&mut self, path: &Path, whitelist: &BTreeSet<String>) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        if !whitelist.contains(name) {
            return None;
        }
        self.artifacts_produced.insert(name.to_string());
        Some(name.to_string())
    }
}

/// Required set of artifacts that must exist before the loop may stop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionCriterion {
    pub required: BTreeSet<String>,
}

impl CompletionCriterion {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_satisfied(&self, produced: &BTreeSet<String>) -> bool {
        self.required.is_subset(produced)
    }

    /// Required artifacts not yet produced, in name order.
    pub fn missing<'a>(&'a self, produced: &'a BTreeSet<String>) -> Vec<&'a str> {
        self.required
            .difference(produced)
            .map(String::as_str)
            .collect()
    }
}
