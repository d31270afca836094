//! Test doubles for the model, the terminal and the secret store, plus a
//! scratch project directory.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::core::secrets::SecretValue;
use crate::core::types::Message;
use crate::io::config::AnchorConfig;
use crate::io::model::{ModelClient, ModelError, ModelRequest};
use crate::io::secret_store::SecretStore;
use crate::io::terminal::Prompter;
use crate::io::wait::{Interrupted, Waiter};
use crate::tools::dispatch::ToolSettings;

/// Model that replays scripted replies in order.
///
/// Once the script is empty it repeats the `repeating` reply if one was set,
/// otherwise it fails with `InvalidResponse`.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: RefCell<VecDeque<Result<Message, ModelError>>>,
    repeating: Option<Message>,
    calls: Cell<u32>,
    seen: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<Message, ModelError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            ..Self::default()
        }
    }

    pub fn repeating(reply: Message) -> Self {
        Self {
            repeating: Some(reply),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    /// Conversation snapshot passed to each call, in call order.
    pub fn seen_messages(&self) -> Vec<Vec<Message>> {
        self.seen.borrow().clone()
    }
}

impl ModelClient for ScriptedModel {
    fn complete(&self, request: &ModelRequest<'_>) -> Result<Message, ModelError> {
        self.calls.set(self.calls.get() + 1);
        self.seen.borrow_mut().push(request.messages.to_vec());
        if let Some(next) = self.script.borrow_mut().pop_front() {
            return next;
        }
        match &self.repeating {
            Some(reply) => Ok(reply.clone()),
            None => Err(ModelError::InvalidResponse("script exhausted".into())),
        }
    }
}

/// Prompter that answers from a fixed list and is interrupted once the list
/// runs out.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    questions: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String, Interrupted> {
        self.questions.push(question.to_string());
        self.answers.pop_front().ok_or(Interrupted)
    }
}

/// In-memory secret store.
#[derive(Debug, Default)]
pub struct FakeSecretStore {
    existing: BTreeSet<String>,
    failing: BTreeSet<String>,
    stored: Vec<String>,
    versions: Vec<String>,
}

impl FakeSecretStore {
    /// Treat `key` as already created, so `create` fails for it.
    pub fn with_existing(mut self, key: &str) -> Self {
        self.existing.insert(key.to_string());
        self
    }

    /// Fail both `create` and `add_version` for `key`.
    pub fn with_failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    /// Keys stored by either operation, in order.
    pub fn stored_keys(&self) -> Vec<String> {
        self.stored.clone()
    }

    /// Keys stored through `add_version`.
    pub fn versions_added(&self) -> Vec<String> {
        self.versions.clone()
    }
}

impl SecretStore for FakeSecretStore {
    fn create(&mut self, _project_id: &str, key: &str, _value: &SecretValue) -> Result<()> {
        if self.failing.contains(key) {
            bail!("simulated failure for {key}");
        }
        if !self.existing.insert(key.to_string()) {
            bail!("secret {key} already exists");
        }
        self.stored.push(key.to_string());
        Ok(())
    }

    fn add_version(&mut self, _project_id: &str, key: &str, _value: &SecretValue) -> Result<()> {
        if self.failing.contains(key) {
            bail!("simulated failure for {key}");
        }
        if !self.existing.contains(key) {
            bail!("secret {key} not found");
        }
        self.stored.push(key.to_string());
        self.versions.push(key.to_string());
        Ok(())
    }
}

/// Waiter that records requested delays without sleeping.
#[derive(Debug, Default)]
pub struct RecordingWaiter {
    waits: RefCell<Vec<Duration>>,
    interrupt_after: Option<usize>,
}

impl RecordingWaiter {
    /// Let `n` waits elapse, then report every later wait as interrupted.
    pub fn interrupting_after(n: usize) -> Self {
        Self {
            waits: RefCell::new(Vec::new()),
            interrupt_after: Some(n),
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }
}

impl Waiter for RecordingWaiter {
    fn wait(&self, delay: Duration) -> Result<(), Interrupted> {
        let mut waits = self.waits.borrow_mut();
        waits.push(delay);
        match self.interrupt_after {
            Some(n) if waits.len() > n => Err(Interrupted),
            _ => Ok(()),
        }
    }
}

/// Tool settings with default config rooted at `root`.
pub fn tool_settings(root: &Path) -> ToolSettings {
    ToolSettings::from_config(root, &AnchorConfig::default())
}

/// Scratch project directory removed on drop.
#[derive(Debug)]
pub struct TempProject {
    dir: tempfile::TempDir,
}

impl TempProject {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp project")?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}
