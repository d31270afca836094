//! Secrets-file parsing, push reporting and redaction.
//!
//! Secret values only ever live in [`SecretValue`], which has no `Serialize`
//! impl and masks itself in `Debug`. Nothing in this module formats a value
//! into a string that could reach the conversation.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

/// Values shorter than this are not redacted; they would match too much text.
pub const MIN_REDACTED_LEN: usize = 4;

pub const REDACTED: &str = "[REDACTED]";

/// A secret value read from disk.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

/// One `KEY=VALUE` line from a secrets file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub key: String,
    pub value: SecretValue,
}

/// Parse a dotenv-style file.
///
/// Blank lines, `#` comments and lines without `=` are ignored. Keys and values
/// are trimmed and surrounding quotes are stripped from values.
/// Entries with an empty key are kept so callers can report them.
pub fn parse_secrets(contents: &str) -> Vec<SecretRecord> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| SecretRecord {
            key: key.trim().to_string(),
            value: SecretValue::new(strip_quotes(value.trim())),
        })
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"').trim_matches('\'')
}

/// Whether `name` is a dotenv-style file that may hold real values:
/// `.env` or `.env.<suffix>`, minus the placeholder `templates`.
pub fn is_dotenv_name(name: &str, templates: &BTreeSet<String>) -> bool {
    (name == ".env" || name.starts_with(".env.")) && !templates.contains(name)
}

/// Outcome of pushing one secrets file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Keys stored successfully, in file order.
    pub pushed: Vec<String>,
    /// Keys skipped because the key or value was empty.
    pub skipped: Vec<String>,
    /// Keys whose create and add-version both failed, with the store's message.
    pub failed: Vec<(String, String)>,
    /// Reference per pushed key, e.g. `KEY:latest`.
    pub references: Vec<(String, String)>,
    /// Human-readable note about what happened to the file.
    pub file_note: String,
}

impl PushReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    /// `KEY=ref,KEY=ref` for every pushed key.
    pub fn reference_string(&self) -> String {
        self.references
            .iter()
            .map(|(key, reference)| format!("{key}={reference}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Summary returned to the model. Contains keys and references only.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.pushed.is_empty() {
            lines.push("Pushed: none".to_string());
        } else {
            lines.push(format!("Pushed: {}", self.pushed.join(", ")));
        }
        if !self.skipped.is_empty() {
            lines.push(format!(
                "Skipped: {} (empty value, fill it in and push again)",
                self.skipped.join(", ")
            ));
        }
        if !self.failed.is_empty() {
            let errors: Vec<String> = self
                .failed
                .iter()
                .map(|(key, message)| format!("ERROR on {key}: {message}"))
                .collect();
            lines.push(format!("Errors: {}", errors.join("; ")));
        }
        if !self.file_note.is_empty() {
            lines.push(self.file_note.clone());
        }
        lines.push(format!("Use in deploy: --set-secrets={}", self.reference_string()));
        lines.join("\n")
    }
}

/// Replaces known secret values in outbound text.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    pattern: Option<Regex>,
}

impl Redactor {
    /// Build a redactor for the given values. Longer values win over their
    /// substrings; values under [`MIN_REDACTED_LEN`] are ignored.
    pub fn new<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a SecretValue>,
    {
        let mut values: Vec<&str> = values
            .into_iter()
            .map(SecretValue::expose)
            .filter(|value| value.len() >= MIN_REDACTED_LEN)
            .collect();
        if values.is_empty() {
            return Self::default();
        }
        values.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        values.dedup();
        let alternation = values
            .iter()
            .map(|value| regex::escape(value))
            .collect::<Vec<_>>()
            .join("|");
        // Escaped literals joined by `|` always compile; fall back to a no-op
        // rather than failing a tool result.
        Self {
            pattern: Regex::new(&alternation).ok(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn redact(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern.replace_all(text, REDACTED).into_owned(),
            None => text.to_string(),
        }
    }
}
