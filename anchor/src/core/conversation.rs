//! Append-only conversation log with tool call/result pairing.

use std::collections::VecDeque;

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::core::types::{Message, ToolResult};

/// Ordered message log shown to the model.
///
/// Messages are never removed or edited. Every tool call carried by an
/// assistant message stays pending until exactly one result with the same id
/// is appended; the next model call must not happen while calls are pending.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
    #[serde(skip)]
    pending: VecDeque<String>,
}

impl Conversation {
    /// Start a conversation with a single user message.
    pub fn seeded(task: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(task)],
            pending: VecDeque::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Ids of tool calls still waiting for a result, in call order.
    pub fn pending_calls(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Result<()> {
        self.ensure_settled()?;
        self.messages.push(Message::user(content));
        Ok(())
    }

    /// Append an assistant message and register its tool calls as pending.
    pub fn push_assistant(&mut self, message: Message) -> Result<()> {
        self.ensure_settled()?;
        self.pending
            .extend(message.tool_calls.iter().map(|call| call.id.clone()));
        self.messages.push(message);
        Ok(())
    }

    /// Append the result for a pending tool call.
    pub fn push_tool_result(&mut self, result: ToolResult) -> Result<()> {
        let position = self
            .pending
            .iter()
            .position(|id| *id == result.tool_call_id)
            .ok_or_else(|| {
                anyhow!(
                    "tool result for unknown or already answered call {}",
                    result.tool_call_id
                )
            })?;
        self.pending.remove(position);
        self.messages.push(Message::tool(result));
        Ok(())
    }

    /// Fail if any tool call from the last assistant message lacks a result.
    pub fn ensure_settled(&self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let ids: Vec<&str> = self.pending_calls().collect();
        Err(anyhow!("tool calls without results: {}", ids.join(", ")))
    }
}
