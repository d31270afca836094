//! One turn of the orchestration loop.

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::conversation::Conversation;
use crate::core::run_state::{CompletionCriterion, RunState, Terminal};
use crate::core::types::{ToolCall, ToolResult};
use crate::io::model::{ModelClient, ModelError, ModelRequest};
use crate::io::prompt::NUDGE;
use crate::io::secret_store::SecretStore;
use crate::io::terminal::Prompter;
use crate::tools::dispatch::{Toolbox, dispatch};
use crate::tools::{Registry, ToolSchema};

/// Per-run settings for each model call.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub model: String,
    pub max_tokens: u32,
    pub completion: CompletionCriterion,
}

/// Progress notifications for the caller.
#[derive(Debug)]
pub enum LoopEvent<'a> {
    TurnStarted { turn: u32, max_turns: u32 },
    AssistantText(&'a str),
    ToolCallsReceived(usize),
    ToolStarted(&'a ToolCall),
    ToolFinished { call: &'a ToolCall, result: &'a ToolResult },
    ArtifactRecorded(&'a str),
    Nudged { missing: Vec<&'a str> },
}

/// What a single turn did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model called tools; all results were appended.
    ToolsExecuted(usize),
    /// The model stopped early and was told to continue.
    Nudged,
    /// The model stopped and the completion criterion holds.
    Done,
}

/// Everything a turn needs besides the mutable run state.
pub struct TurnContext<'a, M, P, S> {
    pub model: &'a M,
    pub registry: &'a Registry,
    pub schemas: &'a [ToolSchema],
    pub toolbox: &'a mut Toolbox<P, S>,
    pub config: &'a TurnConfig,
}

/// Run one turn: call the model, then dispatch its tool calls in order or
/// judge completion.
///
/// The turn counter advances for tool turns and nudges, not for `Done`.
#[instrument(skip_all, fields(turn = state.turn))]
pub fn run_turn<M, P, S, F>(
    ctx: &mut TurnContext<'_, M, P, S>,
    state: &mut RunState,
    conversation: &mut Conversation,
    on_event: &mut F,
) -> Result<TurnOutcome>
where
    M: ModelClient,
    P: Prompter,
    S: SecretStore,
    F: FnMut(&LoopEvent<'_>),
{
    conversation.ensure_settled()?;
    on_event(&LoopEvent::TurnStarted {
        turn: state.turn,
        max_turns: state.max_turns,
    });

    let request = ModelRequest {
        model: &ctx.config.model,
        messages: conversation.messages(),
        tools: ctx.schemas,
        max_tokens: ctx.config.max_tokens,
    };
    let reply = match ctx.model.complete(&request) {
        Ok(reply) => reply,
        Err(ModelError::Interrupted(interrupted)) => return Err(interrupted.into()),
        Err(err) => return Err(anyhow::Error::new(err).context("model call failed")),
    };
    if let Some(text) = reply.content.as_deref() {
        on_event(&LoopEvent::AssistantText(text));
    }
    let calls = reply.tool_calls.clone();
    conversation.push_assistant(reply)?;

    if calls.is_empty() {
        let completion = &ctx.config.completion;
        if completion.is_satisfied(&state.artifacts_produced) {
            info!(turn = state.turn, "completion criterion met");
            state.terminal = Some(Terminal::Done);
            return Ok(TurnOutcome::Done);
        }
        let missing = completion.missing(&state.artifacts_produced);
        debug!(?missing, "model stopped early, nudging");
        on_event(&LoopEvent::Nudged { missing });
        conversation.push_user(NUDGE)?;
        state.advance();
        return Ok(TurnOutcome::Nudged);
    }

    on_event(&LoopEvent::ToolCallsReceived(calls.len()));
    for call in &calls {
        on_event(&LoopEvent::ToolStarted(call));
        let dispatched = dispatch(ctx.registry, ctx.toolbox, call)?;
        if let Some(path) = &dispatched.wrote {
            let whitelist = &ctx.toolbox.settings().artifact_whitelist;
            if let Some(name) = state.record_artifact(path, whitelist) {
                info!(artifact = %name, "artifact produced");
                on_event(&LoopEvent::ArtifactRecorded(&name));
            }
        }
        on_event(&LoopEvent::ToolFinished {
            call,
            result: &dispatched.result,
        });
        conversation.push_tool_result(dispatched.result)?;
    }
    state.advance();
    Ok(TurnOutcome::ToolsExecuted(calls.len()))
}
