//! The orchestration loop: turns until done or out of budget.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::conversation::Conversation;
use crate::core::run_state::{RunState, Terminal};
use crate::io::model::ModelClient;
use crate::io::secret_store::SecretStore;
use crate::io::terminal::Prompter;
use crate::step::{LoopEvent, TurnConfig, TurnContext, TurnOutcome, run_turn};
use crate::tools::Registry;
use crate::tools::dispatch::Toolbox;

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The model stopped calling tools with every required artifact written.
    Done,
    /// The turn budget ran out first.
    Aborted { max_turns: u32 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Model calls made.
    pub turns_used: u32,
    pub stop: LoopStop,
    pub artifacts: BTreeSet<String>,
    pub conversation: Conversation,
}

/// Drive the conversation from the seed `task` until the completion criterion
/// holds after a tool-free reply, or `max_turns` turns were spent.
///
/// Running out of turns is an outcome, not an error. Model failures and
/// interruptions are errors and end the loop immediately.
#[instrument(skip_all, fields(max_turns = max_turns, model = %config.model))]
pub fn run_loop<M, P, S, F>(
    model: &M,
    registry: &Registry,
    toolbox: &mut Toolbox<P, S>,
    config: &TurnConfig,
    task: String,
    max_turns: u32,
    mut on_event: F,
) -> Result<LoopOutcome>
where
    M: ModelClient,
    P: Prompter,
    S: SecretStore,
    F: FnMut(&LoopEvent<'_>),
{
    let schemas = registry.schemas();
    let mut ctx = TurnContext {
        model,
        registry,
        schemas: &schemas,
        toolbox,
        config,
    };
    let mut state = RunState::new(max_turns);
    let mut conversation = Conversation::seeded(task);
    let mut turns_used = 0u32;

    while state.budget_left() {
        let outcome = run_turn(&mut ctx, &mut state, &mut conversation, &mut on_event)?;
        turns_used += 1;
        if outcome == TurnOutcome::Done {
            break;
        }
    }

    let stop = match state.terminal {
        Some(Terminal::Done) => {
            info!(turns_used, "loop done");
            LoopStop::Done
        }
        Some(Terminal::Aborted) | None => {
            state.terminal = Some(Terminal::Aborted);
            warn!(
                max_turns,
                missing = ?config.completion.missing(&state.artifacts_produced),
                "turn budget exhausted"
            );
            LoopStop::Aborted { max_turns }
        }
    };

    Ok(LoopOutcome {
        turns_used,
        stop,
        artifacts: state.artifacts_produced,
        conversation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::run_state::CompletionCriterion;
    use crate::core::types::{Message, ToolCall};
    use crate::profile::Profile;
    use crate::test_support::{FakeSecretStore, ScriptedModel, ScriptedPrompter, tool_settings};

    fn turn_config(required: &[&str]) -> TurnConfig {
        TurnConfig {
            model: "test".into(),
            max_tokens: 64,
            completion: CompletionCriterion::new(required.iter().copied()),
        }
    }

    #[test]
    fn done_immediately_when_nothing_is_required() {
        let temp = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![Ok(Message::assistant(
            Some("Nothing to do.".into()),
            Vec::new(),
        ))]);
        let registry = Registry::for_profile(Profile::Generate);
        let mut toolbox = Toolbox::new(
            tool_settings(temp.path()),
            ScriptedPrompter::default(),
            FakeSecretStore::default(),
        );

        let outcome = run_loop(
            &model,
            &registry,
            &mut toolbox,
            &turn_config(&[]),
            "task".into(),
            5,
            |_: &LoopEvent<'_>| {},
        )
        .expect("loop");

        assert_eq!(outcome.stop, LoopStop::Done);
        assert_eq!(outcome.turns_used, 1);
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn budget_exhaustion_is_an_outcome() {
        let temp = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::repeating(Message::assistant(
            None,
            vec![ToolCall::new("c", "list_directory", r#"{"path": "."}"#)],
        ));
        let registry = Registry::for_profile(Profile::Generate);
        let mut toolbox = Toolbox::new(
            tool_settings(temp.path()),
            ScriptedPrompter::default(),
            FakeSecretStore::default(),
        );

        let outcome = run_loop(
            &model,
            &registry,
            &mut toolbox,
            &turn_config(&["deploy.sh"]),
            "task".into(),
            2,
            |_: &LoopEvent<'_>| {},
        )
        .expect("loop");

        assert_eq!(outcome.stop, LoopStop::Aborted { max_turns: 2 });
        assert_eq!(outcome.turns_used, 2);
        assert_eq!(model.calls(), 2);
    }
}
