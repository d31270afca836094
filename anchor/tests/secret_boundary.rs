//! Secret values never reach the model-visible conversation.
//!
//! The scripted model writes a secrets template, the user "fills it in",
//! and the model then pushes it, reads it back and `cat`s it. The values may
//! only exist on disk and in the store.

use anchor::core::run_state::CompletionCriterion;
use anchor::core::types::{Message, ToolCall};
use anchor::looping::{LoopStop, run_loop};
use anchor::profile::Profile;
use anchor::step::{LoopEvent, TurnConfig};
use anchor::test_support::{
    FakeSecretStore, ScriptedModel, ScriptedPrompter, TempProject, tool_settings,
};
use anchor::tools::Registry;
use anchor::tools::dispatch::Toolbox;
use serde_json::json;

const API_KEY: &str = "sk-test-9f8e7d6c5b4a";
const DB_URL: &str = "postgres://app:hunter2hunter2@db/prod";

fn call(id: &str, name: &str, arguments: serde_json::Value) -> Message {
    Message::assistant(None, vec![ToolCall::new(id, name, arguments.to_string())])
}

#[test]
fn pushed_and_read_back_values_stay_out_of_the_conversation() {
    let project = TempProject::new().expect("project");
    let env_file = project.path(".env.anchor");
    let env_path = env_file.display().to_string();

    // The human fills in the template between the write and the push.
    project
        .write(
            ".env.anchor",
            &format!("# filled by the user\nAPI_KEY={API_KEY}\nEMPTY=\nDATABASE_URL=\"{DB_URL}\"\n"),
        )
        .expect("write secrets");

    let model = ScriptedModel::new(vec![
        Ok(call(
            "ask",
            "ask_user",
            json!({"question": "Fill in .env.anchor and press Enter"}),
        )),
        Ok(call(
            "push",
            "push_secrets",
            json!({"env_file": env_path, "project_id": "demo-project"}),
        )),
        Ok(call("read", "read_file", json!({"path": env_path}))),
        Ok(call(
            "cat",
            "run_command",
            json!({"command": format!("cat {env_path}")}),
        )),
        Ok(call(
            "script",
            "write_file",
            json!({"path": "deploy.sh", "content": "#!/bin/sh\ngcloud run deploy --set-secrets=API_KEY=API_KEY:latest\n"}),
        )),
        Ok(Message::assistant(Some("Deployed.".into()), Vec::new())),
    ]);
    let registry = Registry::for_profile(Profile::Deploy);
    let mut toolbox = Toolbox::new(
        tool_settings(project.root()),
        ScriptedPrompter::new([""]),
        FakeSecretStore::default(),
    );

    let outcome = run_loop(
        &model,
        &registry,
        &mut toolbox,
        &TurnConfig {
            model: "test-model".into(),
            max_tokens: 256,
            completion: CompletionCriterion::new(["deploy.sh"]),
        },
        "deploy".into(),
        20,
        |_: &LoopEvent<'_>| {},
    )
    .expect("loop");
    assert_eq!(outcome.stop, LoopStop::Done);

    let serialized = serde_json::to_string(&outcome.conversation).expect("serialize");
    assert!(!serialized.contains(API_KEY), "API key leaked");
    assert!(!serialized.contains("hunter2hunter2"), "database password leaked");
    for seen in model.seen_messages() {
        let text = serde_json::to_string(&seen).expect("serialize");
        assert!(!text.contains(API_KEY));
        assert!(!text.contains(DB_URL));
    }

    let push_result = outcome
        .conversation
        .messages()
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("push"))
        .and_then(|m| m.content.clone())
        .expect("push result");
    assert!(push_result.contains("Pushed: API_KEY, DATABASE_URL"));
    assert!(push_result.contains("Skipped: EMPTY"));
    assert!(push_result.contains(
        "--set-secrets=API_KEY=API_KEY:latest,DATABASE_URL=DATABASE_URL:latest"
    ));

    let read_result = outcome
        .conversation
        .messages()
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("read"))
        .and_then(|m| m.content.clone())
        .expect("read result");
    assert!(read_result.contains("API_KEY=[REDACTED]"));
}

#[test]
fn generate_profile_cannot_push_or_run_commands() {
    let project = TempProject::new().expect("project");
    project.write(".env.anchor", "TOKEN=abcdefgh\n").expect("write");
    let model = ScriptedModel::new(vec![
        Ok(call(
            "push",
            "push_secrets",
            json!({"env_file": ".env.anchor", "project_id": "p"}),
        )),
        Ok(call("cat", "run_command", json!({"command": "cat .env.anchor"}))),
        Ok(Message::assistant(Some("Stopping.".into()), Vec::new())),
    ]);
    let registry = Registry::for_profile(Profile::Generate);
    let mut store = FakeSecretStore::default();
    let mut toolbox = Toolbox::new(
        tool_settings(project.root()),
        ScriptedPrompter::default(),
        &mut store,
    );

    let outcome = run_loop(
        &model,
        &registry,
        &mut toolbox,
        &TurnConfig {
            model: "test-model".into(),
            max_tokens: 256,
            completion: CompletionCriterion::default(),
        },
        "generate".into(),
        5,
        |_: &LoopEvent<'_>| {},
    )
    .expect("loop");
    drop(toolbox);

    assert_eq!(outcome.stop, LoopStop::Done);
    assert!(store.stored_keys().is_empty());
    let results: Vec<String> = outcome
        .conversation
        .messages()
        .iter()
        .filter(|m| m.tool_call_id.is_some())
        .filter_map(|m| m.content.clone())
        .collect();
    assert_eq!(
        results,
        vec![
            "ERROR: Unknown tool 'push_secrets'".to_string(),
            "ERROR: Unknown tool 'run_command'".to_string(),
        ]
    );
}

#[cfg(unix)]
#[test]
fn project_dotenv_read_before_push_is_redacted() {
    let project = TempProject::new().expect("project");
    let token = "sk-live-0a1b2c3d4e5f";
    project
        .write(".env", &format!("API_KEY={token}\n"))
        .expect("write .env");
    project
        .write("services/worker/.env.production", "QUEUE_PASSWORD=q-pass-778899\n")
        .expect("write nested env");

    let model = ScriptedModel::new(vec![
        Ok(call("read", "read_file", json!({"path": ".env"}))),
        Ok(call(
            "nested",
            "run_command",
            json!({"command": "cat services/worker/.env.production"}),
        )),
        Ok(call(
            "push",
            "push_secrets",
            json!({"env_file": ".env", "project_id": "demo-project"}),
        )),
        Ok(call(
            "script",
            "write_file",
            json!({"path": "deploy.sh", "content": "#!/bin/sh\n"}),
        )),
        Ok(Message::assistant(Some("Deployed.".into()), Vec::new())),
    ]);
    let registry = Registry::for_profile(Profile::Deploy);
    let mut toolbox = Toolbox::new(
        tool_settings(project.root()),
        ScriptedPrompter::default(),
        FakeSecretStore::default(),
    );

    let outcome = run_loop(
        &model,
        &registry,
        &mut toolbox,
        &TurnConfig {
            model: "test-model".into(),
            max_tokens: 256,
            completion: CompletionCriterion::new(["deploy.sh"]),
        },
        "deploy".into(),
        10,
        |_: &LoopEvent<'_>| {},
    )
    .expect("loop");
    assert_eq!(outcome.stop, LoopStop::Done);

    let serialized = serde_json::to_string(&outcome.conversation).expect("serialize");
    assert!(!serialized.contains(token), "API key leaked");
    assert!(!serialized.contains("q-pass-778899"), "nested password leaked");
    for seen in model.seen_messages() {
        let text = serde_json::to_string(&seen).expect("serialize");
        assert!(!text.contains(token));
        assert!(!text.contains("q-pass-778899"));
    }

    let result_for = |id: &str| {
        outcome
            .conversation
            .messages()
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some(id))
            .and_then(|m| m.content.clone())
            .expect("result")
    };
    assert_eq!(result_for("read"), "API_KEY=[REDACTED]\n");
    assert_eq!(result_for("nested"), "QUEUE_PASSWORD=[REDACTED]");
    assert!(result_for("push").contains("Pushed: API_KEY"));
}
