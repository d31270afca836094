//! Malformed tool calls become `ERROR:` results instead of failures.

use anchor::core::types::ToolCall;
use anchor::profile::Profile;
use anchor::test_support::{FakeSecretStore, ScriptedPrompter, TempProject, tool_settings};
use anchor::tools::dispatch::{Toolbox, dispatch};
use anchor::tools::{Registry, ToolKind};

fn run(registry: &Registry, project: &TempProject, call: &ToolCall) -> String {
    let mut toolbox = Toolbox::new(
        tool_settings(project.root()),
        ScriptedPrompter::default(),
        FakeSecretStore::default(),
    );
    let dispatched = dispatch(registry, &mut toolbox, call).expect("dispatch");
    assert_eq!(dispatched.result.tool_call_id, call.id);
    assert!(dispatched.wrote.is_none());
    dispatched.result.content
}

#[test]
fn malformed_json_reports_bad_arguments() {
    let project = TempProject::new().expect("project");
    let registry = Registry::for_profile(Profile::Deploy);

    let text = run(
        &registry,
        &project,
        &ToolCall::new("x1", "write_file", r#"{"path": "Dockerfile", "content": "#),
    );

    assert!(text.starts_with("ERROR: Bad arguments for write_file: "), "{text}");
    assert!(!project.path("Dockerfile").exists());
}

#[test]
fn missing_required_argument_names_the_field() {
    let project = TempProject::new().expect("project");
    let registry = Registry::for_profile(Profile::Deploy);

    let text = run(&registry, &project, &ToolCall::new("x2", "run_command", ""));

    assert!(text.starts_with("ERROR: Bad arguments for run_command: "), "{text}");
    assert!(text.contains("command"), "{text}");
}

#[test]
fn unexpected_field_is_rejected() {
    let project = TempProject::new().expect("project");
    let registry = Registry::for_profile(Profile::Deploy);

    let text = run(
        &registry,
        &project,
        &ToolCall::new("x3", "ask_user", r#"{"question": "?", "default": "y"}"#),
    );

    assert!(text.starts_with("ERROR: Bad arguments for ask_user: "), "{text}");
}

#[test]
fn unknown_and_disabled_tools_read_the_same() {
    let project = TempProject::new().expect("project");
    let registry = Registry::new([ToolKind::ReadFile]);

    assert_eq!(
        run(&registry, &project, &ToolCall::new("x4", "rm_rf", "{}")),
        "ERROR: Unknown tool 'rm_rf'"
    );
    assert_eq!(
        run(
            &registry,
            &project,
            &ToolCall::new("x5", "write_file", r#"{"path": "a", "content": "b"}"#)
        ),
        "ERROR: Unknown tool 'write_file'"
    );
    assert!(!project.path("a").exists());
}

#[test]
fn tool_level_failures_are_text_too() {
    let project = TempProject::new().expect("project");
    let registry = Registry::for_profile(Profile::Deploy);

    let text = run(
        &registry,
        &project,
        &ToolCall::new("x6", "read_file", r#"{"path": "missing.txt"}"#),
    );
    assert!(text.starts_with("ERROR"), "{text}");

    let text = run(
        &registry,
        &project,
        &ToolCall::new(
            "x7",
            "push_secrets",
            r#"{"env_file": ".env.anchor", "project_id": "p"}"#,
        ),
    );
    assert!(text.starts_with("ERROR:"), "{text}");
    assert!(text.contains("not found"), "{text}");
}
