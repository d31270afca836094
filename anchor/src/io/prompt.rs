//! Task prompt rendering.
//!
//! Each profile has a minijinja template under `io/prompts/`. The rendered text
//! becomes the single seed message of the conversation.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::profile::Profile;

const DEPLOY_TEMPLATE: &str = include_str!("prompts/deploy.md");
const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");

/// User message appended when the model stops calling tools before the
/// completion criterion holds.
pub const NUDGE: &str =
    "Continue. Do not summarize or plan. Use tools to execute the next phase now.";

/// Values substituted into a task template.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub project_path: &'a Path,
    /// Secrets template the model should write and later push.
    pub secrets_file: &'a Path,
    pub required_artifacts: Vec<&'a str>,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("deploy", DEPLOY_TEMPLATE)
            .context("load deploy template")?;
        env.add_template("generate", GENERATE_TEMPLATE)
            .context("load generate template")?;
        Ok(Self { env })
    }

    fn render(&self, name: &str, input: &PromptInputs<'_>) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template.render(context! {
            project_path => input.project_path.display().to_string(),
            secrets_file => input.secrets_file.display().to_string(),
            required_artifacts => &input.required_artifacts,
        })?;
        Ok(rendered)
    }
}

/// Render the seed prompt for `profile`.
pub fn render_task_prompt(profile: Profile, input: &PromptInputs<'_>) -> Result<String> {
    let engine = PromptEngine::new()?;
    let template = profile.spec().template;
    let rendered = engine
        .render(template, input)
        .with_context(|| format!("render {template} prompt"))?;
    debug!(template, bytes = rendered.len(), "rendered task prompt");
    Ok(rendered)
}
