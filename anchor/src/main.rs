//! `anchor`: scan a project, generate deployment files and deploy it, driven
//! by a tool-calling language model.

use std::path::PathBuf;
use std::time::Duration;

use anchor::console::Console;
use anchor::core::backoff::BackoffPolicy;
use anchor::core::run_state::CompletionCriterion;
use anchor::exit_codes;
use anchor::io::config::{AnchorConfig, DEFAULT_CONFIG_PATH, load_config};
use anchor::io::model::ChatCompletionsClient;
use anchor::io::prompt::{PromptInputs, render_task_prompt};
use anchor::io::retry::RetryingModel;
use anchor::io::secret_store::GcloudSecretStore;
use anchor::io::terminal::TerminalPrompter;
use anchor::io::transcript::write_transcript;
use anchor::io::wait::{ChannelWaiter, InterruptHandle, Interrupted};
use anchor::logging;
use anchor::looping::run_loop;
use anchor::profile::Profile;
use anchor::step::{LoopEvent, TurnConfig};
use anchor::tools::Registry;
use anchor::tools::dispatch::{ToolSettings, Toolbox};
use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "anchor",
    version,
    about = "Deploy a project to Google Cloud Run with a tool-calling agent"
)]
struct Cli {
    /// Path to the project to deploy.
    #[arg(long, value_name = "PATH")]
    project: PathBuf,

    /// Model id (overrides the config file).
    #[arg(long, env = "ANCHOR_MODEL", value_name = "MODEL")]
    model: Option<String>,

    /// Tool set, prompt and completion rule to use.
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Turn budget (overrides the profile default).
    #[arg(long, value_name = "N")]
    max_turns: Option<u32>,

    /// Config file. Defaults to `<PATH>/.anchor/config.toml`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write `.anchor/transcript.json` when the run ends.
    #[arg(long)]
    transcript: bool,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) if err.downcast_ref::<Interrupted>().is_some() => {
            eprintln!("\nAborted.");
            exit_codes::INTERRUPTED
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli
        .project
        .canonicalize()
        .with_context(|| format!("'{}' is not a valid directory", cli.project.display()))?;
    if !root.is_dir() {
        bail!("'{}' is not a valid directory", cli.project.display());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_PATH));
    let mut config = load_config(&config_path)?;
    apply_overrides(&mut config, &cli);
    config.validate()?;
    info!(config = %config_path.display(), profile = %config.profile, "config loaded");

    let profile = config.profile;
    let required = config.effective_required();
    let settings = ToolSettings::from_config(&root, &config);
    let secrets_file = settings
        .secret_files
        .first()
        .cloned()
        .unwrap_or_else(|| root.join(".env.anchor"));
    let task = render_task_prompt(
        profile,
        &PromptInputs {
            project_path: &root,
            secrets_file: &secrets_file,
            required_artifacts: required.iter().map(String::as_str).collect(),
        },
    )?;

    let client = ChatCompletionsClient::from_config(&config.llm)?;
    let waiter = ChannelWaiter::new();
    install_interrupt_handler(waiter.interrupt_handle())?;
    let model = RetryingModel::new(
        client,
        BackoffPolicy::new(Duration::from_secs(config.llm.backoff_base_secs)),
        waiter,
    );
    let registry = Registry::for_profile(profile);
    let mut toolbox = Toolbox::new(
        settings,
        TerminalPrompter,
        GcloudSecretStore::new(&config.tools),
    );
    let turn_config = TurnConfig {
        model: config.llm.model.clone(),
        max_tokens: config.llm.max_tokens,
        completion: CompletionCriterion::new(required),
    };

    let mut console = Console;
    console.banner(&root, &config.llm.model, profile);
    let outcome = run_loop(
        &model,
        &registry,
        &mut toolbox,
        &turn_config,
        task,
        config.effective_max_turns(),
        |event: &LoopEvent<'_>| console.on_event(event),
    )?;

    if config.transcript {
        match write_transcript(&root, profile, &config.llm.model, &outcome) {
            Ok(path) => println!("Transcript: {}", path.display()),
            Err(err) => warn!(err = %format!("{err:#}"), "failed to write transcript"),
        }
    }
    console.summary(&outcome);
    Ok(exit_codes::OK)
}

/// Ctrl-C during a backoff wait unwinds the run as [`Interrupted`]; anywhere
/// else it ends the process with the interrupted exit code.
#[cfg(unix)]
fn install_interrupt_handler(handle: InterruptHandle) -> Result<()> {
    use anchor::io::wait::SignalAction;
    use signal_hook::consts::SIGINT;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT]).context("install SIGINT handler")?;
    std::thread::spawn(move || {
        for _ in signals.forever() {
            if handle.on_signal() == SignalAction::Exit {
                eprintln!("\nAborted.");
                std::process::exit(exit_codes::INTERRUPTED);
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn install_interrupt_handler(_handle: InterruptHandle) -> Result<()> {
    Ok(())
}

/// Command-line values win over the config file.
fn apply_overrides(config: &mut AnchorConfig, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(profile) = cli.profile {
        config.profile = profile;
    }
    if let Some(max_turns) = cli.max_turns {
        config.max_turns = Some(max_turns);
    }
    if cli.transcript {
        config.transcript = true;
    }
}
