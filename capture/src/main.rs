//! Login-gated UI state capture.
//!
//! Takes a natural-language task, signs into the app it names, executes a
//! documentation-grounded plan (or an on-demand fallback), and writes a
//! numbered screenshot per step plus `manifest.json` under the output directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use ui_capture::exit_codes;
use ui_capture::io::agent::{CommandAgent, Credentials};
use ui_capture::io::config::{CaptureConfig, DEFAULT_CONFIG_FILE, load_config};
use ui_capture::io::history::{HISTORY_FILE, load_history};
use ui_capture::io::planner::CommandPlanner;
use ui_capture::io::profile_store::FsProfileStore;
use ui_capture::io::search::CommandSearch;
use ui_capture::logging;
use ui_capture::orchestrator::{Collaborators, Orchestrator, OrchestratorSettings};

const EMAIL_ENV: &str = "UI_CAPTURE_EMAIL";
const PASSWORD_ENV: &str = "UI_CAPTURE_PASSWORD";

#[derive(Parser)]
#[command(
    name = "ui-capture",
    version,
    about = "Login-gated planning and execution with per-step screenshots"
)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one task end to end and print its result as JSON.
    Run {
        /// Task text, e.g. "Create a project in Linear".
        #[arg(required = true, num_args = 1..)]
        task: Vec<String>,
    },
    /// List supported apps.
    Apps,
    /// Print recorded task results from `history.jsonl`.
    History {
        /// Only the most recent N entries.
        #[arg(short = 'n', long)]
        last: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    logging::init();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Run { task } => cmd_run(&config, &task.join(" ")).await,
        Command::Apps => cmd_apps(&config),
        Command::History { last } => cmd_history(&config, last),
    }
}

async fn cmd_run(config: &CaptureConfig, task: &str) -> Result<i32> {
    if task.trim().is_empty() {
        bail!("task text is empty");
    }
    let credentials = credentials_from_env()?;
    let collaborator_timeout = config.collaborator_timeout();
    let collaborators = Collaborators {
        agent: Arc::new(CommandAgent::new(
            config.agent.command.clone(),
            config.profile_dir.clone(),
            config.step_timeout(),
            config.output_limit_bytes,
        )),
        search: Arc::new(CommandSearch::new(
            config.search.command.clone(),
            collaborator_timeout,
            config.output_limit_bytes,
        )),
        summarizer: Arc::new(CommandPlanner::new(
            config.planner.command.clone(),
            collaborator_timeout,
            config.output_limit_bytes,
        )),
        profiles: Arc::new(FsProfileStore::new(config.profile_dir.clone())),
    };
    let orchestrator = Orchestrator::new(
        config.registry(),
        collaborators,
        credentials,
        OrchestratorSettings {
            output_dir: config.output_dir.clone(),
            step_timeout: config.step_timeout(),
            max_documents: config.max_documents,
        },
    );

    let result = orchestrator.run(task).await?;
    print_json(&result)?;
    Ok(exit_codes::for_status(result.status))
}

fn cmd_apps(config: &CaptureConfig) -> Result<i32> {
    for app in config.registry().profiles() {
        println!(
            "{}\t{}\t{}s{}",
            app.id,
            app.base_url,
            app.overall_timeout_seconds,
            if app.complex { "\tcomplex" } else { "" }
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_history(config: &CaptureConfig, last: Option<usize>) -> Result<i32> {
    let entries = load_history(&config.output_dir.join(HISTORY_FILE))?;
    let skip = last.map_or(0, |n| entries.len().saturating_sub(n));
    for entry in entries.iter().skip(skip) {
        println!("{}", serde_json::to_string(entry).context("serialize history entry")?);
    }
    Ok(exit_codes::OK)
}

/// Login credentials come from the environment, never from the config file.
fn credentials_from_env() -> Result<Credentials> {
    let email = std::env::var(EMAIL_ENV).with_context(|| format!("{EMAIL_ENV} is not set"))?;
    let password =
        std::env::var(PASSWORD_ENV).with_context(|| format!("{PASSWORD_ENV} is not set"))?;
    Ok(Credentials { email, password })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize result")?;
    println!("{payload}");
    Ok(())
}
