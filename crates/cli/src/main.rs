//! IronTask CLI — the main entry point.
//!
//! Commands:
//! - `run`        — Execute a query through the agent loop
//! - `tools`      — Discover and list available tools
//! - `checkpoint` — Inspect a saved checkpoint by task id

use clap::{Parser, Subcommand};
use irontask_agent::{AgentLoop, LazyToolset, RunOutcome};
use irontask_checkpoint::{task_id_for, CheckpointStore, FileCheckpointStore};
use irontask_config::RuntimeConfig;
use irontask_core::event::EventBus;
use irontask_core::tool::ToolSource;
use irontask_providers::{OpenAiCompatProvider, RetryPolicy, RetryProvider};
use irontask_tools::{BuiltinSource, ManifestSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "irontask",
    about = "IronTask — a resilient LLM agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (default: ~/.irontask/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query through the agent loop
    Run {
        /// The user query
        query: String,

        /// Override the model for this run
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Discover and list available tools
    Tools,

    /// Show a saved checkpoint
    Checkpoint {
        /// The task id (printed with every run outcome)
        task_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => RuntimeConfig::load_from(path)?,
        None => RuntimeConfig::load()?,
    };

    match cli.command {
        Commands::Run { query, model } => run_query(config, query, model).await,
        Commands::Tools => list_tools(config).await,
        Commands::Checkpoint { task_id } => show_checkpoint(config, &task_id).await,
    }
}

fn tool_sources(config: &RuntimeConfig) -> Vec<Box<dyn ToolSource>> {
    let workspace = config
        .tools
        .workspace
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    let mut sources: Vec<Box<dyn ToolSource>> = vec![Box::new(BuiltinSource::new(
        workspace,
        config.tools.shell_allowlist.clone(),
    ))];
    if let Some(dir) = &config.tools.manifest_dir {
        sources.push(Box::new(ManifestSource::new(dir)));
    }
    sources
}

fn checkpoint_store(config: &RuntimeConfig) -> Arc<FileCheckpointStore> {
    let dir = config
        .checkpoint_dir
        .clone()
        .unwrap_or_else(FileCheckpointStore::default_dir);
    Arc::new(FileCheckpointStore::new(dir))
}

async fn run_query(
    mut config: RuntimeConfig,
    query: String,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(model) = model {
        config.default_model = model;
        config.models = Default::default();
    }

    let api_key = config.provider.api_key.clone().unwrap_or_default();
    let inner = OpenAiCompatProvider::new(
        config.provider.name.clone(),
        config.provider.base_url.clone(),
        api_key,
    )?;
    let provider = Arc::new(RetryProvider::new(
        Arc::new(inner),
        RetryPolicy::from_config(&config.retry, config.limits.model_timeout_secs),
    ));

    let toolset = Arc::new(LazyToolset::new(
        tool_sources(&config),
        Duration::from_secs(config.limits.tool_timeout_secs),
    ));
    if !config.tools.lazy_loading {
        toolset.get_or_discover().await;
    }

    let agent = Arc::new(AgentLoop::new(
        provider,
        toolset,
        checkpoint_store(&config),
        config,
        Arc::new(EventBus::default()),
    ));

    // Ctrl-C aborts at the next suspension point; the checkpoint survives.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }

    // The run itself never errors; a panic here is a bug, and the user gets
    // a plain failure with the task id instead of a stack trace.
    let task_id = task_id_for(&query);
    let run = tokio::spawn({
        let agent = agent.clone();
        let query = query.clone();
        async move { agent.run_cancellable(&query, cancel).await }
    });
    let outcome = match run.await {
        Ok(outcome) => outcome,
        Err(_) => RunOutcome::Failed {
            message: format!("An unexpected internal error occurred. (task id: {task_id})"),
            task_id,
        },
    };

    match outcome {
        RunOutcome::Done { answer, .. } => {
            println!("{answer}");
            Ok(())
        }
        RunOutcome::Partial { report, .. } => {
            println!("{}", report.render());
            Ok(())
        }
        RunOutcome::Failed { message, .. } => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    }
}

async fn list_tools(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toolset = LazyToolset::new(
        tool_sources(&config),
        Duration::from_secs(config.limits.tool_timeout_secs),
    );
    let registry = toolset.get_or_discover().await;

    println!("{} tool(s) available:", registry.len());
    for definition in registry.definitions() {
        println!("  {:<14} {}", definition.name, definition.description);
    }
    Ok(())
}

async fn show_checkpoint(
    config: RuntimeConfig,
    task_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = checkpoint_store(&config);
    match store.load(task_id).await? {
        Some(checkpoint) => {
            println!("{}", serde_json::to_string_pretty(&checkpoint)?);
            Ok(())
        }
        None => {
            eprintln!("No checkpoint found for task id '{task_id}'");
            std::process::exit(1);
        }
    }
}
