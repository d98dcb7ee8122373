//! sleuth: submit one OSINT lookup, wait for it, print the task as JSON.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sleuth_core::{Scheduler, SchedulerBuilder, SchedulerConfig, WaitError};

#[derive(Parser)]
#[command(name = "sleuth")]
#[command(about = "Run OSINT enumeration tools through the sleuth scheduler", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a task and poll until it finishes
    Run {
        /// Task type, e.g. email-enumeration
        task_type: String,

        /// Payload as a JSON object, e.g. '{"email":"alice@example.com"}'
        payload: String,

        /// Rate limits are tracked per user
        #[arg(long, default_value = "cli")]
        user: String,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "500")]
        poll_ms: u64,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "600")]
        wait_secs: u64,
    },

    /// List the registered task types
    Tools,

    /// Print the effective configuration
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<SchedulerConfig> {
    match path {
        Some(path) => SchedulerConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(SchedulerConfig::default()),
    }
}

fn build(config: SchedulerConfig) -> Result<Scheduler> {
    let scheduler = SchedulerBuilder::new(config)
        .with_builtin_tools()?
        .build()
        .context("building scheduler")?;
    Ok(scheduler)
}

async fn run(
    scheduler: Scheduler,
    task_type: String,
    payload: &str,
    user: &str,
    poll: Duration,
    deadline: Duration,
) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("payload must be valid JSON")?;

    let handle = scheduler.start();
    let task_id = scheduler.add_task(task_type, user, payload).await?;
    tracing::info!(%task_id, "submitted");

    let id = task_id.to_string();
    let waited = tokio::select! {
        waited = scheduler.wait_for_terminal(&id, poll, deadline) => waited,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; cancelling running tools");
            handle.abort_and_join().await;
            let snapshot = scheduler.get_task_status(&id).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            bail!("interrupted");
        }
    };

    let snapshot = match waited {
        Ok(snapshot) => snapshot,
        Err(WaitError::DeadlineElapsed { last, .. }) => {
            handle.abort_and_join().await;
            println!("{}", serde_json::to_string_pretty(&last)?);
            bail!("task {id} did not finish within {}s", deadline.as_secs());
        }
        Err(e) => return Err(e.into()),
    };

    handle.shutdown_and_join().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    tracing::info!(stats = ?scheduler.get_queue_stats().await, "done");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            task_type,
            payload,
            user,
            poll_ms,
            wait_secs,
        } => {
            let scheduler = build(config)?;
            run(
                scheduler,
                task_type,
                &payload,
                &user,
                Duration::from_millis(poll_ms),
                Duration::from_secs(wait_secs),
            )
            .await
        }
        Commands::Tools => {
            for task_type in build(config)?.registered_types() {
                println!("{task_type}");
            }
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
