//! autocrew CLI - runs a declared task queue through LLM executors.

mod report;

use anyhow::{Context, Result};
use autocrew_ai::{AnthropicClient, Credential, LlmConfig, LlmExecutor};
use autocrew_core::{builtin_queue, load_declarations, Task, TaskDeclaration};
use autocrew_execution::{
    run_with_retries, Budget, DependencyResolver, FailurePolicy, Orchestrator, OrchestratorConfig, RetryPolicy,
};
use autocrew_storage::{ComplianceLedger, Ledger, LedgerConfig, MemoryLedger};
use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use report::RunSummary;

#[derive(Parser)]
#[command(name = "autocrew")]
#[command(about = "Dependency-aware task orchestration with LLM executors", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueueArgs {
    /// JSON task declarations (defaults to the built-in queue)
    #[arg(long, env = "AUTOCREW_TASKS")]
    tasks: Option<PathBuf>,
}

#[derive(Args)]
struct LedgerArgs {
    /// Compliance ledger file
    #[arg(long, env = "AUTOCREW_LEDGER", default_value = "CODE-COMPLIANCE.md")]
    ledger: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the queue
    Run {
        #[command(flatten)]
        queue: QueueArgs,
        #[command(flatten)]
        ledger: LedgerArgs,
        /// Name written into ledger notes
        #[arg(long, env = "AUTOCREW_ACTOR", default_value = "Autonomous Claude")]
        actor: String,
        /// Keep ledger marks in memory only
        #[arg(long)]
        no_ledger: bool,
        /// Deadline as a multiple of the estimate
        #[arg(long, default_value_t = 1.5)]
        timeout_multiplier: f64,
        /// Extra passes over failed tasks
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
        /// Tasks allowed in flight at once
        #[arg(long, default_value = "1")]
        concurrency: NonZeroUsize,
        /// Execute tasks even when a dependency failed
        #[arg(long)]
        attempt_failed_deps: bool,
        /// Model id (overrides ANTHROPIC_MODEL)
        #[arg(long)]
        model: Option<String>,
        /// Upper bound for a single model request
        #[arg(long, value_name = "SECS")]
        request_timeout: Option<u64>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved execution order
    Plan {
        #[command(flatten)]
        queue: QueueArgs,
    },
    /// Add unchecked ledger markers for every task
    InitLedger {
        #[command(flatten)]
        queue: QueueArgs,
        #[command(flatten)]
        ledger: LedgerArgs,
    },
    /// List task declarations
    Tasks {
        #[command(flatten)]
        queue: QueueArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = execute(cli.command).await;
    if let Err(e) = &result {
        eprintln!("error: {e:#}");
    }
    ExitCode::from(exit_status(&result))
}

/// 0 when every task completed, 1 when any failed, 2 when the run could not start.
fn exit_status(result: &Result<bool>) -> u8 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns whether every task completed; errors are configuration problems.
async fn execute(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            queue,
            ledger,
            actor,
            no_ledger,
            timeout_multiplier,
            max_retries,
            concurrency,
            attempt_failed_deps,
            model,
            request_timeout,
            json,
        } => {
            let tasks = load_tasks(queue.tasks.as_deref())?;
            let credential = Credential::from_env().context("cannot start the LLM executor")?;
            let client = AnthropicClient::new(llm_config(model, request_timeout), credential)
                .context("cannot build the HTTP client")?;
            let executor = LlmExecutor::new(client);

            let ledger: Arc<dyn Ledger> = if no_ledger {
                Arc::new(MemoryLedger::new())
            } else {
                Arc::new(ComplianceLedger::with_config(LedgerConfig {
                    path: ledger.ledger,
                    actor,
                }))
            };

            let config = OrchestratorConfig {
                budget: Budget::new()
                    .with_timeout_multiplier(timeout_multiplier)
                    .with_max_concurrent(concurrency),
                failure_policy: if attempt_failed_deps {
                    FailurePolicy::AttemptAnyway
                } else {
                    FailurePolicy::Propagate
                },
            };
            let orchestrator = Orchestrator::new(executor.registry(), ledger).with_config(config);

            info!(tasks = tasks.len(), max_retries, "starting autocrew");
            let outcome = run_with_retries(&orchestrator, tasks, RetryPolicy { max_retries }).await?;

            let summary = RunSummary::from_outcome(&outcome);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.render());
            }
            Ok(outcome.overall_success)
        }
        Commands::Plan { queue } => {
            let ordered = DependencyResolver::new().resolve(load_tasks(queue.tasks.as_deref())?)?;
            for (position, task) in ordered.iter().enumerate() {
                println!("{:>2}. {}", position + 1, describe(task));
            }
            Ok(true)
        }
        Commands::InitLedger { queue, ledger } => {
            let tasks = load_tasks(queue.tasks.as_deref())?;
            let artifact = ComplianceLedger::new(&ledger.ledger);
            let added = artifact
                .seed(tasks.iter().map(|t| &t.id))
                .await
                .with_context(|| format!("cannot seed {}", ledger.ledger.display()))?;
            println!("added {} marker(s) to {}", added, artifact.path().display());
            Ok(true)
        }
        Commands::Tasks { queue } => {
            let tasks = load_tasks(queue.tasks.as_deref())?;
            println!("Tasks ({})", tasks.len());
            for task in &tasks {
                println!("  {}", describe(task));
                println!("      {}", task.description);
            }
            Ok(true)
        }
    }
}

/// Environment configuration with command-line overrides on top.
fn llm_config(model: Option<String>, request_timeout: Option<u64>) -> LlmConfig {
    let mut config = LlmConfig::from_env();
    if let Some(model) = model {
        config = config.with_model(model);
    }
    if let Some(secs) = request_timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config
}

fn load_tasks(path: Option<&Path>) -> Result<Vec<Task>> {
    match path {
        Some(path) => load_declarations(path).with_context(|| format!("cannot load tasks from {}", path.display())),
        None => builtin_queue()
            .into_iter()
            .map(TaskDeclaration::into_task)
            .collect::<Result<_, _>>()
            .context("built-in queue is invalid"),
    }
}

fn describe(task: &Task) -> String {
    let deps = if task.dependencies.is_empty() {
        "-".to_string()
    } else {
        task.dependencies.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(", ")
    };
    format!(
        "{} [{}, {}] {}m, after: {}",
        task.id,
        task.category,
        task.priority,
        task.estimated_duration.as_secs() / 60,
        deps
    )
}
