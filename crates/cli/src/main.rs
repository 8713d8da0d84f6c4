//! `rusty-flow` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — validate a workflow JSON file.
//! - `run`      — execute a workflow JSON file in-process.
//! - `merge`    — run the merge node over two item files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::{default_registry, ExecutorConfig, Workflow, WorkflowExecutor};
use nodes::{merge, Item, MergeConfiguration};

#[derive(Parser)]
#[command(
    name = "rusty-flow",
    about = "Workflow engine with item pairing and branch merging",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Execute a workflow and print the last node's items.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// JSON array of trigger items (`{"json": …}` objects or plain objects).
        #[arg(long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        executor: ExecutorArgs,
    },
    /// Merge two item files with the given merge parameters.
    Merge {
        /// JSON object of merge node parameters.
        #[arg(long)]
        parameters: PathBuf,
        /// Items for input 1.
        #[arg(long)]
        input1: PathBuf,
        /// Items for input 2.
        #[arg(long)]
        input2: PathBuf,
    },
}

#[derive(Args)]
struct ExecutorArgs {
    /// Retries for nodes failing with a retryable error.
    #[arg(long, env = "RUSTY_FLOW_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,
    /// Base back-off delay between retries, in milliseconds.
    #[arg(long, env = "RUSTY_FLOW_RETRY_DELAY_MS", default_value_t = 100)]
    retry_delay_ms: u64,
}

impl From<ExecutorArgs> for ExecutorConfig {
    fn from(args: ExecutorArgs) -> Self {
        Self {
            max_retries: args.max_retries,
            retry_base_delay: Duration::from_millis(args.retry_delay_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let workflow: Workflow = read_json(&path)?;

            match engine::validate_dag(&workflow) {
                Ok(order) => {
                    println!("✅ Workflow is valid. Execution order: {order:?}");
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Run {
            path,
            input,
            executor,
        } => {
            let workflow: Workflow = read_json(&path)?;
            let items = match input {
                Some(input) => read_items(&input, 0)?,
                None => vec![Item::empty()],
            };

            info!("Running workflow '{}' with {} trigger items", workflow.name, items.len());
            let result = WorkflowExecutor::new(default_registry(), executor.into())
                .run(&workflow, items)
                .await?;
            info!("Execution {} finished", result.execution_id);

            println!("{}", serde_json::to_string_pretty(&result.output)?);
        }
        Command::Merge {
            parameters,
            input1,
            input2,
        } => {
            let parameters: Value = read_json(&parameters)?;
            let config = MergeConfiguration::from_parameters(&parameters)?;
            let inputs = vec![read_items(&input1, 0)?, read_items(&input2, 1)?];

            let output = merge::execute(&config, inputs);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Items files hold either full items (`{"json": …}`) or plain objects,
/// which are wrapped and attributed to their position on `input`.
fn read_items(path: &Path, input: usize) -> Result<Vec<Item>> {
    let values: Vec<Value> = read_json(path)?;
    let is_item = |v: &Value| v.as_object().is_some_and(|o| o.contains_key("json"));

    if values.iter().all(is_item) {
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(anyhow::Error::from))
            .collect::<Result<Vec<Item>>>()
            .with_context(|| format!("invalid items in {}", path.display()))
    } else {
        Ok(Item::branch_from_values(input, values))
    }
}
