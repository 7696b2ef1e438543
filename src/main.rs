use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use mlpipe_artifact::{ArtifactStore, FsArtifactStore};
use mlpipe_config::EngineConfig;
use mlpipe_engine::{PipelineChart, RunRequest, TracingEventManager};

mod charts;

/// mlpipe - run machine-learning pipeline charts
#[derive(Parser)]
#[command(name = "mlpipe")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// List the built-in charts
  List,

  /// Run a built-in chart
  Run {
    /// Chart name (see `mlpipe list`)
    chart: String,

    /// Input arguments as a JSON object (default: read from stdin)
    #[arg(long)]
    input: Option<String>,

    /// Path to an engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pipeline id; reuse one together with --artifacts-dir to resume a run
    #[arg(long)]
    pipeline_id: Option<String>,

    /// Keep node results as JSON files under this directory
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mlpipe=info,warn")),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::List) => {
      for chart in charts::CHARTS {
        println!("{:<10} {}", chart.name, chart.description);
        println!("{:<10} sample input: {}", "", (chart.sample_input)());
      }
    }
    Some(Commands::Run {
      chart,
      input,
      config,
      pipeline_id,
      artifacts_dir,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_chart(chart, input, config, pipeline_id, artifacts_dir))?;
    }
    None => {
      println!("mlpipe - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run_chart(
  name: String,
  input: Option<String>,
  config: Option<PathBuf>,
  pipeline_id: Option<String>,
  artifacts_dir: Option<PathBuf>,
) -> Result<()> {
  let builtin = charts::find(&name)
    .with_context(|| format!("unknown chart '{}' (see `mlpipe list`)", name))?;

  let config = match config {
    Some(path) => EngineConfig::from_file(&path)
      .with_context(|| format!("failed to load config: {}", path.display()))?,
    None => EngineConfig::default(),
  };

  let payload = match input {
    Some(raw) => serde_json::from_str(&raw).context("failed to parse --input JSON")?,
    None => read_payload_from_stdin()?,
  };
  if !payload.is_object() {
    bail!("input must be a JSON object, got: {}", payload);
  }

  let dag = (builtin.build)().with_context(|| format!("chart '{}' is invalid", name))?;
  let mut chart = PipelineChart::new(builtin.name, dag)
    .with_config(config)
    .with_event_manager(TracingEventManager);

  if let Some(dir) = artifacts_dir {
    eprintln!("Artifacts: {}", dir.display());
    chart = chart.with_artifact_store(move |_| {
      Arc::new(FsArtifactStore::new(dir.clone())) as Arc<dyn ArtifactStore>
    });
  }

  let mut request = RunRequest::from_json(payload);
  if let Some(id) = pipeline_id {
    request = request.pipeline_id(id);
  }

  let cancel = CancellationToken::new();
  let ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      ctrl_c.cancel();
    }
  });

  let result = chart.run_with_cancel(request, cancel).await;
  println!("{}", serde_json::to_string_pretty(&result.to_json())?);

  match result.error {
    Some(error) => Err(error).context("pipeline failed"),
    None => Ok(()),
  }
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read input from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse input JSON from stdin")
    }
  }
}
