//! Headless command-line front end for the Vibecheck engine.

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use vibecheck_rs::Vibecheck;
use vibecheck_rs::input::image_data_uri;
use vibecheck_rs_config::VibecheckConfig;
use vibecheck_rs_core::{EventBus, JsonSettingsStore, PersistedState, SettingsStore};
use vibecheck_rs_protocol::{FeedEventPayload, OutputStatus};

/// Command-line options for the Vibecheck binary.
#[derive(Parser)]
#[command(name = "vibecheck", version)]
struct Cli {
    /// Optional path to a vibecheck.json5 config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit one round, wait for every slot, and print it as JSON
    Run(RunArgs),
    /// Print or clear the persisted prompt history
    History {
        /// Remove every entry instead of printing
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Prompt text
    prompt: String,
    /// Output mode id (p5, svg, html, three, image)
    #[arg(long)]
    mode: Option<String>,
    /// Compare one output per model instead of a batch of one model
    #[arg(long)]
    versus: bool,
    /// Model ids: the batch model, or the versus set with --versus
    #[arg(long = "model")]
    models: Vec<String>,
    /// Number of batch outputs (1-9)
    #[arg(long)]
    batch_size: Option<usize>,
    /// Input image file for image modes
    #[arg(long)]
    image: Option<PathBuf>,
}

/// Entry point for the Vibecheck binary.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Run(args) => run(config, args).await,
        Command::History { clear } => history(&config, clear),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<VibecheckConfig> {
    if let Some(path) = path {
        info!("loading config from path: {}", path.display());
        return VibecheckConfig::load_from_path(path).context("failed to load config");
    }
    let cwd = std::env::current_dir().context("cwd")?;
    info!("loading layered config from cwd: {}", cwd.display());
    let layered = VibecheckConfig::load_layered(&cwd).context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

async fn run(config: VibecheckConfig, args: RunArgs) -> anyhow::Result<()> {
    let events = EventBus::new(256);
    let mut stream = events.stream();
    tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    if let FeedEventPayload::OutputSettled { index, status, .. } = event.payload {
                        info!("slot settled (index={}, status={:?})", index, status);
                    }
                }
                Err(err) => warn!("event stream lagged: {err}"),
            }
        }
    });

    let engine = Vibecheck::new(config, None, None, None, Some(Arc::new(events)))
        .context("failed to initialize engine")?;
    let store = engine.store();
    if let Some(mode) = &args.mode {
        store.set_output_mode(mode)?;
    }
    if args.versus {
        store.set_batch_mode(false);
        if !args.models.is_empty() {
            store.set_versus_models(&args.models);
        }
    } else {
        if let Some(model) = args.models.first() {
            store.set_batch_model(model)?;
        }
        if let Some(size) = args.batch_size {
            store.set_batch_size(size)?;
        }
    }

    let prompt_image = match &args.image {
        Some(path) => Some(
            image_data_uri(path)
                .with_context(|| format!("failed to read image {}", path.display()))?,
        ),
        None => None,
    };

    let Some(handle) = engine.submit_round(args.prompt, prompt_image) else {
        bail!("no model selected for versus mode");
    };
    let round_id = handle.round_id();
    handle.settled().await;

    let round = store
        .round(round_id)
        .context("round disappeared before settling")?;
    let failed = round
        .outputs
        .iter()
        .filter(|output| output.status() == OutputStatus::Failed)
        .count();
    if failed > 0 {
        warn!("round finished with failures (round_id={}, failed={})", round_id, failed);
    }
    println!("{}", serde_json::to_string_pretty(&round)?);
    Ok(())
}

fn history(config: &VibecheckConfig, clear: bool) -> anyhow::Result<()> {
    let settings = JsonSettingsStore::open(config.history.path.as_ref())?;
    if clear {
        settings
            .save(&PersistedState::default())
            .context("failed to clear prompt history")?;
        info!("cleared prompt history (path={})", settings.path().display());
        return Ok(());
    }
    let state = settings
        .load()
        .context("failed to load prompt history")?
        .unwrap_or_default();
    for prompt in state.prompt_history {
        println!("{prompt}");
    }
    Ok(())
}
