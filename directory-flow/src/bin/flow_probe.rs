//! Feed form snapshots (one JSON object per line on stdin) through a
//! directory flow backed by the HTTP lookup, printing each final payload as a
//! JSON line on stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use prospect_directory_flow::{DirectoryFlow, FlowConfig, FormSnapshot, HttpAdditionalDetailsLookup};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "flow_probe", version, about = "Drive a directory flow from stdin")]
struct Args {
    /// Config file (defaults to PROSPECT_FLOW_CONFIG or ~/.config/prospect/directory_flow.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lookup service base URL, overriding the config file
    #[arg(long)]
    base_url: Option<String>,

    /// Exit after this long without a new payload once stdin is closed
    #[arg(long, default_value_t = 2000)]
    idle_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => FlowConfig::load_from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?
            .with_env_token(std::env::var(FlowConfig::ENV_LOOKUP_TOKEN).ok()),
        None => FlowConfig::load().context("failed to load config")?,
    };
    if let Some(base_url) = args.base_url {
        config.lookup.base_url = Some(base_url);
    }

    let lookup = HttpAdditionalDetailsLookup::from_config(&config.lookup)
        .context("lookup service is not configured (use --base-url)")?;
    tracing::info!(url = lookup.url(), "using additional details lookup");

    let mut flow = DirectoryFlow::create(Arc::new(lookup), &config);
    let mut finals = flow.subscribe_final_payloads()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let idle = Duration::from_millis(args.idle_ms);
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line.context("failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let snapshot: FormSnapshot = serde_json::from_str(&line)
                        .with_context(|| format!("invalid form snapshot: {line}"))?;
                    flow.update_form_values(snapshot)?;
                }
                None => stdin_open = false,
            },
            payload = finals.recv() => match payload {
                Ok(payload) => println!("{}", serde_json::to_string(&payload)?),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "output fell behind, payloads skipped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::time::sleep(idle), if !stdin_open => break,
        }
    }

    flow.destroy();
    Ok(())
}

fn init_logging() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
