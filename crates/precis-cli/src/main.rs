//! precis: abstractive article summarization over HTTP or from the terminal.

mod display;

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use precis_ai::{DecodingConfig, Summarizer, SummarizerOptions};
use precis_client::SummaryClient;
use precis_core::{
    Config, GenerationParams, RawParams, SummarizeRequest, SummaryResponse, SummaryStats,
};
use precis_serve::{AppState, OnnxBackend, Server, SummaryBackend, shutdown_signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "precis", author, version)]
#[command(about = "Summarize articles with a local T5 checkpoint")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./precis.toml, then the user config dir)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, short, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "PRECIS_BIND_ADDR")]
        bind: Option<SocketAddr>,

        /// Checkpoint directory
        #[arg(long, env = "PRECIS_CHECKPOINT_DIR")]
        checkpoint: Option<PathBuf>,

        /// Load the model before accepting requests
        #[arg(long)]
        preload: bool,
    },
    /// Summarize a file, or stdin when FILE is omitted or `-`
    Summarize {
        file: Option<PathBuf>,

        #[arg(long)]
        max_length: Option<i64>,

        #[arg(long)]
        min_length: Option<i64>,

        #[arg(long)]
        num_beams: Option<i64>,

        /// Send the request to a running server instead of loading the model
        #[arg(long)]
        server: Option<String>,

        /// Checkpoint directory for local summarization
        #[arg(long, env = "PRECIS_CHECKPOINT_DIR")]
        checkpoint: Option<PathBuf>,
    },
    /// Query a running server's health endpoint
    Health {
        /// Server URL (default: the configured bind address)
        #[arg(long)]
        server: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Serve {
            bind,
            checkpoint,
            preload,
        } => {
            if let Some(addr) = bind {
                config.server.bind_addr = addr;
            }
            if let Some(dir) = checkpoint {
                config.model.checkpoint_dir = dir;
            }
            serve(config, preload).await
        }
        Commands::Summarize {
            file,
            max_length,
            min_length,
            num_beams,
            server,
            checkpoint,
        } => {
            if let Some(dir) = checkpoint {
                config.model.checkpoint_dir = dir;
            }
            let request = SummarizeRequest {
                text: read_input(file.as_deref())?,
                max_length,
                min_length,
                num_beams,
            };
            let resp = match server {
                Some(url) => SummaryClient::new(url).summarize(&request).await?,
                None => summarize_local(&config, request).await?,
            };
            display::print_summary(&resp);
            Ok(())
        }
        Commands::Health { server } => {
            let url = server.unwrap_or_else(|| format!("http://{}", config.server.bind_addr));
            let health = SummaryClient::new(url).health().await?;
            display::print_health(&health);
            if !health.model_loaded {
                anyhow::bail!("server is unhealthy");
            }
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn serve(config: Config, preload: bool) -> anyhow::Result<()> {
    info!("precis v{}", env!("CARGO_PKG_VERSION"));
    info!(checkpoint = %config.model.checkpoint_dir.display(), "model checkpoint");

    let backend = Arc::new(OnnxBackend::new(&config.model, config.generation.clone()));
    if preload {
        backend
            .ensure_loaded()
            .await
            .context("preloading summarization model")?;
    }

    let state = AppState::new(backend, config.generation);
    Server::new(state, config.server)
        .serve_with_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Run the model in-process, mirroring what the server does for one request.
async fn summarize_local(
    config: &Config,
    request: SummarizeRequest,
) -> anyhow::Result<SummaryResponse> {
    if request.text.is_empty() {
        anyhow::bail!("No text provided for summarization");
    }
    let raw = RawParams {
        max_length: request.max_length.map(serde_json::Value::from),
        min_length: request.min_length.map(serde_json::Value::from),
        num_beams: request.num_beams.map(serde_json::Value::from),
    };
    let params = GenerationParams::resolve(&raw, &config.generation)?;
    let decoding = DecodingConfig::new(&params, &config.generation);
    let dir = config.model.checkpoint_dir.clone();
    let options = SummarizerOptions::from(&config.model);
    let text = request.text;

    eprintln!("Loading model from {}...", dir.display());
    let (text, summary) = tokio::task::spawn_blocking(move || -> anyhow::Result<(String, String)> {
        let mut summarizer = Summarizer::load(&dir, options)?;
        let summary = summarizer.summarize(&text, &decoding)?;
        Ok((text, summary))
    })
    .await
    .context("summarization task failed")??;

    let stats = SummaryStats::compute(&text, &summary);
    Ok(SummaryResponse::new(summary, stats, params))
}

fn read_input(file: Option<&std::path::Path>) -> anyhow::Result<String> {
    match file {
        Some(path) if path != std::path::Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
    }
}
