//! reconciler: lifecycle handler for externally-managed agent resources

use anyhow::Context;
use clap::{Parser, Subcommand};
use reconciler::{delivery, init_tracing, intake};
use reconciler_core::ResourceKind;
use reconciler_engine::{Dispatcher, ReconcilerConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "reconciler",
    about = "Create, update and tear down memory stores, knowledge bases and runtime endpoints"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one lifecycle event and print the response
    Handle {
        /// Event JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: String,
        /// Config file (default: $RECONCILER_CONFIG or reconciler.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Treat the event as this kind regardless of its ResourceType
        #[arg(short, long)]
        kind: Option<ResourceKind>,
        /// Print the response only, even if the event carries a ResponseURL
        #[arg(long)]
        no_deliver: bool,
        /// Emit logs as JSON
        #[arg(long)]
        log_json: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show version
    Version,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ReconcilerConfig> {
    let path = ReconcilerConfig::resolve_path(path.as_deref());
    Ok(ReconcilerConfig::load(&path)?.with_env_overrides())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Handle {
            event,
            config,
            kind,
            no_deliver,
            log_json,
        } => {
            init_tracing(log_json);

            let config = load_config(config)?;
            let event = intake::read_event(&event).await?;
            let rpc = Arc::new(config.control_plane.http_control_plane()?);
            let mut dispatcher = Dispatcher::from_config(&config, rpc);
            if let Some(kind) = kind {
                dispatcher = dispatcher.with_kind(kind);
            }

            let response = dispatcher.dispatch(&event).await;
            println!("{}", delivery::response_body(&response)?);

            match event.response_url.as_deref() {
                Some(url) if !no_deliver => {
                    delivery::deliver(&reqwest::Client::new(), url, &response)
                        .await
                        .context("delivering response")?;
                }
                _ if !response.is_success() => std::process::exit(1),
                _ => {}
            }
        }
        Commands::Config { config } => {
            let config = load_config(config)?;
            print!("{}", config.to_toml()?);
        }
        Commands::Version => {
            println!("reconciler {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
