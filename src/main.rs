//! Exoserve - Main Entry Point
//!
//! Serves the KOI classification API, or runs a one-shot training pass.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use exoserve::config::AppConfig;
use exoserve::registry::ModelRegistry;
use exoserve::server::{run_server, ServerConfig};
use exoserve::training;

#[derive(Parser)]
#[command(name = "exoserve", about = "Kepler exoplanet classification service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Host to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to bind
        #[arg(long)]
        port: Option<u16>,
        /// Path to the KOI dataset CSV
        #[arg(long)]
        data: Option<PathBuf>,
        /// Directory for uploaded CSVs
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },
    /// Train once against a dataset and print the evaluation
    Train {
        /// Path to the KOI dataset CSV
        #[arg(long)]
        data: Option<PathBuf>,
        /// Number of trees in the forest
        #[arg(long, default_value_t = 100)]
        trees: usize,
        /// Maximum tree depth (0 = unbounded)
        #[arg(long, default_value_t = 100)]
        max_depth: usize,
        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

async fn serve(
    host: Option<String>,
    port: Option<u16>,
    data: Option<PathBuf>,
    upload_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut server = ServerConfig::default();
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }

    let mut config = AppConfig::default();
    if let Some(data) = data {
        config.dataset_path = data;
    }
    if let Some(dir) = upload_dir {
        config.upload_dir = dir;
    }

    run_server(server, config).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exoserve=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train {
            data,
            trees,
            max_depth,
            seed,
        }) => {
            let mut config = AppConfig::default();
            if let Some(data) = data {
                config.dataset_path = data;
            }
            config.tree_count = trees.max(1);
            config.max_depth = Some(max_depth);
            config.random_seed = seed;

            let registry = ModelRegistry::new();
            let report = training::train_and_publish(&config, &registry);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                std::process::exit(1);
            }
        }
        Some(Commands::Serve {
            host,
            port,
            data,
            upload_dir,
        }) => serve(host, port, data, upload_dir).await?,
        None => serve(None, None, None, None).await?,
    }

    Ok(())
}
