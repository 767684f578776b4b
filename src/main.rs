use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use gallery_pipeline::broker::UnavailableBroker;
use gallery_pipeline::config::{get_config_path, Config};
use gallery_pipeline::media_index::LoggingIndex;
use gallery_pipeline::storage::{StorageLocator, SystemStorage};
use gallery_pipeline::{Pipeline, WorkQueue};

#[derive(Parser)]
#[command(name = "gallery-pipeline", about = "Gallery media folder discovery and visibility")]
struct Cli {
    /// Config file (defaults to ~/.gallery-pipeline/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Boot hook: refresh the watch-list from every storage root
    Boot,
    /// List media folders under the given roots (or the configured ones)
    Scan { roots: Vec<PathBuf> },
    /// Hide a folder from the media index
    Exclude { folder: PathBuf },
    /// Show a previously hidden folder again
    Include { folder: PathBuf },
    /// Print the variant and caching policy of files
    Classify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the storage roots a refresh would walk
    Roots,
    /// Record a storage access grant obtained from the broker
    Grant { tree: String, token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => get_config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;

    if let Command::Grant { tree, token } = &cli.command {
        config.set_access_grant(tree.clone(), token.clone());
        config.save_to(&config_path)?;
        println!("{}", json!({ "tree": tree, "recorded": true }));
        return Ok(());
    }
    if let Command::Roots = &cli.command {
        let roots = SystemStorage::from_config(&config).storage_roots();
        println!("{}", serde_json::to_string_pretty(&roots)?);
        return Ok(());
    }

    let pipeline = Pipeline::from_config(&config, Arc::new(UnavailableBroker), Arc::new(LoggingIndex))?;
    let (queue, _worker) = WorkQueue::start(Arc::new(pipeline));

    match cli.command {
        Command::Boot => {
            let summary = queue.refresh().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Scan { roots } => {
            let roots = if roots.is_empty() {
                SystemStorage::from_config(&config).storage_roots()
            } else {
                roots
            };
            let folders = queue.scan(roots).await?;
            println!("{}", serde_json::to_string_pretty(&folders)?);
        }
        Command::Exclude { folder } => {
            let outcome = queue.exclude(folder.clone()).await?;
            println!("{}", json!({ "folder": folder, "outcome": outcome }));
        }
        Command::Include { folder } => {
            let outcome = queue.include(folder.clone()).await?;
            println!("{}", json!({ "folder": folder, "outcome": outcome }));
        }
        Command::Classify { paths } => {
            let mut results = Vec::with_capacity(paths.len());
            for path in paths {
                let selected = queue.select(path.clone()).await?;
                results.push(match selected {
                    Some((variant, policy)) => json!({ "path": path, "variant": variant, "policy": policy }),
                    None => json!({ "path": path, "variant": "unsupported" }),
                });
            }
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Roots | Command::Grant { .. } => {}
    }

    Ok(())
}
