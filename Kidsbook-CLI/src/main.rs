//! kidsbook - illustrated children's books on a single small GPU
//!
//! `kidsbook story <topic>` writes the story with Ollama and stores one
//! Pending scene per illustration. `kidsbook art` paints every Pending scene
//! with ComfyUI. Run them one after another so only one model sits in VRAM.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use config::AppConfig;

/// Two-phase children's book generator
#[derive(Parser)]
#[command(name = "kidsbook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workflow template to use instead of WORKFLOW_NAME
    #[arg(long, global = true)]
    workflow: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Phase 1: write a story and queue its scenes for illustration
    Story {
        /// What the story is about
        topic: String,
    },

    /// Phase 2: illustrate every pending scene
    Art,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kidsbook=debug,image_engine=debug,story_engine=debug,scene_store=debug"
    } else {
        "kidsbook=info,image_engine=info,story_engine=info,scene_store=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::from_env()?;
    if let Some(workflow) = cli.workflow {
        config.workflow_name = workflow;
    }

    match cli.command {
        Commands::Story { topic } => {
            commands::story::execute(&config, &topic).await?;
        }

        Commands::Art => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping after the current step");
                    on_signal.cancel();
                }
            });

            let summary = commands::art::execute(&config, cancel).await?;
            if summary.cancelled {
                bail!("Art phase interrupted");
            }
        }
    }

    Ok(())
}
