mod db;
mod pipeline;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tgwh")]
#[command(about = "Channel ingestion warehouse pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full pipeline once: collect, load, transform, classify
    Run {
        /// Maximum posts to collect per channel
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Collect posts from the configured channels into the landing store
    Collect {
        /// Maximum posts to collect per channel
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Load landing partitions into the warehouse raw table
    Load {
        /// Partition date (YYYY-MM-DD); defaults to today, falling back to the latest earlier date
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Run the external warehouse transform
    Transform,
    /// Classify post images that have no enrichment yet
    Classify {
        /// Re-classify every post image, including already enriched ones
        #[arg(long)]
        rescan: bool,
    },
    /// Host the cron schedule until interrupted
    Schedule,
    /// Warehouse maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending schema migrations
    Migrate,
    /// Check that the warehouse is reachable
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = tgwh_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match cli.command {
        Commands::Run { limit } => pipeline::run_full(&config, limit, &cancel).await,
        Commands::Collect { limit } => pipeline::run_collect(&config, limit, &cancel).await,
        Commands::Load { date } => pipeline::run_load(&config, date).await,
        Commands::Transform => pipeline::run_transform(&config).await,
        Commands::Classify { rescan } => pipeline::run_classify(&config, rescan).await,
        Commands::Schedule => pipeline::run_schedule(&config, &cancel).await,
        Commands::Db { command } => match command {
            DbCommands::Migrate => db::run_migrate(&config).await,
            DbCommands::Ping => db::run_ping(&config).await,
        },
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("interrupt received, stopping at the next safe point");
            cancel.cancel();
        }
        Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
    }
}

#[cfg(test)]
mod tests;
