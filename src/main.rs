use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::time::Duration;

use campaign_gate::{
    tier_for_reader, AggregationController, AggregationOutcome, Database, GateSettings,
    SettingsStore, VisitLogAggregator,
};

#[derive(Parser)]
#[command(name = "campaign-gate", about = "Reader visit aggregation and tier lookups")]
struct Cli {
    /// Settings JSON; relative paths inside it resolve against its directory.
    #[arg(long, default_value = "campaign-gate.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drain the visit log once.
    Aggregate,
    /// Drain the visit log on an interval until interrupted.
    Watch {
        /// Overrides `aggregationIntervalSecs`.
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Print the reader's tier: casual, loyal or brand_lover.
    Tier { reader_id: String },
    /// Print the counters used to seed the attribute store, as JSON.
    Summary { reader_id: String },
    /// Bind a reader to an authenticated user id (first binding wins).
    Bind { reader_id: String, user_id: String },
}

fn load_settings(path: PathBuf) -> Result<GateSettings> {
    let base = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let store = SettingsStore::new(path)?;
    Ok(store.current().resolved_against(&base))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.settings)?;
    let database = Database::new(settings.database_path.clone())?;

    match cli.command {
        Command::Aggregate => {
            let aggregator = VisitLogAggregator::from_settings(database, &settings);
            match aggregator.run(Utc::now().date_naive()).await? {
                AggregationOutcome::Completed(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                AggregationOutcome::Skipped => {
                    warn!(
                        "Lock {} present; aggregation skipped",
                        settings.lock_path.display()
                    );
                }
            }
        }
        Command::Watch { interval } => {
            let interval =
                Duration::from_secs(interval.unwrap_or(settings.aggregation_interval_secs));
            let aggregator = VisitLogAggregator::from_settings(database, &settings);

            let mut controller = AggregationController::new();
            controller.start(aggregator, interval)?;
            info!("Aggregating every {interval:?}; Ctrl-C to stop");

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            controller.stop().await?;
        }
        Command::Tier { reader_id } => {
            let tier =
                tier_for_reader(&database, &reader_id, Utc::now(), settings.tier_window_days)
                    .await?;
            println!("{tier}");
        }
        Command::Summary { reader_id } => {
            let summary = database
                .reader_summary(&reader_id, Utc::now(), settings.tier_window_days)
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Bind { reader_id, user_id } => {
            if database.bind_user(&reader_id, &user_id).await? {
                info!("Bound reader {reader_id} to user {user_id}");
            } else {
                warn!("Reader {reader_id} is unknown or already bound; binding unchanged");
            }
        }
    }

    Ok(())
}
