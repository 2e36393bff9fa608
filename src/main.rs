use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dhlotto_sync::config::{Config, ConfigOverrides};
use dhlotto_sync::draw::DrawRecord;
use dhlotto_sync::fetcher::{DrawSource, HttpDrawSource};
use dhlotto_sync::reconcile::{backfill, loss_detected, merge, needs_backfill};
use dhlotto_sync::store::{self, HistoryStore};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "dhlotto-sync",
    about = "Fetches Korean lottery draws and keeps a local JSON history"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the configured history file path
    #[arg(short, long)]
    data: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch the newest draw and reconcile it into the history
    Update {
        /// Fetch this round instead of probing for the latest
        #[arg(long)]
        round: Option<u32>,
        /// Skip the loss-recovery backfill even if it would trigger
        #[arg(long)]
        no_backfill: bool,
    },
    /// Fetch a single round and print it, without touching the store
    Fetch {
        #[arg(long)]
        round: u32,
    },
    /// Print the newest stored rounds
    Show {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        data_path: cli
            .data
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        api_url: None,
    });

    if let Commands::Config { init, show } = &cli.command {
        if *init {
            Config::write_template(&config_path)?;
            println!("Wrote config template to {}", config_path.display());
        }
        if *show || !*init {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        return Ok(());
    }

    let source = HttpDrawSource::new(config.source.api_url.clone(), config.source.timeout_secs);
    let store = HistoryStore::new(config.resolved_data_path(), config.resolved_backup_dir());

    match &cli.command {
        Commands::Update { round, no_backfill } => {
            run_update(&config, &store, &source, *round, *no_backfill).await?;
        }
        Commands::Fetch { round } => match source.fetch_by_round(*round).await {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("round {round} is not available"),
        },
        Commands::Show { limit } => {
            let history = store.load();
            let head: Vec<&DrawRecord> = history.iter().take(*limit).collect();
            println!("{}", serde_json::to_string_pretty(&head)?);
        }
        Commands::Config { .. } => unreachable!("config command handled before dispatch"),
    }

    Ok(())
}

/// The primary flow: load, fetch, merge, optionally backfill, save, then run
/// the advisory loss check against the pre-mutation backup. A failed fetch is
/// a normal outcome and exits 0; a failed save propagates and exits non-zero.
async fn run_update(
    config: &Config,
    store: &HistoryStore,
    source: &HttpDrawSource,
    round: Option<u32>,
    no_backfill: bool,
) -> Result<()> {
    let history = store.load();
    let latest_known = store::latest_round(&history);
    info!(
        "loaded {} records, latest known round {latest_known}",
        history.len()
    );

    let fetched = match round {
        Some(round) => source.fetch_by_round(round).await,
        None => source.fetch_latest().await,
    };
    let Some(fetched) = fetched else {
        info!("no new draw available; history unchanged");
        return Ok(());
    };
    info!("fetched round {}: {:?}", fetched.round, fetched.numbers);

    let backup_path = store.backup()?;
    if let Some(path) = &backup_path {
        info!("backed up history to {}", path.display());
    }

    let fetched_round = fetched.round;
    let mut merged = merge(&history, Some(fetched));

    if !no_backfill && needs_backfill(&merged, config.recovery.min_plausible_round) {
        warn!(
            "history holds a single record past round {}; suspecting data loss, attempting recovery",
            config.recovery.min_plausible_round
        );
        backfill(
            source,
            &mut merged,
            fetched_round.saturating_sub(1),
            config.recovery.backfill_window,
            Duration::from_millis(config.recovery.backfill_delay_ms),
        )
        .await;
    }

    store.save(&merged)?;
    info!(
        "saved {} records to {}",
        merged.len(),
        store.data_path().display()
    );

    if let Some(path) = &backup_path {
        match store::count_records(path) {
            Ok(backup_count) => {
                if loss_detected(
                    backup_count,
                    merged.len(),
                    config.recovery.loss_warning_margin,
                ) {
                    warn!(
                        "possible data loss: backup holds {backup_count} records, \
                         new history holds {}",
                        merged.len()
                    );
                }
            }
            Err(err) => warn!("could not read back backup for loss check: {err:#}"),
        }
    }

    Ok(())
}
