//! vantrack binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), loads the
//! location catalog, scans the board listing, loads card detail for every
//! unit in production and prints a report with the production stats.

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vantrack_cli::{AppConfig, FileBoardSource, FileCatalogSource, FileUnitLoader};
use vantrack_core::{location::Sentinels, unit::UnitSummary};
use vantrack_sync::{CancellationToken, ProductionStats, ScanReport, Tracker};

#[derive(Parser)]
#[command(author, version, about = "Production line tracker sync")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Override `sync.max_parallelism` from the config file.
  #[arg(long)]
  max_parallelism: Option<usize>,

  /// Print the report as JSON instead of text.
  #[arg(long)]
  json: bool,

  /// Emit log lines as JSON.
  #[arg(long)]
  json_logs: bool,
}

#[derive(Serialize)]
struct Report {
  scan:         ScanReport,
  ids_resolved: usize,
  units_loaded: usize,
  stats:        ProductionStats,
  units:        Vec<UnitSummary>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  // Logs go to stderr so the report on stdout stays parseable.
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  let subscriber = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr);
  if cli.json_logs {
    subscriber.json().init();
  } else {
    subscriber.init();
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("VANTRACK")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let mut app_cfg: AppConfig = settings
    .try_deserialize::<AppConfig>()
    .context("failed to deserialise AppConfig")?
    .expand_paths();
  if let Some(max) = cli.max_parallelism {
    app_cfg.sync.max_parallelism = max;
  }

  let loader = FileUnitLoader::new(&app_cfg.details_dir, &app_cfg.board_path);
  let tracker = Tracker::start(
    &FileCatalogSource::new(&app_cfg.catalog_path),
    Sentinels::new(),
    loader,
    app_cfg.sync.clone(),
  )
  .await
  .with_context(|| format!("failed to load catalog from {:?}", app_cfg.catalog_path))?;

  let scan = tracker
    .scan(&FileBoardSource::new(&app_cfg.board_path))
    .await
    .with_context(|| format!("failed to scan board listing {:?}", app_cfg.board_path))?;

  // Ctrl-C stops new loads and abandons the ones in flight.
  let cancel = CancellationToken::new();
  tokio::spawn({
    let cancel = cancel.clone();
    async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupted; cancelling outstanding loads");
        cancel.cancel();
      }
    }
  });

  let ids_resolved = tracker.coordinator().resolve_ids(&cancel).await;
  let loaded = tracker.coordinator().load_required(&cancel).await;

  let report = Report {
    scan,
    ids_resolved,
    units_loaded: loaded.len(),
    stats: tracker.stats(Utc::now()),
    units: tracker.summaries(),
  };

  if cli.json {
    let out = serde_json::to_string_pretty(&report).context("failed to serialise report")?;
    println!("{out}");
  } else {
    print_report(&report);
  }

  Ok(())
}

fn print_report(report: &Report) {
  let scan = &report.scan;
  println!(
    "board: {} units seen, {} new, {} unresolved, {} duplicate",
    scan.seen,
    scan.created,
    scan.unresolved,
    scan.duplicates.len()
  );
  for name in &scan.duplicates {
    println!("  duplicate: {name}");
  }
  println!(
    "loads: {} ids resolved, {} units loaded",
    report.ids_resolved, report.units_loaded
  );
  println!();

  for unit in &report.units {
    let position = unit.current_position.as_deref().unwrap_or("-");
    let redline = unit
      .redline_date
      .map(|d| d.format("%Y-%m-%d").to_string())
      .unwrap_or_else(|| "-".to_string());
    println!(
      "{:<12} {:<18} redline {:<10} job {:>3}  red {:>3} ({:>3} open)  yellow {:>3}",
      unit.name,
      position,
      redline,
      unit.job_cards,
      unit.red_cards,
      unit.open_red_cards,
      unit.yellow_cards
    );
  }
  println!();

  let stats = &report.stats;
  println!(
    "units {}  car park {}  handover overdue {}  handed over {}",
    stats.total, stats.car_park, stats.handover_overdue, stats.handed_over
  );
}
