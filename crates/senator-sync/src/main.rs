//! senator-sync batch job.
//!
//! Reads configuration from `senator-sync.toml` (or the path given with
//! `--config`) and the `DB_*` / `SYNC_*` environment, connects to the access
//! log database once, reconciles employees and then visitors, and exits.
//!
//! Exits non-zero only when the store cannot be reached or the connection is
//! lost mid-run; individual record failures are logged and skipped.

use std::{
  fs::{File, OpenOptions},
  io,
  path::{Path, PathBuf},
  sync::Mutex,
};

use anyhow::Context as _;
use clap::Parser;
use senator_core::{store::AccessStore, subject::SubjectKind};
use senator_store_mysql::MySqlStore;
use senator_store_sqlite::SqliteStore;
use senator_sync::config::{Backend, SyncConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser)]
#[command(author, version, about = "Reconcile access logs into the employee and visitor registries")]
struct Cli {
  /// Path to an optional TOML configuration file.
  #[arg(short, long, default_value = "senator-sync.toml")]
  config: PathBuf,

  /// Only reconcile one kind of subject (`employee` or `visitor`).
  #[arg(long, value_name = "KIND")]
  only: Option<SubjectKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let cfg = SyncConfig::load(&cli.config, cli.only)
    .context("failed to load configuration")?;

  let log_file_error = init_tracing(&cfg.log_file).err();
  if let Some(e) = log_file_error {
    tracing::warn!(
      path = %cfg.log_file.display(),
      error = %e,
      "cannot open log file, logging to stdout only"
    );
  }

  tracing::info!(config = ?cfg, "starting registry sync");

  match cfg.backend {
    Backend::Mysql => {
      let store = MySqlStore::connect(&cfg.connect_params())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "cannot connect to database"))
        .with_context(|| format!("failed to connect to {}:{}", cfg.host, cfg.port))?;
      sync(store, &cfg).await
    }
    Backend::Sqlite => {
      let path = cfg.sqlite_path();
      let store = SqliteStore::open(&path)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "cannot open database"))
        .with_context(|| format!("failed to open store at {path:?}"))?;
      sync(store, &cfg).await
    }
  }
}

/// Run the sync and release the connection whatever the outcome.
async fn sync<S: AccessStore>(store: S, cfg: &SyncConfig) -> anyhow::Result<()> {
  let outcome = senator_sync::run(&store, &cfg.kinds()).await;

  if let Err(e) = store.close().await {
    tracing::warn!(error = %e, "failed to close store connection");
  }

  let report = outcome
    .inspect_err(|e| tracing::error!(error = %e, "sync aborted"))
    .context("sync aborted")?;

  for (kind, counts) in report.iter() {
    tracing::info!(
      %kind,
      candidates = counts.candidates,
      inserted = counts.inserted,
      updated = counts.updated,
      failures = counts.failures(),
      "summary"
    );
  }
  Ok(())
}

/// Install a stdout layer and, if the file can be opened, a plain-text layer
/// appending to `log_file`. Returns the open error when falling back to
/// stdout only.
fn init_tracing(log_file: &Path) -> io::Result<()> {
  let (file_layer, file_error) = match open_log_file(log_file) {
    Ok(file) => (
      Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
      None,
    ),
    Err(e) => (None, Some(e)),
  };

  tracing_subscriber::registry()
    .with(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with(fmt::layer())
    .with(file_layer)
    .init();

  file_error.map_or(Ok(()), Err)
}

fn open_log_file(path: &Path) -> io::Result<File> {
  if let Some(dir) = path.parent() {
    std::fs::create_dir_all(dir)?;
  }
  OpenOptions::new().create(true).append(true).open(path)
}
