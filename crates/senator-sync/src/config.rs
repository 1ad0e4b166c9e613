//! Run configuration, built once at start-up and passed by reference.
//!
//! Sources, later wins: built-in defaults, an optional TOML file, `DB_*`
//! environment variables for the connection, `SYNC_*` for the job itself, and
//! finally command-line overrides.

use std::{collections::HashMap, fmt, path::{Path, PathBuf}};

use config::{Config, Environment, File};
use senator_core::subject::SubjectKind;
use senator_store_mysql::ConnectParams;
use serde::Deserialize;

use crate::Result;

/// Which store implementation a run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  Mysql,
  Sqlite,
}

/// Everything a sync run needs to know.
#[derive(Clone, Deserialize)]
pub struct SyncConfig {
  pub backend:  Backend,
  pub host:     String,
  pub user:     String,
  pub password: String,
  /// Keyed `name` so that it reads from `DB_NAME`.
  #[serde(rename = "name")]
  pub database: String,
  pub port:     u16,
  /// SQLite file; defaults to `<database>.db` in the working directory.
  pub path:     Option<PathBuf>,
  pub log_file: PathBuf,
  /// Restrict the run to a single subject kind.
  pub only:     Option<SubjectKind>,
}

impl SyncConfig {
  /// Load from defaults, `file` (if it exists) and the process environment.
  pub fn load(file: &Path, only: Option<SubjectKind>) -> Result<Self> {
    Self::load_from(file, only, None)
  }

  /// As [`SyncConfig::load`], reading variables from `env` instead of the
  /// process environment when given.
  pub fn load_from(
    file: &Path,
    only: Option<SubjectKind>,
    env: Option<HashMap<String, String>>,
  ) -> Result<Self> {
    let settings = Config::builder()
      .set_default("backend", "mysql")?
      .set_default("host", "localhost")?
      .set_default("user", "senator-service-account")?
      .set_default("password", "")?
      .set_default("name", "senator")?
      .set_default("port", 3306)?
      .set_default("log_file", "/var/log/senator/sync-data.log")?
      .add_source(File::from(file).required(false))
      .add_source(Environment::with_prefix("DB").source(env.clone()))
      .add_source(Environment::with_prefix("SYNC").source(env))
      .set_override_option("only", only.map(SubjectKind::as_str))?
      .build()?;

    Ok(settings.try_deserialize()?)
  }

  /// The kinds this run processes, in processing order.
  pub fn kinds(&self) -> Vec<SubjectKind> {
    match self.only {
      Some(kind) => vec![kind],
      None => SubjectKind::ALL.to_vec(),
    }
  }

  pub fn connect_params(&self) -> ConnectParams {
    ConnectParams {
      host:     self.host.clone(),
      port:     self.port,
      user:     self.user.clone(),
      password: self.password.clone(),
      database: self.database.clone(),
    }
  }

  pub fn sqlite_path(&self) -> PathBuf {
    self
      .path
      .clone()
      .unwrap_or_else(|| PathBuf::from(format!("{}.db", self.database)))
  }
}

impl fmt::Debug for SyncConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SyncConfig")
      .field("backend", &self.backend)
      .field("host", &self.host)
      .field("user", &self.user)
      .field("password", &"<redacted>")
      .field("database", &self.database)
      .field("port", &self.port)
      .field("path", &self.path)
      .field("log_file", &self.log_file)
      .field("only", &self.only)
      .finish()
  }
}
