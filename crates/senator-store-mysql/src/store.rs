//! [`MySqlStore`] — the MySQL implementation of [`AccessStore`].

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use senator_core::{
  normalize::NOT_AVAILABLE,
  record::{CandidateRecord, RawEvent, RawSnapshot},
  registry::{Applied, RegistryEntry, RegistryUpsert, RegistryWrite, StoredText},
  store::AccessStore,
  subject::SubjectKind,
};
use sqlx::{
  MySql, Transaction,
  mysql::{MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions},
  query::Query,
};

use crate::{Error, Result};

// ─── Connection ──────────────────────────────────────────────────────────────

/// Everything needed to open a session against the production database.
#[derive(Clone)]
pub struct ConnectParams {
  pub host:     String,
  pub port:     u16,
  pub user:     String,
  pub password: String,
  pub database: String,
}

impl fmt::Debug for ConnectParams {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConnectParams")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("user", &self.user)
      .field("password", &"<redacted>")
      .field("database", &self.database)
      .finish()
  }
}

impl ConnectParams {
  fn options(&self) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
      .host(&self.host)
      .port(self.port)
      .username(&self.user)
      .password(&self.password)
      .database(&self.database)
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

type CandidateRow = (
  String,
  Option<String>,
  Option<String>,
  NaiveDateTime,
  NaiveDateTime,
  i64,
);

type EntryRow = (
  String,
  String,
  String,
  String,
  Option<String>,
  String,
  NaiveDateTime,
  NaiveDateTime,
  i64,
  NaiveDateTime,
  NaiveDateTime,
);

fn entry_from_row(kind: SubjectKind, row: EntryRow) -> RegistryEntry {
  let (
    badge_number,
    first_name,
    last_name,
    affiliation,
    position,
    status,
    first_seen,
    last_seen,
    access_count,
    created_at,
    updated_at,
  ) = row;

  RegistryEntry {
    kind,
    badge_number,
    first_name,
    last_name,
    affiliation,
    position,
    status,
    first_seen: first_seen.and_utc(),
    last_seen: last_seen.and_utc(),
    access_count,
    created_at: created_at.and_utc(),
    updated_at: updated_at.and_utc(),
  }
}

/// `DATETIME` columns hold naive UTC.
fn naive(dt: DateTime<Utc>) -> NaiveDateTime { dt.naive_utc() }

/// `access_logs` keeps the swipe time as separate `DATE` and `TIME` columns.
fn event_date_time(dt: DateTime<Utc>) -> (NaiveDate, NaiveTime) {
  let naive = naive(dt);
  (naive.date(), naive.time())
}

// ─── Access log SQL ──────────────────────────────────────────────────────────

const RECORD_EVENT_SQL: &str = "
  INSERT INTO access_logs
    (badge_number, person_id, person_type, person_name, group_name,
     event_date, event_time, processed)
  VALUES (?, ?, ?, ?, ?, ?, ?, 0)";

const UNPROCESSED_SQL: &str = "
  SELECT person_id, person_name, group_name,
         MIN(TIMESTAMP(event_date, event_time)),
         MAX(TIMESTAMP(event_date, event_time)),
         COUNT(*)
  FROM access_logs
  WHERE person_type = ? AND processed = 0
  GROUP BY person_id, person_name, group_name
  ORDER BY person_id, MIN(TIMESTAMP(event_date, event_time))";

const LATEST_SQL: &str = "
  SELECT person_name, group_name
  FROM access_logs
  WHERE person_id = ? AND person_type = ?
  ORDER BY event_date DESC, event_time DESC, id DESC
  LIMIT 1";

// ─── Store ───────────────────────────────────────────────────────────────────

/// An access-log database on a MySQL or MariaDB server.
#[derive(Clone)]
pub struct MySqlStore {
  pool: MySqlPool,
}

impl MySqlStore {
  /// Open the single session a sync run works through.
  pub async fn connect(params: &ConnectParams) -> Result<Self> {
    let pool = MySqlPoolOptions::new()
      .max_connections(1)
      .connect_with(params.options())
      .await?;
    Ok(Self { pool })
  }

  /// Append a raw event to `access_logs`, unprocessed.
  ///
  /// This is the access-control feed's write path; the sync job itself never
  /// calls it.
  pub async fn record_event(&self, event: &RawEvent) -> Result<u64> {
    let (event_date, event_time) = event_date_time(event.event_at);
    let done = sqlx::query(RECORD_EVENT_SQL)
      .bind(&event.subject_id)
      .bind(&event.subject_id)
      .bind(event.kind.as_str())
      .bind(&event.raw_name)
      .bind(&event.raw_group)
      .bind(event_date)
      .bind(event_time)
      .execute(&self.pool)
      .await?;

    Ok(done.last_insert_id())
  }

  /// Commit `tx` if `outcome` succeeded, otherwise roll it back explicitly.
  async fn finish<T>(tx: Transaction<'static, MySql>, outcome: sqlx::Result<T>) -> Result<T> {
    match outcome {
      Ok(value) => {
        tx.commit().await?;
        Ok(value)
      }
      Err(e) => {
        tx.rollback().await?;
        Err(e.into())
      }
    }
  }

  /// Lock the badge's row (or the gap where it would go), then insert or
  /// update it. Runs inside the caller's transaction.
  async fn apply_upsert(
    tx: &mut Transaction<'static, MySql>,
    upsert: &RegistryUpsert,
  ) -> sqlx::Result<Applied> {
    let kind = upsert.kind();
    let select_sql = format!(
      "SELECT first_name, last_name, {affiliation} FROM {table}
       WHERE badge_number = ? FOR UPDATE",
      affiliation = kind.affiliation_column(),
      table = kind.registry_table(),
    );
    let stored: Option<(String, String, String)> = sqlx::query_as(&select_sql)
      .bind(upsert.badge_number())
      .fetch_optional(&mut **tx)
      .await?;
    let now = naive(Utc::now());

    match stored {
      Some((first_name, last_name, affiliation)) => {
        let write = upsert.update_write(&StoredText { first_name, last_name, affiliation });
        let sql = update_sql(kind);
        bind_update(&sql, &write, now).execute(&mut **tx).await?;
        Ok(Applied::Updated)
      }
      None => {
        let write = upsert.insert_write();
        let sql = insert_sql(kind);
        bind_insert(&sql, &write, now).execute(&mut **tx).await?;
        Ok(Applied::Inserted)
      }
    }
  }
}

fn entry_columns(kind: SubjectKind) -> String {
  let position = if kind.has_position() { "position" } else { "NULL" };
  format!(
    "badge_number, first_name, last_name, {affiliation}, {position}, status,
     first_seen, last_seen, access_count, created_at, updated_at",
    affiliation = kind.affiliation_column(),
  )
}

fn position_of(entry: &RegistryWrite) -> String {
  entry.position.clone().unwrap_or_else(|| NOT_AVAILABLE.to_owned())
}

fn insert_sql(kind: SubjectKind) -> String {
  let (position_column, position_param) =
    if kind.has_position() { (", position", ", ?") } else { ("", "") };
  format!(
    "INSERT INTO {table} (
       badge_number, first_name, last_name, {affiliation}, status,
       first_seen, last_seen, access_count, created_at, updated_at{position_column}
     ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?{position_param})",
    table = kind.registry_table(),
    affiliation = kind.affiliation_column(),
  )
}

fn bind_insert<'q>(
  sql: &'q str,
  entry: &'q RegistryWrite,
  now: NaiveDateTime,
) -> Query<'q, MySql, MySqlArguments> {
  let query = sqlx::query(sql)
    .bind(&entry.badge_number)
    .bind(&entry.first_name)
    .bind(&entry.last_name)
    .bind(&entry.affiliation)
    .bind(&entry.status)
    .bind(naive(entry.first_seen))
    .bind(naive(entry.last_seen))
    .bind(entry.access_count)
    .bind(now)
    .bind(now);
  if entry.kind.has_position() { query.bind(position_of(entry)) } else { query }
}

fn update_sql(kind: SubjectKind) -> String {
  let position_assignment = if kind.has_position() { ", position = ?" } else { "" };
  format!(
    "UPDATE {table}
     SET first_name = ?, last_name = ?, {affiliation} = ?, status = ?,
         last_seen = ?, access_count = ?, updated_at = ?{position_assignment}
     WHERE badge_number = ?",
    table = kind.registry_table(),
    affiliation = kind.affiliation_column(),
  )
}

fn bind_update<'q>(
  sql: &'q str,
  entry: &'q RegistryWrite,
  now: NaiveDateTime,
) -> Query<'q, MySql, MySqlArguments> {
  let mut query = sqlx::query(sql)
    .bind(&entry.first_name)
    .bind(&entry.last_name)
    .bind(&entry.affiliation)
    .bind(&entry.status)
    .bind(naive(entry.last_seen))
    .bind(entry.access_count)
    .bind(now);
  if entry.kind.has_position() {
    query = query.bind(position_of(entry));
  }
  query.bind(&entry.badge_number)
}

// ─── AccessStore impl ────────────────────────────────────────────────────────

impl AccessStore for MySqlStore {
  type Error = Error;

  // ── Access log reads ──────────────────────────────────────────────────────

  async fn query_unprocessed(&self, kind: SubjectKind) -> Result<Vec<CandidateRecord>> {
    let rows: Vec<CandidateRow> = sqlx::query_as(UNPROCESSED_SQL)
      .bind(kind.as_str())
      .fetch_all(&self.pool)
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(subject_id, raw_name, raw_group, first_seen, last_seen, count)| {
          CandidateRecord::from_aggregate(
            subject_id,
            kind,
            raw_name,
            raw_group,
            first_seen.and_utc(),
            last_seen.and_utc(),
            count,
          )
        })
        .collect(),
    )
  }

  async fn query_latest(
    &self,
    subject_id: &str,
    kind:       SubjectKind,
  ) -> Result<Option<RawSnapshot>> {
    let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(LATEST_SQL)
      .bind(subject_id)
      .bind(kind.as_str())
      .fetch_optional(&self.pool)
      .await?;

    Ok(row.map(|(raw_name, raw_group)| RawSnapshot { raw_name, raw_group }))
  }

  // ── Registry ──────────────────────────────────────────────────────────────

  async fn find_registry_entry(
    &self,
    kind:         SubjectKind,
    badge_number: &str,
  ) -> Result<Option<RegistryEntry>> {
    let sql = format!(
      "SELECT {columns} FROM {table} WHERE badge_number = ?",
      columns = entry_columns(kind),
      table = kind.registry_table(),
    );

    let row: Option<EntryRow> = sqlx::query_as(&sql)
      .bind(badge_number)
      .fetch_optional(&self.pool)
      .await?;

    Ok(row.map(|r| entry_from_row(kind, r)))
  }

  async fn insert_registry_entry(&self, entry: &RegistryWrite) -> Result<()> {
    let sql = insert_sql(entry.kind);
    let mut tx = self.pool.begin().await?;
    let outcome = bind_insert(&sql, entry, naive(Utc::now())).execute(&mut *tx).await;
    Self::finish(tx, outcome).await?;
    Ok(())
  }

  async fn update_registry_entry(&self, entry: &RegistryWrite) -> Result<()> {
    let sql = update_sql(entry.kind);
    let mut tx = self.pool.begin().await?;
    let outcome = bind_update(&sql, entry, naive(Utc::now())).execute(&mut *tx).await;
    let done = Self::finish(tx, outcome).await?;

    // `updated_at` always moves, so a matched row is always an affected row.
    if done.rows_affected() == 0 {
      return Err(Error::EntryNotFound {
        kind:         entry.kind,
        badge_number: entry.badge_number.clone(),
      });
    }
    Ok(())
  }

  async fn upsert_registry_entry(&self, upsert: &RegistryUpsert) -> Result<Applied> {
    let mut tx = self.pool.begin().await?;
    let outcome = Self::apply_upsert(&mut tx, upsert).await;
    Self::finish(tx, outcome).await
  }

  // ── Access log writes ─────────────────────────────────────────────────────

  async fn mark_events_processed(&self, subject_id: &str, kind: SubjectKind) -> Result<u64> {
    let mut tx = self.pool.begin().await?;
    let outcome = sqlx::query(
      "UPDATE access_logs SET processed = 1
       WHERE person_id = ? AND person_type = ? AND processed = 0",
    )
    .bind(subject_id)
    .bind(kind.as_str())
    .execute(&mut *tx)
    .await;

    Ok(Self::finish(tx, outcome).await?.rows_affected())
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  async fn close(self) -> Result<()> {
    self.pool.close().await;
    Ok(())
  }
}
