//! [`SqliteStore`] — the SQLite implementation of [`AccessStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{
  OptionalExtension as _, Transaction, TransactionBehavior, params_from_iter, types::Value,
};
use senator_core::{
  normalize::NOT_AVAILABLE,
  record::{CandidateRecord, RawEvent, RawSnapshot},
  registry::{Applied, RegistryEntry, RegistryUpsert, RegistryWrite, StoredText},
  store::AccessStore,
  subject::SubjectKind,
};

use crate::{
  Error, Result,
  encode::{RawCandidate, RawEntry, encode_dt, encode_kind},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An access-log database backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append a raw event to `access_logs`, unprocessed, and return its row id.
  ///
  /// This is the access-control feed's write path; the sync job itself never
  /// calls it.
  pub async fn record_event(&self, event: &RawEvent) -> Result<i64> {
    let subject_id = event.subject_id.clone();
    let kind_str   = encode_kind(event.kind);
    let raw_name   = event.raw_name.clone();
    let raw_group  = event.raw_group.clone();
    let event_at   = encode_dt(event.event_at);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO access_logs (person_id, person_type, person_name, group_name, event_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![subject_id, kind_str, raw_name, raw_group, event_at],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(id)
  }
}

/// Run `f` in a transaction, committing on success and rolling back
/// explicitly on failure. The write lock is taken at `BEGIN`, so reads inside
/// `f` see the state its writes apply to.
fn in_transaction<T>(
  conn: &mut rusqlite::Connection,
  f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  match f(&tx) {
    Ok(value) => {
      tx.commit()?;
      Ok(value)
    }
    Err(e) => {
      tx.rollback()?;
      Err(e)
    }
  }
}

/// `SELECT` list shared by every registry read; visitors have no position.
fn entry_columns(kind: SubjectKind) -> String {
  let position = if kind.has_position() { "position" } else { "NULL" };
  format!(
    "badge_number, first_name, last_name, {affiliation}, {position}, status,
     first_seen, last_seen, access_count, created_at, updated_at",
    affiliation = kind.affiliation_column(),
  )
}

/// Position value bound for kinds that carry the column.
fn position_value(entry: &RegistryWrite) -> Option<Value> {
  entry.kind.has_position().then(|| {
    Value::Text(entry.position.clone().unwrap_or_else(|| NOT_AVAILABLE.to_owned()))
  })
}

/// `INSERT` for one registry row; `?9` fills both `created_at` and
/// `updated_at`.
fn insert_sql(kind: SubjectKind) -> String {
  let (position_column, position_param) =
    if kind.has_position() { (", position", ", ?10") } else { ("", "") };
  format!(
    "INSERT INTO {table} (
       badge_number, first_name, last_name, {affiliation}, status,
       first_seen, last_seen, access_count, created_at, updated_at{position_column}
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9{position_param})",
    table = kind.registry_table(),
    affiliation = kind.affiliation_column(),
  )
}

fn insert_values(entry: &RegistryWrite, now: String) -> Vec<Value> {
  let mut values = vec![
    Value::Text(entry.badge_number.clone()),
    Value::Text(entry.first_name.clone()),
    Value::Text(entry.last_name.clone()),
    Value::Text(entry.affiliation.clone()),
    Value::Text(entry.status.clone()),
    Value::Text(encode_dt(entry.first_seen)),
    Value::Text(encode_dt(entry.last_seen)),
    Value::Integer(entry.access_count),
    Value::Text(now),
  ];
  values.extend(position_value(entry));
  values
}

/// `UPDATE` by badge; `first_seen` and `created_at` are never touched.
fn update_sql(kind: SubjectKind) -> String {
  let position_assignment = if kind.has_position() { ", position = ?9" } else { "" };
  format!(
    "UPDATE {table}
     SET first_name = ?2, last_name = ?3, {affiliation} = ?4, status = ?5,
         last_seen = ?6, access_count = ?7, updated_at = ?8{position_assignment}
     WHERE badge_number = ?1",
    table = kind.registry_table(),
    affiliation = kind.affiliation_column(),
  )
}

fn update_values(entry: &RegistryWrite, now: String) -> Vec<Value> {
  let mut values = vec![
    Value::Text(entry.badge_number.clone()),
    Value::Text(entry.first_name.clone()),
    Value::Text(entry.last_name.clone()),
    Value::Text(entry.affiliation.clone()),
    Value::Text(entry.status.clone()),
    Value::Text(encode_dt(entry.last_seen)),
    Value::Integer(entry.access_count),
    Value::Text(now),
  ];
  values.extend(position_value(entry));
  values
}

// ─── AccessStore impl ────────────────────────────────────────────────────────

impl AccessStore for SqliteStore {
  type Error = Error;

  // ── Access log reads ──────────────────────────────────────────────────────

  async fn query_unprocessed(&self, kind: SubjectKind) -> Result<Vec<CandidateRecord>> {
    let kind_str = encode_kind(kind);

    let raws: Vec<RawCandidate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, person_name, group_name,
                  MIN(event_at), MAX(event_at), COUNT(*)
           FROM access_logs
           WHERE person_type = ?1 AND processed = 0
           GROUP BY person_id, person_name, group_name
           ORDER BY person_id, MIN(event_at)",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![kind_str], |row| {
            Ok(RawCandidate {
              subject_id:  row.get(0)?,
              raw_name:    row.get(1)?,
              raw_group:   row.get(2)?,
              first_seen:  row.get(3)?,
              last_seen:   row.get(4)?,
              event_count: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|raw| raw.into_candidate(kind)).collect()
  }

  async fn query_latest(
    &self,
    subject_id: &str,
    kind:       SubjectKind,
  ) -> Result<Option<RawSnapshot>> {
    let subject_id = subject_id.to_owned();
    let kind_str   = encode_kind(kind);

    let snapshot = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT person_name, group_name
             FROM access_logs
             WHERE person_id = ?1 AND person_type = ?2
             ORDER BY event_at DESC, id DESC
             LIMIT 1",
            rusqlite::params![subject_id, kind_str],
            |row| {
              Ok(RawSnapshot {
                raw_name:  row.get(0)?,
                raw_group: row.get(1)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    Ok(snapshot)
  }

  // ── Registry ──────────────────────────────────────────────────────────────

  async fn find_registry_entry(
    &self,
    kind:         SubjectKind,
    badge_number: &str,
  ) -> Result<Option<RegistryEntry>> {
    let badge_number = badge_number.to_owned();
    let sql = format!(
      "SELECT {columns} FROM {table} WHERE badge_number = ?1",
      columns = entry_columns(kind),
      table = kind.registry_table(),
    );

    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![badge_number], |row| {
            Ok(RawEntry {
              badge_number: row.get(0)?,
              first_name:   row.get(1)?,
              last_name:    row.get(2)?,
              affiliation:  row.get(3)?,
              position:     row.get(4)?,
              status:       row.get(5)?,
              first_seen:   row.get(6)?,
              last_seen:    row.get(7)?,
              access_count: row.get(8)?,
              created_at:   row.get(9)?,
              updated_at:   row.get(10)?,
            })
          })
          .optional()?)
      })
      .await?;

    raw.map(|r| r.into_entry(kind)).transpose()
  }

  async fn insert_registry_entry(&self, entry: &RegistryWrite) -> Result<()> {
    let sql = insert_sql(entry.kind);
    let values = insert_values(entry, encode_dt(Utc::now()));

    self
      .conn
      .call(move |conn| {
        in_transaction(conn, |tx| tx.execute(&sql, params_from_iter(values)))?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn update_registry_entry(&self, entry: &RegistryWrite) -> Result<()> {
    let sql = update_sql(entry.kind);
    let values = update_values(entry, encode_dt(Utc::now()));

    let changed = self
      .conn
      .call(move |conn| {
        Ok(in_transaction(conn, |tx| tx.execute(&sql, params_from_iter(values)))?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::EntryNotFound {
        kind:         entry.kind,
        badge_number: entry.badge_number.clone(),
      });
    }
    Ok(())
  }

  async fn upsert_registry_entry(&self, upsert: &RegistryUpsert) -> Result<Applied> {
    let kind = upsert.kind();
    let upsert = upsert.clone();
    let now = encode_dt(Utc::now());
    let select_sql = format!(
      "SELECT first_name, last_name, {affiliation} FROM {table} WHERE badge_number = ?1",
      affiliation = kind.affiliation_column(),
      table = kind.registry_table(),
    );

    let applied = self
      .conn
      .call(move |conn| {
        Ok(in_transaction(conn, |tx| {
          let stored = tx
            .query_row(&select_sql, rusqlite::params![upsert.badge_number()], |row| {
              Ok(StoredText {
                first_name:  row.get(0)?,
                last_name:   row.get(1)?,
                affiliation: row.get(2)?,
              })
            })
            .optional()?;

          match stored {
            Some(stored) => {
              let write = upsert.update_write(&stored);
              tx.execute(&update_sql(kind), params_from_iter(update_values(&write, now)))?;
              Ok(Applied::Updated)
            }
            None => {
              let write = upsert.insert_write();
              tx.execute(&insert_sql(kind), params_from_iter(insert_values(&write, now)))?;
              Ok(Applied::Inserted)
            }
          }
        })?)
      })
      .await?;

    Ok(applied)
  }

  // ── Access log writes ─────────────────────────────────────────────────────

  async fn mark_events_processed(&self, subject_id: &str, kind: SubjectKind) -> Result<u64> {
    let subject_id = subject_id.to_owned();
    let kind_str   = encode_kind(kind);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(in_transaction(conn, |tx| {
          tx.execute(
            "UPDATE access_logs SET processed = 1
             WHERE person_id = ?1 AND person_type = ?2 AND processed = 0",
            rusqlite::params![subject_id, kind_str],
          )
        })?)
      })
      .await?;

    Ok(changed as u64)
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }
}
