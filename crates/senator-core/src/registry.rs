//! Registry entries — the canonical employee and visitor records.
//!
//! Entries are keyed by badge number within a kind. They are created on the
//! first sighting of a badge, updated on later runs, and never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  normalize::{NOT_AVAILABLE, clean_affiliation, split_full_name},
  record::{CandidateRecord, RawSnapshot},
  subject::SubjectKind,
};

/// A persisted registry row, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
  pub kind:         SubjectKind,
  pub badge_number: String,
  pub first_name:   String,
  pub last_name:    String,
  /// Department for employees, company for visitors.
  pub affiliation:  String,
  /// Only employees carry a position.
  pub position:     Option<String>,
  pub status:       String,
  pub first_seen:   DateTime<Utc>,
  pub last_seen:    DateTime<Utc>,
  pub access_count: i64,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// The normalised values a reconciliation writes for one badge.
///
/// `created_at` and `updated_at` are not accepted from callers; the store
/// assigns them. On update, `first_seen` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryWrite {
  pub kind:         SubjectKind,
  pub badge_number: String,
  pub first_name:   String,
  pub last_name:    String,
  pub affiliation:  String,
  pub position:     Option<String>,
  pub status:       String,
  pub first_seen:   DateTime<Utc>,
  pub last_seen:    DateTime<Utc>,
  pub access_count: i64,
}

impl RegistryWrite {
  /// Normalise a candidate's raw text into registry fields.
  pub fn from_candidate(record: &CandidateRecord) -> Self {
    let (first_name, last_name) =
      split_full_name(record.raw_name.as_deref().unwrap_or_default());

    Self {
      kind: record.kind,
      badge_number: record.subject_id.clone(),
      first_name,
      last_name,
      affiliation: clean_affiliation(record.raw_group.as_deref()),
      position: record.kind.has_position().then(|| NOT_AVAILABLE.to_owned()),
      status: record.status.clone(),
      first_seen: record.first_seen,
      last_seen: record.last_seen,
      access_count: record.event_count,
    }
  }

  /// Keep the stored text for every field the candidate left blank, so that
  /// an update never replaces a known name with the sentinel.
  pub fn retain_known_text(&mut self, stored: &StoredText, record: &CandidateRecord) {
    if record.name_missing() {
      self.first_name.clone_from(&stored.first_name);
      self.last_name.clone_from(&stored.last_name);
    }
    if record.group_missing() {
      self.affiliation.clone_from(&stored.affiliation);
    }
  }
}

/// The text columns of an existing entry, as read inside an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredText {
  pub first_name:  String,
  pub last_name:   String,
  pub affiliation: String,
}

impl From<&RegistryEntry> for StoredText {
  fn from(entry: &RegistryEntry) -> Self {
    Self {
      first_name:  entry.first_name.clone(),
      last_name:   entry.last_name.clone(),
      affiliation: entry.affiliation.clone(),
    }
  }
}

/// How an upsert landed in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
  Inserted,
  Updated,
}

/// One candidate's registry write, resolved against the stored row by the
/// store inside a single transaction.
///
/// A new badge gets [`insert_write`](Self::insert_write), backfilled from the
/// snapshot if one was attached. An existing badge gets
/// [`update_write`](Self::update_write), which never uses the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryUpsert {
  record:   CandidateRecord,
  snapshot: Option<RawSnapshot>,
}

impl RegistryUpsert {
  pub fn new(record: CandidateRecord) -> Self { Self { record, snapshot: None } }

  /// Attach the subject's latest raw text for a possible insert.
  pub fn with_snapshot(mut self, snapshot: RawSnapshot) -> Self {
    self.snapshot = Some(snapshot);
    self
  }

  pub fn kind(&self) -> SubjectKind { self.record.kind }

  pub fn badge_number(&self) -> &str { &self.record.subject_id }

  /// The write for a badge with no entry yet.
  pub fn insert_write(&self) -> RegistryWrite {
    match &self.snapshot {
      Some(snapshot) => {
        let mut filled = self.record.clone();
        filled.backfill_from(snapshot.clone());
        RegistryWrite::from_candidate(&filled)
      }
      None => RegistryWrite::from_candidate(&self.record),
    }
  }

  /// The write for a badge whose entry currently holds `stored`.
  pub fn update_write(&self, stored: &StoredText) -> RegistryWrite {
    let mut write = RegistryWrite::from_candidate(&self.record);
    write.retain_known_text(stored, &self.record);
    write
  }
}
