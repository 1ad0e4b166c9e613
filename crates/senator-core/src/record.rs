//! Raw log rows and the per-subject summaries derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subject::{ACTIVE_STATUS, SubjectKind};

/// One badge swipe as recorded by the access-control feed.
///
/// The sync job never writes these except to flip `processed`; stores accept
/// them through their own `record_event` helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
  pub subject_id: String,
  pub kind:       SubjectKind,
  pub raw_name:   Option<String>,
  pub raw_group:  Option<String>,
  pub event_at:   DateTime<Utc>,
}

impl RawEvent {
  pub fn new(
    subject_id: impl Into<String>,
    kind: SubjectKind,
    raw_name: impl Into<String>,
    raw_group: impl Into<String>,
    event_at: DateTime<Utc>,
  ) -> Self {
    Self {
      subject_id: subject_id.into(),
      kind,
      raw_name: Some(raw_name.into()),
      raw_group: Some(raw_group.into()),
      event_at,
    }
  }
}

/// Unprocessed events for one `(subject_id, raw_name, raw_group)` group.
///
/// Because the raw text is part of the grouping key, a subject whose name or
/// group string varies between swipes yields several candidates in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
  pub subject_id:  String,
  pub kind:        SubjectKind,
  pub raw_name:    Option<String>,
  pub raw_group:   Option<String>,
  pub status:      String,
  pub first_seen:  DateTime<Utc>,
  pub last_seen:   DateTime<Utc>,
  pub event_count: i64,
}

impl CandidateRecord {
  /// Build a candidate from one aggregated row; the status is always active.
  pub fn from_aggregate(
    subject_id: String,
    kind: SubjectKind,
    raw_name: Option<String>,
    raw_group: Option<String>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    event_count: i64,
  ) -> Self {
    Self {
      subject_id,
      kind,
      raw_name,
      raw_group,
      status: ACTIVE_STATUS.to_owned(),
      first_seen,
      last_seen,
      event_count,
    }
  }

  /// Whether the raw name is absent or blank.
  pub fn name_missing(&self) -> bool { is_blank(self.raw_name.as_deref()) }

  /// Whether the raw group is absent or blank.
  pub fn group_missing(&self) -> bool { is_blank(self.raw_group.as_deref()) }

  /// Fill blank raw fields from `snapshot`, leaving populated ones alone.
  pub fn backfill_from(&mut self, snapshot: RawSnapshot) {
    if self.name_missing() && !is_blank(snapshot.raw_name.as_deref()) {
      self.raw_name = snapshot.raw_name;
    }
    if self.group_missing() && !is_blank(snapshot.raw_group.as_deref()) {
      self.raw_group = snapshot.raw_group;
    }
  }
}

/// The name and group text of a subject's most recent log row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSnapshot {
  pub raw_name:  Option<String>,
  pub raw_group: Option<String>,
}

fn is_blank(s: Option<&str>) -> bool { s.is_none_or(|s| s.trim().is_empty()) }
