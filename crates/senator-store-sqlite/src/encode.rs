//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that `MIN`, `MAX` and `ORDER BY` on the text column agree with
//! chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use senator_core::{
  record::CandidateRecord, registry::RegistryEntry, subject::SubjectKind,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── SubjectKind ─────────────────────────────────────────────────────────────

pub fn encode_kind(k: SubjectKind) -> &'static str { k.as_str() }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values of one aggregated `access_logs` group.
pub struct RawCandidate {
  pub subject_id:  String,
  pub raw_name:    Option<String>,
  pub raw_group:   Option<String>,
  pub first_seen:  String,
  pub last_seen:   String,
  pub event_count: i64,
}

impl RawCandidate {
  pub fn into_candidate(self, kind: SubjectKind) -> Result<CandidateRecord> {
    Ok(CandidateRecord::from_aggregate(
      self.subject_id,
      kind,
      self.raw_name,
      self.raw_group,
      decode_dt(&self.first_seen)?,
      decode_dt(&self.last_seen)?,
      self.event_count,
    ))
  }
}

/// Raw strings read directly from an `employees` or `visitors` row.
pub struct RawEntry {
  pub badge_number: String,
  pub first_name:   String,
  pub last_name:    String,
  pub affiliation:  String,
  pub position:     Option<String>,
  pub status:       String,
  pub first_seen:   String,
  pub last_seen:    String,
  pub access_count: i64,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawEntry {
  pub fn into_entry(self, kind: SubjectKind) -> Result<RegistryEntry> {
    Ok(RegistryEntry {
      kind,
      badge_number: self.badge_number,
      first_name:   self.first_name,
      last_name:    self.last_name,
      affiliation:  self.affiliation,
      position:     self.position,
      status:       self.status,
      first_seen:   decode_dt(&self.first_seen)?,
      last_seen:    decode_dt(&self.last_seen)?,
      access_count: self.access_count,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let later = base + Duration::microseconds(1_500);
    let much_later = base + Duration::hours(30);

    let mut encoded = vec![encode_dt(much_later), encode_dt(later), encode_dt(base)];
    encoded.sort();
    assert_eq!(
      encoded,
      vec![encode_dt(base), encode_dt(later), encode_dt(much_later)]
    );
    assert_eq!(encode_dt(base).len(), encode_dt(later).len());
  }

  #[test]
  fn timestamp_roundtrip_keeps_micros() {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
      + Duration::microseconds(42);
    assert_eq!(decode_dt(&encode_dt(at)).unwrap(), at);
  }

  #[test]
  fn decode_rejects_garbage() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
    assert!(matches!(decode_dt("2024-06-01 12:00:00"), Err(Error::DateParse(_))));
  }
}
