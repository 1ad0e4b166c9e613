//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use senator_core::{
  normalize::NOT_AVAILABLE,
  record::{CandidateRecord, RawEvent, RawSnapshot},
  registry::{Applied, RegistryUpsert, RegistryWrite},
  store::{AccessStore, StoreError},
  subject::{ACTIVE_STATUS, SubjectKind},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

fn employee(badge: &str, name: &str, group: &str, when: DateTime<Utc>) -> RawEvent {
  RawEvent::new(badge, SubjectKind::Employee, name, group, when)
}

fn visitor(badge: &str, name: &str, group: &str, when: DateTime<Utc>) -> RawEvent {
  RawEvent::new(badge, SubjectKind::Visitor, name, group, when)
}

fn write(kind: SubjectKind, badge: &str, count: i64, last_seen: DateTime<Utc>) -> RegistryWrite {
  RegistryWrite {
    kind,
    badge_number: badge.into(),
    first_name: "Ada".into(),
    last_name: "Lovelace".into(),
    affiliation: "Engineering".into(),
    position: kind.has_position().then(|| NOT_AVAILABLE.to_owned()),
    status: ACTIVE_STATUS.into(),
    first_seen: at(1, 8),
    last_seen,
    access_count: count,
  }
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unprocessed_empty_store_returns_nothing() {
  let s = store().await;
  assert!(s.query_unprocessed(SubjectKind::Employee).await.unwrap().is_empty());
  assert!(s.query_unprocessed(SubjectKind::Visitor).await.unwrap().is_empty());
}

#[tokio::test]
async fn unprocessed_aggregates_window_and_count() {
  let s = store().await;
  s.record_event(&employee("200", "Ada Lovelace", "R&D", at(3, 9))).await.unwrap();
  s.record_event(&employee("200", "Ada Lovelace", "R&D", at(1, 8))).await.unwrap();
  s.record_event(&employee("200", "Ada Lovelace", "R&D", at(2, 17))).await.unwrap();

  let records = s.query_unprocessed(SubjectKind::Employee).await.unwrap();
  assert_eq!(records.len(), 1);
  let r = &records[0];
  assert_eq!(r.subject_id, "200");
  assert_eq!(r.kind, SubjectKind::Employee);
  assert_eq!(r.raw_name.as_deref(), Some("Ada Lovelace"));
  assert_eq!(r.raw_group.as_deref(), Some("R&D"));
  assert_eq!(r.status, ACTIVE_STATUS);
  assert_eq!(r.first_seen, at(1, 8));
  assert_eq!(r.last_seen, at(3, 9));
  assert_eq!(r.event_count, 3);
}

#[tokio::test]
async fn unprocessed_filters_by_kind_and_orders_by_subject() {
  let s = store().await;
  s.record_event(&employee("300", "C", "G", at(1, 8))).await.unwrap();
  s.record_event(&employee("100", "A", "G", at(1, 9))).await.unwrap();
  s.record_event(&visitor("050", "V", "Acme", at(1, 10))).await.unwrap();
  s.record_event(&employee("200", "B", "G", at(1, 7))).await.unwrap();

  let employees = s.query_unprocessed(SubjectKind::Employee).await.unwrap();
  let ids: Vec<_> = employees.iter().map(|r| r.subject_id.as_str()).collect();
  assert_eq!(ids, ["100", "200", "300"]);

  let visitors = s.query_unprocessed(SubjectKind::Visitor).await.unwrap();
  assert_eq!(visitors.len(), 1);
  assert_eq!(visitors[0].kind, SubjectKind::Visitor);
}

#[tokio::test]
async fn unprocessed_groups_on_raw_text() {
  let s = store().await;
  s.record_event(&employee("100", "Ada Lovelace", "R&D", at(1, 8))).await.unwrap();
  s.record_event(&employee("100", "Ada  Lovelace", "R&D", at(2, 8))).await.unwrap();
  s.record_event(&employee("100", "Ada Lovelace", "R&D", at(3, 8))).await.unwrap();

  let records = s.query_unprocessed(SubjectKind::Employee).await.unwrap();
  assert_eq!(records.len(), 2);
  assert_eq!(records[0].raw_name.as_deref(), Some("Ada Lovelace"));
  assert_eq!(records[0].event_count, 2);
  assert_eq!(records[1].raw_name.as_deref(), Some("Ada  Lovelace"));
  assert_eq!(records[1].event_count, 1);
}

#[tokio::test]
async fn unprocessed_groups_missing_text_together() {
  let s = store().await;
  let mut event = employee("100", "", "", at(1, 8));
  event.raw_name = None;
  event.raw_group = None;
  s.record_event(&event).await.unwrap();
  event.event_at = at(2, 8);
  s.record_event(&event).await.unwrap();

  let records = s.query_unprocessed(SubjectKind::Employee).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].raw_name, None);
  assert_eq!(records[0].event_count, 2);
}

// ─── Latest snapshot ─────────────────────────────────────────────────────────

#[tokio::test]
async fn latest_snapshot_picks_newest_event() {
  let s = store().await;
  s.record_event(&employee("100", "Old Name", "Old Dept", at(1, 8))).await.unwrap();
  s.record_event(&employee("100", "New Name", "New Dept", at(4, 8))).await.unwrap();
  s.record_event(&employee("100", "Mid Name", "Mid Dept", at(2, 8))).await.unwrap();

  let snapshot = s.query_latest("100", SubjectKind::Employee).await.unwrap();
  assert_eq!(
    snapshot,
    Some(RawSnapshot {
      raw_name:  Some("New Name".into()),
      raw_group: Some("New Dept".into()),
    })
  );
}

#[tokio::test]
async fn latest_snapshot_breaks_ties_by_insertion_order() {
  let s = store().await;
  s.record_event(&employee("100", "First", "A", at(1, 8))).await.unwrap();
  s.record_event(&employee("100", "Second", "B", at(1, 8))).await.unwrap();

  let snapshot = s.query_latest("100", SubjectKind::Employee).await.unwrap().unwrap();
  assert_eq!(snapshot.raw_name.as_deref(), Some("Second"));
}

#[tokio::test]
async fn latest_snapshot_ignores_processed_flag_and_respects_kind() {
  let s = store().await;
  s.record_event(&employee("100", "Ada", "R&D", at(1, 8))).await.unwrap();
  s.mark_events_processed("100", SubjectKind::Employee).await.unwrap();

  let snapshot = s.query_latest("100", SubjectKind::Employee).await.unwrap();
  assert!(snapshot.is_some());
  assert!(s.query_latest("100", SubjectKind::Visitor).await.unwrap().is_none());
  assert!(s.query_latest("999", SubjectKind::Employee).await.unwrap().is_none());
}

// ─── Registry writes ─────────────────────────────────────────────────────────

#[tokio::test]
async fn find_missing_entry_returns_none() {
  let s = store().await;
  assert!(s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap().is_none());
}

#[tokio::test]
async fn insert_sets_both_timestamps_once() {
  let s = store().await;
  s.insert_registry_entry(&write(SubjectKind::Employee, "100", 3, at(2, 8))).await.unwrap();

  let entry = s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap().unwrap();
  assert_eq!(entry.kind, SubjectKind::Employee);
  assert_eq!(entry.first_name, "Ada");
  assert_eq!(entry.last_name, "Lovelace");
  assert_eq!(entry.affiliation, "Engineering");
  assert_eq!(entry.position.as_deref(), Some(NOT_AVAILABLE));
  assert_eq!(entry.first_seen, at(1, 8));
  assert_eq!(entry.last_seen, at(2, 8));
  assert_eq!(entry.access_count, 3);
  assert_eq!(entry.created_at, entry.updated_at);
}

#[tokio::test]
async fn registries_are_separate_per_kind() {
  let s = store().await;
  s.insert_registry_entry(&write(SubjectKind::Visitor, "100", 1, at(2, 8))).await.unwrap();

  let visitor = s.find_registry_entry(SubjectKind::Visitor, "100").await.unwrap().unwrap();
  assert_eq!(visitor.position, None);
  assert_eq!(visitor.affiliation, "Engineering");
  assert!(s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_insert_fails_and_leaves_entry_intact() {
  let s = store().await;
  s.insert_registry_entry(&write(SubjectKind::Employee, "100", 3, at(2, 8))).await.unwrap();
  let before = s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap();

  let mut again = write(SubjectKind::Employee, "100", 9, at(9, 8));
  again.first_name = "Changed".into();
  let err = s.insert_registry_entry(&again).await.unwrap_err();
  assert!(matches!(err, Error::Database(_)));
  assert!(!err.is_connection_lost());

  let after = s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap();
  assert_eq!(before, after);
}

#[tokio::test]
async fn update_preserves_first_seen_and_created_at() {
  let s = store().await;
  s.insert_registry_entry(&write(SubjectKind::Employee, "100", 3, at(2, 8))).await.unwrap();
  let before = s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap().unwrap();

  tokio::time::sleep(std::time::Duration::from_millis(5)).await;

  let mut next = write(SubjectKind::Employee, "100", 5, at(6, 8));
  next.first_seen = at(5, 8);
  next.last_name = "Byron".into();
  s.update_registry_entry(&next).await.unwrap();

  let after = s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap().unwrap();
  assert_eq!(after.last_name, "Byron");
  assert_eq!(after.last_seen, at(6, 8));
  assert_eq!(after.access_count, 5);
  assert_eq!(after.first_seen, before.first_seen);
  assert_eq!(after.created_at, before.created_at);
  assert!(after.updated_at > before.updated_at);
}

#[tokio::test]
async fn update_of_missing_entry_is_an_error() {
  let s = store().await;
  let err = s
    .update_registry_entry(&write(SubjectKind::Visitor, "404", 1, at(1, 9)))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::EntryNotFound { kind: SubjectKind::Visitor, ref badge_number } if badge_number == "404"
  ));
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

fn candidate(
  kind: SubjectKind,
  badge: &str,
  name: Option<&str>,
  group: Option<&str>,
) -> CandidateRecord {
  CandidateRecord::from_aggregate(
    badge.into(),
    kind,
    name.map(Into::into),
    group.map(Into::into),
    at(4, 8),
    at(6, 18),
    2,
  )
}

#[tokio::test]
async fn upsert_inserts_new_badge_with_backfill() {
  let s = store().await;
  let upsert = RegistryUpsert::new(candidate(SubjectKind::Visitor, "V-3", None, Some("Acme")))
    .with_snapshot(RawSnapshot {
      raw_name:  Some("Grace Hopper".into()),
      raw_group: Some("Navy".into()),
    });

  assert_eq!(s.upsert_registry_entry(&upsert).await.unwrap(), Applied::Inserted);

  let e = s.find_registry_entry(SubjectKind::Visitor, "V-3").await.unwrap().unwrap();
  assert_eq!(e.first_name, "Grace");
  assert_eq!(e.last_name, "Hopper");
  assert_eq!(e.affiliation, "Acme");
  assert_eq!(e.position, None);
  assert_eq!(e.first_seen, at(4, 8));
  assert_eq!(e.access_count, 2);
  assert_eq!(e.created_at, e.updated_at);
}

#[tokio::test]
async fn upsert_updates_existing_badge_and_keeps_stored_text() {
  let s = store().await;
  s.insert_registry_entry(&write(SubjectKind::Employee, "100", 1, at(1, 9))).await.unwrap();
  let before = s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap().unwrap();

  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  let upsert = RegistryUpsert::new(candidate(SubjectKind::Employee, "100", Some(" "), Some("Ops")))
    .with_snapshot(RawSnapshot {
      raw_name:  Some("Someone Else".into()),
      raw_group: None,
    });
  assert_eq!(s.upsert_registry_entry(&upsert).await.unwrap(), Applied::Updated);

  let after = s.find_registry_entry(SubjectKind::Employee, "100").await.unwrap().unwrap();
  assert_eq!(after.first_name, "Ada");
  assert_eq!(after.last_name, "Lovelace");
  assert_eq!(after.affiliation, "Ops");
  assert_eq!(after.last_seen, at(6, 18));
  assert_eq!(after.access_count, 2);
  assert_eq!(after.first_seen, before.first_seen);
  assert_eq!(after.created_at, before.created_at);
  assert!(after.updated_at > before.updated_at);
}

#[tokio::test]
async fn upsert_on_closed_connection_reports_connection_lost() {
  let s = store().await;
  let handle = s.clone();
  s.close().await.unwrap();

  let upsert = RegistryUpsert::new(candidate(SubjectKind::Employee, "100", Some("Ada"), None));
  let err = handle.upsert_registry_entry(&upsert).await.unwrap_err();
  assert!(err.is_connection_lost());
}

// ─── Mark processed ──────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_processed_sweeps_every_row_for_subject() {
  let s = store().await;
  s.record_event(&employee("100", "Ada Lovelace", "R&D", at(1, 8))).await.unwrap();
  s.record_event(&employee("100", "A. Lovelace", "Research", at(2, 8))).await.unwrap();
  s.record_event(&employee("200", "Charles Babbage", "R&D", at(1, 8))).await.unwrap();
  s.record_event(&visitor("100", "Guest", "Acme", at(1, 8))).await.unwrap();

  let changed = s.mark_events_processed("100", SubjectKind::Employee).await.unwrap();
  assert_eq!(changed, 2);

  let remaining = s.query_unprocessed(SubjectKind::Employee).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].subject_id, "200");
  assert_eq!(s.query_unprocessed(SubjectKind::Visitor).await.unwrap().len(), 1);

  let again = s.mark_events_processed("100", SubjectKind::Employee).await.unwrap();
  assert_eq!(again, 0);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_connection_reports_connection_lost() {
  let s = store().await;
  let handle = s.clone();
  s.close().await.unwrap();

  let err = handle.query_unprocessed(SubjectKind::Employee).await.unwrap_err();
  assert!(err.is_connection_lost());
}

#[tokio::test]
async fn reopening_file_store_keeps_data() {
  let dir = std::env::temp_dir().join(format!(
    "senator-store-sqlite-{}-{}",
    std::process::id(),
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
  ));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("senator.db");

  let s = SqliteStore::open(&path).await.unwrap();
  s.record_event(&employee("100", "Ada", "R&D", at(1, 8) + Duration::minutes(1))).await.unwrap();
  s.close().await.unwrap();

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.query_unprocessed(SubjectKind::Employee).await.unwrap().len(), 1);
  s.close().await.unwrap();

  std::fs::remove_dir_all(&dir).ok();
}
