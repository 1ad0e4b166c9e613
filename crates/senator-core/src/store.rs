//! The `AccessStore` trait — everything the sync engine asks of the database.
//!
//! The trait is implemented by storage backends (`senator-store-sqlite`,
//! `senator-store-mysql`). The sync engine depends on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use crate::{
  record::{CandidateRecord, RawSnapshot},
  registry::{Applied, RegistryEntry, RegistryUpsert, RegistryWrite},
  subject::SubjectKind,
};

/// Classification every backend error must provide.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` when the underlying connection is gone and no further statement
  /// can succeed in this run.
  fn is_connection_lost(&self) -> bool;
}

/// Abstraction over the database holding `access_logs` and both registries.
///
/// Every write method runs in its own transaction, which is rolled back if any
/// statement in it fails.
pub trait AccessStore: Send + Sync {
  type Error: StoreError;

  // ── Access log reads ──────────────────────────────────────────────────

  /// Aggregate unprocessed rows of `kind`, grouped by
  /// `(subject_id, raw_name, raw_group)` and ordered by `subject_id`.
  fn query_unprocessed(
    &self,
    kind: SubjectKind,
  ) -> impl Future<Output = Result<Vec<CandidateRecord>, Self::Error>> + Send + '_;

  /// The name/group of the most recent row for a subject, processed or not.
  /// Ties on timestamp are broken by insertion order, latest first.
  fn query_latest<'a>(
    &'a self,
    subject_id: &'a str,
    kind: SubjectKind,
  ) -> impl Future<Output = Result<Option<RawSnapshot>, Self::Error>> + Send + 'a;

  // ── Registry ──────────────────────────────────────────────────────────

  /// Look up a registry entry by badge number. Returns `None` if absent.
  fn find_registry_entry<'a>(
    &'a self,
    kind: SubjectKind,
    badge_number: &'a str,
  ) -> impl Future<Output = Result<Option<RegistryEntry>, Self::Error>> + Send + 'a;

  /// Insert a new entry; `created_at` and `updated_at` are both set to now.
  fn insert_registry_entry<'a>(
    &'a self,
    entry: &'a RegistryWrite,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Overwrite names, affiliation, position, status, `last_seen` and
  /// `access_count` of an existing entry and advance `updated_at`.
  /// `first_seen` and `created_at` are left untouched.
  ///
  /// Returns an error if no entry with that badge number exists.
  fn update_registry_entry<'a>(
    &'a self,
    entry: &'a RegistryWrite,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Insert or update the entry for `upsert`'s badge. The existence check
  /// and the write share one transaction that holds the badge's row (or its
  /// absence) until commit.
  fn upsert_registry_entry<'a>(
    &'a self,
    upsert: &'a RegistryUpsert,
  ) -> impl Future<Output = Result<Applied, Self::Error>> + Send + 'a;

  // ── Access log writes ─────────────────────────────────────────────────

  /// Flag every row for `(subject_id, kind)` as processed, returning how many
  /// rows changed.
  fn mark_events_processed<'a>(
    &'a self,
    subject_id: &'a str,
    kind: SubjectKind,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Release the underlying connection.
  fn close(self) -> impl Future<Output = Result<(), Self::Error>> + Send
  where
    Self: Sized;
}
