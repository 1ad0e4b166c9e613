//! Registry Reconciler — upserts candidates and consumes their log rows.
//!
//! Each candidate is its own unit of work: an upsert committed on its own,
//! followed (only on success) by marking the subject's rows processed. A
//! failure on one candidate is logged and counted, and the run moves on. Only
//! a lost store connection stops the run.

pub use senator_core::registry::Applied;
use senator_core::{
  record::CandidateRecord,
  registry::RegistryUpsert,
  store::{AccessStore, StoreError},
  subject::SubjectKind,
};

use crate::{Error, Result, aggregate::Aggregator, report::SyncReport};

pub struct Reconciler<'s, S> {
  store:      &'s S,
  aggregator: Aggregator<'s, S>,
}

impl<'s, S: AccessStore> Reconciler<'s, S> {
  pub fn new(store: &'s S) -> Self {
    Self { store, aggregator: Aggregator::new(store) }
  }

  /// Log a failed store call and classify it for the caller.
  fn store_failure(
    operation: &'static str,
    kind: SubjectKind,
    badge: &str,
    error: S::Error,
  ) -> Error {
    tracing::error!(%kind, badge, operation, error = %error, "store call failed");
    if error.is_connection_lost() {
      Error::Unrecoverable { operation, source: Box::new(error) }
    } else {
      Error::Record {
        operation,
        kind,
        badge: badge.to_owned(),
        source: Box::new(error),
      }
    }
  }

  /// Insert or update the registry entry for `record`'s badge.
  ///
  /// A brand-new entry whose candidate has no name or group text borrows it
  /// from the subject's most recent log row. Existing entries never get that
  /// backfill; blank candidate text leaves their stored text as it is. The
  /// store decides between the two inside one transaction.
  pub async fn upsert(&self, record: &CandidateRecord) -> Result<Applied> {
    let kind = record.kind;
    let badge = record.subject_id.as_str();

    let mut upsert = RegistryUpsert::new(record.clone());
    if (record.name_missing() || record.group_missing())
      && let Some(snapshot) = self.aggregator.latest_snapshot(badge, kind).await?
    {
      upsert = upsert.with_snapshot(snapshot);
    }

    self
      .store
      .upsert_registry_entry(&upsert)
      .await
      .map_err(|e| Self::store_failure("upsert_registry_entry", kind, badge, e))
  }

  /// Flag every log row of the subject as processed, including rows that were
  /// not part of this run's candidate.
  pub async fn mark_processed(&self, subject_id: &str, kind: SubjectKind) -> Result<u64> {
    self
      .store
      .mark_events_processed(subject_id, kind)
      .await
      .map_err(|e| Self::store_failure("mark_events_processed", kind, subject_id, e))
  }

  /// Reconcile every unprocessed candidate of each kind in `kinds`, in order.
  #[tracing::instrument(skip_all, fields(run_id = %uuid::Uuid::new_v4()))]
  pub async fn run(&self, kinds: &[SubjectKind]) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for &kind in kinds {
      self.run_kind(kind, &mut report).await?;
    }

    tracing::info!(
      candidates = report.candidates(),
      failures = report.failures(),
      "sync finished"
    );
    Ok(report)
  }

  async fn run_kind(&self, kind: SubjectKind, report: &mut SyncReport) -> Result<()> {
    let records = self.aggregator.unprocessed_records(kind).await?;
    tracing::info!(%kind, count = records.len(), "candidates to reconcile");

    let counts = report.kind_mut(kind);
    for record in &records {
      counts.candidates += 1;
      let badge = record.subject_id.as_str();

      let applied = match self.upsert(record).await {
        Ok(applied) => applied,
        Err(e) if e.is_fatal() => return Err(e),
        Err(_) => {
          counts.write_failures += 1;
          tracing::error!(%kind, badge, "failed to reconcile subject");
          continue;
        }
      };
      match applied {
        Applied::Inserted => counts.inserted += 1,
        Applied::Updated => counts.updated += 1,
      }

      match self.mark_processed(badge, kind).await {
        Ok(marked) => {
          counts.events_marked += marked;
          tracing::info!(%kind, badge, ?applied, marked, "subject reconciled");
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(_) => {
          counts.mark_failures += 1;
          tracing::error!(%kind, badge, "failed to mark events processed");
        }
      }
    }

    tracing::info!(
      %kind,
      inserted = counts.inserted,
      updated = counts.updated,
      write_failures = counts.write_failures,
      mark_failures = counts.mark_failures,
      events_marked = counts.events_marked,
      "kind finished"
    );
    Ok(())
  }
}
