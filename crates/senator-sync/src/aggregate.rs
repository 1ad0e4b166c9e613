//! Record Aggregator — reads candidate records and raw snapshots.
//!
//! Read failures never abort a run on their own: they are logged and reported
//! as "nothing found". Only a lost connection escapes, as
//! [`Error::Unrecoverable`].

use senator_core::{
  record::{CandidateRecord, RawSnapshot},
  store::{AccessStore, StoreError},
  subject::SubjectKind,
};

use crate::{Error, Result};

pub struct Aggregator<'s, S> {
  store: &'s S,
}

impl<'s, S: AccessStore> Aggregator<'s, S> {
  pub fn new(store: &'s S) -> Self { Self { store } }

  /// Unprocessed events of `kind`, one candidate per
  /// `(subject_id, raw_name, raw_group)`, ordered by subject id.
  pub async fn unprocessed_records(&self, kind: SubjectKind) -> Result<Vec<CandidateRecord>> {
    match self.store.query_unprocessed(kind).await {
      Ok(records) => Ok(records),
      Err(e) if e.is_connection_lost() => Err(Error::Unrecoverable {
        operation: "query_unprocessed",
        source:    Box::new(e),
      }),
      Err(e) => {
        tracing::error!(%kind, error = %e, "failed to query unprocessed events");
        Ok(Vec::new())
      }
    }
  }

  /// The most recent raw name/group recorded for a subject, if any.
  pub async fn latest_snapshot(
    &self,
    subject_id: &str,
    kind: SubjectKind,
  ) -> Result<Option<RawSnapshot>> {
    match self.store.query_latest(subject_id, kind).await {
      Ok(snapshot) => Ok(snapshot),
      Err(e) if e.is_connection_lost() => Err(Error::Unrecoverable {
        operation: "query_latest",
        source:    Box::new(e),
      }),
      Err(e) => {
        tracing::error!(
          %kind,
          badge = subject_id,
          error = %e,
          "failed to fetch latest snapshot"
        );
        Ok(None)
      }
    }
  }
}
