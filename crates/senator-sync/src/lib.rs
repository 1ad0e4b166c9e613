//! Incremental reconciliation of access-control logs into the employee and
//! visitor registries.
//!
//! A run reads every unprocessed `access_logs` row through an
//! [`AccessStore`], folds the rows into one candidate per subject, upserts a
//! normalised registry entry for each candidate and then marks the subject's
//! rows processed. Re-running with no new rows is a no-op.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod report;

pub use error::{Error, Result};

use senator_core::{store::AccessStore, subject::SubjectKind};

use reconcile::Reconciler;
use report::SyncReport;

/// Run one reconciliation pass over `kinds` against `store`.
pub async fn run<S: AccessStore>(store: &S, kinds: &[SubjectKind]) -> Result<SyncReport> {
  Reconciler::new(store).run(kinds).await
}
