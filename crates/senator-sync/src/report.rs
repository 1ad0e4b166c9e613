//! Per-run outcome counters.

use std::collections::BTreeMap;

use senator_core::subject::SubjectKind;

/// What happened to the candidates of one subject kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindReport {
  pub candidates:     usize,
  pub inserted:       usize,
  pub updated:        usize,
  /// Candidates whose registry write failed; their events stay unprocessed.
  pub write_failures: usize,
  /// Candidates written to the registry whose events could not be marked.
  pub mark_failures:  usize,
  pub events_marked:  u64,
}

impl KindReport {
  pub fn failures(&self) -> usize { self.write_failures + self.mark_failures }
}

/// The outcome of one sync run, keyed by kind in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  kinds: BTreeMap<SubjectKind, KindReport>,
}

impl SyncReport {
  /// Counters for `kind`; all zero if the run did not cover it.
  pub fn kind(&self, kind: SubjectKind) -> KindReport {
    self.kinds.get(&kind).copied().unwrap_or_default()
  }

  pub(crate) fn kind_mut(&mut self, kind: SubjectKind) -> &mut KindReport {
    self.kinds.entry(kind).or_default()
  }

  pub fn candidates(&self) -> usize { self.kinds.values().map(|k| k.candidates).sum() }

  pub fn failures(&self) -> usize { self.kinds.values().map(KindReport::failures).sum() }

  pub fn iter(&self) -> impl Iterator<Item = (SubjectKind, &KindReport)> {
    self.kinds.iter().map(|(kind, report)| (*kind, report))
  }
}
