//! Subject kinds — employees and visitors.
//!
//! Both kinds share one reconciliation path. Everything that differs between
//! them (log discriminant, registry table, affiliation column) is data on the
//! variant rather than a separate code path.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Status written to every entry touched by a sync run.
pub const ACTIVE_STATUS: &str = "active";

/// The kind of badge holder a log row or registry entry belongs to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
  Employee,
  Visitor,
}

impl SubjectKind {
  /// Every kind, in the order a full run processes them.
  pub const ALL: [SubjectKind; 2] = [SubjectKind::Employee, SubjectKind::Visitor];

  /// The `person_type` value stored in `access_logs`.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Employee => "employee",
      Self::Visitor => "visitor",
    }
  }

  /// The registry table holding entries of this kind.
  pub fn registry_table(self) -> &'static str {
    match self {
      Self::Employee => "employees",
      Self::Visitor => "visitors",
    }
  }

  /// The registry column the raw group name is normalised into.
  pub fn affiliation_column(self) -> &'static str {
    match self {
      Self::Employee => "department",
      Self::Visitor => "company",
    }
  }

  /// Whether registry entries of this kind carry a `position` column.
  pub fn has_position(self) -> bool { matches!(self, Self::Employee) }
}

impl fmt::Display for SubjectKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SubjectKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "employee" => Ok(Self::Employee),
      "visitor" => Ok(Self::Visitor),
      _ => Err(Error::UnknownSubjectKind(s.to_owned())),
    }
  }
}
