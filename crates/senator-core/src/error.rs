//! Error types for `senator-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown subject kind: {0:?}")]
  UnknownSubjectKind(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
