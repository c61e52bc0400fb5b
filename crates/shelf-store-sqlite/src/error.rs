//! Error type for `shelf-store-sqlite`.

use shelf_core::{Classify, ErrorClass};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] shelf_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value could not be mapped back onto a domain type.
  #[error("decode error: {0}")]
  Decode(String),

  /// A UNIQUE constraint rejected the insert.
  #[error("already exists: {0}")]
  Duplicate(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Core(e) => e.class(),
      Self::Duplicate(_) => ErrorClass::Conflict,
      Self::Database(_) | Self::DateParse(_) | Self::Decode(_) => {
        ErrorClass::Internal
      }
    }
  }
}
