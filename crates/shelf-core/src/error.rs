//! Error types for `shelf-core`.

use thiserror::Error;

use crate::status::StatusTag;

#[derive(Debug, Error)]
pub enum Error {
  #[error("material not found: {0}")]
  MaterialNotFound(i64),

  #[error("person not found: {0}")]
  PersonNotFound(i64),

  #[error("material_id is required")]
  MissingMaterial,

  #[error("unknown status tag: {0:?}")]
  UnknownTag(String),

  #[error("{0} is derived and cannot be recorded")]
  DerivedTag(StatusTag),

  #[error("cannot move a material from {from} to {to}")]
  IllegalTransition { from: StatusTag, to: StatusTag },

  #[error("material {material_id} is held by person {holder}")]
  NotHolder { material_id: i64, holder: i64 },

  #[error("material {0} is overdue and cannot be prolonged")]
  OverdueRenewal(i64),

  #[error("{0}")]
  Forbidden(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse category of a failure, used by transport layers to pick a status
/// code without knowing every backend's error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  NotFound,
  Invalid,
  Forbidden,
  Conflict,
  Internal,
}

/// Implemented by every error type a [`LibraryStore`](crate::store::LibraryStore)
/// can return.
pub trait Classify {
  fn class(&self) -> ErrorClass;
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::MaterialNotFound(_) | Self::PersonNotFound(_) => ErrorClass::NotFound,
      Self::MissingMaterial | Self::UnknownTag(_) | Self::DerivedTag(_) => {
        ErrorClass::Invalid
      }
      Self::IllegalTransition { .. }
      | Self::NotHolder { .. }
      | Self::OverdueRenewal(_) => ErrorClass::Conflict,
      Self::Forbidden(_) => ErrorClass::Forbidden,
    }
  }
}

