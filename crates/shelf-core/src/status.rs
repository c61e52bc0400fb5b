//! Status records: the append-only log behind every material.
//!
//! A record is written once and never updated. The current state of a
//! material is whatever its latest record says, ordered by `created_at` with
//! the record id as tie-break.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, person::Person};

// ─── Tag ─────────────────────────────────────────────────────────────────────

/// The lifecycle tag carried by a status record.
///
/// Serialised with the variant names as-is (`"Busy"`, `"Free"`, …), which is
/// also the representation stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusTag {
  Free,
  /// Checked out.
  Busy,
  /// A renewal of an existing claim.
  Prolong,
  /// Derived from `Busy`/`Prolong` past its due date. Never stored.
  Overdue,
  /// Requested, waiting for pickup or moderation.
  Pending,
  Rejected,
}

impl StatusTag {
  pub const STORED: [StatusTag; 5] = [
    Self::Free,
    Self::Busy,
    Self::Prolong,
    Self::Pending,
    Self::Rejected,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Free => "Free",
      Self::Busy => "Busy",
      Self::Prolong => "Prolong",
      Self::Overdue => "Overdue",
      Self::Pending => "Pending",
      Self::Rejected => "Rejected",
    }
  }

  /// Whether records with this tag may be written to the store.
  pub fn is_stored(self) -> bool { !matches!(self, Self::Overdue) }

  /// `Busy` or `Prolong`: the material is physically out and has a due date.
  pub fn is_loan(self) -> bool { matches!(self, Self::Busy | Self::Prolong) }

  /// Any tag that reserves the material for one person.
  pub fn is_hold(self) -> bool { self.is_loan() || matches!(self, Self::Pending) }
}

impl fmt::Display for StatusTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for StatusTag {
  type Err = Error;

  /// Case-insensitive; `Overdue` parses so callers get a precise error later.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    [Self::Overdue]
      .into_iter()
      .chain(Self::STORED)
      .find(|tag| tag.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| Error::UnknownTag(s.to_owned()))
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One immutable row of the status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
  pub id:          i64,
  pub material_id: Option<i64>,
  pub person_id:   Option<i64>,
  pub status:      StatusTag,
  /// Server-assigned; never changes after creation.
  pub created_at:  DateTime<Utc>,
}

impl StatusRecord {
  /// Total order used to pick the latest record.
  pub fn order_key(&self) -> (DateTime<Utc>, i64) { (self.created_at, self.id) }
}

/// A record bundled with the person it refers to, as read back from a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
  #[serde(flatten)]
  pub record: StatusRecord,
  pub person: Option<Person>,
}

impl StatusEntry {
  /// Name to show for the person behind this record.
  pub fn display_name(&self) -> String {
    match (&self.person, self.record.person_id) {
      (Some(p), _) => p.username.clone(),
      (None, Some(id)) => format!("#{id}"),
      (None, None) => "unknown".to_owned(),
    }
  }
}

/// The most recent entry; equal timestamps resolve to the highest id.
pub fn latest(entries: &[StatusEntry]) -> Option<&StatusEntry> {
  entries.iter().max_by_key(|e| e.record.order_key())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn entry(id: i64, secs: i64, status: StatusTag) -> StatusEntry {
    StatusEntry {
      record: StatusRecord {
        id,
        material_id: Some(1),
        person_id: Some(7),
        status,
        created_at: Utc.timestamp_opt(secs, 0).unwrap(),
      },
      person: None,
    }
  }

  #[test]
  fn parse_is_case_insensitive() {
    assert_eq!("busy".parse::<StatusTag>().unwrap(), StatusTag::Busy);
    assert_eq!(" Prolong ".parse::<StatusTag>().unwrap(), StatusTag::Prolong);
    assert_eq!("OVERDUE".parse::<StatusTag>().unwrap(), StatusTag::Overdue);
    assert!(matches!(
      "lost".parse::<StatusTag>(),
      Err(Error::UnknownTag(s)) if s == "lost"
    ));
  }

  #[test]
  fn serde_uses_variant_names() {
    let json = serde_json::to_string(&StatusTag::Rejected).unwrap();
    assert_eq!(json, "\"Rejected\"");
  }

  #[test]
  fn latest_prefers_newer_timestamp() {
    let entries = vec![entry(5, 200, StatusTag::Busy), entry(9, 100, StatusTag::Free)];
    assert_eq!(latest(&entries).unwrap().record.id, 5);
  }

  #[test]
  fn latest_breaks_ties_by_highest_id() {
    let entries = vec![
      entry(3, 100, StatusTag::Busy),
      entry(4, 100, StatusTag::Free),
      entry(2, 100, StatusTag::Pending),
    ];
    assert_eq!(latest(&entries).unwrap().record.status, StatusTag::Free);
  }

  #[test]
  fn display_name_falls_back_to_id() {
    assert_eq!(entry(1, 0, StatusTag::Busy).display_name(), "#7");
  }
}
