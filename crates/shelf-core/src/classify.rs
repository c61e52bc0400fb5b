//! The status classifier: latest record + current time → display state.

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer, ser::SerializeStruct};

use crate::status::{StatusEntry, StatusRecord, StatusTag, latest};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Loan rules shared by the classifier, the transition table and histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
  pub loan_period: Duration,
}

impl LoanPolicy {
  pub const DEFAULT_LOAN_DAYS: u32 = 14;
  /// Longest loan period a deployment may configure (about a century).
  pub const MAX_LOAN_DAYS: u32 = 36_500;

  pub fn from_days(days: u32) -> Self {
    Self { loan_period: Duration::days(i64::from(days)) }
  }

  /// Implied return date of a `Busy` or `Prolong` record. `None` for other
  /// tags, and for loans whose due date falls outside the representable range.
  pub fn due_at(&self, record: &StatusRecord) -> Option<DateTime<Utc>> {
    if !record.status.is_loan() {
      return None;
    }
    record.created_at.checked_add_signed(self.loan_period)
  }

  pub fn is_overdue(&self, record: &StatusRecord, now: DateTime<Utc>) -> bool {
    self.due_at(record).is_some_and(|due| now > due)
  }
}

impl Default for LoanPolicy {
  fn default() -> Self { Self::from_days(Self::DEFAULT_LOAN_DAYS) }
}

// ─── Current status ──────────────────────────────────────────────────────────

/// What a material looks like to a reader right now.
///
/// `Free` serialises as the bare string `"Free"`; every other variant as
/// `{"type": "<Variant>", "body": "<username>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentStatus {
  Free,
  Claimed { body: String },
  Overdue { body: String },
  /// Requested but not yet picked up. Not a claim and never overdue.
  Pending { body: String },
}

impl CurrentStatus {
  pub fn is_free(&self) -> bool { matches!(self, Self::Free) }

  /// Checked out, whether on time or not.
  pub fn is_claimed(&self) -> bool {
    matches!(self, Self::Claimed { .. } | Self::Overdue { .. })
  }

  pub fn is_overdue(&self) -> bool { matches!(self, Self::Overdue { .. }) }

  /// Lowercase name used by list filters (`?status=overdue`).
  pub fn filter_key(&self) -> &'static str {
    match self {
      Self::Free => "free",
      Self::Claimed { .. } => "claimed",
      Self::Overdue { .. } => "overdue",
      Self::Pending { .. } => "pending",
    }
  }
}

impl Serialize for CurrentStatus {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let (kind, body) = match self {
      Self::Free => return serializer.serialize_str("Free"),
      Self::Claimed { body } => ("Claimed", body),
      Self::Overdue { body } => ("Overdue", body),
      Self::Pending { body } => ("Pending", body),
    };
    let mut s = serializer.serialize_struct("CurrentStatus", 2)?;
    s.serialize_field("type", kind)?;
    s.serialize_field("body", body)?;
    s.end()
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Classify a material from all of its entries, in any order.
pub fn classify(
  entries: &[StatusEntry],
  now: DateTime<Utc>,
  policy: &LoanPolicy,
) -> CurrentStatus {
  classify_latest(latest(entries), now, policy)
}

/// Classify a material from its most recent entry alone.
pub fn classify_latest(
  entry: Option<&StatusEntry>,
  now: DateTime<Utc>,
  policy: &LoanPolicy,
) -> CurrentStatus {
  let Some(entry) = entry else {
    return CurrentStatus::Free;
  };

  match entry.record.status {
    StatusTag::Free | StatusTag::Rejected => CurrentStatus::Free,
    StatusTag::Pending => CurrentStatus::Pending { body: entry.display_name() },
    StatusTag::Busy | StatusTag::Prolong | StatusTag::Overdue => {
      let body = entry.display_name();
      // A stored `Overdue` cannot exist; treat it like any other loan.
      let overdue = entry.record.status == StatusTag::Overdue
        || policy.is_overdue(&entry.record, now);
      if overdue {
        CurrentStatus::Overdue { body }
      } else {
        CurrentStatus::Claimed { body }
      }
    }
  }
}
