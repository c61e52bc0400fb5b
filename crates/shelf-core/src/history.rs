//! Claim histories for a material or a person.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  classify::LoanPolicy,
  status::{StatusEntry, StatusTag},
};

/// One history line: the record plus its return deadline, if it was a loan.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
  #[serde(flatten)]
  pub entry:  StatusEntry,
  pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct History {
  /// Number of `Busy` records, i.e. how many times the item was claimed.
  pub claimed_count: usize,
  /// Most recent first.
  pub entries:       Vec<HistoryEntry>,
}

/// Count of `Busy` records in `entries`.
pub fn claimed_count(entries: &[StatusEntry]) -> usize {
  entries
    .iter()
    .filter(|e| e.record.status == StatusTag::Busy)
    .count()
}

impl History {
  pub fn from_entries(mut entries: Vec<StatusEntry>, policy: &LoanPolicy) -> Self {
    let claimed_count = claimed_count(&entries);
    entries.sort_by_key(|e| std::cmp::Reverse(e.record.order_key()));

    let entries = entries
      .into_iter()
      .map(|entry| HistoryEntry {
        due_at: policy.due_at(&entry.record),
        entry,
      })
      .collect();

    Self { claimed_count, entries }
  }

  /// Keep only entries whose username contains `query`, ignoring case.
  ///
  /// `claimed_count` still describes the whole history.
  pub fn filter_username(mut self, query: &str) -> Self {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
      return self;
    }
    self.entries.retain(|e| {
      e.entry
        .person
        .as_ref()
        .is_some_and(|p| p.username.to_lowercase().contains(&needle))
    });
    self
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::{
    person::{Person, Role},
    status::StatusRecord,
  };

  fn entry(id: i64, status: StatusTag, username: &str) -> StatusEntry {
    StatusEntry {
      record: StatusRecord {
        id,
        material_id: Some(1),
        person_id: Some(id),
        status,
        created_at: Utc.timestamp_opt(1_700_000_000 + id * 60, 0).unwrap(),
      },
      person: Some(Person {
        id,
        username: username.into(),
        role: Role::Reader,
        email: None,
      }),
    }
  }

  #[test]
  fn empty_history() {
    let h = History::from_entries(vec![], &LoanPolicy::default());
    assert_eq!(h.claimed_count, 0);
    assert!(h.entries.is_empty());
  }

  #[test]
  fn counts_busy_records() {
    use StatusTag::*;
    let entries = [Busy, Free, Busy, Free, Busy]
      .into_iter()
      .enumerate()
      .map(|(i, tag)| entry(i as i64 + 1, tag, "alice"))
      .collect();
    let h = History::from_entries(entries, &LoanPolicy::default());
    assert_eq!(h.claimed_count, 3);
    assert_eq!(h.entries.len(), 5);
  }

  #[test]
  fn most_recent_first_with_due_dates() {
    let entries = vec![
      entry(1, StatusTag::Busy, "alice"),
      entry(3, StatusTag::Prolong, "alice"),
      entry(2, StatusTag::Pending, "alice"),
    ];
    let h = History::from_entries(entries, &LoanPolicy::from_days(7));
    let ids: Vec<i64> = h.entries.iter().map(|e| e.entry.record.id).collect();
    assert_eq!(ids, [3, 2, 1]);

    let prolong = &h.entries[0];
    assert_eq!(
      prolong.due_at,
      Some(prolong.entry.record.created_at + Duration::days(7))
    );
    assert_eq!(h.entries[1].due_at, None);
  }

  #[test]
  fn username_filter_is_case_insensitive() {
    let entries = vec![
      entry(1, StatusTag::Busy, "Alice"),
      entry(2, StatusTag::Free, "bob"),
      entry(3, StatusTag::Busy, "malice"),
    ];
    let h = History::from_entries(entries, &LoanPolicy::default()).filter_username("ALI");
    assert_eq!(h.entries.len(), 2);
    assert_eq!(h.claimed_count, 2);
  }
}
