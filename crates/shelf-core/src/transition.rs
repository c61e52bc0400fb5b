//! The status state machine.
//!
//! A caller asks for a tag; the tag names an [`Action`]. The pair
//! `(current tag, action)` is looked up in [`next`], and the permission rules
//! in [`plan`] decide who may perform it and whose record it becomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  classify::LoanPolicy,
  person::Person,
  status::{StatusRecord, StatusTag},
};

// ─── Actions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  /// Check out, either directly or by picking up a pending request.
  Claim,
  /// Reserve a free material.
  Request,
  /// Renew an active loan.
  Prolong,
  /// Hand back a loan or cancel a request.
  Return,
  /// Turn down a pending request.
  Reject,
}

impl Action {
  /// The action implied by a requested tag.
  pub fn for_tag(tag: StatusTag) -> Result<Self> {
    match tag {
      StatusTag::Busy => Ok(Self::Claim),
      StatusTag::Pending => Ok(Self::Request),
      StatusTag::Prolong => Ok(Self::Prolong),
      StatusTag::Free => Ok(Self::Return),
      StatusTag::Rejected => Ok(Self::Reject),
      StatusTag::Overdue => Err(Error::DerivedTag(tag)),
    }
  }

  pub fn target(self) -> StatusTag {
    match self {
      Self::Claim => StatusTag::Busy,
      Self::Request => StatusTag::Pending,
      Self::Prolong => StatusTag::Prolong,
      Self::Return => StatusTag::Free,
      Self::Reject => StatusTag::Rejected,
    }
  }

  /// Notification template sent to the subject person.
  pub fn template(self) -> &'static str {
    match self {
      Self::Claim => "status.claimed",
      Self::Request => "status.pending",
      Self::Prolong => "status.prolonged",
      Self::Return => "status.returned",
      Self::Reject => "status.rejected",
    }
  }
}

/// Transition table. `None` means the pair is illegal.
pub fn next(from: StatusTag, action: Action) -> Option<StatusTag> {
  use StatusTag as T;

  match (from, action) {
    (T::Free | T::Rejected, Action::Claim) => Some(T::Busy),
    (T::Free | T::Rejected, Action::Request) => Some(T::Pending),
    (T::Pending, Action::Claim) => Some(T::Busy),
    (T::Pending, Action::Return) => Some(T::Free),
    (T::Pending, Action::Reject) => Some(T::Rejected),
    (T::Busy | T::Prolong, Action::Prolong) => Some(T::Prolong),
    (T::Busy | T::Prolong, Action::Return) => Some(T::Free),
    _ => None,
  }
}

// ─── Planning ────────────────────────────────────────────────────────────────

/// A requested status change for one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
  pub material_id: i64,
  /// Whose record this is. Staff acting on an existing hold default to the
  /// holder; everyone else defaults to themselves.
  pub person_id:   Option<i64>,
  pub status:      StatusTag,
}

/// An approved transition, ready to be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
  pub action:    Action,
  pub from:      StatusTag,
  pub to:        StatusTag,
  pub person_id: i64,
}

/// Validate `request` against the material's latest record.
///
/// `current` must be the latest stored record for the material, or `None`
/// if it has never had one.
pub fn plan(
  current: Option<&StatusRecord>,
  request: &TransitionRequest,
  actor: &Person,
  now: DateTime<Utc>,
  policy: &LoanPolicy,
) -> Result<Transition> {
  let action = Action::for_tag(request.status)?;
  let from = current.map_or(StatusTag::Free, |r| r.status);
  let to = next(from, action).ok_or(Error::IllegalTransition {
    from,
    to: action.target(),
  })?;

  let holder = current
    .filter(|r| r.status.is_hold())
    .and_then(|r| r.person_id);
  let continues_hold = from.is_hold();

  let person_id = match request.person_id {
    Some(id) => id,
    None if continues_hold && actor.is_staff() => holder.unwrap_or(actor.id),
    None => actor.id,
  };

  if action == Action::Reject && !actor.is_staff() {
    return Err(Error::Forbidden("only staff may reject a request".into()));
  }
  if !actor.is_staff() && person_id != actor.id {
    return Err(Error::Forbidden(format!(
      "{} may not act for person {person_id}",
      actor.username
    )));
  }
  if continues_hold
    && let Some(holder) = holder
    && holder != person_id
  {
    return Err(Error::NotHolder { material_id: request.material_id, holder });
  }
  if action == Action::Prolong
    && current.is_some_and(|r| policy.is_overdue(r, now))
  {
    return Err(Error::OverdueRenewal(request.material_id));
  }

  Ok(Transition { action, from, to, person_id })
}
