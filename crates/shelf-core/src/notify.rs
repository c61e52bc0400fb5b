//! The outbound notification seam.
//!
//! Status changes are announced to the affected person through a
//! [`Notifier`]. Delivery is best-effort: implementations must not block the
//! caller and report failures through their own logging.

/// Dispatches a templated message to a person.
pub trait Notifier: Send + Sync {
  fn notify(&self, person_id: i64, template: &str, payload: serde_json::Value);
}

