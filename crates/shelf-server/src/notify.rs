//! Notification sinks for status changes.

use std::time::Duration;

use serde_json::{Value, json};
use shelf_core::notify::Notifier;

/// Writes each notification to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn notify(&self, person_id: i64, template: &str, payload: Value) {
    tracing::info!(person_id, template, %payload, "notification");
  }
}

/// POSTs each notification as JSON to a webhook, in the background.
///
/// Delivery is best effort: failures are logged and never retried.
pub struct WebhookNotifier {
  client: reqwest::Client,
  url:    String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> reqwest::Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()?;
    Ok(Self { client, url: url.into() })
  }
}

/// Body sent to the webhook.
fn envelope(person_id: i64, template: &str, payload: Value) -> Value {
  json!({
    "person_id": person_id,
    "template":  template,
    "payload":   payload,
  })
}

impl Notifier for WebhookNotifier {
  fn notify(&self, person_id: i64, template: &str, payload: Value) {
    let body = envelope(person_id, template, payload);
    let request = self.client.post(&self.url).json(&body);
    let template = template.to_owned();

    tokio::spawn(async move {
      match request.send().await.and_then(|r| r.error_for_status()) {
        Ok(_) => tracing::debug!(person_id, %template, "notification delivered"),
        Err(e) => tracing::warn!(person_id, %template, error = %e, "notification failed"),
      }
    });
  }
}
