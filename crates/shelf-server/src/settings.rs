//! Runtime configuration, layered from `config.toml` and `SHELF_*`
//! environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use shelf_core::classify::LoanPolicy;

/// Deserialised server settings. Every field has a default so an empty
/// configuration starts a working local server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  #[serde(default = "default_store_path")]
  pub store_path:       PathBuf,
  /// Days a claim or renewal lasts before the loan counts as overdue.
  #[serde(default = "default_loan_period_days")]
  pub loan_period_days: u32,
  #[serde(default = "default_upload_dir")]
  pub upload_dir:       PathBuf,
  #[serde(default = "default_static_dir")]
  pub static_dir:       PathBuf,
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes: usize,
  /// When set, notifications are POSTed here as JSON instead of logged.
  #[serde(default)]
  pub notify_webhook:   Option<String>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/shelf/shelf.db") }
fn default_loan_period_days() -> u32 { LoanPolicy::DEFAULT_LOAN_DAYS }
fn default_upload_dir() -> PathBuf { PathBuf::from("uploads") }
fn default_static_dir() -> PathBuf { PathBuf::from("static") }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }

impl ServerConfig {
  /// Read `path` (optional) and overlay `SHELF_*` environment variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    let cfg: Self = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SHELF"))
      .build()?
      .try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> Result<(), config::ConfigError> {
    if !(1..=LoanPolicy::MAX_LOAN_DAYS).contains(&self.loan_period_days) {
      return Err(config::ConfigError::Message(format!(
        "loan_period_days must be between 1 and {}, got {}",
        LoanPolicy::MAX_LOAN_DAYS,
        self.loan_period_days
      )));
    }
    Ok(())
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
