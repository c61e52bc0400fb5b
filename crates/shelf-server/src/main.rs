//! Shelf server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), overlays
//! `SHELF_*` environment variables, opens the SQLite store and serves the
//! JSON API under `/api`.
//!
//! # Bootstrapping
//!
//! Every request needs the credentials of a known person, so the first staff
//! account is created from the command line:
//!
//! ```
//! cargo run -p shelf-server -- --create-staff admin
//! ```

mod settings;
mod notify;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use shelf_api::{AppState, FileStore, auth::hash_password};
use shelf_core::{
  classify::LoanPolicy,
  notify::Notifier,
  person::{NewPerson, Role},
  store::LibraryStore,
};
use shelf_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
  settings::{ServerConfig, expand_tilde},
  notify::{LogNotifier, WebhookNotifier},
};

#[derive(Parser)]
#[command(author, version, about = "Shelf library status server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Create a staff account with a password entered on stdin and exit.
  #[arg(long, value_name = "USERNAME")]
  create_staff: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    println!("{}", hash_password(&password)?);
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_policy(LoanPolicy::from_days(cfg.loan_period_days));

  if let Some(username) = cli.create_staff {
    let password = read_password()?;
    let person = store
      .add_person(NewPerson {
        username,
        role: Role::Staff,
        email: None,
        password_hash: Some(hash_password(&password)?),
      })
      .await
      .context("failed to create staff account")?;
    println!("created staff account {} (id {})", person.username, person.id);
    return Ok(());
  }

  let notifier: Arc<dyn Notifier> = match &cfg.notify_webhook {
    Some(url) => {
      tracing::info!(%url, "notifications go to webhook");
      Arc::new(WebhookNotifier::new(url.as_str()).context("failed to build webhook client")?)
    }
    None => Arc::new(LogNotifier),
  };

  let state = AppState {
    store: Arc::new(store),
    notifier,
    files: Arc::new(FileStore::new(
      expand_tilde(&cfg.upload_dir),
      expand_tilde(&cfg.static_dir),
      cfg.max_upload_bytes,
    )),
  };

  let app = Router::new()
    .nest("/api", shelf_api::api_router(state))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!(loan_days = cfg.loan_period_days, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_owned();
  anyhow::ensure!(!password.is_empty(), "password must not be empty");
  Ok(password)
}
