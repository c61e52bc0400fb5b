//! JSON REST API for Shelf.
//!
//! Exposes an axum [`Router`] backed by any [`LibraryStore`]. Every route
//! requires HTTP Basic credentials of a known person; TLS is the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", shelf_api::api_router(state))
//! ```

pub mod auth;
pub mod error;
pub mod files;
pub mod materials;
pub mod persons;
pub mod statuses;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{delete, get, post},
};
use shelf_core::{notify::Notifier, store::LibraryStore};

pub use error::ApiError;
pub use files::FileStore;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
///
/// The loan policy is read from the store so classification and renewal
/// checks always agree.
pub struct AppState<S: LibraryStore> {
  pub store:    Arc<S>,
  pub notifier: Arc<dyn Notifier>,
  pub files:    Arc<FileStore>,
}

impl<S: LibraryStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      notifier: Arc::clone(&self.notifier),
      files:    Arc::clone(&self.files),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: LibraryStore + Clone + 'static,
{
  let upload_limit = state.files.max_bytes();

  Router::new()
    // Materials
    .route("/materials", get(materials::list::<S>).post(materials::create::<S>))
    .route(
      "/materials/{id}",
      get(materials::get_one::<S>).patch(materials::update::<S>),
    )
    .route("/materials/{id}/statuses", get(materials::history::<S>))
    .route("/categories", get(materials::categories::<S>))
    // Persons
    .route("/persons", get(persons::list::<S>).post(persons::create::<S>))
    .route("/persons/{id}", get(persons::get_one::<S>))
    // Statuses
    .route("/statuses", post(statuses::create::<S>))
    // Files
    .route(
      "/files",
      post(files::upload::<S>).layer(DefaultBodyLimit::max(upload_limit)),
    )
    .route("/files/{filename}", delete(files::remove::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
