//! Handlers for `/files` endpoints and the on-disk [`FileStore`].
//!
//! | Method   | Path               | Notes |
//! |----------|--------------------|-------|
//! | `POST`   | `/files`           | multipart, field `file`; returns 201 + `{"filename":"..."}` |
//! | `DELETE` | `/files/:filename` | staff only; removes from the static dir; 204 |

use std::{io, path::PathBuf};

use axum::{
  Json,
  extract::{Multipart, Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Serialize;
use shelf_core::store::LibraryStore;
use uuid::Uuid;

use crate::{AppState, auth::Actor, error::ApiError};

// ─── Store ────────────────────────────────────────────────────────────────────

/// Uploads land in `upload_dir` under a random name; removals target
/// `static_dir`, where published files are served from.
#[derive(Debug, Clone)]
pub struct FileStore {
  upload_dir: PathBuf,
  static_dir: PathBuf,
  max_bytes:  usize,
}

impl FileStore {
  pub fn new(upload_dir: PathBuf, static_dir: PathBuf, max_bytes: usize) -> Self {
    Self { upload_dir, static_dir, max_bytes }
  }

  pub fn max_bytes(&self) -> usize { self.max_bytes }

  /// Write `data` as `<uuid>.<ext>` and return the generated filename.
  pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<String, ApiError> {
    let filename = match extension(original_name) {
      Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
      None => Uuid::new_v4().to_string(),
    };

    tokio::fs::create_dir_all(&self.upload_dir)
      .await
      .map_err(io_error)?;
    tokio::fs::write(self.upload_dir.join(&filename), data)
      .await
      .map_err(io_error)?;

    Ok(filename)
  }

  pub async fn remove(&self, filename: &str) -> Result<(), ApiError> {
    let filename = validate_filename(filename)?;
    match tokio::fs::remove_file(self.static_dir.join(filename)).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        Err(ApiError::NotFound(format!("file {filename} not found")))
      }
      Err(e) => Err(io_error(e)),
    }
  }
}

fn io_error(e: io::Error) -> ApiError { ApiError::Internal(Box::new(e)) }

/// Lowercased extension of `name`, if it is short and ASCII-alphanumeric.
fn extension(name: &str) -> Option<String> {
  let (stem, ext) = name.rsplit_once('.')?;
  let valid = !stem.is_empty()
    && !ext.is_empty()
    && ext.len() <= 10
    && ext.chars().all(|c| c.is_ascii_alphanumeric());
  valid.then(|| ext.to_ascii_lowercase())
}

/// Accept only a single plain path component.
pub fn validate_filename(name: &str) -> Result<&str, ApiError> {
  let ok = !name.is_empty()
    && !name.starts_with('.')
    && !name.contains(['/', '\\', '\0'])
    && name != "..";
  if ok {
    Ok(name)
  } else {
    Err(ApiError::BadRequest(format!("invalid filename {name:?}")))
  }
}

// ─── Upload ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Uploaded {
  pub filename: String,
}

/// `POST /files`: the first part named `file` is stored.
pub async fn upload<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(e.to_string()))?
  {
    if field.name() != Some("file") {
      continue;
    }
    let original = field.file_name().unwrap_or("upload").to_owned();
    let data = field
      .bytes()
      .await
      .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let filename = state.files.save(&original, &data).await?;
    tracing::info!(%filename, bytes = data.len(), uploader = %actor.username, "file uploaded");
    return Ok((StatusCode::CREATED, Json(Uploaded { filename })));
  }

  Err(ApiError::BadRequest("missing multipart field \"file\"".into()))
}

// ─── Remove ───────────────────────────────────────────────────────────────────

/// `DELETE /files/:filename`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(filename): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  actor.require_staff()?;
  state.files.remove(&filename).await?;
  tracing::info!(%filename, "file removed");
  Ok(StatusCode::NO_CONTENT)
}
