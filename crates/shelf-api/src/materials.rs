//! Handlers for `/materials` and `/categories` endpoints.
//!
//! | Method  | Path                       | Notes |
//! |---------|----------------------------|-------|
//! | `GET`   | `/materials`               | optional `category`, `text`, `status`, `limit`, `offset` |
//! | `POST`  | `/materials`               | staff only; body: [`NewMaterialBody`]; returns 201 |
//! | `GET`   | `/materials/:id`           | [`MaterialView`] with derived status |
//! | `PATCH` | `/materials/:id`           | staff only; body: [`PatchMaterialBody`] |
//! | `GET`   | `/materials/:id/statuses`  | [`History`]; optional `username` filter |
//! | `GET`   | `/categories`              | category names with material counts |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shelf_core::{
  classify::{CurrentStatus, LoanPolicy, classify_latest},
  history::{History, claimed_count},
  material::{
    CategoryCount, Material, MaterialPatch, MaterialSummary, MaterialView, NewMaterial,
  },
  status::latest,
  store::{LibraryStore, MaterialQuery},
};

use crate::{AppState, auth::Actor, error::ApiError};

/// Derive the read model for a material from its latest entry.
fn view(summary: MaterialSummary, now: DateTime<Utc>, policy: &LoanPolicy) -> MaterialView {
  let current_status = classify_latest(summary.latest.as_ref(), now, policy);
  let due_at = if current_status.is_claimed() {
    summary.latest.as_ref().and_then(|e| policy.due_at(&e.record))
  } else {
    None
  };

  MaterialView {
    material: summary.material,
    current_status,
    due_at,
    claimed_count: summary.claimed_count,
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// Values accepted by the `status` list filter.
const STATUS_FILTERS: [&str; 4] = ["free", "claimed", "overdue", "pending"];

/// `claimed` also matches overdue loans: both are out with a reader.
fn matches_status(filter: &str, status: &CurrentStatus) -> bool {
  match filter {
    "claimed" => status.is_claimed(),
    other => status.filter_key() == other,
  }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub category: Option<String>,
  /// Substring of the title or identifier.
  pub text:     Option<String>,
  /// One of `free`, `claimed`, `overdue`, `pending`.
  pub status:   Option<String>,
  pub limit:    Option<usize>,
  pub offset:   Option<usize>,
}

/// `GET /materials[?category=...][&text=...][&status=...][&limit=N][&offset=N]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _actor: Actor,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<MaterialView>>, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  let status = params.status.map(|s| s.to_lowercase());
  if let Some(s) = &status
    && !STATUS_FILTERS.contains(&s.as_str())
  {
    return Err(ApiError::BadRequest(format!("unknown status filter {s:?}")));
  }

  // Status is derived, so with a status filter pagination happens after
  // classification.
  let query = MaterialQuery {
    category: params.category,
    text:     params.text,
    limit:    if status.is_some() { None } else { params.limit },
    offset:   if status.is_some() { None } else { params.offset },
  };

  let summaries = state
    .store
    .list_materials(&query)
    .await
    .map_err(ApiError::from_store)?;

  let (now, policy) = (Utc::now(), state.store.policy());
  let mut views: Vec<MaterialView> = summaries
    .into_iter()
    .map(|summary| view(summary, now, &policy))
    .collect();

  if let Some(s) = &status {
    views = views
      .into_iter()
      .filter(|v| matches_status(s, &v.current_status))
      .skip(params.offset.unwrap_or(0))
      .take(params.limit.unwrap_or(usize::MAX))
      .collect();
  }

  Ok(Json(views))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /materials/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _actor: Actor,
  Path(id): Path<i64>,
) -> Result<Json<MaterialView>, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  let material = state
    .store
    .get_material(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(shelf_core::Error::MaterialNotFound(id))?;

  let entries = state
    .store
    .statuses_for_material(id)
    .await
    .map_err(ApiError::from_store)?;

  let summary = MaterialSummary {
    material,
    claimed_count: claimed_count(&entries),
    latest: latest(&entries).cloned(),
  };
  Ok(Json(view(summary, Utc::now(), &state.store.policy())))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /materials`.
#[derive(Debug, Deserialize)]
pub struct NewMaterialBody {
  pub identifier: String,
  pub id_type:    String,
  #[serde(rename = "type")]
  pub kind:       String,
  pub title:      String,
  pub category:   Option<String>,
}

impl From<NewMaterialBody> for NewMaterial {
  fn from(b: NewMaterialBody) -> Self {
    NewMaterial {
      identifier: b.identifier,
      id_type:    b.id_type,
      kind:       b.kind,
      title:      b.title,
      category:   b.category,
    }
  }
}

/// `POST /materials`: returns 201 + the stored [`Material`].
pub async fn create<S>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Json(body): Json<NewMaterialBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  actor.require_staff()?;
  if body.identifier.trim().is_empty() || body.title.trim().is_empty() {
    return Err(ApiError::BadRequest("identifier and title are required".into()));
  }

  let material = state
    .store
    .add_material(body.into())
    .await
    .map_err(ApiError::from_store)?;

  tracing::info!(material_id = material.id, identifier = %material.identifier, "material added");
  Ok((StatusCode::CREATED, Json(material)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `PATCH /materials/:id`. Identity fields are absent
/// on purpose: they never change.
#[derive(Debug, Deserialize)]
pub struct PatchMaterialBody {
  #[serde(rename = "type")]
  pub kind:     Option<String>,
  pub title:    Option<String>,
  pub category: Option<String>,
}

/// `PATCH /materials/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<i64>,
  Json(body): Json<PatchMaterialBody>,
) -> Result<Json<Material>, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  actor.require_staff()?;
  let patch = MaterialPatch {
    kind:     body.kind,
    title:    body.title,
    category: body.category,
  };
  if patch.is_empty() {
    return Err(ApiError::BadRequest("patch has no fields".into()));
  }

  let material = state
    .store
    .update_material(id, patch)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(shelf_core::Error::MaterialNotFound(id))?;
  Ok(Json(material))
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  /// Case-insensitive substring of the person's username.
  pub username: Option<String>,
}

/// `GET /materials/:id/statuses[?username=...]`
pub async fn history<S>(
  State(state): State<AppState<S>>,
  _actor: Actor,
  Path(id): Path<i64>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<History>, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  state
    .store
    .get_material(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(shelf_core::Error::MaterialNotFound(id))?;

  let entries = state
    .store
    .statuses_for_material(id)
    .await
    .map_err(ApiError::from_store)?;

  let mut history = History::from_entries(entries, &state.store.policy());
  if let Some(q) = &params.username {
    history = history.filter_username(q);
  }
  Ok(Json(history))
}

// ─── Categories ───────────────────────────────────────────────────────────────

/// `GET /categories`
pub async fn categories<S>(
  State(state): State<AppState<S>>,
  _actor: Actor,
) -> Result<Json<Vec<CategoryCount>>, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  let categories = state
    .store
    .categories()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(categories))
}
