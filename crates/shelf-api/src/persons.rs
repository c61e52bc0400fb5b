//! Handlers for `/persons` endpoints.
//!
//! | Method | Path           | Notes |
//! |--------|----------------|-------|
//! | `GET`  | `/persons`     | all persons, by username |
//! | `POST` | `/persons`     | staff only; body: [`NewPersonBody`]; returns 201 |
//! | `GET`  | `/persons/:id` | [`PersonView`]: the person and their history |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use shelf_core::{
  history::History,
  person::{NewPerson, Person, Role},
  store::LibraryStore,
};

use crate::{
  AppState,
  auth::{Actor, hash_password},
  error::ApiError,
};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /persons`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _actor: Actor,
) -> Result<Json<Vec<Person>>, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  let persons = state
    .store
    .list_persons()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(persons))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PersonView {
  #[serde(flatten)]
  pub person:  Person,
  pub history: History,
}

/// `GET /persons/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _actor: Actor,
  Path(id): Path<i64>,
) -> Result<Json<PersonView>, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  let person = state
    .store
    .get_person(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(shelf_core::Error::PersonNotFound(id))?;

  let entries = state
    .store
    .statuses_for_person(id)
    .await
    .map_err(ApiError::from_store)?;

  Ok(Json(PersonView {
    person,
    history: History::from_entries(entries, &state.store.policy()),
  }))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /persons`.
#[derive(Debug, Deserialize)]
pub struct NewPersonBody {
  pub username: String,
  #[serde(default)]
  pub role:     Role,
  pub email:    Option<String>,
  /// Without a password the person exists but cannot log in.
  pub password: Option<String>,
}

/// `POST /persons`: returns 201 + the stored [`Person`].
pub async fn create<S>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Json(body): Json<NewPersonBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  actor.require_staff()?;

  let username = body.username.trim().to_owned();
  if username.is_empty() || username.contains(':') {
    return Err(ApiError::BadRequest(format!("invalid username {username:?}")));
  }

  let password_hash = body.password.as_deref().map(hash_password).transpose()?;
  let person = state
    .store
    .add_person(NewPerson {
      username,
      role: body.role,
      email: body.email,
      password_hash,
    })
    .await
    .map_err(ApiError::from_store)?;

  tracing::info!(person_id = person.id, username = %person.username, role = ?person.role, "person added");
  Ok((StatusCode::CREATED, Json(person)))
}
