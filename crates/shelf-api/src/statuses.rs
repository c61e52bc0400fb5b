//! Handler for `POST /statuses`: the only way a status record is created.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use shelf_core::{
  status::{StatusRecord, StatusTag},
  store::LibraryStore,
  transition::{Action, TransitionRequest},
};

use crate::{AppState, auth::Actor, error::ApiError};

/// JSON body accepted by `POST /statuses`.
#[derive(Debug, Deserialize)]
pub struct CreateStatusInput {
  pub material_id: Option<i64>,
  pub person_id:   Option<i64>,
  pub status:      String,
}

impl TryFrom<CreateStatusInput> for TransitionRequest {
  type Error = shelf_core::Error;

  fn try_from(input: CreateStatusInput) -> Result<Self, Self::Error> {
    let status: StatusTag = input.status.parse()?;
    let material_id = input.material_id.ok_or(shelf_core::Error::MissingMaterial)?;
    Ok(TransitionRequest { material_id, person_id: input.person_id, status })
  }
}

/// `POST /statuses`: returns 201 + the appended [`StatusRecord`].
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Json(body): Json<CreateStatusInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LibraryStore + Clone + 'static,
{
  let request = TransitionRequest::try_from(body)?;
  let username = actor.username.clone();

  let record = state
    .store
    .create_status(request, actor)
    .await
    .map_err(ApiError::from_store)?;

  tracing::info!(
    status_id = record.id,
    material_id = ?record.material_id,
    person_id = ?record.person_id,
    status = %record.status,
    actor = %username,
    "status created"
  );

  notify(&state, &record).await;
  Ok((StatusCode::CREATED, Json(record)))
}

/// Announce `record` to its person. Failures here never fail the request.
async fn notify<S>(state: &AppState<S>, record: &StatusRecord)
where
  S: LibraryStore + Clone + 'static,
{
  let (Some(person_id), Ok(action)) = (record.person_id, Action::for_tag(record.status))
  else {
    return;
  };

  let title = match record.material_id {
    Some(id) => match state.store.get_material(id).await {
      Ok(m) => m.map(|m| m.title),
      Err(e) => {
        tracing::warn!(error = %e, material_id = id, "could not load material for notification");
        None
      }
    },
    None => None,
  };

  let payload = json!({
    "status_id":   record.id,
    "material_id": record.material_id,
    "title":       title,
    "status":      record.status,
    "created_at":  record.created_at,
    "due_at":      state.store.policy().due_at(record),
  });
  state.notifier.notify(person_id, action.template(), payload);
}
