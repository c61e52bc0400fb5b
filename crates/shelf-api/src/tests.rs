//! Router tests against an in-memory `SqliteStore`.

use std::{
  path::PathBuf,
  sync::{Arc, Mutex},
};

use axum::{
  body::Body,
  http::{Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde_json::{Value, json};
use shelf_core::{
  classify::LoanPolicy,
  notify::Notifier,
  person::{NewPerson, Person, Role},
  store::LibraryStore,
};
use shelf_store_sqlite::SqliteStore;
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, FileStore, api_router, auth::hash_password};

// ─── Fixtures ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingNotifier {
  sent: Mutex<Vec<(i64, String, Value)>>,
}

impl RecordingNotifier {
  fn sent(&self) -> Vec<(i64, String, Value)> { self.sent.lock().unwrap().clone() }
}

impl Notifier for RecordingNotifier {
  fn notify(&self, person_id: i64, template: &str, payload: Value) {
    self.sent.lock().unwrap().push((person_id, template.to_owned(), payload));
  }
}

struct Fixture {
  state:    AppState<SqliteStore>,
  notifier: Arc<RecordingNotifier>,
  dir:      PathBuf,
  admin:    Person,
  alice:    Person,
  bob:      Person,
}

const ADMIN: (&str, &str) = ("admin", "admin-pw");
const ALICE: (&str, &str) = ("alice", "alice-pw");
const BOB: (&str, &str) = ("bob", "bob-pw");

async fn add_person(store: &SqliteStore, (username, password): (&str, &str), role: Role) -> Person {
  store
    .add_person(NewPerson {
      username: username.into(),
      role,
      email: None,
      password_hash: Some(hash_password(password).unwrap()),
    })
    .await
    .unwrap()
}

async fn fixture() -> Fixture { fixture_with(LoanPolicy::default()).await }

async fn fixture_with(policy: LoanPolicy) -> Fixture {
  let store = SqliteStore::open_in_memory().await.unwrap().with_policy(policy);
  let admin = add_person(&store, ADMIN, Role::Staff).await;
  let alice = add_person(&store, ALICE, Role::Reader).await;
  let bob = add_person(&store, BOB, Role::Reader).await;

  let dir = std::env::temp_dir().join(format!("shelf-api-{}", Uuid::new_v4()));
  let notifier = Arc::new(RecordingNotifier::default());
  let state = AppState {
    store:    Arc::new(store),
    notifier: notifier.clone(),
    files:    Arc::new(FileStore::new(dir.join("uploads"), dir.join("static"), 1024 * 1024)),
  };

  Fixture { state, notifier, dir, admin, alice, bob }
}

fn basic((user, pass): (&str, &str)) -> String {
  format!("Basic {}", B64.encode(format!("{user}:{pass}")))
}

async fn send(
  fx: &Fixture,
  method: Method,
  uri: &str,
  who: Option<(&str, &str)>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(who) = who {
    builder = builder.header(header::AUTHORIZATION, basic(who));
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = api_router(fx.state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn add_material(fx: &Fixture, identifier: &str, title: &str, category: &str) -> i64 {
  let (status, body) = send(
    fx,
    Method::POST,
    "/materials",
    Some(ADMIN),
    Some(json!({
      "identifier": identifier,
      "id_type": "isbn",
      "type": "book",
      "title": title,
      "category": category,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["id"].as_i64().unwrap()
}

async fn set_status(
  fx: &Fixture,
  who: (&str, &str),
  material_id: i64,
  person_id: Option<i64>,
  tag: &str,
) -> (StatusCode, Value) {
  send(
    fx,
    Method::POST,
    "/statuses",
    Some(who),
    Some(json!({ "material_id": material_id, "person_id": person_id, "status": tag })),
  )
  .await
}

// ─── Authentication ───────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_are_401_with_challenge() {
  let fx = fixture().await;
  let req = Request::builder()
    .uri("/materials")
    .body(Body::empty())
    .unwrap();
  let resp = api_router(fx.state.clone()).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  let challenge = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
  assert!(challenge.to_str().unwrap().starts_with("Basic"));
}

#[tokio::test]
async fn wrong_password_is_401() {
  let fx = fixture().await;
  let (status, body) = send(&fx, Method::GET, "/persons", Some(("alice", "nope")), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "unauthorized");

  let (status, _) = send(&fx, Method::GET, "/persons", Some(("ghost", "x")), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Materials ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn readers_cannot_manage_materials() {
  let fx = fixture().await;
  let (status, _) = send(
    &fx,
    Method::POST,
    "/materials",
    Some(ALICE),
    Some(json!({ "identifier": "1", "id_type": "isbn", "type": "book", "title": "Dune" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let id = add_material(&fx, "1", "Dune", "sci-fi").await;
  let (status, _) = send(
    &fx,
    Method::PATCH,
    &format!("/materials/{id}"),
    Some(ALICE),
    Some(json!({ "title": "Dune Messiah" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn new_material_is_free() {
  let fx = fixture().await;
  let id = add_material(&fx, "978-0441013593", "Dune", "sci-fi").await;

  let (status, view) = send(&fx, Method::GET, &format!("/materials/{id}"), Some(ALICE), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(view["title"], "Dune");
  assert_eq!(view["type"], "book");
  assert_eq!(view["current_status"], "Free");
  assert_eq!(view["claimed_count"], 0);
  assert!(view["due_at"].is_null());
}

#[tokio::test]
async fn patch_updates_mutable_fields() {
  let fx = fixture().await;
  let id = add_material(&fx, "1", "Dune", "sci-fi").await;

  let (status, body) = send(
    &fx,
    Method::PATCH,
    &format!("/materials/{id}"),
    Some(ADMIN),
    Some(json!({ "title": "Dune (2nd ed.)", "category": "classics" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["title"], "Dune (2nd ed.)");
  assert_eq!(body["category"], "classics");
  assert_eq!(body["identifier"], "1");

  let (status, _) = send(
    &fx,
    Method::PATCH,
    &format!("/materials/{id}"),
    Some(ADMIN),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(
    &fx,
    Method::PATCH,
    "/materials/999",
    Some(ADMIN),
    Some(json!({ "title": "x" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_material_is_404() {
  let fx = fixture().await;
  let (status, body) = send(&fx, Method::GET, "/materials/42", Some(ALICE), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("42"));

  let (status, _) = send(&fx, Method::GET, "/materials/42/statuses", Some(ALICE), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_identifier_conflicts() {
  let fx = fixture().await;
  add_material(&fx, "1", "Dune", "sci-fi").await;
  let (status, _) = send(
    &fx,
    Method::POST,
    "/materials",
    Some(ADMIN),
    Some(json!({ "identifier": "1", "id_type": "isbn", "type": "book", "title": "Other" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_filters_by_derived_status() {
  let fx = fixture().await;
  let dune = add_material(&fx, "1", "Dune", "sci-fi").await;
  let emma = add_material(&fx, "2", "Emma", "classics").await;
  add_material(&fx, "3", "Ulysses", "classics").await;
  set_status(&fx, ALICE, dune, None, "Busy").await;
  set_status(&fx, BOB, emma, None, "Pending").await;

  let (status, claimed) = send(&fx, Method::GET, "/materials?status=claimed", Some(ALICE), None).await;
  assert_eq!(status, StatusCode::OK);
  let claimed = claimed.as_array().unwrap();
  assert_eq!(claimed.len(), 1);
  assert_eq!(claimed[0]["id"], dune);
  assert_eq!(claimed[0]["current_status"], json!({ "type": "Claimed", "body": "alice" }));

  let (_, pending) = send(&fx, Method::GET, "/materials?status=pending", Some(ALICE), None).await;
  assert_eq!(pending.as_array().unwrap().len(), 1);

  let (_, free) = send(&fx, Method::GET, "/materials?status=FREE&limit=1", Some(ALICE), None).await;
  assert_eq!(free.as_array().unwrap().len(), 1);
  assert_eq!(free[0]["title"], "Ulysses");

  let (status, _) = send(&fx, Method::GET, "/materials?status=lost", Some(ALICE), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_category_and_text() {
  let fx = fixture().await;
  add_material(&fx, "1", "Dune", "sci-fi").await;
  add_material(&fx, "2", "Emma", "classics").await;
  add_material(&fx, "3", "Dune Messiah", "sci-fi").await;

  let (_, all) = send(&fx, Method::GET, "/materials?category=sci-fi", Some(ALICE), None).await;
  assert_eq!(all.as_array().unwrap().len(), 2);

  let (_, page) = send(&fx, Method::GET, "/materials?text=dune&offset=1", Some(ALICE), None).await;
  let page = page.as_array().unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0]["title"], "Dune Messiah");
}

#[tokio::test]
async fn categories_are_counted() {
  let fx = fixture().await;
  add_material(&fx, "1", "Dune", "sci-fi").await;
  add_material(&fx, "2", "Emma", "classics").await;
  add_material(&fx, "3", "Dune Messiah", "sci-fi").await;

  let (status, body) = send(&fx, Method::GET, "/categories", Some(BOB), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    body,
    json!([
      { "category": "classics", "materials": 1 },
      { "category": "sci-fi", "materials": 2 },
    ])
  );
}

// ─── Statuses ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn claim_marks_material_claimed_and_notifies() {
  let fx = fixture().await;
  let id = add_material(&fx, "1", "Dune", "sci-fi").await;

  let (status, record) = set_status(&fx, ALICE, id, None, "Busy").await;
  assert_eq!(status, StatusCode::CREATED, "{record}");
  assert_eq!(record["status"], "Busy");
  assert_eq!(record["person_id"], fx.alice.id);
  assert_eq!(record["material_id"], id);

  let (_, view) = send(&fx, Method::GET, &format!("/materials/{id}"), Some(BOB), None).await;
  assert_eq!(view["current_status"], json!({ "type": "Claimed", "body": "alice" }));
  assert_eq!(view["claimed_count"], 1);
  assert!(view["due_at"].is_string());

  let sent = fx.notifier.sent();
  assert_eq!(sent.len(), 1);
  let (person_id, template, payload) = &sent[0];
  assert_eq!(*person_id, fx.alice.id);
  assert_eq!(template, "status.claimed");
  assert_eq!(payload["title"], "Dune");
  assert!(payload["due_at"].is_string());
}

#[tokio::test]
async fn second_claim_conflicts() {
  let fx = fixture().await;
  let id = add_material(&fx, "1", "Dune", "sci-fi").await;
  set_status(&fx, ALICE, id, None, "Busy").await;

  let (status, body) = set_status(&fx, BOB, id, None, "Busy").await;
  assert_eq!(status, StatusCode::CONFLICT, "{body}");
  assert_eq!(fx.notifier.sent().len(), 1);
}

#[tokio::test]
async fn invalid_status_input_is_400() {
  let fx = fixture().await;
  let id = add_material(&fx, "1", "Dune", "sci-fi").await;

  let (status, _) = set_status(&fx, ALICE, id, None, "Overdue").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = set_status(&fx, ALICE, id, None, "Lost").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(
    &fx,
    Method::POST,
    "/statuses",
    Some(ALICE),
    Some(json!({ "status": "Busy" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(fx.notifier.sent().is_empty());
}

#[tokio::test]
async fn status_for_unknown_material_or_person_is_404() {
  let fx = fixture().await;
  let (status, _) = set_status(&fx, ALICE, 999, None, "Busy").await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let id = add_material(&fx, "1", "Dune", "sci-fi").await;
  let (status, _) = set_status(&fx, ADMIN, id, Some(999), "Busy").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn readers_act_only_for_themselves() {
  let fx = fixture().await;
  let id = add_material(&fx, "1", "Dune", "sci-fi").await;

  let (status, _) = set_status(&fx, ALICE, id, Some(fx.bob.id), "Busy").await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  // Staff may check a material out on a reader's behalf.
  let (status, record) = set_status(&fx, ADMIN, id, Some(fx.bob.id), "Busy").await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(record["person_id"], fx.bob.id);

  // Alice is not the holder.
  let (status, _) = set_status(&fx, ALICE, id, None, "Free").await;
  assert_eq!(status, StatusCode::CONFLICT);

  // Staff return defaults to the holder.
  let (status, record) = set_status(&fx, ADMIN, id, None, "Free").await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(record["person_id"], fx.bob.id);
  assert_ne!(record["person_id"], fx.admin.id);
}

#[tokio::test]
async fn only_staff_reject_requests() {
  let fx = fixture().await;
  let id = add_material(&fx, "1", "Dune", "sci-fi").await;

  let (status, _) = set_status(&fx, ALICE, id, None, "Pending").await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, view) = send(&fx, Method::GET, &format!("/materials/{id}"), Some(ALICE), None).await;
  assert_eq!(view["current_status"], json!({ "type": "Pending", "body": "alice" }));

  let (status, _) = set_status(&fx, ALICE, id, None, "Rejected").await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, record) = set_status(&fx, ADMIN, id, None, "Rejected").await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(record["person_id"], fx.alice.id);

  let (_, view) = send(&fx, Method::GET, &format!("/materials/{id}"), Some(ALICE), None).await;
  assert_eq!(view["current_status"], "Free");

  let templates: Vec<String> = fx.notifier.sent().into_iter().map(|(_, t, _)| t).collect();
  assert_eq!(templates, ["status.pending", "status.rejected"]);
}

#[tokio::test]
async fn full_loan_cycle_builds_history() {
  let fx = fixture().await;
  let id = add_material(&fx, "1", "Dune", "sci-fi").await;

  for (who, tag) in [(ALICE, "Busy"), (ALICE, "Prolong"), (ALICE, "Free"), (BOB, "Busy")] {
    let (status, body) = set_status(&fx, who, id, None, tag).await;
    assert_eq!(status, StatusCode::CREATED, "{tag}: {body}");
  }

  let (status, history) =
    send(&fx, Method::GET, &format!("/materials/{id}/statuses"), Some(ALICE), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(history["claimed_count"], 2);
  let statuses: Vec<&str> = history["entries"]
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["status"].as_str().unwrap())
    .collect();
  assert_eq!(statuses, ["Busy", "Free", "Prolong", "Busy"]);
  assert_eq!(history["entries"][0]["person"]["username"], "bob");
  assert!(history["entries"][0]["due_at"].is_string());
  assert!(history["entries"][1]["due_at"].is_null());

  let (_, filtered) = send(
    &fx,
    Method::GET,
    &format!("/materials/{id}/statuses?username=ALI"),
    Some(ALICE),
    None,
  )
  .await;
  assert_eq!(filtered["claimed_count"], 2);
  assert_eq!(filtered["entries"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn views_and_renewals_share_the_store_policy() {
  let fx = fixture_with(LoanPolicy::from_days(0)).await;
  let id = add_material(&fx, "1", "Dune", "sci-fi").await;
  set_status(&fx, ALICE, id, None, "Busy").await;
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;

  let (_, view) = send(&fx, Method::GET, &format!("/materials/{id}"), Some(BOB), None).await;
  assert_eq!(view["current_status"], json!({ "type": "Overdue", "body": "alice" }));

  let (_, overdue) = send(&fx, Method::GET, "/materials?status=overdue", Some(BOB), None).await;
  assert_eq!(overdue.as_array().unwrap().len(), 1);

  let (status, body) = set_status(&fx, ALICE, id, None, "Prolong").await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].as_str().unwrap().contains("overdue"), "{body}");
}

#[tokio::test]
async fn text_filter_treats_wildcards_literally() {
  let fx = fixture().await;
  add_material(&fx, "1", "100% Dune", "sci-fi").await;
  add_material(&fx, "2", "Emma", "classics").await;

  let (status, found) = send(&fx, Method::GET, "/materials?text=%25", Some(ALICE), None).await;
  assert_eq!(status, StatusCode::OK);
  let found = found.as_array().unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0]["title"], "100% Dune");
}

// ─── Persons ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn staff_create_persons_who_can_log_in() {
  let fx = fixture().await;
  let (status, person) = send(
    &fx,
    Method::POST,
    "/persons",
    Some(ADMIN),
    Some(json!({ "username": "carol", "password": "carol-pw", "email": "carol@example.org" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(person["role"], "reader");
  assert!(person.get("password_hash").is_none());

  let (status, persons) = send(&fx, Method::GET, "/persons", Some(("carol", "carol-pw")), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(persons.as_array().unwrap().len(), 4);

  let (status, _) = send(
    &fx,
    Method::POST,
    "/persons",
    Some(ADMIN),
    Some(json!({ "username": "carol" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = send(
    &fx,
    Method::POST,
    "/persons",
    Some(ALICE),
    Some(json!({ "username": "dave" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn person_view_includes_history() {
  let fx = fixture().await;
  let dune = add_material(&fx, "1", "Dune", "sci-fi").await;
  let emma = add_material(&fx, "2", "Emma", "classics").await;
  set_status(&fx, ALICE, dune, None, "Busy").await;
  set_status(&fx, ALICE, dune, None, "Free").await;
  set_status(&fx, ALICE, emma, None, "Busy").await;

  let (status, view) =
    send(&fx, Method::GET, &format!("/persons/{}", fx.alice.id), Some(BOB), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(view["username"], "alice");
  assert_eq!(view["history"]["claimed_count"], 2);
  assert_eq!(view["history"]["entries"][0]["material_id"], emma);

  let (status, _) = send(&fx, Method::GET, "/persons/999", Some(BOB), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Files ────────────────────────────────────────────────────────────────────

fn multipart(boundary: &str, filename: &str, data: &str) -> String {
  format!(
    "--{boundary}\r\n\
     Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
     Content-Type: application/octet-stream\r\n\r\n\
     {data}\r\n\
     --{boundary}--\r\n"
  )
}

#[tokio::test]
async fn upload_stores_file_under_random_name() {
  let fx = fixture().await;
  let boundary = "shelf-boundary";
  let req = Request::builder()
    .method(Method::POST)
    .uri("/files")
    .header(header::AUTHORIZATION, basic(ALICE))
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={boundary}"),
    )
    .body(Body::from(multipart(boundary, "Cover.PNG", "not really a png")))
    .unwrap();

  let resp = api_router(fx.state.clone()).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::CREATED);
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  let filename = body["filename"].as_str().unwrap();
  assert!(filename.ends_with(".png"), "{filename}");
  assert_ne!(filename, "Cover.PNG");

  let stored = tokio::fs::read_to_string(fx.dir.join("uploads").join(filename))
    .await
    .unwrap();
  assert_eq!(stored, "not really a png");

  tokio::fs::remove_dir_all(&fx.dir).await.ok();
}

#[tokio::test]
async fn remove_deletes_from_static_dir() {
  let fx = fixture().await;
  let static_dir = fx.dir.join("static");
  tokio::fs::create_dir_all(&static_dir).await.unwrap();
  tokio::fs::write(static_dir.join("old.png"), b"x").await.unwrap();

  let (status, _) = send(&fx, Method::DELETE, "/files/old.png", Some(ALICE), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(&fx, Method::DELETE, "/files/old.png", Some(ADMIN), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert!(!static_dir.join("old.png").exists());

  let (status, _) = send(&fx, Method::DELETE, "/files/old.png", Some(ADMIN), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  tokio::fs::remove_dir_all(&fx.dir).await.ok();
}

#[tokio::test]
async fn remove_refuses_path_traversal() {
  let fx = fixture().await;
  for name in ["..%2Fsecret", "%2E%2E", ".env", "a%5Cb"] {
    let (status, _) =
      send(&fx, Method::DELETE, &format!("/files/{name}"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
  }
}
