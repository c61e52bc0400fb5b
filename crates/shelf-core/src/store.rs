//! The `LibraryStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `shelf-store-sqlite`).
//! The API layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  Classify,
  classify::LoanPolicy,
  material::{CategoryCount, Material, MaterialPatch, MaterialSummary, NewMaterial},
  person::{NewPerson, Person},
  status::{StatusEntry, StatusRecord},
  transition::TransitionRequest,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`LibraryStore::list_materials`].
///
/// Filtering by current status is not part of the query: status is derived,
/// so callers classify the returned materials themselves.
#[derive(Debug, Clone, Default)]
pub struct MaterialQuery {
  /// Exact category match.
  pub category: Option<String>,
  /// Literal substring match over title and identifier.
  pub text:     Option<String>,
  /// `None` means unbounded.
  pub limit:    Option<usize>,
  pub offset:   Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Shelf storage backend.
///
/// Status records are append-only: there is no method to update or delete
/// one.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LibraryStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  /// Loan rules the store validates renewals against. Readers classify with
  /// the same policy.
  fn policy(&self) -> LoanPolicy;

  // ── Materials ─────────────────────────────────────────────────────────

  fn add_material(
    &self,
    input: NewMaterial,
  ) -> impl Future<Output = Result<Material, Self::Error>> + Send + '_;

  /// Retrieve a material by id. Returns `None` if not found.
  fn get_material(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Material>, Self::Error>> + Send + '_;

  /// Apply `patch` and bump `updated_at`. Returns `None` if not found.
  fn update_material(
    &self,
    id: i64,
    patch: MaterialPatch,
  ) -> impl Future<Output = Result<Option<Material>, Self::Error>> + Send + '_;

  /// Matching materials by id, each with its latest entry and claim count.
  fn list_materials<'a>(
    &'a self,
    query: &'a MaterialQuery,
  ) -> impl Future<Output = Result<Vec<MaterialSummary>, Self::Error>> + Send + 'a;

  /// Distinct non-empty categories with their material counts, by name.
  fn categories(
    &self,
  ) -> impl Future<Output = Result<Vec<CategoryCount>, Self::Error>> + Send + '_;

  // ── Persons ───────────────────────────────────────────────────────────

  /// Persist a new person. Usernames are unique.
  fn add_person(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  fn get_person(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  fn list_persons(
    &self,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Look up a person together with their stored password hash.
  fn person_credentials<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<(Person, String)>, Self::Error>> + Send + 'a;

  // ── Statuses ──────────────────────────────────────────────────────────

  /// Validate `request` against the material's latest record and append the
  /// resulting record, atomically. `created_at` is set by the store.
  ///
  /// Fails with the domain error from
  /// [`transition::plan`](crate::transition::plan) when the change is not
  /// allowed, or with a not-found error for an unknown material or person.
  fn create_status(
    &self,
    request: TransitionRequest,
    actor: Person,
  ) -> impl Future<Output = Result<StatusRecord, Self::Error>> + Send + '_;

  /// All entries for a material, oldest first.
  fn statuses_for_material(
    &self,
    material_id: i64,
  ) -> impl Future<Output = Result<Vec<StatusEntry>, Self::Error>> + Send + '_;

  /// All entries for a person, oldest first.
  fn statuses_for_person(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<Vec<StatusEntry>, Self::Error>> + Send + '_;
}
