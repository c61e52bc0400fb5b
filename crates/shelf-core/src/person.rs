//! Persons: the readers and staff who hold materials.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Reader,
  /// May act on behalf of others and moderate pending requests.
  Staff,
}

/// A person as exposed to API clients. Credentials never live here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub id:       i64,
  pub username: String,
  pub role:     Role,
  pub email:    Option<String>,
}

impl Person {
  pub fn is_staff(&self) -> bool { self.role == Role::Staff }
}

/// Input to [`crate::store::LibraryStore::add_person`].
#[derive(Debug, Clone)]
pub struct NewPerson {
  pub username:      String,
  pub role:          Role,
  pub email:         Option<String>,
  /// argon2 PHC string; persons without one cannot authenticate.
  pub password_hash: Option<String>,
}
