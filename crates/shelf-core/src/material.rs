//! Materials: the library items whose status is tracked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{classify::CurrentStatus, status::StatusEntry};

/// A library item. `identifier` and `id_type` (e.g. an ISBN and `"isbn"`)
/// never change; the descriptive fields may be patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
  pub id:         i64,
  pub identifier: String,
  pub id_type:    String,
  #[serde(rename = "type")]
  pub kind:       String,
  pub title:      String,
  pub category:   Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::LibraryStore::add_material`].
#[derive(Debug, Clone)]
pub struct NewMaterial {
  pub identifier: String,
  pub id_type:    String,
  pub kind:       String,
  pub title:      String,
  pub category:   Option<String>,
}

/// Changes to the mutable fields of a material. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct MaterialPatch {
  pub kind:     Option<String>,
  pub title:    Option<String>,
  pub category: Option<String>,
}

impl MaterialPatch {
  pub fn is_empty(&self) -> bool {
    self.kind.is_none() && self.title.is_none() && self.category.is_none()
  }
}

/// A material with just enough of its status log to classify it.
#[derive(Debug, Clone)]
pub struct MaterialSummary {
  pub material:      Material,
  /// The latest record, if the material has any.
  pub latest:        Option<StatusEntry>,
  /// Number of `Busy` records over the material's lifetime.
  pub claimed_count: usize,
}

/// Read model for a material, computed on every request.
#[derive(Debug, Clone, Serialize)]
pub struct MaterialView {
  #[serde(flatten)]
  pub material:       Material,
  pub current_status: CurrentStatus,
  /// Return deadline of the active loan, if any.
  pub due_at:         Option<DateTime<Utc>>,
  pub claimed_count:  usize,
}

/// Number of materials filed under one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
  pub category:  String,
  pub materials: usize,
}
