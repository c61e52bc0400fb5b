//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width
//! and a `Z` suffix, so lexical order equals chronological order. Status tags
//! use their variant names; roles are lowercase.

use chrono::{DateTime, SecondsFormat, Utc};
use shelf_core::{
  material::{Material, MaterialSummary},
  person::{Person, Role},
  status::{StatusEntry, StatusRecord, StatusTag},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str {
  match r {
    Role::Reader => "reader",
    Role::Staff => "staff",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "reader" => Ok(Role::Reader),
    "staff" => Ok(Role::Staff),
    other => Err(Error::Decode(format!("unknown role: {other:?}"))),
  }
}

// ─── StatusTag ───────────────────────────────────────────────────────────────

pub fn decode_tag(s: &str) -> Result<StatusTag> {
  match s.parse::<StatusTag>() {
    Ok(tag) if tag.is_stored() => Ok(tag),
    _ => Err(Error::Decode(format!("unknown stored status: {s:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `materials` row.
pub struct RawMaterial {
  pub id:         i64,
  pub identifier: String,
  pub id_type:    String,
  pub kind:       String,
  pub title:      String,
  pub category:   Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

/// Column list matching [`RawMaterial::from_row`].
pub const MATERIAL_COLUMNS: &str =
  "id, identifier, id_type, type, title, category, created_at, updated_at";

impl RawMaterial {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      identifier: row.get(1)?,
      id_type:    row.get(2)?,
      kind:       row.get(3)?,
      title:      row.get(4)?,
      category:   row.get(5)?,
      created_at: row.get(6)?,
      updated_at: row.get(7)?,
    })
  }

  pub fn into_material(self) -> Result<Material> {
    Ok(Material {
      id:         self.id,
      identifier: self.identifier,
      id_type:    self.id_type,
      kind:       self.kind,
      title:      self.title,
      category:   self.category,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `persons` row.
pub struct RawPerson {
  pub id:       i64,
  pub username: String,
  pub role:     String,
  pub email:    Option<String>,
}

impl RawPerson {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:       row.get(0)?,
      username: row.get(1)?,
      role:     row.get(2)?,
      email:    row.get(3)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      id:       self.id,
      username: self.username,
      role:     decode_role(&self.role)?,
      email:    self.email,
    })
  }
}

/// Raw values from a `statuses` row, optionally joined with its person.
pub struct RawStatusEntry {
  // statuses columns
  pub id:          i64,
  pub material_id: Option<i64>,
  pub person_id:   Option<i64>,
  pub status:      String,
  pub created_at:  String,
  // persons join
  pub username:    Option<String>,
  pub role:        Option<String>,
  pub email:       Option<String>,
}

/// Select list matching [`RawStatusEntry::from_row`]; expects aliases `s` and
/// `p` for `statuses` and `persons`.
pub const STATUS_ENTRY_COLUMNS: &str = "s.id, s.material_id, s.person_id, s.status, \
                                        s.created_at, p.username, p.role, p.email";

impl RawStatusEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Self::from_row_at(row, 0)
  }

  /// Read the entry columns starting at column `at`.
  pub fn from_row_at(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(at)?,
      material_id: row.get(at + 1)?,
      person_id:   row.get(at + 2)?,
      status:      row.get(at + 3)?,
      created_at:  row.get(at + 4)?,
      username:    row.get(at + 5)?,
      role:        row.get(at + 6)?,
      email:       row.get(at + 7)?,
    })
  }

  pub fn to_record(&self) -> Result<StatusRecord> {
    Ok(StatusRecord {
      id:          self.id,
      material_id: self.material_id,
      person_id:   self.person_id,
      status:      decode_tag(&self.status)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }

  pub fn into_entry(self) -> Result<StatusEntry> {
    let record = self.to_record()?;
    let person = match (self.person_id, self.username, self.role) {
      (Some(id), Some(username), Some(role)) => Some(Person {
        id,
        username,
        role: decode_role(&role)?,
        email: self.email,
      }),
      _ => None,
    };
    Ok(StatusEntry { record, person })
  }
}

/// A material row followed by its claim count and its latest status entry,
/// as selected by [`MATERIAL_SUMMARY_SELECT`].
pub struct RawMaterialSummary {
  pub material:      RawMaterial,
  pub claimed_count: i64,
  pub latest:        Option<RawStatusEntry>,
}

/// Select list and joins for [`RawMaterialSummary::from_row`]; the caller
/// appends `WHERE`/`ORDER BY` clauses over alias `m`.
pub const MATERIAL_SUMMARY_SELECT: &str = "
  SELECT m.id, m.identifier, m.id_type, m.type, m.title, m.category,
         m.created_at, m.updated_at,
         (SELECT COUNT(*) FROM statuses b
           WHERE b.material_id = m.id AND b.status = 'Busy'),
         s.id, s.material_id, s.person_id, s.status, s.created_at,
         p.username, p.role, p.email
  FROM materials m
  LEFT JOIN statuses s ON s.id = (
    SELECT l.id FROM statuses l
    WHERE l.material_id = m.id
    ORDER BY l.created_at DESC, l.id DESC
    LIMIT 1
  )
  LEFT JOIN persons p ON p.id = s.person_id";

impl RawMaterialSummary {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let status_id: Option<i64> = row.get(9)?;
    Ok(Self {
      material:      RawMaterial::from_row(row)?,
      claimed_count: row.get(8)?,
      latest:        match status_id {
        Some(_) => Some(RawStatusEntry::from_row_at(row, 9)?),
        None => None,
      },
    })
  }

  pub fn into_summary(self) -> Result<MaterialSummary> {
    Ok(MaterialSummary {
      material:      self.material.into_material()?,
      latest:        self.latest.map(RawStatusEntry::into_entry).transpose()?,
      claimed_count: usize::try_from(self.claimed_count)
        .map_err(|_| Error::Decode(format!("claim count {}", self.claimed_count)))?,
    })
  }
}

/// Turn user text into a `LIKE` pattern matching it literally as a
/// substring. Pair with `ESCAPE '\'`.
pub fn like_pattern(text: &str) -> String {
  let mut pattern = String::with_capacity(text.len() + 2);
  pattern.push('%');
  for c in text.chars() {
    if matches!(c, '\\' | '%' | '_') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

/// `true` if `e` is a UNIQUE or PRIMARY KEY constraint failure.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}
