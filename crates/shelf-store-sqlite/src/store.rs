//! [`SqliteStore`], the SQLite implementation of [`LibraryStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use shelf_core::{
  classify::LoanPolicy,
  material::{CategoryCount, Material, MaterialPatch, MaterialSummary, NewMaterial},
  person::{NewPerson, Person},
  status::{StatusEntry, StatusRecord},
  store::{LibraryStore, MaterialQuery},
  transition::{self, TransitionRequest},
};

use crate::{
  Error, Result,
  encode::{
    MATERIAL_COLUMNS, MATERIAL_SUMMARY_SELECT, RawMaterial, RawMaterialSummary,
    RawPerson, RawStatusEntry, STATUS_ENTRY_COLUMNS, encode_dt, encode_role,
    is_unique_violation, like_pattern,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Shelf store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  policy:          LoanPolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy: LoanPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy: LoanPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Use `policy` for renewals in [`LibraryStore::create_status`] and report
  /// it through [`LibraryStore::policy`].
  pub fn with_policy(mut self, policy: LoanPolicy) -> Self {
    self.policy = policy;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn statuses_where(
    &self,
    column: &'static str,
    id: i64,
  ) -> Result<Vec<StatusEntry>> {
    let raws: Vec<RawStatusEntry> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {STATUS_ENTRY_COLUMNS}
           FROM statuses s
           LEFT JOIN persons p ON p.id = s.person_id
           WHERE s.{column} = ?1
           ORDER BY s.created_at, s.id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawStatusEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStatusEntry::into_entry).collect()
  }
}

// ─── LibraryStore impl ───────────────────────────────────────────────────────

impl LibraryStore for SqliteStore {
  type Error = Error;

  fn policy(&self) -> LoanPolicy { self.policy }

  // ── Materials ─────────────────────────────────────────────────────────────

  async fn add_material(&self, input: NewMaterial) -> Result<Material> {
    let now = Utc::now();
    let at_str = encode_dt(now);
    let key = format!("{} {}", input.id_type, input.identifier);

    let row = input.clone();
    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO materials
             (identifier, id_type, type, title, category, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![
            row.identifier,
            row.id_type,
            row.kind,
            row.title,
            row.category,
            at_str,
          ],
        );
        match inserted {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    let id = id.ok_or(Error::Duplicate(format!("material {key}")))?;
    tracing::debug!(material_id = id, "material added");

    Ok(Material {
      id,
      identifier: input.identifier,
      id_type: input.id_type,
      kind: input.kind,
      title: input.title,
      category: input.category,
      created_at: now,
      updated_at: now,
    })
  }

  async fn get_material(&self, id: i64) -> Result<Option<Material>> {
    let raw: Option<RawMaterial> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?1"),
              rusqlite::params![id],
              RawMaterial::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMaterial::into_material).transpose()
  }

  async fn update_material(
    &self,
    id: i64,
    patch: MaterialPatch,
  ) -> Result<Option<Material>> {
    let at_str = encode_dt(Utc::now());

    let raw: Option<RawMaterial> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE materials
           SET type       = COALESCE(?2, type),
               title      = COALESCE(?3, title),
               category   = COALESCE(?4, category),
               updated_at = ?5
           WHERE id = ?1",
          rusqlite::params![id, patch.kind, patch.title, patch.category, at_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?1"),
              rusqlite::params![id],
              RawMaterial::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMaterial::into_material).transpose()
  }

  async fn list_materials(&self, query: &MaterialQuery) -> Result<Vec<MaterialSummary>> {
    let category = query.category.clone();
    let pattern = query.text.as_deref().map(like_pattern);
    // SQLite treats a negative LIMIT as unbounded; an offset past the end
    // simply yields no rows.
    let limit_val = query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(-1));
    let offset_val = query
      .offset
      .map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX));

    let raws: Vec<RawMaterialSummary> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{MATERIAL_SUMMARY_SELECT}
           WHERE (?1 IS NULL OR m.category = ?1)
             AND (?2 IS NULL
                  OR m.title LIKE ?2 ESCAPE '\\'
                  OR m.identifier LIKE ?2 ESCAPE '\\')
           ORDER BY m.id
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![category, pattern, limit_val, offset_val],
            RawMaterialSummary::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMaterialSummary::into_summary).collect()
  }

  async fn categories(&self) -> Result<Vec<CategoryCount>> {
    let rows: Vec<(String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT category, COUNT(*)
           FROM materials
           WHERE category IS NOT NULL AND category != ''
           GROUP BY category
           ORDER BY category",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(category, n)| CategoryCount { category, materials: n as usize })
        .collect(),
    )
  }

  // ── Persons ───────────────────────────────────────────────────────────────

  async fn add_person(&self, input: NewPerson) -> Result<Person> {
    let at_str = encode_dt(Utc::now());
    let role_str = encode_role(input.role).to_owned();
    let username = input.username.clone();
    let email = input.email.clone();

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO persons (username, role, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![username, role_str, email, input.password_hash, at_str],
        );
        match inserted {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    let id = id.ok_or_else(|| Error::Duplicate(format!("username {:?}", input.username)))?;
    tracing::debug!(person_id = id, "person added");

    Ok(Person {
      id,
      username: input.username,
      role: input.role,
      email: input.email,
    })
  }

  async fn get_person(&self, id: i64) -> Result<Option<Person>> {
    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, username, role, email FROM persons WHERE id = ?1",
              rusqlite::params![id],
              RawPerson::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  async fn list_persons(&self) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT id, username, role, email FROM persons ORDER BY id")?;
        let rows = stmt
          .query_map([], RawPerson::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn person_credentials(&self, username: &str) -> Result<Option<(Person, String)>> {
    let username = username.to_owned();

    let raw: Option<(RawPerson, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, username, role, email, password_hash
               FROM persons
               WHERE username = ?1 AND password_hash IS NOT NULL",
              rusqlite::params![username],
              |row| Ok((RawPerson::from_row(row)?, row.get(4)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(p, hash)| Ok((p.into_person()?, hash)))
      .transpose()
  }

  // ── Statuses ──────────────────────────────────────────────────────────────

  async fn create_status(
    &self,
    request: TransitionRequest,
    actor: Person,
  ) -> Result<StatusRecord> {
    let policy = self.policy;
    let material_id = request.material_id;

    // Read-validate-append runs in one IMMEDIATE transaction so two
    // concurrent claims on the same material cannot both pass validation.
    let outcome: Result<StatusRecord> = self
      .conn
      .call(move |conn| -> std::result::Result<Result<StatusRecord>, tokio_rusqlite::Error> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let material_exists = tx
          .query_row(
            "SELECT 1 FROM materials WHERE id = ?1",
            rusqlite::params![material_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !material_exists {
          return Ok(Err(shelf_core::Error::MaterialNotFound(material_id).into()));
        }

        let latest: Option<RawStatusEntry> = tx
          .query_row(
            &format!(
              "SELECT {STATUS_ENTRY_COLUMNS}
               FROM statuses s
               LEFT JOIN persons p ON p.id = s.person_id
               WHERE s.material_id = ?1
               ORDER BY s.created_at DESC, s.id DESC
               LIMIT 1"
            ),
            rusqlite::params![material_id],
            RawStatusEntry::from_row,
          )
          .optional()?;
        let current = match latest.as_ref().map(RawStatusEntry::to_record).transpose() {
          Ok(current) => current,
          Err(e) => return Ok(Err(e)),
        };

        // Never stamp a record before the one it follows, even if the wall
        // clock stepped back; equal stamps fall back to id order.
        let now = current
          .as_ref()
          .map_or_else(Utc::now, |c| Utc::now().max(c.created_at));
        let planned =
          match transition::plan(current.as_ref(), &request, &actor, now, &policy) {
            Ok(t) => t,
            Err(e) => return Ok(Err(e.into())),
          };

        let person_exists = tx
          .query_row(
            "SELECT 1 FROM persons WHERE id = ?1",
            rusqlite::params![planned.person_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !person_exists {
          return Ok(Err(
            shelf_core::Error::PersonNotFound(planned.person_id).into(),
          ));
        }

        tx.execute(
          "INSERT INTO statuses (material_id, person_id, status, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            material_id,
            planned.person_id,
            planned.to.as_str(),
            encode_dt(now),
          ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Ok(StatusRecord {
          id,
          material_id: Some(material_id),
          person_id: Some(planned.person_id),
          status: planned.to,
          created_at: now,
        }))
      })
      .await?;

    if let Ok(record) = &outcome {
      tracing::debug!(
        material_id,
        status_id = record.id,
        status = %record.status,
        "status appended"
      );
    }
    outcome
  }

  async fn statuses_for_material(&self, material_id: i64) -> Result<Vec<StatusEntry>> {
    self.statuses_where("material_id", material_id).await
  }

  async fn statuses_for_person(&self, person_id: i64) -> Result<Vec<StatusEntry>> {
    self.statuses_where("person_id", person_id).await
  }
}
