//! SQL schema for the Shelf SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA busy_timeout = 5000;
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS materials (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier  TEXT NOT NULL,
    id_type     TEXT NOT NULL,    -- e.g. 'isbn'
    type        TEXT NOT NULL,    -- e.g. 'book'
    title       TEXT NOT NULL,
    category    TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (id_type, identifier)
);

CREATE TABLE IF NOT EXISTS persons (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    role          TEXT NOT NULL DEFAULT 'reader',   -- 'reader' | 'staff'
    email         TEXT,
    password_hash TEXT,                             -- argon2 PHC string
    created_at    TEXT NOT NULL
);

-- Statuses are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS statuses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    material_id INTEGER REFERENCES materials(id),
    person_id   INTEGER REFERENCES persons(id),
    status      TEXT NOT NULL
                CHECK (status IN ('Free', 'Busy', 'Prolong', 'Pending', 'Rejected')),
    created_at  TEXT NOT NULL      -- RFC 3339 UTC, fixed microsecond width
);

CREATE INDEX IF NOT EXISTS statuses_material_idx
    ON statuses(material_id, created_at, id);
CREATE INDEX IF NOT EXISTS statuses_person_idx   ON statuses(person_id);
CREATE INDEX IF NOT EXISTS materials_category_idx ON materials(category);

PRAGMA user_version = 1;
";
