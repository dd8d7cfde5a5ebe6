//! SQL schema for the Beacon SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC, fixed width; sorts lexically
    email       TEXT,
    phone       TEXT,
    first_name  TEXT,
    last_name   TEXT,
    birthday    TEXT,            -- YYYY-MM-DD or NULL
    preferences TEXT NOT NULL DEFAULT '{}'
);

-- One row per (subject, business). Counters are only ever changed with
-- relative UPDATEs so concurrent increments never lose a write.
CREATE TABLE IF NOT EXISTS memberships (
    subject_id       TEXT NOT NULL REFERENCES subjects(subject_id),
    business_id      TEXT NOT NULL,
    brand_id         TEXT,
    valid_stamps     INTEGER NOT NULL DEFAULT 0,
    total_stamps     INTEGER,
    token_balance    INTEGER NOT NULL DEFAULT 0,
    valid_coupons    INTEGER NOT NULL DEFAULT 0,
    total_coupons    INTEGER NOT NULL DEFAULT 0,
    last_activity_at TEXT,
    PRIMARY KEY (subject_id, business_id)
);

-- Brand → owning business.
CREATE TABLE IF NOT EXISTS brands (
    brand_id    TEXT PRIMARY KEY,
    business_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS subjects_created_idx    ON subjects(created_at);
CREATE INDEX IF NOT EXISTS memberships_business_idx ON memberships(business_id);
CREATE INDEX IF NOT EXISTS memberships_brand_idx    ON memberships(brand_id);

PRAGMA user_version = 1;
";
