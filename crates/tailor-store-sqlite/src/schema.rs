//! SQL schema for the Tailor SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One live row per (visitor, page-url-hash, organization) triple; every
-- write path is an upsert on that key.
CREATE TABLE IF NOT EXISTS personalizations (
    id                     TEXT PRIMARY KEY,
    visitor_id             TEXT NOT NULL,
    organization_id        TEXT NOT NULL,
    page_url               TEXT NOT NULL DEFAULT '',
    page_url_hash          TEXT NOT NULL,
    page_schema            TEXT NOT NULL DEFAULT 'null',  -- JSON, stored verbatim
    intent                 TEXT,                          -- JSON VisitorIntent
    variation              TEXT,                          -- JSON Variation
    judge                  TEXT,                          -- JSON JudgeSummary
    cache_duration_seconds INTEGER NOT NULL DEFAULT 43200,
    expires_at             TEXT NOT NULL,                 -- ISO 8601 UTC
    times_applied          INTEGER NOT NULL DEFAULT 0,
    last_applied_at        TEXT,
    status                 TEXT NOT NULL DEFAULT 'pending',
    error_message          TEXT,
    trigger_source         TEXT NOT NULL DEFAULT 'api',
    visitor_journey_id     TEXT,
    created_at             TEXT NOT NULL,
    updated_at             TEXT NOT NULL,
    UNIQUE (visitor_id, page_url_hash, organization_id)
);

CREATE INDEX IF NOT EXISTS personalizations_org_status_idx
    ON personalizations(organization_id, status);
CREATE INDEX IF NOT EXISTS personalizations_expires_idx
    ON personalizations(expires_at);

-- Persona variations are a map-valued field on the organization's own
-- settings row, not a separate collection.
CREATE TABLE IF NOT EXISTS organizations (
    organization_id    TEXT PRIMARY KEY,
    page_schema        TEXT,                          -- JSON
    reference_content  TEXT,
    persona_variations TEXT NOT NULL DEFAULT '{}',   -- JSON map keyed by persona
    last_generated_at  TEXT
);

PRAGMA user_version = 1;
";
