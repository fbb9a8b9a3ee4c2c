//! v001 -- Initial schema creation.
//!
//! Creates the two document tables: `guild_docs` (one row per community) and
//! `user_docs` (one row per user, feedback history).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Guild documents
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS guild_docs (
    guild_id   TEXT PRIMARY KEY NOT NULL,    -- snowflake id as decimal string
    doc        TEXT NOT NULL,                -- JSON-encoded guild document
    updated_at TEXT NOT NULL                 -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- User documents
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS user_docs (
    user_id    TEXT PRIMARY KEY NOT NULL,    -- snowflake id as decimal string
    doc        TEXT NOT NULL,                -- JSON-encoded user document
    updated_at TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
