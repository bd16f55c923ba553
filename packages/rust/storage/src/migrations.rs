//! SQL migration definitions for the skywatch database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: airports, events, feed_entries, poll_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Tracked airports and their latest announced status
CREATE TABLE IF NOT EXISTS airports (
    icao           TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    current_status TEXT,
    updated_at     TEXT NOT NULL
);

-- Status events; one feed entry yields at most one event per airport
CREATE TABLE IF NOT EXISTS events (
    id         TEXT PRIMARY KEY,
    icao       TEXT NOT NULL REFERENCES airports(icao) ON DELETE CASCADE,
    ts         TEXT NOT NULL,
    status     TEXT NOT NULL,
    entry_id   TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(icao, entry_id)
);

CREATE INDEX IF NOT EXISTS idx_events_icao_ts ON events(icao, ts);

-- Processed feed entries (incremental poll ledger)
CREATE TABLE IF NOT EXISTS feed_entries (
    id           TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    published    TEXT NOT NULL,
    seen_at      TEXT NOT NULL
);

-- Poll run history
CREATE TABLE IF NOT EXISTS poll_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
