//! `SQLite` schema definitions for riskregister.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the projects table.
pub const CREATE_PROJECTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    project_name TEXT NOT NULL DEFAULT '',
    project_manager TEXT NOT NULL DEFAULT '',
    sponsor TEXT NOT NULL DEFAULT '',
    start_date TEXT,
    end_date TEXT,
    risk_plan TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the per-project category list.
pub const CREATE_CATEGORIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS categories (
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (project_id, name)
)
";

/// SQL statement to create the risks table.
pub const CREATE_RISKS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS risks (
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    id TEXT NOT NULL,
    position INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    probability INTEGER NOT NULL,
    impact INTEGER NOT NULL,
    owner TEXT NOT NULL DEFAULT '',
    mitigation TEXT NOT NULL DEFAULT '',
    priority TEXT NOT NULL,
    response TEXT NOT NULL,
    status TEXT NOT NULL,
    date_identified TEXT NOT NULL,
    date_resolved TEXT,
    last_reviewed TEXT NOT NULL,
    PRIMARY KEY (project_id, id)
)
";

/// SQL statement to create the status history table.
pub const CREATE_STATUS_HISTORY_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS status_history (
    project_id TEXT NOT NULL,
    risk_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    changed_at TEXT NOT NULL,
    status TEXT NOT NULL,
    note TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (project_id, risk_id, seq),
    FOREIGN KEY (project_id, risk_id) REFERENCES risks(project_id, id) ON DELETE CASCADE
)
";

/// SQL statement to create an index on risk status for filtering.
pub const CREATE_STATUS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_risks_status ON risks(project_id, status)
";

/// SQL statement to create an index on risk position for ordered listing.
pub const CREATE_POSITION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_risks_position ON risks(project_id, position)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_PROJECTS_TABLE,
    CREATE_CATEGORIES_TABLE,
    CREATE_RISKS_TABLE,
    CREATE_STATUS_HISTORY_TABLE,
    CREATE_STATUS_INDEX,
    CREATE_POSITION_INDEX,
    CREATE_METADATA_TABLE,
];
