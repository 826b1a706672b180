//! Storage layer for riskregister.
//!
//! This module provides `SQLite`-based persistent storage for projects, their
//! category lists, risks and the status history of every risk.

pub mod migrations;
pub mod schema;

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::dates::{format_date, parse_date, parse_timestamp};
use crate::error::{Error, Result};
use crate::project::{Project, ProjectMeta};
use crate::risk::{Risk, StatusChange};

const MEMORY_PATH: &str = ":memory:";

const PROJECT_COLUMNS: &str =
    "p.id, p.project_name, p.project_manager, p.sponsor, p.start_date, p.end_date, p.risk_plan";

const RISK_COLUMNS: &str = "id, title, description, category, probability, impact, owner, \
     mitigation, priority, response, status, date_identified, date_resolved, last_reviewed";

/// Storage engine for the risk register.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Projects with metadata and an ordered category list
/// - Risks kept in insertion order per project
/// - Append-only status history per risk
/// - Cascading deletes from project to risks to history
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Last identifier handed out by `generate_id`.
    last_id: Cell<i64>,
}

/// One row of the project listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Project identifier.
    pub id: String,
    /// Project metadata.
    pub meta: ProjectMeta,
    /// Number of risks in the project.
    pub risk_count: usize,
    /// Mean risk score, 0 when the project has no risks.
    pub aggregated_score: f64,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self::from_connection(path, conn))
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(MEMORY_PATH),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self::from_connection(PathBuf::from(MEMORY_PATH), conn))
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn,
            last_id: Cell::new(0),
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generate a fresh identifier.
    ///
    /// Identifiers are the current Unix time in milliseconds, bumped forward
    /// until they clash with neither a project nor a risk, and strictly
    /// increasing within one storage handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn generate_id(&self) -> Result<String> {
        let mut candidate = Utc::now()
            .timestamp_millis()
            .max(self.last_id.get().saturating_add(1));
        while self.id_in_use(&candidate.to_string())? {
            candidate += 1;
        }
        self.last_id.set(candidate);
        Ok(candidate.to_string())
    }

    fn id_in_use(&self, id: &str) -> Result<bool> {
        let used: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)
                 OR EXISTS(SELECT 1 FROM risks WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        Ok(used)
    }

    // === Projects ===

    /// Insert a project together with its categories and risks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, including when a
    /// project with the same id already exists.
    pub fn insert_project(&self, project: &Project) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let meta = &project.meta;
        tx.execute(
            r"
            INSERT INTO projects (id, project_name, project_manager, sponsor,
                                  start_date, end_date, risk_plan)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                project.id,
                meta.project_name,
                meta.project_manager,
                meta.sponsor,
                meta.start_date.map(format_date),
                meta.end_date.map(format_date),
                meta.risk_plan,
            ],
        )?;
        write_categories(&tx, &project.id, &project.categories)?;
        for (position, risk) in project.risks.iter().enumerate() {
            write_risk(&tx, &project.id, risk, i64::try_from(position).unwrap_or(i64::MAX))?;
        }
        tx.commit()?;

        debug!(
            project = %project.id,
            risks = project.risks.len(),
            "Inserted project"
        );
        Ok(())
    }

    /// Check whether a project exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn project_exists(&self, id: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// List all projects in creation order, with risk counts and scores.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a stored value is corrupt.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {PROJECT_COLUMNS},
                   COUNT(r.id),
                   COALESCE(AVG(r.probability * r.impact), 0.0)
            FROM projects p LEFT JOIN risks r ON r.project_id = p.id
            GROUP BY p.id
            ORDER BY p.rowid
            "
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    ProjectRow::from_row(row)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, f64>(8)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(project, count, score)| {
                let (id, meta) = project.into_meta()?;
                Ok(ProjectSummary {
                    id,
                    meta,
                    risk_count: usize::try_from(count).unwrap_or(0),
                    aggregated_score: score,
                })
            })
            .collect()
    }

    /// Load a complete project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a stored value is corrupt.
    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let Some(meta) = self.get_meta(id)? else {
            return Ok(None);
        };
        Ok(Some(Project {
            id: id.to_string(),
            meta,
            risks: self.list_risks(id)?,
            categories: self.categories(id)?,
        }))
    }

    /// Load a project's metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a stored value is corrupt.
    pub fn get_meta(&self, id: &str) -> Result<Option<ProjectMeta>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = ?1"),
                [id],
                ProjectRow::from_row,
            )
            .optional()?;
        row.map(|r| r.into_meta().map(|(_, meta)| meta))
            .transpose()
    }

    /// Replace a project's metadata.
    ///
    /// Returns `false` if the project does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_meta(&self, id: &str, meta: &ProjectMeta) -> Result<bool> {
        write_meta(&self.conn, id, meta)
    }

    /// A project's categories in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn categories(&self, project_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM categories WHERE project_id = ?1 ORDER BY position")?;
        let names = stmt
            .query_map([project_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Replace a project's category list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_categories(&self, project_id: &str, categories: &[String]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        write_categories(&tx, project_id, categories)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a project with all its categories, risks and history.
    ///
    /// Returns `true` if a project was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_project(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", [id])?;
        if affected > 0 {
            info!(project = %id, "Deleted project");
        }
        Ok(affected > 0)
    }

    // === Risks ===

    /// Append a risk, with its history, to the end of a project's list.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` if the project does not exist, or an error if
    /// the database operation fails (including a duplicate risk id).
    pub fn insert_risk(&self, project_id: &str, risk: &Risk) -> Result<()> {
        if !self.project_exists(project_id)? {
            return Err(Error::project_not_found(project_id));
        }

        let tx = self.conn.unchecked_transaction()?;
        append_risk(&tx, project_id, risk)?;
        tx.commit()?;

        debug!(project = %project_id, risk = %risk.id, "Inserted risk");
        Ok(())
    }

    /// Merge imported data into a project in a single transaction.
    ///
    /// Risks are appended in order, `meta` replaces the project's metadata
    /// and `categories` replaces its category list. Nothing is written if
    /// any step fails.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` if the project does not exist, or an error if
    /// the database operation fails (including a duplicate risk id).
    pub fn import_into(
        &self,
        project_id: &str,
        risks: &[Risk],
        meta: Option<&ProjectMeta>,
        categories: Option<&[String]>,
    ) -> Result<()> {
        if !self.project_exists(project_id)? {
            return Err(Error::project_not_found(project_id));
        }

        let tx = self.conn.unchecked_transaction()?;
        for risk in risks {
            append_risk(&tx, project_id, risk)?;
        }
        if let Some(meta) = meta {
            write_meta(&tx, project_id, meta)?;
        }
        if let Some(categories) = categories {
            write_categories(&tx, project_id, categories)?;
        }
        tx.commit()?;

        debug!(project = %project_id, risks = risks.len(), "Imported into project");
        Ok(())
    }

    /// Check whether a risk exists in a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn risk_exists(&self, project_id: &str, risk_id: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM risks WHERE project_id = ?1 AND id = ?2)",
            [project_id, risk_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Get a risk by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a stored value is corrupt.
    pub fn get_risk(&self, project_id: &str, risk_id: &str) -> Result<Option<Risk>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {RISK_COLUMNS} FROM risks WHERE project_id = ?1 AND id = ?2"),
                [project_id, risk_id],
                RiskRow::from_row,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            r"
            SELECT risk_id, changed_at, status, note FROM status_history
            WHERE project_id = ?1 AND risk_id = ?2 ORDER BY seq
            ",
        )?;
        let history = stmt
            .query_map([project_id, risk_id], HistoryRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(HistoryRow::into_change)
            .collect::<Result<Vec<_>>>()?;

        row.into_risk(history).map(Some)
    }

    /// All risks of a project in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a stored value is corrupt.
    pub fn list_risks(&self, project_id: &str) -> Result<Vec<Risk>> {
        let mut history = self.history_by_risk(project_id)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RISK_COLUMNS} FROM risks WHERE project_id = ?1 ORDER BY position"
        ))?;
        let rows = stmt
            .query_map([project_id], RiskRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                let entries = history.remove(&row.id).unwrap_or_default();
                row.into_risk(entries)
            })
            .collect()
    }

    fn history_by_risk(&self, project_id: &str) -> Result<HashMap<String, Vec<StatusChange>>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT risk_id, changed_at, status, note FROM status_history
            WHERE project_id = ?1 ORDER BY risk_id, seq
            ",
        )?;
        let rows = stmt
            .query_map([project_id], HistoryRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut grouped: HashMap<String, Vec<StatusChange>> = HashMap::new();
        for row in rows {
            let risk_id = row.risk_id.clone();
            grouped.entry(risk_id).or_default().push(row.into_change()?);
        }
        Ok(grouped)
    }

    /// Overwrite a stored risk, keeping its position in the list.
    ///
    /// The stored history is replaced by `risk.status_history`.
    /// Returns `false` if the risk does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_risk(&self, project_id: &str, risk: &Risk) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let affected = tx.execute(
            r"
            UPDATE risks
            SET title = ?3, description = ?4, category = ?5, probability = ?6, impact = ?7,
                owner = ?8, mitigation = ?9, priority = ?10, response = ?11, status = ?12,
                date_identified = ?13, date_resolved = ?14, last_reviewed = ?15
            WHERE project_id = ?1 AND id = ?2
            ",
            params![
                project_id,
                risk.id,
                risk.title,
                risk.description,
                risk.category,
                risk.probability,
                risk.impact,
                risk.owner,
                risk.mitigation,
                risk.priority.as_str(),
                risk.response.as_str(),
                risk.status.as_str(),
                format_date(risk.date_identified),
                risk.date_resolved.map(format_date),
                encode_timestamp(&risk.last_reviewed),
            ],
        )?;
        if affected == 0 {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM status_history WHERE project_id = ?1 AND risk_id = ?2",
            [project_id, risk.id.as_str()],
        )?;
        write_history(&tx, project_id, risk)?;
        tx.commit()?;

        debug!(project = %project_id, risk = %risk.id, "Updated risk");
        Ok(true)
    }

    /// Delete a risk and its history.
    ///
    /// Returns `true` if a risk was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_risk(&self, project_id: &str, risk_id: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM risks WHERE project_id = ?1 AND id = ?2",
            [project_id, risk_id],
        )?;
        Ok(affected > 0)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |table: &str| -> Result<i64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n)
        };

        let db_size_bytes = if self.path.as_os_str() == MEMORY_PATH {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_projects: count("projects")?,
            total_risks: count("risks")?,
            total_history_entries: count("status_history")?,
            schema_version: migrations::get_schema_version(&self.conn)?,
            db_size_bytes,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of projects.
    pub total_projects: i64,
    /// Number of risks across all projects.
    pub total_risks: i64,
    /// Number of status history entries across all risks.
    pub total_history_entries: i64,
    /// Schema version of the database.
    pub schema_version: i32,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::CorruptValue {
        column,
        value: value.to_string(),
    })
}

fn decode_date(column: &'static str, value: &str) -> Result<chrono::NaiveDate> {
    parse_date(value).ok_or_else(|| Error::CorruptValue {
        column,
        value: value.to_string(),
    })
}

fn decode_opt_date(column: &'static str, value: Option<&str>) -> Result<Option<chrono::NaiveDate>> {
    match value {
        Some(v) if !v.trim().is_empty() => decode_date(column, v).map(Some),
        _ => Ok(None),
    }
}

fn decode_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(value).ok_or_else(|| Error::CorruptValue {
        column,
        value: value.to_string(),
    })
}

fn decode_level(column: &'static str, value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::CorruptValue {
        column,
        value: value.to_string(),
    })
}

fn write_meta(conn: &Connection, id: &str, meta: &ProjectMeta) -> Result<bool> {
    let affected = conn.execute(
        r"
        UPDATE projects
        SET project_name = ?2, project_manager = ?3, sponsor = ?4,
            start_date = ?5, end_date = ?6, risk_plan = ?7
        WHERE id = ?1
        ",
        params![
            id,
            meta.project_name,
            meta.project_manager,
            meta.sponsor,
            meta.start_date.map(format_date),
            meta.end_date.map(format_date),
            meta.risk_plan,
        ],
    )?;
    Ok(affected > 0)
}

fn write_categories(conn: &Connection, project_id: &str, categories: &[String]) -> Result<()> {
    conn.execute("DELETE FROM categories WHERE project_id = ?1", [project_id])?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO categories (project_id, position, name) VALUES (?1, ?2, ?3)",
    )?;
    for (position, name) in categories.iter().enumerate() {
        stmt.execute(params![
            project_id,
            i64::try_from(position).unwrap_or(i64::MAX),
            name
        ])?;
    }
    Ok(())
}

fn append_risk(conn: &Connection, project_id: &str, risk: &Risk) -> Result<()> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM risks WHERE project_id = ?1",
        [project_id],
        |row| row.get(0),
    )?;
    write_risk(conn, project_id, risk, position)
}

fn write_risk(conn: &Connection, project_id: &str, risk: &Risk, position: i64) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO risks (project_id, position, {RISK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            project_id,
            position,
            risk.id,
            risk.title,
            risk.description,
            risk.category,
            risk.probability,
            risk.impact,
            risk.owner,
            risk.mitigation,
            risk.priority.as_str(),
            risk.response.as_str(),
            risk.status.as_str(),
            format_date(risk.date_identified),
            risk.date_resolved.map(format_date),
            encode_timestamp(&risk.last_reviewed),
        ],
    )?;
    write_history(conn, project_id, risk)
}

fn write_history(conn: &Connection, project_id: &str, risk: &Risk) -> Result<()> {
    let mut stmt = conn.prepare(
        r"
        INSERT INTO status_history (project_id, risk_id, seq, changed_at, status, note)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
    )?;
    for (seq, change) in risk.status_history.iter().enumerate() {
        stmt.execute(params![
            project_id,
            risk.id,
            i64::try_from(seq).unwrap_or(i64::MAX),
            encode_timestamp(&change.date),
            change.status.as_str(),
            change.note,
        ])?;
    }
    Ok(())
}

/// Raw column values of a project row.
struct ProjectRow {
    id: String,
    project_name: String,
    project_manager: String,
    sponsor: String,
    start_date: Option<String>,
    end_date: Option<String>,
    risk_plan: String,
}

impl ProjectRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_name: row.get(1)?,
            project_manager: row.get(2)?,
            sponsor: row.get(3)?,
            start_date: row.get(4)?,
            end_date: row.get(5)?,
            risk_plan: row.get(6)?,
        })
    }

    fn into_meta(self) -> Result<(String, ProjectMeta)> {
        let meta = ProjectMeta {
            project_name: self.project_name,
            project_manager: self.project_manager,
            sponsor: self.sponsor,
            start_date: decode_opt_date("start_date", self.start_date.as_deref())?,
            end_date: decode_opt_date("end_date", self.end_date.as_deref())?,
            risk_plan: self.risk_plan,
        };
        Ok((self.id, meta))
    }
}

/// Raw column values of a risk row, decoded outside the row callback so
/// that bad values surface as `CorruptValue`.
struct RiskRow {
    id: String,
    title: String,
    description: String,
    category: String,
    probability: i64,
    impact: i64,
    owner: String,
    mitigation: String,
    priority: String,
    response: String,
    status: String,
    date_identified: String,
    date_resolved: Option<String>,
    last_reviewed: String,
}

impl RiskRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            probability: row.get(4)?,
            impact: row.get(5)?,
            owner: row.get(6)?,
            mitigation: row.get(7)?,
            priority: row.get(8)?,
            response: row.get(9)?,
            status: row.get(10)?,
            date_identified: row.get(11)?,
            date_resolved: row.get(12)?,
            last_reviewed: row.get(13)?,
        })
    }

    fn into_risk(self, status_history: Vec<StatusChange>) -> Result<Risk> {
        Ok(Risk {
            probability: decode_level("probability", self.probability)?,
            impact: decode_level("impact", self.impact)?,
            priority: decode("priority", &self.priority)?,
            response: decode("response", &self.response)?,
            status: decode("status", &self.status)?,
            date_identified: decode_date("date_identified", &self.date_identified)?,
            date_resolved: decode_opt_date("date_resolved", self.date_resolved.as_deref())?,
            last_reviewed: decode_timestamp("last_reviewed", &self.last_reviewed)?,
            status_history,
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            owner: self.owner,
            mitigation: self.mitigation,
        })
    }
}

struct HistoryRow {
    risk_id: String,
    changed_at: String,
    status: String,
    note: String,
}

impl HistoryRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            risk_id: row.get(0)?,
            changed_at: row.get(1)?,
            status: row.get(2)?,
            note: row.get(3)?,
        })
    }

    fn into_change(self) -> Result<StatusChange> {
        Ok(StatusChange {
            date: decode_timestamp("changed_at", &self.changed_at)?,
            status: decode("status", &self.status)?,
            note: self.note,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{Priority, RiskInput, RiskStatus};
    use chrono::{NaiveDate, TimeZone};

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_project(id: &str) -> Project {
        let mut project = Project::new(
            id,
            ProjectMeta {
                project_name: format!("Project {id}"),
                project_manager: "Dana".to_string(),
                start_date: Some(date(2024, 1, 1)),
                end_date: Some(date(2024, 6, 30)),
                ..ProjectMeta::default()
            },
        );
        project.add_category("Technical");
        project.add_category("Schedule");
        project
    }

    fn create_test_risk(id: &str, p: u8, i: u8) -> Risk {
        let input = RiskInput {
            title: format!("Risk {id}"),
            description: "Something may go wrong".to_string(),
            category: "Technical".to_string(),
            probability: p,
            impact: i,
            owner: "Sam".to_string(),
            mitigation: "Watch it".to_string(),
            date_identified: date(2024, 1, 5),
            ..RiskInput::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 9, 30, 0).unwrap();
        Risk::create(id.to_string(), input, "identified", now)
    }

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_insert_and_get_project() {
        let storage = create_test_storage();
        let mut project = create_test_project("p1");
        project.risks.push(create_test_risk("r1", 3, 4));
        storage.insert_project(&project).unwrap();

        let loaded = storage.get_project("p1").unwrap().unwrap();
        assert_eq!(loaded, project);
        assert_eq!(loaded.categories, vec!["Technical", "Schedule"]);
    }

    #[test]
    fn test_get_nonexistent_project() {
        let storage = create_test_storage();
        assert!(storage.get_project("missing").unwrap().is_none());
        assert!(!storage.project_exists("missing").unwrap());
    }

    #[test]
    fn test_duplicate_project_rejected() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        assert!(storage.insert_project(&create_test_project("p1")).is_err());
    }

    #[test]
    fn test_list_projects_summaries() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("b")).unwrap();
        storage.insert_project(&create_test_project("a")).unwrap();
        storage.insert_risk("a", &create_test_risk("r1", 2, 2)).unwrap();
        storage.insert_risk("a", &create_test_risk("r2", 4, 4)).unwrap();

        let summaries = storage.list_projects().unwrap();
        assert_eq!(summaries.len(), 2);
        // creation order, not id order
        assert_eq!(summaries[0].id, "b");
        assert_eq!(summaries[0].risk_count, 0);
        assert!(summaries[0].aggregated_score.abs() < f64::EPSILON);
        assert_eq!(summaries[1].risk_count, 2);
        assert!((summaries[1].aggregated_score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_meta() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();

        let meta = ProjectMeta {
            project_name: "Renamed".to_string(),
            end_date: None,
            ..storage.get_meta("p1").unwrap().unwrap()
        };
        assert!(storage.update_meta("p1", &meta).unwrap());
        assert_eq!(storage.get_meta("p1").unwrap().unwrap(), meta);

        assert!(!storage.update_meta("missing", &meta).unwrap());
    }

    #[test]
    fn test_set_categories_replaces_list() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();

        storage
            .set_categories("p1", &["Budget".to_string(), "Legal".to_string()])
            .unwrap();
        assert_eq!(storage.categories("p1").unwrap(), vec!["Budget", "Legal"]);

        storage.set_categories("p1", &[]).unwrap();
        assert!(storage.categories("p1").unwrap().is_empty());
    }

    #[test]
    fn test_delete_project_cascades() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        storage.insert_risk("p1", &create_test_risk("r1", 1, 1)).unwrap();

        assert!(storage.delete_project("p1").unwrap());
        assert!(!storage.delete_project("p1").unwrap());

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_projects, 0);
        assert_eq!(stats.total_risks, 0);
        assert_eq!(stats.total_history_entries, 0);
        assert!(storage.categories("p1").unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_get_risk() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        let risk = create_test_risk("r1", 3, 5);
        storage.insert_risk("p1", &risk).unwrap();

        let loaded = storage.get_risk("p1", "r1").unwrap().unwrap();
        assert_eq!(loaded, risk);
        assert_eq!(loaded.status_history.len(), 1);
        assert_eq!(loaded.status_history[0].note, "identified");
        assert!(storage.risk_exists("p1", "r1").unwrap());
    }

    #[test]
    fn test_insert_risk_unknown_project() {
        let storage = create_test_storage();
        let err = storage
            .insert_risk("missing", &create_test_risk("r1", 1, 1))
            .unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound { .. }));
    }

    #[test]
    fn test_import_into_writes_everything() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        storage.insert_risk("p1", &create_test_risk("r1", 1, 1)).unwrap();

        let meta = ProjectMeta {
            project_name: "Imported".to_string(),
            ..ProjectMeta::default()
        };
        let categories = vec!["Technical".to_string(), "Legal".to_string()];
        let risks = vec![create_test_risk("r2", 2, 2), create_test_risk("r3", 3, 3)];
        storage
            .import_into("p1", &risks, Some(&meta), Some(&categories))
            .unwrap();

        let project = storage.get_project("p1").unwrap().unwrap();
        assert_eq!(project.meta, meta);
        assert_eq!(project.categories, categories);
        let ids: Vec<&str> = project.risks.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_import_into_rolls_back_on_failure() {
        let storage = create_test_storage();
        let original = create_test_project("p1");
        storage.insert_project(&original).unwrap();

        let meta = ProjectMeta {
            project_name: "Never saved".to_string(),
            ..ProjectMeta::default()
        };
        let categories = vec!["Legal".to_string()];
        // second risk clashes with the first
        let risks = vec![create_test_risk("r1", 2, 2), create_test_risk("r1", 3, 3)];
        assert!(storage
            .import_into("p1", &risks, Some(&meta), Some(&categories))
            .is_err());

        let project = storage.get_project("p1").unwrap().unwrap();
        assert_eq!(project, original);
        assert_eq!(storage.stats().unwrap().total_history_entries, 0);

        let err = storage.import_into("missing", &[], None, None).unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound { .. }));
    }

    #[test]
    fn test_risks_scoped_to_project() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        storage.insert_project(&create_test_project("p2")).unwrap();
        storage.insert_risk("p1", &create_test_risk("r1", 1, 1)).unwrap();

        assert!(storage.get_risk("p2", "r1").unwrap().is_none());
        assert!(storage.list_risks("p2").unwrap().is_empty());
    }

    #[test]
    fn test_list_risks_keeps_insertion_order() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        for id in ["z", "a", "m"] {
            storage.insert_risk("p1", &create_test_risk(id, 2, 3)).unwrap();
        }

        let ids: Vec<String> = storage
            .list_risks("p1")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_update_risk_rewrites_fields_and_history() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        storage.insert_risk("p1", &create_test_risk("a", 1, 1)).unwrap();
        storage.insert_risk("p1", &create_test_risk("b", 1, 1)).unwrap();

        let mut risk = storage.get_risk("p1", "a").unwrap().unwrap();
        let input = RiskInput {
            status: RiskStatus::InProgress,
            priority: Priority::High,
            date_resolved: Some(date(2024, 3, 1)),
            ..risk.to_input()
        };
        risk.apply(input, "working on it", Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap());
        assert!(storage.update_risk("p1", &risk).unwrap());

        let loaded = storage.get_risk("p1", "a").unwrap().unwrap();
        assert_eq!(loaded, risk);
        assert_eq!(loaded.status_history.len(), 2);
        assert_eq!(loaded.status_history[1].status, RiskStatus::InProgress);

        // position is unchanged
        assert_eq!(storage.list_risks("p1").unwrap()[0].id, "a");
    }

    #[test]
    fn test_update_missing_risk() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        assert!(!storage
            .update_risk("p1", &create_test_risk("ghost", 1, 1))
            .unwrap());
    }

    #[test]
    fn test_delete_risk() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        storage.insert_risk("p1", &create_test_risk("r1", 1, 1)).unwrap();

        assert!(storage.delete_risk("p1", "r1").unwrap());
        assert!(storage.get_risk("p1", "r1").unwrap().is_none());
        assert!(!storage.delete_risk("p1", "r1").unwrap());
        assert_eq!(storage.stats().unwrap().total_history_entries, 0);
    }

    #[test]
    fn test_corrupt_status_reported() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        storage.insert_risk("p1", &create_test_risk("r1", 1, 1)).unwrap();
        storage
            .conn
            .execute("UPDATE risks SET status = 'Exploded'", [])
            .unwrap();

        let err = storage.get_risk("p1", "r1").unwrap_err();
        assert!(matches!(err, Error::CorruptValue { column: "status", .. }));
    }

    #[test]
    fn test_generate_id_unique_and_increasing() {
        let storage = create_test_storage();
        let first: i64 = storage.generate_id().unwrap().parse().unwrap();
        let second: i64 = storage.generate_id().unwrap().parse().unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_generate_id_skips_used_ids() {
        let storage = create_test_storage();
        let future = (Utc::now().timestamp_millis() + 60_000).to_string();
        storage.insert_project(&create_test_project(&future)).unwrap();
        storage.last_id.set(future.parse::<i64>().unwrap() - 1);

        let id = storage.generate_id().unwrap();
        assert_ne!(id, future);
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();

        assert_eq!(stats.total_projects, 0);
        assert_eq!(stats.total_risks, 0);
        assert_eq!(stats.schema_version, migrations::CURRENT_VERSION);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_unicode_content() {
        let storage = create_test_storage();
        storage.insert_project(&create_test_project("p1")).unwrap();
        let mut risk = create_test_risk("r1", 2, 2);
        risk.title = "Lieferverzug 🚚 – Ünïcödé".to_string();
        storage.insert_risk("p1", &risk).unwrap();

        let loaded = storage.get_risk("p1", "r1").unwrap().unwrap();
        assert_eq!(loaded.title, "Lieferverzug 🚚 – Ünïcödé");
    }

    #[test]
    fn test_open_file_based() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("riskregister_test_{}.db", std::process::id()));

        {
            let storage = Storage::open(&db_path).unwrap();
            let mut project = create_test_project("p1");
            project.risks.push(create_test_risk("r1", 4, 2));
            storage.insert_project(&project).unwrap();
            assert_eq!(storage.path(), db_path);
            assert!(storage.stats().unwrap().db_size_bytes > 0);
        }

        // reopen and read back
        let storage = Storage::open(&db_path).unwrap();
        let project = storage.get_project("p1").unwrap().unwrap();
        assert_eq!(project.risks.len(), 1);
        assert_eq!(project.risks[0].score(), 8);

        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let nested_path = temp_dir.join(format!(
            "riskregister_test_{}/nested/db.sqlite",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }
}
