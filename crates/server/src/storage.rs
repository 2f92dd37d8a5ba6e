use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use taskflow_api::db::{Built, MIGRATIONS};
use taskflow_api::{
    ActivityResponse, DocumentResponse, InviteResponse, MemberResponse, ProjectResponse,
    TaskResponse, UserResponse,
};
use taskflow_core::analytics::TaskFacts;

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
}

impl Db {
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Root of the document blob store
    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    /// Write document bytes, return the storage key
    pub fn write_document(
        &self,
        project_id: &str,
        document_id: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let dir = self.documents_dir().join(project_id);
        std::fs::create_dir_all(&dir)?;
        let key = format!("{project_id}/{document_id}");
        std::fs::write(self.documents_dir().join(&key), bytes).context("writing document")?;
        Ok(key)
    }

    /// Read document bytes from disk
    pub fn read_document(&self, storage_key: &str) -> Result<Vec<u8>> {
        let path = self.documents_dir().join(storage_key);
        std::fs::read(&path).context("reading document")
    }

    /// Remove a document blob. Missing files are not an error.
    pub fn delete_document(&self, storage_key: &str) -> Result<()> {
        match std::fs::remove_file(self.documents_dir().join(storage_key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("deleting document"),
        }
    }

    /// Remove a project's blob directory once its rows are gone.
    pub fn delete_project_documents(&self, project_id: &str) -> Result<()> {
        match std::fs::remove_dir_all(self.documents_dir().join(project_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("deleting project documents"),
        }
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("taskflow.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // Enable WAL mode for better concurrent read performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
        data_dir: data_dir.to_path_buf(),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ── sea-query bridge ───────────────────────────────────────────────────────

/// Convert `sea_query::Values` into rusqlite bind params.
pub fn sql_params(values: &sea_query::Values) -> Vec<SqlValue> {
    use sea_query::Value;

    values
        .0
        .iter()
        .map(|v| match v {
            Value::Bool(Some(b)) => SqlValue::Integer(i64::from(*b)),
            Value::TinyInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
            Value::SmallInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
            Value::Int(Some(i)) => SqlValue::Integer(i64::from(*i)),
            Value::BigInt(Some(i)) => SqlValue::Integer(*i),
            Value::TinyUnsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
            Value::SmallUnsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
            Value::Unsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
            Value::BigUnsigned(Some(u)) => SqlValue::Integer(i64::try_from(*u).unwrap_or(i64::MAX)),
            Value::Float(Some(f)) => SqlValue::Real(f64::from(*f)),
            Value::Double(Some(f)) => SqlValue::Real(*f),
            Value::String(Some(s)) => SqlValue::Text(s.to_string()),
            Value::Char(Some(c)) => SqlValue::Text(c.to_string()),
            Value::Bytes(Some(b)) => SqlValue::Blob(b.to_vec()),
            _ => SqlValue::Null,
        })
        .collect()
}

pub fn execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, rusqlite::params_from_iter(sql_params(&values)))
}

pub fn query_row<T>(
    conn: &Connection,
    (sql, values): Built,
    f: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    conn.query_row(&sql, rusqlite::params_from_iter(sql_params(&values)), f)
}

pub fn query_opt<T>(
    conn: &Connection,
    built: Built,
    f: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Option<T>> {
    query_row(conn, built, f).optional()
}

pub fn query_all<T>(
    conn: &Connection,
    (sql, values): Built,
    f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(sql_params(&values)), f)?;
    rows.collect()
}

/// True when an error is a UNIQUE / PRIMARY KEY violation.
pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ── Row mappers ────────────────────────────────────────────────────────────

/// Read a text column into a `FromStr` enum.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a profile row (id, email, display_name, avatar_url, email_verified, created_at).
pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserResponse> {
    Ok(UserResponse {
        user_id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        email_verified: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn project_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectResponse> {
    Ok(ProjectResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: parse_col(row, 3)?,
        color: row.get(4)?,
        due_date: row.get(5)?,
        owner_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        role: None,
    })
}

/// Project row followed by the caller's membership role.
pub fn project_with_role_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectResponse> {
    let mut project = project_from_row(row)?;
    project.role = Some(parse_col(row, 9)?);
    Ok(project)
}

pub fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberResponse> {
    Ok(MemberResponse {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        role: parse_col(row, 3)?,
        joined_at: row.get(4)?,
    })
}

pub fn invite_from_row(row: &Row<'_>) -> rusqlite::Result<InviteResponse> {
    Ok(InviteResponse {
        id: row.get(0)?,
        project_id: row.get(1)?,
        project_name: row.get(2)?,
        email: row.get(3)?,
        role: parse_col(row, 4)?,
        status: parse_col(row, 5)?,
        invited_by: row.get(6)?,
        invited_by_name: row.get(7)?,
        created_at: row.get(8)?,
        expires_at: row.get(9)?,
    })
}

pub fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskResponse> {
    Ok(TaskResponse {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_col(row, 4)?,
        priority: parse_col(row, 5)?,
        assignee_id: row.get(6)?,
        assignee_name: row.get(7)?,
        due_date: row.get(8)?,
        position: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

pub fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityResponse> {
    let details: String = row.get(6)?;
    Ok(ActivityResponse {
        id: row.get(0)?,
        project_id: row.get(1)?,
        task_id: row.get(2)?,
        user_id: row.get(3)?,
        user_name: row.get(4)?,
        action: parse_col(row, 5)?,
        details: serde_json::from_str(&details).unwrap_or_else(|_| serde_json::json!({})),
        created_at: row.get(7)?,
    })
}

/// Document row with its storage key (last column).
pub fn document_from_row(row: &Row<'_>) -> rusqlite::Result<(DocumentResponse, String)> {
    Ok((
        DocumentResponse {
            id: row.get(0)?,
            project_id: row.get(1)?,
            task_id: row.get(2)?,
            name: row.get(3)?,
            content_type: row.get(4)?,
            size_bytes: row.get(5)?,
            uploaded_by: row.get(6)?,
            created_at: row.get(7)?,
        },
        row.get(8)?,
    ))
}

/// The calendar date of a `YYYY-MM-DD[ HH:MM:SS]` column.
fn date_prefix(s: &str) -> Option<NaiveDate> {
    s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Analytics row (status, priority, assignee_id, due_date, created_at, completed_at).
pub fn facts_from_row(row: &Row<'_>) -> rusqlite::Result<TaskFacts> {
    let due_date: Option<String> = row.get(3)?;
    let created_at: String = row.get(4)?;
    let completed_at: Option<String> = row.get(5)?;
    let created_on = date_prefix(&created_at).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("bad created_at '{created_at}'").into(),
        )
    })?;
    Ok(TaskFacts {
        status: parse_col(row, 0)?,
        priority: parse_col(row, 1)?,
        assignee_id: row.get(2)?,
        due_date: due_date.as_deref().and_then(date_prefix),
        created_on,
        completed_on: completed_at.as_deref().and_then(date_prefix),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        init_db(dir.path()).unwrap();
        let db = init_db(dir.path()).unwrap();
        let applied: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_builders_bind_through_converter() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        let conn = db.conn();
        execute(
            &conn,
            taskflow_api::db::users::insert("u1", "ada@example.com", "Ada", "h", "s"),
        )
        .unwrap();

        let user =
            query_row(&conn, taskflow_api::db::users::get_by_id("u1"), user_from_row).unwrap();
        assert_eq!(user.display_name, "Ada");
        assert!(!user.email_verified);

        let missing =
            query_opt(&conn, taskflow_api::db::users::get_by_id("nope"), user_from_row).unwrap();
        assert!(missing.is_none());

        let err = execute(
            &conn,
            taskflow_api::db::users::insert("u2", "ada@example.com", "Ada", "h", "s"),
        )
        .unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn test_document_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        let key = db.write_document("p1", "d1", b"hello").unwrap();
        assert_eq!(key, "p1/d1");
        assert_eq!(db.read_document(&key).unwrap(), b"hello");
        db.delete_document(&key).unwrap();
        db.delete_document(&key).unwrap();
        assert!(db.read_document(&key).is_err());
        db.delete_project_documents("p1").unwrap();
    }

    #[test]
    fn test_date_prefix() {
        assert_eq!(
            date_prefix("2026-02-03 10:11:12"),
            NaiveDate::from_ymd_opt(2026, 2, 3)
        );
        assert_eq!(date_prefix("2026-02-03"), NaiveDate::from_ymd_opt(2026, 2, 3));
        assert_eq!(date_prefix("bad"), None);
    }
}
