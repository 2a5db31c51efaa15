//! SQLite-backed record store

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::record::{NewStudent, StudentPatch, StudentRecord};
use super::RecordStore;

/// Connection strings that select an in-memory database
const MEMORY_URLS: [&str; 2] = [":memory:", "sqlite::memory:"];

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    remote_image_url TEXT,
    local_image_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_students_remote
    ON students(remote_image_url) WHERE remote_image_url IS NOT NULL;
"#;

const SELECT_COLUMNS: &str = "SELECT id, name, age, remote_image_url, local_image_url FROM students";

/// Record store over a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store named by a connection string
    ///
    /// Accepts a file path, a `sqlite://` URL, or `:memory:` / `sqlite::memory:`.
    pub fn open(database_url: &str) -> Result<Self> {
        if MEMORY_URLS.contains(&database_url) {
            return Self::in_memory();
        }

        let path = Path::new(database_url.strip_prefix("sqlite://").unwrap_or(database_url));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        info!(path = %path.display(), "Record store opened");
        Self::with_connection(conn)
    }

    /// Open a private in-memory store
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        debug!("In-memory record store opened");
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to run record store migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("Record store lock poisoned: {}", e))
    }

    fn query_all(&self, sql: &str) -> Result<Vec<StudentRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).context("Failed to prepare query")?;
        let records = stmt
            .query_map([], StudentRecord::from_row)
            .context("Failed to query students")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read student row")?;
        Ok(records)
    }
}

impl RecordStore for SqliteStore {
    fn insert(&self, student: NewStudent) -> Result<StudentRecord> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO students (id, name, age) VALUES (?1, ?2, ?3)",
            params![id, student.name, student.age],
        )
        .context("Failed to insert student")?;

        debug!(id = %id, "Inserted student");
        Ok(StudentRecord {
            id,
            name: student.name,
            age: student.age,
            remote_image_url: None,
            local_image_url: None,
        })
    }

    fn list(&self) -> Result<Vec<StudentRecord>> {
        self.query_all(&format!("{} ORDER BY rowid", SELECT_COLUMNS))
    }

    fn get(&self, id: &str) -> Result<Option<StudentRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            StudentRecord::from_row,
        )
        .optional()
        .context("Failed to load student")
    }

    fn update(&self, id: &str, patch: &StudentPatch) -> Result<bool> {
        let conn = self.lock()?;
        let matched = conn
            .execute(
                "UPDATE students SET
                    name = COALESCE(?2, name),
                    age = COALESCE(?3, age),
                    remote_image_url = CASE WHEN ?4 THEN ?5 ELSE remote_image_url END,
                    local_image_url = COALESCE(?6, local_image_url)
                 WHERE id = ?1",
                params![
                    id,
                    patch.name,
                    patch.age,
                    patch.remote_image_url.is_some(),
                    patch.remote_image_url.clone().flatten(),
                    patch.local_image_url
                ],
            )
            .context("Failed to update student")?;

        debug!(id = id, matched = matched, "Updated student");
        Ok(matched > 0)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM students WHERE id = ?1", params![id])
            .context("Failed to delete student")?;
        Ok(removed > 0)
    }

    fn with_remote_image(&self) -> Result<Vec<StudentRecord>> {
        self.query_all(&format!(
            "{} WHERE remote_image_url IS NOT NULL AND remote_image_url != '' ORDER BY rowid",
            SELECT_COLUMNS
        ))
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))
            .context("Failed to count students")?;
        Ok(count as usize)
    }
}
