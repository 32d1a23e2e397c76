//! @ai:module:intent Durable submission records with at-most-once ingestion
//! @ai:module:layer infrastructure
//! @ai:module:public_api SubmissionStore, NewSubmission, SubmissionRow
//! @ai:module:stateless false

use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// @ai:intent A fully-formed record ready to be written
///
/// Scoring and parsing complete before an insert is attempted, so a partial
/// record can never reach the store.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub vars: String,
    pub unixtime: i64,
    pub kmpp: f64,
    pub spread: i64,
    pub path: String,
    pub config: String,
}

/// @ai:intent One stored submission row
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRow {
    pub id: i64,
    pub vars: String,
    pub unixtime: i64,
    pub kmpp: f64,
    pub spread: i64,
    pub path: String,
    pub config: String,
}

/// @ai:intent SQLite-backed submission store
///
/// The UNIQUE constraint on `path` is the true dedup guarantor; the
/// `exists` pre-check only avoids wasted scoring work.
pub struct SubmissionStore {
    conn: Connection,
}

impl SubmissionStore {
    /// @ai:intent Open (creating if needed) the store at the given path
    /// @ai:effects fs:write
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// @ai:intent In-memory store for tests
    /// @ai:effects pure
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS submissions (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              vars TEXT,
              unixtime INTEGER,
              kmpp REAL,
              spread INTEGER,
              path TEXT UNIQUE,
              config TEXT
            );
            CREATE INDEX IF NOT EXISTS submissions_config ON submissions (config);
            "#,
        )?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// @ai:intent Has this archive path already been recorded?
    /// @ai:effects fs:read
    pub fn exists(&self, path: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM submissions WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// @ai:intent Atomically record one submission
    ///
    /// Returns the assigned id. A UNIQUE violation on `path` means another
    /// writer raced us here and its record stands.
    /// @ai:effects fs:write
    pub fn insert(&self, submission: &NewSubmission) -> Result<i64> {
        let inserted = self.conn.execute(
            "INSERT INTO submissions (vars, unixtime, kmpp, spread, path, config)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                submission.vars,
                submission.unixtime,
                submission.kmpp,
                submission.spread,
                submission.path,
                submission.config,
            ],
        );

        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicatePath(submission.path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// @ai:intent Fetch the stored row for an archive path
    /// @ai:effects fs:read
    pub fn lookup_by_path(&self, path: &str) -> Result<Option<SubmissionRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, vars, unixtime, kmpp, spread, path, config
                 FROM submissions WHERE path = ?1",
                params![path],
                row_to_submission,
            )
            .optional()?;
        Ok(row)
    }

    /// @ai:intent Total number of stored submissions
    /// @ai:effects fs:read
    pub fn count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT count(*) FROM submissions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_submission(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubmissionRow> {
    Ok(SubmissionRow {
        id: row.get(0)?,
        vars: row.get(1)?,
        unixtime: row.get(2)?,
        kmpp: row.get(3)?,
        spread: row.get(4)?,
        path: row.get(5)?,
        config: row.get(6)?,
    })
}
