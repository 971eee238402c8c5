//! Jobs table persistence via `rusqlite`. One row per input row, with a
//! linear append-only status progression.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::ResolvedRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::persistence_error(format!("unknown job status: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_ref: Option<String>,
}

/// A thread-safe handle onto the jobs table. Cloned cheaply (shares the
/// connection via `Arc<Mutex<_>>`), matching the pattern used for
/// connection-pooled SQLite access elsewhere in this codebase.
#[derive(Clone)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::persistence_error(e.to_string()))?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::persistence_error(e.to_string()))?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                error_message TEXT,
                result_ref TEXT
            );",
        )
        .map_err(|e| Error::persistence_error(e.to_string()))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("jobs table connection lock poisoned");
        f(&conn).map_err(|e| Error::persistence_error(e.to_string()))
    }

    pub fn enqueue(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO jobs (id, status) VALUES (?1, 'pending')",
                params![id],
            )
            .map(|_| ())
        })
    }

    pub fn mark_processing(&self, id: &str, started_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET status = 'processing', started_at = ?2 WHERE id = ?1",
                params![id, started_at.to_rfc3339()],
            )
            .map(|_| ())
        })
    }

    pub fn mark_completed(&self, id: &str, completed_at: DateTime<Utc>, result_ref: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET status = 'completed', completed_at = ?2, result_ref = ?3 WHERE id = ?1",
                params![id, completed_at.to_rfc3339(), result_ref],
            )
            .map(|_| ())
        })
    }

    pub fn mark_failed(&self, id: &str, completed_at: DateTime<Utc>, error: &Error) -> Result<()> {
        let message = error.truncated_message(1000);
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET status = 'failed', completed_at = ?2, error_message = ?3 WHERE id = ?1",
                params![id, completed_at.to_rfc3339(), message],
            )
            .map(|_| ())
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<JobRow>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, status, started_at, completed_at, error_message, result_ref
                 FROM jobs WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .map(Some)
            .or_else(|e| {
                if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                    Ok(None)
                } else {
                    Err(e)
                }
            })
        })?;

        let Some((id, status, started_at, completed_at, error_message, result_ref)) = row else {
            return Ok(None);
        };

        Ok(Some(JobRow {
            id,
            status: JobStatus::from_str(&status)?,
            started_at: started_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
            completed_at: completed_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
            error_message,
            result_ref,
        }))
    }

    /// Serialize and persist a resolved record as the job's `result_ref`
    /// payload (a JSON blob keyed by job id in this simple single-table
    /// design; a production deployment would point `result_ref` at a blob
    /// store key instead).
    pub fn save_result(&self, id: &str, record: &ResolvedRecord, completed_at: DateTime<Utc>) -> Result<()> {
        let payload = serde_json::to_string(record).map_err(Error::Serialization)?;
        self.mark_completed(id, completed_at, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_are_linear() {
        let store = JobStore::open_in_memory().unwrap();
        store.enqueue("row-1").unwrap();
        let job = store.get("row-1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let now = Utc::now();
        store.mark_processing("row-1", now).unwrap();
        let job = store.get("row-1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.started_at.is_some());

        store.mark_completed("row-1", now, "{}").unwrap();
        let job = store.get("row-1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn missing_job_returns_none() {
        let store = JobStore::open_in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn mark_failed_truncates_error_message() {
        let store = JobStore::open_in_memory().unwrap();
        store.enqueue("row-1").unwrap();
        let err = Error::input_invalid("x".repeat(2000));
        store.mark_failed("row-1", Utc::now(), &err).unwrap();
        let job = store.get("row-1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.unwrap().chars().count(), 1000);
    }
}
