//! SQLite backend for single-host deployments.
//!
//! Records and queue entries live in two tables of one database file.
//! All access is serialized through a `Mutex<Connection>` and runs on the
//! blocking thread pool. Several processes may share the file: dequeue is
//! a single `DELETE ... RETURNING` statement, so each entry is handed out
//! exactly once.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clipper_models::{Job, JobId, JobUpdate};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;

use crate::error::{QueueError, QueueResult};
use crate::store::{JobRecordStore, WorkQueue};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS queue (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id      TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_queue_order ON queue (enqueued_at, seq);
";

/// Cheaply cloneable handle to a SQLite-backed store and queue.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Opens (or creates) the database at the given path.
    pub fn open(path: &Path) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    QueueError::config(format!(
                        "cannot create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %path.display(), "SQLite job store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing.
    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with the locked connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&mut Connection) -> QueueResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| QueueError::connection_failed("SQLite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| QueueError::connection_failed(format!("SQLite task failed: {}", e)))?
    }
}

fn load(conn: &Connection, id: &str) -> QueueResult<Option<Job>> {
    let data: Option<String> = conn
        .query_row("SELECT data FROM jobs WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;

    match data {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl JobRecordStore for SqliteBackend {
    async fn create(&self, job: &Job) -> QueueResult<()> {
        let job = job.clone();
        self.with_conn(move |conn| {
            let data = serde_json::to_string(&job)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO jobs (id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    job.id.as_str(),
                    data,
                    job.created_at.timestamp_millis(),
                    job.updated_at.timestamp_millis()
                ],
            )?;
            if inserted == 0 {
                return Err(QueueError::duplicate_id(job.id.as_str()));
            }
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &JobId) -> QueueResult<Option<Job>> {
        let id = id.clone();
        self.with_conn(move |conn| load(conn, id.as_str())).await
    }

    async fn update(&self, id: &JobId, update: &JobUpdate) -> QueueResult<Job> {
        let id = id.clone();
        let update = update.clone();
        self.with_conn(move |conn| {
            // Write lock held across the read-modify-write.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut job = load(&tx, id.as_str())?.ok_or_else(|| QueueError::not_found(id.as_str()))?;
            job.apply(&update)?;

            tx.execute(
                "UPDATE jobs SET data = ?2, updated_at = ?3 WHERE id = ?1",
                params![
                    id.as_str(),
                    serde_json::to_string(&job)?,
                    job.updated_at.timestamp_millis()
                ],
            )?;
            tx.commit()?;
            Ok(job)
        })
        .await
    }

    async fn ping(&self) -> QueueResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl WorkQueue for SqliteBackend {
    async fn enqueue(&self, id: &JobId) -> QueueResult<()> {
        let id = id.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO queue (job_id, enqueued_at) VALUES (?1, ?2)",
                params![id.as_str(), chrono::Utc::now().timestamp_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn dequeue(&self) -> QueueResult<Option<JobId>> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id: Option<String> = tx
                .query_row(
                    "DELETE FROM queue
                     WHERE seq = (SELECT seq FROM queue ORDER BY enqueued_at, seq LIMIT 1)
                     RETURNING job_id",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            tx.commit()?;
            Ok(id.map(JobId::from))
        })
        .await
    }

    async fn len(&self) -> QueueResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
            Ok(count.max(0) as usize)
        })
        .await
    }
}
