// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent job store backed by SQLite.
//
// Every status change runs in one immediate transaction that updates the job
// row (guarded on the status it was read with) and appends exactly one
// history row. Payload bytes are stored inline; the spool never inspects
// them.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info, instrument, warn};

use bonspool_core::error::{Result, SpoolError};
use bonspool_core::types::{
    ANONYMOUS_USER, HistoryEntry, Job, JobId, JobPage, JobQuery, JobStatus, NewJob, PrinterId,
    SYSTEM_ACTOR,
};

use crate::db::{db_err, format_ts, open_file, open_memory, parse_col, parse_opt_ts, parse_ts};

const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL CHECK (status IN
            ('pending', 'approved', 'rejected', 'printing', 'completed', 'failed')),
        payload BLOB NOT NULL,
        payload_hash TEXT NOT NULL,
        printer_id TEXT,
        submitted_by TEXT NOT NULL,
        notes TEXT,
        modified INTEGER NOT NULL DEFAULT 0,
        original_payload BLOB,
        modified_markup TEXT,
        chain_depth INTEGER NOT NULL DEFAULT 0 CHECK (chain_depth >= 0),
        origin_service TEXT,
        trace_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status) WHERE deleted_at IS NULL;
    CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs (created_at);
    CREATE INDEX IF NOT EXISTS idx_jobs_trace ON jobs (trace_id);

    CREATE TABLE IF NOT EXISTS job_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL REFERENCES jobs (id) ON DELETE CASCADE,
        from_status TEXT NOT NULL,
        to_status TEXT NOT NULL,
        actor TEXT NOT NULL,
        notes TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_job_history_job ON job_history (job_id, id);
"#;

const JOB_COLUMNS: &str = "id, status, payload, payload_hash, printer_id, submitted_by, notes,
    modified, original_payload, modified_markup, chain_depth, origin_service, trace_id,
    created_at, updated_at, deleted_at";

/// Persistent job store.
///
/// Calls are synchronous and short; the connection sits behind a mutex so
/// the store can be shared across tasks. The guard is never held across an
/// `.await`.
pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    /// Open (or create) the job database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = open_file(path.as_ref())?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create job tables"))?;
        info!("job store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an isolated in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = open_memory()?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create job tables"))?;
        debug!("in-memory job store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SpoolError::Database("job store lock poisoned".into()))
    }

    /// Persist a new job in `pending`. Creation writes no history row.
    #[instrument(skip(self, request), fields(bytes = request.payload.len()))]
    pub fn create(&self, request: NewJob) -> Result<Job> {
        let job = Job::new(request)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO jobs ({JOB_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                job.id.to_string(),
                job.status.as_str(),
                job.payload,
                job.payload_hash,
                job.printer_id.map(|p| p.to_string()),
                job.user,
                job.notes,
                job.modified,
                job.original_payload,
                job.modified_markup,
                job.chain_depth,
                job.origin_service,
                job.trace_id,
                format_ts(&job.created_at),
                format_ts(&job.updated_at),
                Option::<String>::None,
            ],
        )
        .map_err(db_err("insert job"))?;

        info!(
            job_id = %job.id,
            trace_id = %job.trace_id,
            chain_depth = job.chain_depth,
            "job created"
        );
        Ok(job)
    }

    /// Fetch an active job. Soft-deleted jobs read as absent.
    pub fn get(&self, id: &JobId) -> Result<Option<Job>> {
        let conn = self.conn()?;
        fetch_job(&conn, id)
    }

    /// Like [`get`](Self::get) but a missing job is an error.
    pub fn require(&self, id: &JobId) -> Result<Job> {
        self.get(id)?.ok_or(SpoolError::JobNotFound(*id))
    }

    pub fn approve(&self, id: &JobId, user: &str) -> Result<Job> {
        self.transition(id, JobStatus::Approved, actor_or_anonymous(user), None)
    }

    pub fn reject(&self, id: &JobId, reason: &str, user: &str) -> Result<Job> {
        let reason = reason.trim();
        let notes = (!reason.is_empty()).then_some(reason);
        self.transition(id, JobStatus::Rejected, actor_or_anonymous(user), notes)
    }

    pub(crate) fn mark_printing(&self, id: &JobId, notes: Option<&str>) -> Result<Job> {
        self.transition(id, JobStatus::Printing, SYSTEM_ACTOR, notes)
    }

    pub(crate) fn mark_completed(&self, id: &JobId, notes: Option<&str>) -> Result<Job> {
        self.transition(id, JobStatus::Completed, SYSTEM_ACTOR, notes)
    }

    pub(crate) fn mark_failed(&self, id: &JobId, notes: Option<&str>) -> Result<Job> {
        self.transition(id, JobStatus::Failed, SYSTEM_ACTOR, notes)
    }

    /// Validate and apply one status change plus its history row.
    #[instrument(skip_all, fields(job_id = %id, to = %to))]
    fn transition(
        &self,
        id: &JobId,
        to: JobStatus,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<Job> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("begin transition"))?;

        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM jobs WHERE id = ?1 AND deleted_at IS NULL",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("read job status"))?;
        let from: JobStatus = current.ok_or(SpoolError::JobNotFound(*id))?.parse()?;

        if let Err(e) = from.check_transition(to) {
            warn!(job_id = %id, %from, %to, "rejected invalid transition");
            return Err(e);
        }

        let now = format_ts(&Utc::now());
        let rows = tx
            .execute(
                "UPDATE jobs SET status = ?1, notes = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = ?5 AND deleted_at IS NULL",
                params![to.as_str(), notes, now, id.to_string(), from.as_str()],
            )
            .map_err(db_err("update job status"))?;
        if rows != 1 {
            return Err(SpoolError::InvalidTransition { from, to });
        }

        tx.execute(
            "INSERT INTO job_history (job_id, from_status, to_status, actor, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id.to_string(), from.as_str(), to.as_str(), actor, notes, now],
        )
        .map_err(db_err("append job history"))?;

        tx.commit().map_err(db_err("commit transition"))?;

        info!(job_id = %id, %from, %to, actor, "job transitioned");
        fetch_job(&conn, id)?.ok_or(SpoolError::JobNotFound(*id))
    }

    /// Replace stored payload bytes without touching the digest.
    #[cfg(test)]
    pub(crate) fn overwrite_payload(&self, id: &JobId, payload: &[u8]) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE jobs SET payload = ?1 WHERE id = ?2",
                params![payload, id.to_string()],
            )
            .map_err(db_err("overwrite payload"))?;
        Ok(())
    }

    /// One page of active jobs, newest first, plus the total match count.
    #[instrument(skip(self))]
    pub fn list(&self, query: JobQuery) -> Result<JobPage> {
        let query = query.normalized();
        let status = query.status.map(|s| s.as_str());
        let conn = self.conn()?;

        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM jobs
                 WHERE deleted_at IS NULL AND (?1 IS NULL OR status = ?1)",
                params![status],
                |row| row.get(0),
            )
            .map_err(db_err("count jobs"))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE deleted_at IS NULL AND (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))
            .map_err(db_err("prepare list jobs"))?;
        let jobs = stmt
            .query_map(params![status, query.limit, query.offset], row_to_job)
            .map_err(db_err("query list jobs"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect job rows"))?;

        debug!(count = jobs.len(), total, "listed jobs");
        Ok(JobPage {
            jobs,
            total: total.max(0) as u64,
            limit: query.limit,
            offset: query.offset,
        })
    }

    /// Number of active jobs, optionally restricted to one status.
    pub fn count(&self, status: Option<JobStatus>) -> Result<u64> {
        let conn = self.conn()?;
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM jobs
                 WHERE deleted_at IS NULL AND (?1 IS NULL OR status = ?1)",
                params![status.map(|s| s.as_str())],
                |row| row.get(0),
            )
            .map_err(db_err("count jobs"))?;
        Ok(total.max(0) as u64)
    }

    /// Soft-delete a `pending` or `rejected` job. Status is unchanged, so no
    /// history row is written.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn delete(&self, id: &JobId) -> Result<Job> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("begin delete"))?;

        let mut job = fetch_job(&tx, id)?.ok_or(SpoolError::JobNotFound(*id))?;
        if !job.status.is_deletable() {
            return Err(SpoolError::JobNotDeletable {
                id: *id,
                status: job.status,
            });
        }

        let now = Utc::now();
        tx.execute(
            "UPDATE jobs SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![format_ts(&now), id.to_string()],
        )
        .map_err(db_err("soft delete job"))?;
        tx.commit().map_err(db_err("commit delete"))?;

        job.deleted_at = Some(now);
        job.updated_at = now;
        info!(job_id = %id, status = %job.status, "job soft-deleted");
        Ok(job)
    }

    /// Soft-delete every sweepable job whose last transition is at least
    /// `age_days` old. Returns the number of jobs swept.
    #[instrument(skip(self))]
    pub fn cleanup(&self, age_days: u32) -> Result<usize> {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::days(i64::from(age_days));
        let sweepable = JobStatus::ALL
            .iter()
            .filter(|s| s.is_sweepable())
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE jobs SET deleted_at = ?1
             WHERE deleted_at IS NULL
               AND status IN ({sweepable})
               AND updated_at <= ?2"
        );
        let conn = self.conn()?;
        let swept = conn
            .execute(&sql, params![format_ts(&now), format_ts(&cutoff)])
            .map_err(db_err("sweep finished jobs"))?;
        info!(swept, age_days, "finished jobs swept");
        Ok(swept)
    }

    /// Transition log for a job, oldest first. Available after soft delete.
    pub fn history(&self, id: &JobId) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM jobs WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("check job exists"))?;
        if exists.is_none() {
            return Err(SpoolError::JobNotFound(*id));
        }

        let mut stmt = conn
            .prepare(
                "SELECT id, job_id, from_status, to_status, actor, notes, created_at
                 FROM job_history WHERE job_id = ?1 ORDER BY id ASC",
            )
            .map_err(db_err("prepare history"))?;
        let entries = stmt
            .query_map(params![id.to_string()], row_to_history)
            .map_err(db_err("query history"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect history rows"))?;
        Ok(entries)
    }
}

fn actor_or_anonymous(user: &str) -> &str {
    let user = user.trim();
    if user.is_empty() { ANONYMOUS_USER } else { user }
}

fn fetch_job(conn: &Connection, id: &JobId) -> Result<Option<Job>> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1 AND deleted_at IS NULL"),
        params![id.to_string()],
        row_to_job,
    )
    .optional()
    .map_err(db_err("get job"))
}

/// Map a database row to a [`Job`].
fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let id: String = row.get(0)?;
    let status: String = row.get(1)?;
    let printer_id: Option<String> = row.get(4)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(Job {
        id: parse_col::<JobId>(0, &id)?,
        status: parse_col::<JobStatus>(1, &status)?,
        payload: row.get(2)?,
        payload_hash: row.get(3)?,
        printer_id: printer_id
            .map(|p| parse_col::<PrinterId>(4, &p))
            .transpose()?,
        user: row.get(5)?,
        notes: row.get(6)?,
        modified: row.get(7)?,
        original_payload: row.get(8)?,
        modified_markup: row.get(9)?,
        chain_depth: row.get(10)?,
        origin_service: row.get(11)?,
        trace_id: row.get(12)?,
        created_at: parse_ts(13, &created_at)?,
        updated_at: parse_ts(14, &updated_at)?,
        deleted_at: parse_opt_ts(15, row.get(15)?)?,
    })
}

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let job_id: String = row.get(1)?;
    let from: String = row.get(2)?;
    let to: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    Ok(HistoryEntry {
        id: row.get(0)?,
        job_id: parse_col::<JobId>(1, &job_id)?,
        from_status: parse_col::<JobStatus>(2, &from)?,
        to_status: parse_col::<JobStatus>(3, &to)?,
        actor: row.get(4)?,
        notes: row.get(5)?,
        created_at: parse_ts(6, &created_at)?,
    })
}
