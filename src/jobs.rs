//! Durable job records for batches submitted to the status service.
//!
//! Every job keeps its input keys at `{storage_dir}/{id}.input.txt` and its
//! results at `{storage_dir}/{id}.txt`. The record table itself is written
//! to `{storage_dir}/jobs.json` on every status transition (not on every
//! progress tick), so job status survives a restart. Jobs found running or
//! queued when the store is reopened can never finish and are marked failed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subsift_core::{JobTracker, LookupMode};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{AppError, Result};

const SNAPSHOT_FILE: &str = "jobs.json";
const SNAPSHOT_VERSION: u32 = 1;

/// Message recorded on jobs that were in flight when the process stopped.
pub const INTERRUPTED: &str = "interrupted";

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub mode: LookupMode,
    /// Keys processed so far.
    pub progress: usize,
    /// Keys in the batch.
    pub total: usize,
    /// Stored input keys.
    pub input: PathBuf,
    /// Results file.
    pub output: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobSnapshot {
    version: u32,
    jobs: Vec<JobRecord>,
}

/// Thread-safe table of job records backed by a directory.
#[derive(Debug)]
pub struct JobStore {
    dir: PathBuf,
    jobs: Mutex<HashMap<Uuid, JobRecord>>,
}

impl JobStore {
    /// Open the store at `dir`, creating the directory and loading any
    /// previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Job`] if the directory cannot be created or an
    /// existing snapshot cannot be parsed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AppError::Job(format!("cannot create {}: {e}", dir.display())))?;

        let snapshot = load_snapshot(&dir.join(SNAPSHOT_FILE))?;
        let mut interrupted = 0usize;
        let now = Utc::now();
        let jobs = snapshot
            .jobs
            .into_iter()
            .map(|mut job| {
                if !job.status.is_terminal() {
                    job.status = JobStatus::Failed;
                    job.error = Some(INTERRUPTED.to_owned());
                    job.updated_at = now;
                    interrupted += 1;
                }
                (job.id, job)
            })
            .collect();

        let store = Self {
            dir,
            jobs: Mutex::new(jobs),
        };
        if interrupted > 0 {
            info!(interrupted, "marked unfinished jobs as failed");
            store.persist(&store.lock());
        }
        debug!(dir = %store.dir.display(), "opened job store");
        Ok(store)
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register a new queued job and store its input keys.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Job`] if the input file cannot be written.
    pub fn create(&self, mode: LookupMode, keys: &[String]) -> Result<JobRecord> {
        let id = Uuid::new_v4();
        let input = self.dir.join(format!("{id}.input.txt"));
        let output = self.dir.join(format!("{id}.txt"));

        let mut body = keys.join("\n");
        body.push('\n');
        std::fs::write(&input, body)
            .map_err(|e| AppError::Job(format!("cannot store input for {id}: {e}")))?;

        let now = Utc::now();
        let record = JobRecord {
            id,
            status: JobStatus::Queued,
            mode,
            progress: 0,
            total: keys.len(),
            input,
            output,
            error: None,
            created_at: now,
            updated_at: now,
        };

        let mut jobs = self.lock();
        jobs.insert(id, record.clone());
        self.persist(&jobs);
        info!(%id, %mode, total = record.total, "job queued");
        Ok(record)
    }

    /// Current record for `id`.
    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.lock().get(&id).cloned()
    }

    /// Every record, oldest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.lock().values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Remove a job and its stored input and output. Returns `false` for an
    /// unknown id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Job`] if an artifact exists but cannot be removed.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut jobs = self.lock();
        let Some(record) = jobs.remove(&id) else {
            return Ok(false);
        };
        self.persist(&jobs);
        drop(jobs);

        for path in [&record.input, &record.output] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::Job(format!(
                        "cannot remove {}: {e}",
                        path.display()
                    )));
                }
            }
        }
        info!(%id, "job deleted");
        Ok(true)
    }

    /// A [`JobTracker`] that writes batch transitions into record `id`.
    pub fn tracker(self: &Arc<Self>, id: Uuid) -> JobHandle {
        JobHandle {
            store: Arc::clone(self),
            id,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to record `id`, persisting when `transition` is set.
    fn update(&self, id: Uuid, transition: bool, f: impl FnOnce(&mut JobRecord)) {
        let mut jobs = self.lock();
        let Some(record) = jobs.get_mut(&id) else {
            debug!(%id, "update for unknown job ignored");
            return;
        };
        f(record);
        record.updated_at = Utc::now();
        if transition {
            self.persist(&jobs);
        }
    }

    fn persist(&self, jobs: &HashMap<Uuid, JobRecord>) {
        let mut records: Vec<JobRecord> = jobs.values().cloned().collect();
        records.sort_by_key(|j| j.created_at);
        let snapshot = JobSnapshot {
            version: SNAPSHOT_VERSION,
            jobs: records,
        };
        if let Err(e) = save_snapshot(&self.dir.join(SNAPSHOT_FILE), &snapshot) {
            error!("cannot persist job store: {e}");
        }
    }
}

/// Job tracker bound to one record of a [`JobStore`].
#[derive(Debug, Clone)]
pub struct JobHandle {
    store: Arc<JobStore>,
    id: Uuid,
}

impl JobHandle {
    /// The tracked job id.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl JobTracker for JobHandle {
    fn mark_running(&self, total: usize) {
        self.store.update(self.id, true, |job| {
            job.status = JobStatus::Running;
            job.total = total;
            job.progress = 0;
        });
    }

    fn set_progress(&self, completed: usize, total: usize) {
        self.store.update(self.id, false, |job| {
            job.progress = completed;
            job.total = total;
        });
    }

    fn mark_completed(&self) {
        self.store.update(self.id, true, |job| {
            job.status = JobStatus::Completed;
            job.error = None;
        });
        info!(id = %self.id, "job completed");
    }

    fn mark_failed(&self, message: &str) {
        self.store.update(self.id, true, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(message.to_owned());
        });
        error!(id = %self.id, error = %message, "job failed");
    }
}

fn load_snapshot(path: &Path) -> Result<JobSnapshot> {
    let bytes = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(JobSnapshot::default());
        }
        Err(e) => return Err(AppError::Job(format!("cannot read job store: {e}"))),
    };
    serde_json::from_slice(&bytes).map_err(|e| AppError::Job(format!("cannot parse job store: {e}")))
}

fn save_snapshot(path: &Path, snapshot: &JobSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| AppError::Job(format!("cannot serialize job store: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| AppError::Job(format!("cannot write job store: {e}")))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| AppError::Job(format!("cannot replace job store: {e}")))?;
    Ok(())
}
