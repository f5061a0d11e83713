//! Job bookkeeping for hosts that run pipelines in the background.
//!
//! A host (an HTTP front end, a queue worker) injects a [`JobStore`] and
//! calls [`run_job`]; the store records the job as processing, then as
//! completed or failed. [`InMemoryJobStore`] forgets entries after a TTL.

use crate::config::{PodcastConfig, PodcastRequest};
use crate::podcast::{self, PipelineOutcome};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// State of one pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed { audio_path: PathBuf },
    Failed { error: String },
}

/// Key-value store of job states.
pub trait JobStore: Send + Sync {
    fn put(&self, job_id: &str, status: JobStatus);
    fn get(&self, job_id: &str) -> Option<JobStatus>;
    fn remove(&self, job_id: &str) -> Option<JobStatus>;
}

/// Process-local [`JobStore`] whose entries expire `ttl` after their last
/// update.
pub struct InMemoryJobStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, JobStatus)>>,
}

impl InMemoryJobStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, (updated, _)| updated.elapsed() < ttl);
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {} expired jobs", purged);
        }
        purged
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.purge_expired();
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (Instant, JobStatus)>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl JobStore for InMemoryJobStore {
    fn put(&self, job_id: &str, status: JobStatus) {
        self.lock()
            .insert(job_id.to_string(), (Instant::now(), status));
    }

    fn get(&self, job_id: &str) -> Option<JobStatus> {
        let mut entries = self.lock();
        let (updated, status) = entries.get(job_id)?;
        if updated.elapsed() < self.ttl {
            return Some(status.clone());
        }
        entries.remove(job_id);
        None
    }

    fn remove(&self, job_id: &str) -> Option<JobStatus> {
        self.lock().remove(job_id).map(|(_, status)| status)
    }
}

/// Run one pipeline and record its progress under `job_id`.
pub async fn run_job(
    store: &dyn JobStore,
    job_id: &str,
    request: &PodcastRequest,
    config: &PodcastConfig,
) -> PipelineOutcome {
    store.put(job_id, JobStatus::Processing);
    let outcome = podcast::run(request, config).await;
    let status = match &outcome {
        PipelineOutcome::Completed { final_audio } => JobStatus::Completed {
            audio_path: final_audio.clone(),
        },
        PipelineOutcome::Failed { message, .. } => JobStatus::Failed {
            error: message.clone(),
        },
    };
    store.put(job_id, status);
    outcome
}
