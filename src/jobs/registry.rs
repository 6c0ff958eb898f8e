//! Job registry
//!
//! In-memory job records plus the cancellation token of whatever stage is
//! currently running for each job. At most one stage runs per job.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::id::JobId;
use super::types::{Job, JobState, PipelineError};

#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<JobRegistryInner>,
}

#[derive(Default)]
struct JobRegistryInner {
    jobs: RwLock<HashMap<JobId, Job>>,
    /// Running stages; touched from `Drop`, so a synchronous lock
    active: parking_lot::Mutex<HashMap<JobId, CancellationToken>>,
}

/// Marks a job as busy until dropped
pub struct ActivityGuard {
    inner: Arc<JobRegistryInner>,
    job_id: JobId,
    token: CancellationToken,
}

impl ActivityGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.inner.active.lock().remove(&self.job_id);
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) {
        self.inner.jobs.write().await.insert(job.id.clone(), job);
    }

    pub async fn get(&self, id: &JobId) -> Result<Job, PipelineError> {
        self.inner
            .jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(id.clone()))
    }

    /// Apply `f` to a job and return the updated record, `None` if the job is gone
    pub async fn update<F>(&self, id: &JobId, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.inner.jobs.write().await;
        let job = jobs.get_mut(id)?;
        f(job);
        job.updated_at = chrono::Utc::now();
        Some(job.clone())
    }

    pub async fn remove(&self, id: &JobId) -> Option<Job> {
        self.inner.jobs.write().await.remove(id)
    }

    /// Start a stage on a job that must currently be in `expected`
    pub async fn begin(&self, id: &JobId, expected: JobState) -> Result<ActivityGuard, PipelineError> {
        let jobs = self.inner.jobs.read().await;
        let job = jobs
            .get(id)
            .ok_or_else(|| PipelineError::NotFound(id.clone()))?;

        let mut active = self.inner.active.lock();
        if active.contains_key(id) {
            return Err(PipelineError::Busy(id.clone()));
        }
        if job.state != expected {
            return Err(PipelineError::InvalidState {
                job_id: id.clone(),
                state: job.state.as_str(),
                expected: expected.as_str(),
            });
        }

        let token = CancellationToken::new();
        active.insert(id.clone(), token.clone());

        Ok(ActivityGuard {
            inner: self.inner.clone(),
            job_id: id.clone(),
            token,
        })
    }

    pub fn is_busy(&self, id: &JobId) -> bool {
        self.inner.active.lock().contains_key(id)
    }

    /// Cancel the running stage of a job; returns whether one was running
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.inner.active.lock().get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running stage, returning how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let active = self.inner.active.lock();
        for token in active.values() {
            token.cancel();
        }
        active.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.jobs.read().await.is_empty()
    }
}
