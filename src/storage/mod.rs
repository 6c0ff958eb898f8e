//! Job artifact storage
//!
//! Persists a job's document, extracted text and audiobook between pipeline
//! stages, keyed by job id and stage. Local filesystem and in-memory backends.

mod local;
mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::audio::AudioFormat;
use crate::config::{StorageBackend, StorageConfig};
use crate::jobs::JobId;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Pipeline stage an artifact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Uploaded PDF bytes
    Document,
    /// Extracted UTF-8 text
    Text,
    /// Assembled audiobook
    Audio,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Document, Stage::Text, Stage::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error for {stage} of job {job_id}: {source}")]
    Io {
        job_id: String,
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialise storage: {0}")]
    Init(String),
}

/// Storage backend trait
#[async_trait]
pub trait JobStorage: Send + Sync {
    /// Create whatever the backend needs before first use
    async fn init(&self) -> Result<(), StorageError>;

    async fn put(&self, job_id: &JobId, stage: Stage, data: Bytes) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing is stored for this job and stage
    async fn get(&self, job_id: &JobId, stage: Stage) -> Result<Option<Bytes>, StorageError>;

    /// Returns whether anything was deleted
    async fn delete(&self, job_id: &JobId, stage: Stage) -> Result<bool, StorageError>;

    /// Best-effort removal of every stored artifact; returns the number removed
    async fn purge(&self) -> usize;

    /// Directory for per-chunk spool files, if the backend is disk-based
    fn temp_dir(&self) -> Option<&Path> {
        None
    }

    /// Delete every stage of a job, returning how many artifacts were removed
    async fn delete_job(&self, job_id: &JobId) -> Result<usize, StorageError> {
        let mut count = 0;
        for stage in Stage::ALL {
            if self.delete(job_id, stage).await? {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Build the configured backend
pub fn from_config(config: &StorageConfig, audio_format: AudioFormat) -> Arc<dyn JobStorage> {
    match config.backend {
        StorageBackend::Local => Arc::new(LocalStorage::new(config.data_dir.clone(), audio_format)),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    }
}
