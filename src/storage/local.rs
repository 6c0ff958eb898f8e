//! Local filesystem storage
//!
//! Layout under the data directory:
//! `uploads/<id>.pdf`, `uploads/<id>.txt`, `audio/<id>.<ext>`, `temp/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{JobStorage, Stage, StorageError};
use crate::audio::AudioFormat;
use crate::jobs::JobId;

const DIRS: [&str; 3] = ["uploads", "audio", "temp"];

pub struct LocalStorage {
    base_path: PathBuf,
    temp_path: PathBuf,
    audio_format: AudioFormat,
}

impl LocalStorage {
    pub fn new(base_path: PathBuf, audio_format: AudioFormat) -> Self {
        Self {
            temp_path: base_path.join("temp"),
            base_path,
            audio_format,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path(&self, job_id: &JobId, stage: Stage) -> PathBuf {
        match stage {
            Stage::Document => self.base_path.join("uploads").join(format!("{}.pdf", job_id)),
            Stage::Text => self.base_path.join("uploads").join(format!("{}.txt", job_id)),
            Stage::Audio => self
                .base_path
                .join("audio")
                .join(format!("{}.{}", job_id, self.audio_format.extension())),
        }
    }

    fn io_error(job_id: &JobId, stage: Stage, source: std::io::Error) -> StorageError {
        StorageError::Io {
            job_id: job_id.to_string(),
            stage: stage.as_str(),
            source,
        }
    }
}

#[async_trait]
impl JobStorage for LocalStorage {
    async fn init(&self) -> Result<(), StorageError> {
        for dir in DIRS {
            let path = self.base_path.join(dir);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| StorageError::Init(format!("{}: {}", path.display(), e)))?;
        }
        tracing::debug!(path = %self.base_path.display(), "Storage directories ready");
        Ok(())
    }

    async fn put(&self, job_id: &JobId, stage: Stage, data: Bytes) -> Result<(), StorageError> {
        let path = self.path(job_id, stage);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(job_id, stage, e))?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| Self::io_error(job_id, stage, e))
    }

    async fn get(&self, job_id: &JobId, stage: Stage) -> Result<Option<Bytes>, StorageError> {
        match tokio::fs::read(self.path(job_id, stage)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(job_id, stage, e)),
        }
    }

    async fn delete(&self, job_id: &JobId, stage: Stage) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(self.path(job_id, stage)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(job_id, stage, e)),
        }
    }

    async fn purge(&self) -> usize {
        let mut count = 0;

        for dir in DIRS {
            let path = self.base_path.join(dir);
            let mut entries = match tokio::fs::read_dir(&path).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Failed to list directory for purge: {}", e);
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "Failed to read directory entry: {}", e);
                        break;
                    }
                };

                let entry_path = entry.path();
                let removed = match entry.file_type().await {
                    Ok(kind) if kind.is_dir() => tokio::fs::remove_dir_all(&entry_path).await,
                    _ => tokio::fs::remove_file(&entry_path).await,
                };
                match removed {
                    Ok(()) => count += 1,
                    Err(e) => {
                        tracing::warn!(path = %entry_path.display(), "Failed to purge: {}", e)
                    }
                }
            }
        }

        if count > 0 {
            tracing::info!(count, "Purged stored artifacts");
        }
        count
    }

    fn temp_dir(&self) -> Option<&Path> {
        Some(&self.temp_path)
    }
}
