//! In-memory storage, for tests and single-process deployments without disk

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{JobStorage, Stage, StorageError};
use crate::jobs::JobId;

#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<(JobId, Stage), Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl JobStorage for MemoryStorage {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(&self, job_id: &JobId, stage: Stage, data: Bytes) -> Result<(), StorageError> {
        self.objects.write().await.insert((job_id.clone(), stage), data);
        Ok(())
    }

    async fn get(&self, job_id: &JobId, stage: Stage) -> Result<Option<Bytes>, StorageError> {
        Ok(self.objects.read().await.get(&(job_id.clone(), stage)).cloned())
    }

    async fn delete(&self, job_id: &JobId, stage: Stage) -> Result<bool, StorageError> {
        Ok(self.objects.write().await.remove(&(job_id.clone(), stage)).is_some())
    }

    async fn purge(&self) -> usize {
        let mut objects = self.objects.write().await;
        let count = objects.len();
        objects.clear();
        count
    }
}
