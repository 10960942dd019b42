use analyser_core::models::{FrameworkKind, JobDescriptor};
use async_trait::async_trait;
use moka::future::Cache;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed { framework: FrameworkKind, files: usize, code: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub descriptor: JobDescriptor,
    pub event_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
    pub status: JobStatus,
}

/// The most recent job per client.
///
/// A second job for the same client replaces the first one's record, even
/// while the first is still running: last write wins.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn put(&self, record: JobRecord);

    async fn get(&self, client_id: &str) -> Option<JobRecord>;

    /// Update the status of the client's record if it still belongs to `event_id`.
    async fn set_status(&self, client_id: &str, event_id: &str, status: JobStatus) {
        if let Some(mut record) = self.get(client_id).await
            && record.event_id == event_id
        {
            record.status = status;
            self.put(record).await;
        }
    }
}

pub struct InMemoryJobStore {
    records: Cache<String, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new(capacity: u64) -> Self {
        Self { records: Cache::builder().max_capacity(capacity).build() }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put(&self, record: JobRecord) {
        self.records.insert(record.descriptor.client_id.clone(), record).await;
    }

    async fn get(&self, client_id: &str) -> Option<JobRecord> { self.records.get(client_id).await }
}
