//! In-memory job queue.
//!
//! Mirrors the filesystem layout with maps so gateway policy can be exercised
//! without disk. The `put_output` hook plays the external worker.

use super::{JobId, JobQueue, OutputStream, Owner, QueueError, DEFAULT_CHUNK_SIZE};
use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Folder = HashMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct Inner {
    inboxes: HashMap<String, Folder>,
    outboxes: HashMap<String, Folder>,
    fail_writes: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryQueue {
    inner: Arc<Mutex<Inner>>,
    chunk_size: usize,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Provision both the input and output side for `owner`.
    pub fn provision(&self, owner: &str) {
        self.provision_inbox(owner);
        self.provision_outbox(owner);
    }

    pub fn provision_inbox(&self, owner: &str) {
        self.lock().inboxes.entry(owner.to_string()).or_default();
    }

    pub fn provision_outbox(&self, owner: &str) {
        self.lock().outboxes.entry(owner.to_string()).or_default();
    }

    /// Make every subsequent `write_input` fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Stored input for a job, if any.
    pub fn input(&self, owner: &str, id: &str) -> Option<Vec<u8>> {
        self.lock()
            .inboxes
            .get(owner)
            .and_then(|b| b.get(id))
            .cloned()
    }

    pub fn input_count(&self, owner: &str) -> usize {
        self.lock().inboxes.get(owner).map_or(0, HashMap::len)
    }

    /// Publish a job output, as the external worker would.
    pub fn put_output(&self, owner: &str, id: &str, bytes: impl Into<Vec<u8>>) {
        self.lock()
            .outboxes
            .entry(owner.to_string())
            .or_default()
            .insert(id.to_string(), bytes.into());
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn inbox_exists(&self, owner: &Owner) -> bool {
        self.lock().inboxes.contains_key(owner.as_str())
    }

    async fn write_input(&self, owner: &Owner, id: &JobId, payload: &[u8]) -> Result<(), QueueError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(QueueError::Io {
                path: PathBuf::from("in").join(owner.as_str()).join(id.file_name()),
                source: std::io::Error::other("simulated write failure"),
            });
        }
        let inbox = inner
            .inboxes
            .get_mut(owner.as_str())
            .ok_or_else(|| QueueError::OwnerNotProvisioned(owner.clone()))?;
        inbox.insert(id.as_str().to_string(), payload.to_vec());
        Ok(())
    }

    async fn read_output(&self, owner: &Owner, id: &JobId) -> Result<Option<OutputStream>, QueueError> {
        let inner = self.lock();
        let outbox = inner
            .outboxes
            .get(owner.as_str())
            .ok_or_else(|| QueueError::OwnerNotProvisioned(owner.clone()))?;

        Ok(outbox.get(id.as_str()).map(|data| {
            let chunks: Vec<std::io::Result<Bytes>> = data
                .chunks(self.chunk_size)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            futures::stream::iter(chunks).boxed()
        }))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_write_requires_provisioned_inbox() {
        let queue = MemoryQueue::new();
        let owner = Owner::parse("alice").unwrap();
        let id = JobId::generate();

        assert!(queue.write_input(&owner, &id, b"x").await.is_err());

        queue.provision_inbox("alice");
        queue.write_input(&owner, &id, b"x").await.unwrap();
        assert_eq!(queue.input("alice", id.as_str()), Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_output_chunks() {
        let queue = MemoryQueue::new().with_chunk_size(3);
        queue.provision("alice");
        queue.put_output("alice", "job", "abcdefgh");

        let owner = Owner::parse("alice").unwrap();
        let id = JobId::parse("job").unwrap();
        let chunks: Vec<Bytes> = queue
            .read_output(&owner, &id)
            .await
            .unwrap()
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), b"abcdefgh");
    }
}
