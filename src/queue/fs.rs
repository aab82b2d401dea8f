//! Filesystem-backed job queue.

use super::{JobId, JobQueue, OutputStream, Owner, QueueError, DEFAULT_CHUNK_SIZE};
use async_trait::async_trait;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

const INPUT_DIR: &str = "in";
const OUTPUT_DIR: &str = "out";

/// Job queue rooted at a local or shared directory.
#[derive(Debug, Clone)]
pub struct FsQueue {
    root: PathBuf,
    chunk_size: usize,
}

impl FsQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the streaming read increment. Values below 1 are raised to 1.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox(&self, owner: &Owner) -> PathBuf {
        self.root.join(INPUT_DIR).join(owner.as_str())
    }

    pub fn outbox(&self, owner: &Owner) -> PathBuf {
        self.root.join(OUTPUT_DIR).join(owner.as_str())
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> QueueError + '_ {
    move |source| QueueError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Removes a temp file on drop unless disarmed. Covers both error returns and
/// a write future dropped mid-flight.
struct TempFileGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> TempFileGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp job file");
            }
        }
    }
}

/// Write to a hidden temp file beside the target, sync, then rename into place.
async fn write_atomic(path: &Path, tmp_path: &Path, payload: &[u8]) -> Result<(), QueueError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp_path)
        .await
        .map_err(io_error(tmp_path))?;
    let mut guard = TempFileGuard::new(tmp_path);

    file.write_all(payload).await.map_err(io_error(tmp_path))?;
    file.sync_all().await.map_err(io_error(tmp_path))?;
    drop(file);

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(io_error(path))?;
    guard.disarm();
    Ok(())
}

#[async_trait]
impl JobQueue for FsQueue {
    async fn inbox_exists(&self, owner: &Owner) -> bool {
        is_dir(&self.inbox(owner)).await
    }

    async fn write_input(&self, owner: &Owner, id: &JobId, payload: &[u8]) -> Result<(), QueueError> {
        let dir = self.inbox(owner);
        if !is_dir(&dir).await {
            return Err(QueueError::OwnerNotProvisioned(owner.clone()));
        }

        let path = dir.join(id.file_name());
        let tmp_path = dir.join(format!(".{}.tmp", id.file_name()));

        write_atomic(&path, &tmp_path, payload).await
    }

    async fn read_output(&self, owner: &Owner, id: &JobId) -> Result<Option<OutputStream>, QueueError> {
        let dir = self.outbox(owner);
        if !is_dir(&dir).await {
            return Err(QueueError::OwnerNotProvisioned(owner.clone()));
        }

        let path = dir.join(id.file_name());
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };

        let metadata = file.metadata().await.map_err(io_error(&path))?;
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(ReaderStream::with_capacity(file, self.chunk_size).boxed()))
    }

    fn backend_name(&self) -> &str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    fn setup(owner: &str) -> (TempDir, FsQueue, Owner) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("in").join(owner)).unwrap();
        std::fs::create_dir_all(dir.path().join("out").join(owner)).unwrap();
        let queue = FsQueue::new(dir.path());
        (dir, queue, Owner::parse(owner).unwrap())
    }

    async fn collect(stream: OutputStream) -> Vec<u8> {
        let chunks: Vec<_> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_write_input_creates_job_file_only() {
        let (dir, queue, owner) = setup("alice");
        let id = JobId::generate();

        queue.write_input(&owner, &id, b"payload").await.unwrap();

        let inbox = dir.path().join("in/alice");
        let entries: Vec<_> = std::fs::read_dir(&inbox)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec![id.file_name()]);
        assert_eq!(std::fs::read(inbox.join(id.file_name())).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_write_input_unprovisioned_owner() {
        let (_dir, queue, _) = setup("alice");
        let bob = Owner::parse("bob").unwrap();

        assert!(!queue.inbox_exists(&bob).await);
        let err = queue.write_input(&bob, &JobId::generate(), b"x").await.unwrap_err();
        assert!(matches!(err, QueueError::OwnerNotProvisioned(_)));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let (dir, queue, owner) = setup("alice");
        let id = JobId::generate();
        let inbox = dir.path().join("in/alice");
        // A directory squatting on the target name makes the rename fail.
        std::fs::create_dir(inbox.join(id.file_name())).unwrap();
        std::fs::write(inbox.join(id.file_name()).join("occupant"), b"x").unwrap();

        assert!(queue.write_input(&owner, &id, b"payload").await.is_err());

        let names: Vec<_> = std::fs::read_dir(&inbox)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![id.file_name()]);
        assert!(inbox.join(id.file_name()).is_dir());
    }

    #[tokio::test]
    async fn test_dropped_write_leaves_nothing_behind() {
        let (dir, queue, owner) = setup("alice");
        let id = JobId::generate();
        let inbox = dir.path().join("in/alice");
        let tmp_path = inbox.join(format!(".{}.tmp", id.file_name()));
        // Large enough that write_all yields several times mid-file.
        let payload = vec![b'7'; 16 * 1024 * 1024];

        let mut write = queue.write_input(&owner, &id, &payload);
        let mut interrupted = false;
        for _ in 0..10_000 {
            if futures::poll!(write.as_mut()).is_ready() {
                break;
            }
            let partial = std::fs::metadata(&tmp_path).map(|m| m.len() > 0).unwrap_or(false);
            if partial {
                interrupted = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        drop(write);

        assert!(interrupted, "write finished before it could be interrupted");
        let names: Vec<_> = std::fs::read_dir(&inbox).unwrap().collect();
        assert!(names.is_empty(), "inbox should be empty, found {names:?}");
    }

    #[tokio::test]
    async fn test_read_output_absent_then_present() {
        let (dir, queue, owner) = setup("alice");
        let id = JobId::generate();

        assert!(queue.read_output(&owner, &id).await.unwrap().is_none());

        std::fs::write(dir.path().join("out/alice").join(id.file_name()), b"0.42\n").unwrap();
        let stream = queue.read_output(&owner, &id).await.unwrap().unwrap();
        assert_eq!(collect(stream).await, b"0.42\n");
    }

    #[tokio::test]
    async fn test_read_output_streams_in_bounded_chunks() {
        let (dir, queue, owner) = setup("alice");
        let queue = queue.with_chunk_size(16);
        let id = JobId::generate();
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(dir.path().join("out/alice").join(id.file_name()), &payload).unwrap();

        let chunks: Vec<_> = queue
            .read_output(&owner, &id)
            .await
            .unwrap()
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 16));
        assert_eq!(chunks.concat(), payload);
    }

    #[tokio::test]
    async fn test_read_output_unprovisioned_owner() {
        let (dir, queue, _) = setup("alice");
        std::fs::create_dir_all(dir.path().join("in/carol")).unwrap();
        let carol = Owner::parse("carol").unwrap();

        let err = queue.read_output(&carol, &JobId::generate()).await.err().unwrap();
        assert!(matches!(err, QueueError::OwnerNotProvisioned(_)));
    }

    #[tokio::test]
    async fn test_directory_named_like_output_is_absent() {
        let (dir, queue, owner) = setup("alice");
        let id = JobId::generate();
        std::fs::create_dir(dir.path().join("out/alice").join(id.file_name())).unwrap();

        assert!(queue.read_output(&owner, &id).await.unwrap().is_none());
    }
}
