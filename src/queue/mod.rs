//! Job queue storage.
//!
//! The queue is a pair of per-owner directory trees shared with an external
//! worker:
//!
//! ```text
//! <root>/in/<owner>/<job id>.cpe    written here, consumed by the worker
//! <root>/out/<owner>/<job id>.cpe   written by the worker, streamed back here
//! ```
//!
//! Owner directories are provisioned externally. The filesystem is the only
//! state: nothing about pending jobs is kept in memory.

pub mod encoding;
pub mod fs;
pub mod key;
pub mod memory;

pub use fs::FsQueue;
pub use key::{JobId, KeyError, Owner};
pub use memory::MemoryQueue;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;
use std::path::PathBuf;
use thiserror::Error;

/// Extension shared by queued input and output files.
pub const JOB_FILE_EXTENSION: &str = "cpe";

/// Default read increment when streaming job output.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Job output as a stream of bounded chunks.
pub type OutputStream = BoxStream<'static, std::io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Owner directory not provisioned: {0}")]
    OwnerNotProvisioned(Owner),

    #[error("Queue I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Storage behind the gateway.
///
/// Implementations must make [`write_input`](JobQueue::write_input) all or
/// nothing: a reader either sees the complete file or no file.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Whether `owner` has a provisioned input directory.
    async fn inbox_exists(&self, owner: &Owner) -> bool;

    /// Stores an encoded job input under `owner`'s input directory.
    async fn write_input(&self, owner: &Owner, id: &JobId, payload: &[u8]) -> Result<(), QueueError>;

    /// Opens the worker's output for `id`. `Ok(None)` means not produced yet.
    async fn read_output(&self, owner: &Owner, id: &JobId) -> Result<Option<OutputStream>, QueueError>;

    /// Human-readable backend name for logging.
    fn backend_name(&self) -> &str;
}
