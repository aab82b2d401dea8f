//! Job Queue Gateway
//!
//! Request-scoped policy between callers and the job queue:
//!
//! - **submit**: owner check, CDM extraction for both objects, encoding, and
//!   a single all-or-nothing write keyed by a fresh job id.
//! - **fetch**: owner and id checks, then a byte-exact stream of the worker's
//!   output if it exists.
//!
//! Nothing is cached between calls; every request re-reads the queue.

use crate::cdm::{CdmObject, Conjunction};
use crate::queue::{encoding, JobId, JobQueue, KeyError, OutputStream, Owner, QueueError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Externally observable failures of submit and fetch.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Owner missing, malformed, or not provisioned. Deliberately one case.
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    BadRequest(&'static str),

    /// Output not produced yet; the caller is expected to retry.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<QueueError> for GatewayError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::OwnerNotProvisioned(_) => Self::Forbidden(FORBIDDEN_MESSAGE),
            QueueError::Io { .. } => Self::Internal(err.to_string()),
        }
    }
}

const FORBIDDEN_MESSAGE: &str = "job submission not allowed";
const STATUS_FORBIDDEN_MESSAGE: &str = "cpe status not allowed";

/// Gateway over any [`JobQueue`] backend.
pub struct Gateway<Q: JobQueue> {
    queue: Arc<Q>,
}

impl<Q: JobQueue> Clone for Gateway<Q> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<Q: JobQueue> Gateway<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue: Arc::new(queue),
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Queues a CDM for processing and returns the new job id.
    pub async fn submit(&self, owner: &str, body: &[u8]) -> Result<JobId, GatewayError> {
        let owner = Owner::parse(owner).map_err(|e| {
            debug!(error = %e, "Rejected submission owner");
            GatewayError::Forbidden(FORBIDDEN_MESSAGE)
        })?;

        if !self.queue.inbox_exists(&owner).await {
            info!(%owner, "Submission for unprovisioned owner");
            return Err(GatewayError::Forbidden(FORBIDDEN_MESSAGE));
        }

        if body.is_empty() {
            return Err(GatewayError::BadRequest("No content provided"));
        }

        let text = std::str::from_utf8(body)
            .map_err(|e| GatewayError::Internal(format!("CDM body is not valid UTF-8: {e}")))?;

        let conjunction = Conjunction::from_cdm(text);
        log_incomplete("OBJECT1", &owner, &conjunction.object1);
        log_incomplete("OBJECT2", &owner, &conjunction.object2);

        let payload = encoding::encode(&conjunction);
        let id = JobId::generate();
        self.queue.write_input(&owner, &id, payload.as_bytes()).await?;

        info!(
            %owner,
            job_id = %id,
            bytes = payload.len(),
            object1 = %conjunction.object1.designator,
            object2 = %conjunction.object2.designator,
            backend = self.queue.backend_name(),
            "Job queued"
        );
        Ok(id)
    }

    /// Opens the output of a previously submitted job.
    pub async fn fetch(&self, owner: &str, job_id: &str) -> Result<OutputStream, GatewayError> {
        let owner = Owner::parse(owner).map_err(|e| {
            debug!(error = %e, "Rejected status owner");
            GatewayError::Forbidden(STATUS_FORBIDDEN_MESSAGE)
        })?;

        let id = JobId::parse(job_id).map_err(|e| match e {
            KeyError::Empty => GatewayError::BadRequest(
                "provide the id of the cpe to check or download (cpe_id)",
            ),
            KeyError::Unsafe(_) => GatewayError::BadRequest("malformed cpe_id"),
        })?;

        match self.queue.read_output(&owner, &id).await {
            Ok(Some(stream)) => {
                debug!(%owner, job_id = %id, "Streaming job output");
                Ok(stream)
            }
            Ok(None) => {
                debug!(%owner, job_id = %id, "Job output not yet available");
                Err(GatewayError::NotFound("cpe not yet available"))
            }
            Err(QueueError::OwnerNotProvisioned(_)) => {
                info!(%owner, "Status request for unprovisioned owner");
                Err(GatewayError::Forbidden(STATUS_FORBIDDEN_MESSAGE))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn log_incomplete(block: &str, owner: &Owner, object: &CdmObject) {
    if object.is_complete() {
        return;
    }
    warn!(
        %owner,
        block,
        designator = %object.designator,
        missing_state = ?object.missing_state_fields(),
        missing_covariance = object.missing_covariance(),
        "CDM object incomplete; queued with defaults"
    );
}
