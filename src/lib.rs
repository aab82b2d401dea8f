//! CPE Gateway: Conjunction Data Message intake for collision probability
//! estimation.
//!
//! ## Architecture
//!
//! - **CDM Extractor** ([`cdm`]): tolerant, pure extraction of both objects'
//!   state vectors, covariance entries and catalog numbers
//! - **Job Queue** ([`queue`]): owner-scoped filesystem queue shared with an
//!   external estimation worker, plus an in-memory backend
//! - **Gateway** ([`gateway`]): submission and retrieval policy
//! - **API** ([`api`]): Axum routes over the gateway

pub mod api;
pub mod cdm;
pub mod config;
pub mod gateway;
pub mod queue;

pub use cdm::{extract_object_block, CdmObject, Conjunction, StateVector};
pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayError};
pub use queue::{FsQueue, JobId, JobQueue, MemoryQueue, Owner, QueueError};
