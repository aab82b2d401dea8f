//! Gateway Configuration Module
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `CPE_CONFIG` environment variable (path to TOML file)
//! 3. `cpe_gateway.toml` in the current working directory
//! 4. Built-in defaults
//!
//! `CPE_*` environment variables and CLI flags are layered on top.
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:8080"
//!
//! [queue]
//! root = "/srv/cpe/queue"
//! chunk_size = 8192
//!
//! [limits]
//! max_body_bytes = 1048576
//! ```

mod gateway_config;
pub mod validation;

pub use gateway_config::*;
