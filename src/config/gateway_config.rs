//! Gateway configuration loaded from TOML with environment overrides.
//!
//! Search order:
//! 1. `--config <path>` (fatal if it cannot be loaded)
//! 2. `$CPE_CONFIG`
//! 3. `./cpe_gateway.toml`
//! 4. Built-in defaults
//!
//! Environment overrides (`CPE_SERVER_ADDR`, `CPE_QUEUE_ROOT`,
//! `CPE_MAX_BODY_BYTES`, `CPE_CHUNK_SIZE`) are applied on top of whichever
//! source won.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::queue::DEFAULT_CHUNK_SIZE;

/// Env var naming a config file.
pub const CONFIG_ENV_VAR: &str = "CPE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "cpe_gateway.toml";

/// Largest accepted streaming chunk (16 MiB).
const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP bind address
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Directory holding `in/<owner>` and `out/<owner>`
    pub root: PathBuf,
    /// Read increment when streaming job output (bytes)
    pub chunk_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("queue"),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted CDM body (bytes)
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1_048_576, // 1 MB
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub limits: LimitsConfig,
}

impl GatewayConfig {
    /// Load configuration using the standard search order.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            return Ok((config, ConfigSource::File(path.to_path_buf())));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => return Ok((config, ConfigSource::File(p))),
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from CPE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "CPE_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => return Ok((config, ConfigSource::File(local))),
                Err(e) => {
                    warn!(error = %e, "Failed to load ./cpe_gateway.toml, using defaults");
                }
            }
        }

        Ok((Self::default(), ConfigSource::Defaults))
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are warned about, not fatal.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CPE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Unparseable numbers are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("CPE_SERVER_ADDR") {
            self.server.addr = addr;
        }
        if let Some(root) = lookup("CPE_QUEUE_ROOT") {
            self.queue.root = PathBuf::from(root);
        }
        if let Some(v) = lookup("CPE_MAX_BODY_BYTES") {
            match v.parse() {
                Ok(n) => self.limits.max_body_bytes = n,
                Err(_) => warn!(value = %v, "Ignoring invalid CPE_MAX_BODY_BYTES"),
            }
        }
        if let Some(v) = lookup("CPE_CHUNK_SIZE") {
            match v.parse() {
                Ok(n) => self.queue.chunk_size = n,
                Err(_) => warn!(value = %v, "Ignoring invalid CPE_CHUNK_SIZE"),
            }
        }
    }

    /// Range checks. Reports every violation at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.addr.trim().is_empty() {
            errors.push("server.addr must not be empty".to_string());
        }
        if self.queue.root.as_os_str().is_empty() {
            errors.push("queue.root must not be empty".to_string());
        }
        if self.queue.chunk_size == 0 || self.queue.chunk_size > MAX_CHUNK_SIZE {
            errors.push(format!(
                "queue.chunk_size must be between 1 and {MAX_CHUNK_SIZE}, got {}",
                self.queue.chunk_size
            ));
        }
        if self.limits.max_body_bytes == 0 {
            errors.push("limits.max_body_bytes must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Log the effective configuration.
    pub fn log_summary(&self, source: &ConfigSource) {
        info!(
            source = %source,
            addr = %self.server.addr,
            queue_root = %self.queue.root.display(),
            chunk_size = self.queue.chunk_size,
            max_body_bytes = self.limits.max_body_bytes,
            "Gateway configuration loaded"
        );
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(p) => write!(f, "{}", p.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}
