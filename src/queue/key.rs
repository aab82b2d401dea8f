//! Owner and job identifiers.
//!
//! Both end up as single path components under the queue root, so they are
//! only constructible through validating parsers.

use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier is not a plain path component: {0:?}")]
    Unsafe(String),
}

fn check_component(raw: &str) -> Result<(), KeyError> {
    if raw.trim().is_empty() {
        return Err(KeyError::Empty);
    }
    let unsafe_char = |c: char| c == '/' || c == '\\' || c == '\0';
    if raw.starts_with('.') || raw.contains(unsafe_char) {
        return Err(KeyError::Unsafe(raw.to_string()));
    }
    Ok(())
}

/// Caller identity. Maps to `<root>/in/<owner>` and `<root>/out/<owner>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner(String);

impl Owner {
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        check_component(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job identifier. Freshly generated ids are random v4 UUIDs (122 random
/// bits); ids received from callers are accepted as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        check_component(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Queue file name for this job, shared by input and output sides.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, super::JOB_FILE_EXTENSION)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_plain_names_accepted() {
        assert_eq!(Owner::parse("esa-ops").unwrap().as_str(), "esa-ops");
        assert_eq!(
            JobId::parse("6f1c1b3e-8d7a-4c0b-9a55-3f0e2f1d9c11").unwrap().file_name(),
            "6f1c1b3e-8d7a-4c0b-9a55-3f0e2f1d9c11.cpe"
        );
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(Owner::parse(""), Err(KeyError::Empty));
        assert_eq!(JobId::parse(""), Err(KeyError::Empty));
        assert_eq!(Owner::parse("   "), Err(KeyError::Empty));
    }

    #[test]
    fn test_traversal_rejected() {
        for raw in ["..", "../x", "a/b", "a\\b", ".hidden", "nul\0byte"] {
            assert!(
                matches!(Owner::parse(raw), Err(KeyError::Unsafe(_))),
                "owner {raw:?} should be rejected"
            );
            assert!(
                matches!(JobId::parse(raw), Err(KeyError::Unsafe(_))),
                "job id {raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_generated_ids_are_distinct_uuids() {
        let ids: HashSet<JobId> = (0..1000).map(|_| JobId::generate()).collect();
        assert_eq!(ids.len(), 1000);
        for id in &ids {
            assert!(Uuid::parse_str(id.as_str()).is_ok());
            assert!(JobId::parse(id.as_str()).is_ok());
        }
    }
}
