//! Session identifiers and their generators

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, server-minted session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh session identifiers
///
/// Enables dependency injection of deterministic ids in tests.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> SessionId;
}

/// Random UUID v4 identifiers (default)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> SessionId {
        SessionId(Uuid::new_v4().to_string())
    }
}

/// Monotonic identifiers with a fixed prefix: `s1`, `s2`, ...
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("s")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> SessionId {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        SessionId(format!("{}{}", self.prefix, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_generator_produces_distinct_ids() {
        let generator = UuidIdGenerator;
        assert_ne!(generator.next_id(), generator.next_id());
    }

    #[test]
    fn sequential_generator_counts_from_one() {
        let generator = SequentialIdGenerator::default();
        assert_eq!(generator.next_id().as_str(), "s1");
        assert_eq!(generator.next_id().as_str(), "s2");
    }

    #[test]
    fn sequential_generator_uses_prefix() {
        let generator = SequentialIdGenerator::new("conn-");
        assert_eq!(generator.next_id().to_string(), "conn-1");
    }

    #[test]
    fn session_id_serializes_as_plain_string() {
        let id = SessionId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
