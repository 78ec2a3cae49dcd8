//! Identifier newtypes.
//!
//! `QueueName` is the key the whole engine is organised around; `BatchId` only
//! exists so log lines and failures for one extracted batch can be correlated.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Name of a queue in the backing store.
///
/// Ordered lexicographically, which is the order queues are evaluated in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QueueName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one extracted batch (ULID, sortable by extraction time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(Ulid);

impl BatchId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_order_lexicographically() {
        let mut names = vec![QueueName::new("q2"), QueueName::new("a"), QueueName::new("q10")];
        names.sort();
        let names: Vec<&str> = names.iter().map(QueueName::as_str).collect();
        assert_eq!(names, vec!["a", "q10", "q2"]);
    }

    #[test]
    fn batch_ids_are_unique_and_prefixed() {
        let a = BatchId::generate();
        let b = BatchId::generate();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("batch-"));
    }
}
