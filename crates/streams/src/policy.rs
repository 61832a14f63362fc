use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backing medium for a stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Persisted to disk.
    #[default]
    File,

    /// Held in memory only.
    Memory,
}

/// How long messages are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Retained until a configured limit (age, size, count) is hit.
    #[default]
    Limits,

    /// Retained while at least one consumer is interested.
    Interest,

    /// Removed once acknowledged by a consumer.
    WorkQueue,
}

/// What happens when a stream is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardPolicy {
    /// Drop the oldest messages to make room.
    Old,

    /// Refuse new messages.
    #[default]
    New,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Memory => "memory",
        })
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Limits => "limits",
            Self::Interest => "interest",
            Self::WorkQueue => "work_queue",
        })
    }
}

impl fmt::Display for DiscardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Old => "old",
            Self::New => "new",
        })
    }
}

/// Broker-side configuration of a stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Unique name of the stream.
    pub name: String,

    /// Subject patterns routed into the stream.
    #[serde(default)]
    pub subjects: Vec<String>,

    /// Backing medium.
    #[serde(default)]
    pub storage: StorageType,

    /// Retention policy.
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Discard policy.
    #[serde(default)]
    pub discard: DiscardPolicy,

    /// Number of replicas.
    #[serde(default = "default_replicas")]
    pub num_replicas: usize,

    /// Maximum age of a message. `None` keeps messages indefinitely.
    #[serde(default)]
    pub max_age: Option<Duration>,
}

const fn default_replicas() -> usize {
    1
}

impl StreamConfig {
    /// Creates a config with default policies and no subjects.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subjects: Vec::new(),
            storage: StorageType::default(),
            retention: RetentionPolicy::default(),
            discard: DiscardPolicy::default(),
            num_replicas: default_replicas(),
            max_age: None,
        }
    }

    /// Returns the first policy field that differs from `other`, as
    /// `(field, ours, theirs)`.
    #[must_use]
    pub fn policy_mismatch(&self, other: &Self) -> Option<(&'static str, String, String)> {
        if self.storage != other.storage {
            return Some(("storage", self.storage.to_string(), other.storage.to_string()));
        }

        if self.retention != other.retention {
            return Some((
                "retention",
                self.retention.to_string(),
                other.retention.to_string(),
            ));
        }

        if self.discard != other.discard {
            return Some(("discard", self.discard.to_string(), other.discard.to_string()));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::new("orders");

        assert_eq!(config.storage, StorageType::File);
        assert_eq!(config.retention, RetentionPolicy::Limits);
        assert_eq!(config.discard, DiscardPolicy::New);
        assert_eq!(config.num_replicas, 1);
        assert_eq!(config.max_age, None);
    }

    #[test]
    fn test_policy_mismatch_reports_first_difference() {
        let ours = StreamConfig::new("orders");
        let mut theirs = ours.clone();
        assert_eq!(ours.policy_mismatch(&theirs), None);

        theirs.retention = RetentionPolicy::WorkQueue;
        theirs.discard = DiscardPolicy::Old;
        assert_eq!(
            ours.policy_mismatch(&theirs),
            Some(("retention", "limits".to_string(), "work_queue".to_string()))
        );

        // Replicas and age are limits, not policy.
        let mut resized = ours.clone();
        resized.num_replicas = 3;
        resized.max_age = Some(Duration::from_secs(60));
        assert_eq!(ours.policy_mismatch(&resized), None);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: StreamConfig = serde_json::from_str(
            r#"{"name":"orders","subjects":["com.acme.orders.*"],"retention":"work_queue"}"#,
        )
        .unwrap();

        assert_eq!(config.name, "orders");
        assert_eq!(config.subjects, vec!["com.acme.orders.*".to_string()]);
        assert_eq!(config.storage, StorageType::File);
        assert_eq!(config.retention, RetentionPolicy::WorkQueue);
        assert_eq!(config.discard, DiscardPolicy::New);
        assert_eq!(config.num_replicas, 1);
    }
}
