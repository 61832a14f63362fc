//! In-memory (single node) stream broker for local development and tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use proven_streams::subject::{
    find_overlap, validate_stream_name, validate_subject_pattern,
};
use proven_streams::{StreamBroker, StreamConfig};
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory stream broker.
///
/// Clones share the same streams. Enforces the same create rules as a
/// `JetStream` server: valid names and subjects, idempotent create for an
/// identical config, and no overlapping subjects across streams.
#[derive(Clone, Debug)]
pub struct MemoryBroker {
    streams: Arc<Mutex<BTreeMap<String, StreamConfig>>>,
    available: Arc<AtomicBool>,
    pending_failures: Arc<AtomicUsize>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Creates a new, empty, available `MemoryBroker`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: Arc::new(Mutex::new(BTreeMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            pending_failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes every subsequent call fail with `Error::Unavailable` until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail with `Error::Unavailable`.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), Error> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::Unavailable);
        }

        if self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Unavailable);
        }

        Ok(())
    }
}

#[async_trait]
impl StreamBroker for MemoryBroker {
    type Error = Error;

    async fn get_stream(&self, name: &str) -> Result<Option<StreamConfig>, Self::Error> {
        self.check_available()?;

        Ok(self.streams.lock().await.get(name).cloned())
    }

    async fn list_streams(&self) -> Result<Vec<StreamConfig>, Self::Error> {
        self.check_available()?;

        Ok(self.streams.lock().await.values().cloned().collect())
    }

    async fn create_stream(&self, mut config: StreamConfig) -> Result<StreamConfig, Self::Error> {
        self.check_available()?;

        validate_stream_name(&config.name).map_err(Error::InvalidName)?;

        if config.subjects.is_empty() {
            config.subjects.push(config.name.clone());
        }

        for subject in &config.subjects {
            validate_subject_pattern(subject).map_err(Error::InvalidSubject)?;
        }

        let mut streams = self.streams.lock().await;

        if let Some(existing) = streams.get(&config.name) {
            if *existing == config {
                return Ok(existing.clone());
            }
            return Err(Error::NameInUse(config.name));
        }

        if let Some(other) = streams
            .values()
            .find(|other| find_overlap(&config.subjects, &other.subjects).is_some())
        {
            return Err(Error::SubjectOverlap(other.name.clone()));
        }

        debug!(stream = %config.name, subjects = ?config.subjects, "Created in-memory stream");
        streams.insert(config.name.clone(), config.clone());

        Ok(config)
    }

    async fn delete_stream(&self, name: &str) -> Result<(), Self::Error> {
        self.check_available()?;

        self.streams
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }
}
