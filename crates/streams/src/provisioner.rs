use crate::error::Error;
use crate::policy::{DiscardPolicy, RetentionPolicy, StorageType, StreamConfig};
use crate::subject::{claimed_subjects, find_overlap, validate_stream_name, validate_subject_pattern};
use crate::{BrokerError, BrokerErrorKind, Provisioner, StreamBroker};

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

/// What to do when a stream with the configured name already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExistingStream {
    /// Accept it only if storage, retention and discard match the declared policy.
    #[default]
    VerifyPolicy,

    /// Accept it whatever its policy.
    Accept,
}

/// Configuration for the `StreamProvisioner`.
#[derive(Clone, Debug)]
pub struct StreamProvisionerConfig<B> {
    /// The broker session to provision through.
    pub broker: B,

    /// Unique name of the stream.
    pub stream_name: String,

    /// Subject pattern the stream claims, along with everything beneath it.
    pub subject_prefix: String,

    /// Storage type. Defaults to file storage if not set.
    pub storage: Option<StorageType>,

    /// Retention policy. Defaults to limits-based retention if not set.
    pub retention: Option<RetentionPolicy>,

    /// Discard policy. Defaults to discarding new messages when full if not set.
    pub discard: Option<DiscardPolicy>,

    /// Number of replicas. Defaults to 1 if not set.
    pub num_replicas: Option<usize>,

    /// Maximum message age. Messages are kept indefinitely if not set.
    pub max_age: Option<Duration>,

    /// Handling of a pre-existing stream under the same name. Defaults to
    /// `ExistingStream::VerifyPolicy` if not set.
    pub on_existing: Option<ExistingStream>,
}

/// Ensures a single durable stream exists and owns its subject space.
///
/// Holds no state about the broker between calls: every operation re-queries it.
#[derive(Clone, Debug)]
pub struct StreamProvisioner<B> {
    broker: B,
    desired: StreamConfig,
    subject_prefix: String,
    on_existing: ExistingStream,
}

impl<B> StreamProvisioner<B>
where
    B: StreamBroker,
{
    /// Creates a new instance of `StreamProvisioner`. Does not contact the broker.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the stream name or subject prefix is invalid.
    pub fn new(
        StreamProvisionerConfig {
            broker,
            stream_name,
            subject_prefix,
            storage,
            retention,
            discard,
            num_replicas,
            max_age,
            on_existing,
        }: StreamProvisionerConfig<B>,
    ) -> Result<Self, Error<B::Error>> {
        validate_stream_name(&stream_name).map_err(|source| Error::InvalidConfig {
            field: "stream_name",
            source,
        })?;
        validate_subject_pattern(&subject_prefix).map_err(|source| Error::InvalidConfig {
            field: "subject_prefix",
            source,
        })?;

        let desired = StreamConfig {
            name: stream_name,
            subjects: claimed_subjects(&subject_prefix),
            storage: storage.unwrap_or_default(),
            retention: retention.unwrap_or_default(),
            discard: discard.unwrap_or_default(),
            num_replicas: num_replicas.unwrap_or(1),
            max_age,
        };

        Ok(Self {
            broker,
            desired,
            subject_prefix,
            on_existing: on_existing.unwrap_or_default(),
        })
    }

    /// The configuration sent to the broker when the stream is created.
    #[must_use]
    pub const fn desired_config(&self) -> &StreamConfig {
        &self.desired
    }

    /// The subject prefix this provisioner was configured with.
    #[must_use]
    pub fn subject_prefix(&self) -> &str {
        &self.subject_prefix
    }

    /// Whether the stream currently exists in the broker.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the broker is unreachable.
    #[instrument(skip(self), fields(stream = %self.desired.name))]
    pub async fn stream_exists(&self) -> Result<bool, Error<B::Error>> {
        let existing = self
            .broker
            .get_stream(&self.desired.name)
            .await
            .map_err(|e| self.broker_error(e))?;

        Ok(existing.is_some())
    }

    fn broker_error(&self, error: B::Error) -> Error<B::Error> {
        Error::from_broker(error, &self.desired.name)
    }

    fn confirm_existing(&self, existing: StreamConfig) -> Result<StreamConfig, Error<B::Error>> {
        if existing.subjects != self.desired.subjects {
            warn!(existing = ?existing.subjects, declared = ?self.desired.subjects, "Existing stream claims different subjects");
        }

        if self.on_existing == ExistingStream::VerifyPolicy {
            if let Some((field, expected, actual)) = self.desired.policy_mismatch(&existing) {
                warn!(field, %expected, %actual, "Existing stream has a different policy");

                return Err(Error::PolicyMismatch {
                    stream: existing.name,
                    field,
                    expected,
                    actual,
                });
            }
        }

        debug!("Stream already exists, nothing to do.");
        Ok(existing)
    }

    /// Scans every other stream for a subject pattern overlapping ours.
    async fn find_conflict(&self) -> Result<Option<Error<B::Error>>, Error<B::Error>> {
        let streams = self
            .broker
            .list_streams()
            .await
            .map_err(|e| self.broker_error(e))?;

        debug!(count = streams.len(), "Scanning streams for subject overlap");

        Ok(streams
            .iter()
            .filter(|other| other.name != self.desired.name)
            .find_map(|other| {
                find_overlap(&self.desired.subjects, &other.subjects).map(|(requested, subject)| {
                    Error::Conflict {
                        stream: other.name.clone(),
                        subject: subject.to_string(),
                        requested: requested.to_string(),
                    }
                })
            }))
    }

    async fn create(&self) -> Result<StreamConfig, Error<B::Error>> {
        let error = match self.broker.create_stream(self.desired.clone()).await {
            Ok(confirmed) => {
                info!(subjects = ?confirmed.subjects, storage = %confirmed.storage, retention = %confirmed.retention, discard = %confirmed.discard, "Stream created.");
                return Ok(confirmed);
            }
            Err(error) => error,
        };

        match error.kind() {
            // Lost a create race. The winner's stream is the one to confirm.
            BrokerErrorKind::AlreadyExists => {
                debug!("Stream was created concurrently, confirming it");

                match self
                    .broker
                    .get_stream(&self.desired.name)
                    .await
                    .map_err(|e| self.broker_error(e))?
                {
                    Some(existing) => self.confirm_existing(existing),
                    None => Err(Error::BrokerRejected(error)),
                }
            }
            // A conflicting stream appeared after our scan.
            BrokerErrorKind::SubjectOverlap => match self.find_conflict().await? {
                Some(conflict) => {
                    warn!(error = %conflict, "Broker refused overlapping subjects");
                    Err(conflict)
                }
                None => Err(Error::BrokerRejected(error)),
            },
            _ => Err(self.broker_error(error)),
        }
    }
}

#[async_trait]
impl<B> Provisioner for StreamProvisioner<B>
where
    B: StreamBroker,
{
    type Error = Error<B::Error>;

    fn stream_name(&self) -> &str {
        &self.desired.name
    }

    #[instrument(skip(self), fields(stream = %self.desired.name, subject_prefix = %self.subject_prefix))]
    async fn ensure_stream(&self) -> Result<StreamConfig, Self::Error> {
        let existing = self
            .broker
            .get_stream(&self.desired.name)
            .await
            .map_err(|e| self.broker_error(e))?;

        if let Some(existing) = existing {
            return self.confirm_existing(existing);
        }

        if let Some(conflict) = self.find_conflict().await? {
            warn!(error = %conflict, "Refusing to create stream");
            return Err(conflict);
        }

        self.create().await
    }

    #[instrument(skip(self), fields(stream = %self.desired.name))]
    async fn delete_stream(&self) -> Result<(), Self::Error> {
        self.broker
            .delete_stream(&self.desired.name)
            .await
            .map_err(|e| self.broker_error(e))?;

        info!("Stream deleted.");
        Ok(())
    }
}
