//! Stream broker backed by NATS `JetStream`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::future::Future;
use std::time::Duration;

use async_nats::Client;
use async_nats::jetstream::Context as JetStreamContext;
use async_nats::jetstream::stream::{
    Config as NatsStreamConfig, DiscardPolicy as NatsDiscardPolicy,
    RetentionPolicy as NatsRetentionPolicy, StorageType as NatsStorageType,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use proven_streams::{
    BrokerError, BrokerErrorKind, DiscardPolicy, RetentionPolicy, StorageType, StreamBroker,
    StreamConfig,
};
use tracing::{debug, instrument};

/// Configuration for the `NatsBroker`.
#[derive(Clone, Debug)]
pub struct NatsBrokerConfig {
    /// The NATS client to use.
    pub client: Client,

    /// Timeout for individual NATS `JetStream` operations. Defaults to 10 seconds if not set.
    pub operation_timeout: Option<Duration>,
}

/// A stream broker talking to a NATS `JetStream` server.
#[derive(Clone, Debug)]
pub struct NatsBroker {
    jetstream_context: JetStreamContext,
    operation_timeout: Duration,
}

impl NatsBroker {
    /// Creates a new instance of `NatsBroker`. Does not contact the server.
    #[must_use]
    pub fn new(
        NatsBrokerConfig {
            client,
            operation_timeout,
        }: NatsBrokerConfig,
    ) -> Self {
        Self {
            jetstream_context: async_nats::jetstream::new(client),
            operation_timeout: operation_timeout.unwrap_or(Duration::from_secs(10)),
        }
    }

    /// Runs a single round trip, failing with `Error::Timeout` once the bound elapses.
    async fn bounded<F, T, E>(&self, operation: &'static str, future: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, E>> + Send,
        Error: From<E>,
    {
        tokio::time::timeout(self.operation_timeout, future)
            .await
            .map_err(|_| Error::Timeout {
                operation,
                timeout: self.operation_timeout,
            })?
            .map_err(Error::from)
    }
}

#[async_trait]
impl StreamBroker for NatsBroker {
    type Error = Error;

    #[instrument(skip(self))]
    async fn get_stream(&self, name: &str) -> Result<Option<StreamConfig>, Self::Error> {
        match self
            .bounded("get_stream", self.jetstream_context.get_stream(name))
            .await
        {
            Ok(stream) => Ok(Some(from_nats_config(&stream.cached_info().config))),
            Err(e) if e.kind() == BrokerErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn list_streams(&self) -> Result<Vec<StreamConfig>, Self::Error> {
        let infos: Vec<_> = self
            .bounded("list_streams", async {
                self.jetstream_context
                    .streams()
                    .try_collect::<Vec<_>>()
                    .await
            })
            .await?;

        debug!(count = infos.len(), "Listed JetStream streams");

        Ok(infos
            .iter()
            .map(|info| from_nats_config(&info.config))
            .collect())
    }

    #[instrument(skip(self, config), fields(stream = %config.name))]
    async fn create_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error> {
        let stream = self
            .bounded(
                "create_stream",
                self.jetstream_context.create_stream(to_nats_config(&config)),
            )
            .await?;

        Ok(from_nats_config(&stream.cached_info().config))
    }

    #[instrument(skip(self))]
    async fn delete_stream(&self, name: &str) -> Result<(), Self::Error> {
        self.bounded("delete_stream", async {
            self.jetstream_context
                .delete_stream(name)
                .await
                .map_err(Error::Delete)
        })
        .await?;

        Ok(())
    }
}

/// Converts a stream config to its `JetStream` representation.
#[must_use]
pub fn to_nats_config(config: &StreamConfig) -> NatsStreamConfig {
    NatsStreamConfig {
        name: config.name.clone(),
        subjects: config.subjects.clone(),
        storage: match config.storage {
            StorageType::File => NatsStorageType::File,
            StorageType::Memory => NatsStorageType::Memory,
        },
        retention: match config.retention {
            RetentionPolicy::Limits => NatsRetentionPolicy::Limits,
            RetentionPolicy::Interest => NatsRetentionPolicy::Interest,
            RetentionPolicy::WorkQueue => NatsRetentionPolicy::WorkQueue,
        },
        discard: match config.discard {
            DiscardPolicy::Old => NatsDiscardPolicy::Old,
            DiscardPolicy::New => NatsDiscardPolicy::New,
        },
        num_replicas: config.num_replicas,
        // zero means unlimited
        max_age: config.max_age.unwrap_or_default(),
        ..Default::default()
    }
}

/// Converts a `JetStream` stream config back to the broker-neutral form.
#[must_use]
pub fn from_nats_config(config: &NatsStreamConfig) -> StreamConfig {
    StreamConfig {
        name: config.name.clone(),
        subjects: config.subjects.clone(),
        storage: match config.storage {
            NatsStorageType::File => StorageType::File,
            NatsStorageType::Memory => StorageType::Memory,
        },
        retention: match config.retention {
            NatsRetentionPolicy::Limits => RetentionPolicy::Limits,
            NatsRetentionPolicy::Interest => RetentionPolicy::Interest,
            NatsRetentionPolicy::WorkQueue => RetentionPolicy::WorkQueue,
        },
        discard: match config.discard {
            NatsDiscardPolicy::Old => DiscardPolicy::Old,
            NatsDiscardPolicy::New => DiscardPolicy::New,
        },
        num_replicas: config.num_replicas,
        max_age: (!config.max_age.is_zero()).then_some(config.max_age),
    }
}
