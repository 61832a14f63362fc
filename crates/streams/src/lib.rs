//! Abstract interface for provisioning durable, subject-addressed streams.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod policy;
mod provisioner;
mod retry;

/// Hierarchical subject matching and validation.
pub mod subject;

pub use error::Error;
pub use policy::{DiscardPolicy, RetentionPolicy, StorageType, StreamConfig};
pub use provisioner::{ExistingStream, StreamProvisioner, StreamProvisionerConfig};
pub use retry::{RetryConfig, RetryingProvisioner};

use std::error::Error as StdError;
use std::fmt::Debug;

use async_trait::async_trait;

/// Coarse classification of a broker failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerErrorKind {
    /// The broker could not be reached, the session is invalid, or the round trip timed out.
    Unavailable,

    /// The named stream does not exist.
    NotFound,

    /// The stream name is already in use with a different configuration.
    AlreadyExists,

    /// The requested subjects overlap with those of another stream.
    SubjectOverlap,

    /// Any other validation failure reported by the broker.
    Rejected,
}

/// Marker trait for broker errors.
pub trait BrokerError: Debug + StdError + Send + Sync + 'static {
    /// Classifies the failure.
    fn kind(&self) -> BrokerErrorKind;
}

/// The broker capabilities a provisioner needs.
///
/// Every call is a single round trip. Implementations bound each round trip
/// with their own timeout and report elapsing as [`BrokerErrorKind::Unavailable`].
#[async_trait]
pub trait StreamBroker: Clone + Send + Sync + 'static {
    /// The error type for broker operations.
    type Error: BrokerError;

    /// Fetches the configuration of the stream registered under `name`, if any.
    async fn get_stream(&self, name: &str) -> Result<Option<StreamConfig>, Self::Error>;

    /// Lists the configuration of every stream known to the broker.
    async fn list_streams(&self) -> Result<Vec<StreamConfig>, Self::Error>;

    /// Creates a stream and returns the configuration the broker confirmed.
    async fn create_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error>;

    /// Deletes the stream registered under `name`.
    async fn delete_stream(&self, name: &str) -> Result<(), Self::Error>;
}

/// Marker trait for provisioner errors.
pub trait ProvisionerError: Debug + StdError + Send + Sync + 'static {
    /// Whether repeating the same call may succeed.
    fn is_retriable(&self) -> bool;
}

/// Something that guarantees the existence of exactly one durable stream.
#[async_trait]
pub trait Provisioner: Send + Sync + 'static {
    /// The error type for provisioning operations.
    type Error: ProvisionerError;

    /// The name of the stream this provisioner owns.
    fn stream_name(&self) -> &str;

    /// Creates the stream if absent and returns the broker-confirmed configuration.
    ///
    /// Calling this repeatedly is a no-op once the stream exists.
    async fn ensure_stream(&self) -> Result<StreamConfig, Self::Error>;

    /// Deletes the stream.
    async fn delete_stream(&self) -> Result<(), Self::Error>;
}
