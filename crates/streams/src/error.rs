use crate::subject::SubjectValidationError;
use crate::{BrokerError, BrokerErrorKind, ProvisionerError};

use thiserror::Error;

/// Errors that can occur while provisioning a stream.
#[derive(Debug, Error)]
pub enum Error<E>
where
    E: BrokerError,
{
    /// The broker rejected the request for a reason other than a subject conflict.
    #[error("broker rejected request: {0}")]
    BrokerRejected(#[source] E),

    /// The requested subjects overlap with those of another stream.
    #[error("subject `{requested}` overlaps `{subject}` claimed by stream `{stream}`")]
    Conflict {
        /// Name of the stream already claiming the subject.
        stream: String,
        /// The existing stream's overlapping pattern.
        subject: String,
        /// Our overlapping pattern.
        requested: String,
    },

    /// The broker could not be reached or did not answer in time.
    #[error("broker unavailable: {0}")]
    Connection(#[source] E),

    /// The provisioner was configured with an invalid stream name or subject.
    #[error("invalid {field}: {source}")]
    InvalidConfig {
        /// Which option was invalid.
        field: &'static str,
        /// What was wrong with it.
        source: SubjectValidationError,
    },

    /// The stream does not exist.
    #[error("stream `{0}` not found")]
    NotFound(String),

    /// A stream with the same name exists with a different policy.
    #[error("stream `{stream}` exists with {field} `{actual}`, expected `{expected}`")]
    PolicyMismatch {
        /// Name of the existing stream.
        stream: String,
        /// The policy field that differs.
        field: &'static str,
        /// The declared value.
        expected: String,
        /// The broker's value.
        actual: String,
    },
}

impl<E> Error<E>
where
    E: BrokerError,
{
    /// Maps a broker failure to the provisioner taxonomy.
    pub(crate) fn from_broker(error: E, stream: &str) -> Self {
        match error.kind() {
            BrokerErrorKind::Unavailable => Self::Connection(error),
            BrokerErrorKind::NotFound => Self::NotFound(stream.to_string()),
            BrokerErrorKind::AlreadyExists
            | BrokerErrorKind::SubjectOverlap
            | BrokerErrorKind::Rejected => Self::BrokerRejected(error),
        }
    }

    /// Whether the stream was absent. Cleanup paths usually ignore this.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error is a subject conflict with another stream.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl<E> ProvisionerError for Error<E>
where
    E: BrokerError,
{
    fn is_retriable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
