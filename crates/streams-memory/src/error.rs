use proven_streams::subject::SubjectValidationError;
use proven_streams::{BrokerError, BrokerErrorKind};
use thiserror::Error;

/// Errors returned by the in-memory broker.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The stream name is not acceptable to the broker.
    #[error("invalid stream name: {0}")]
    InvalidName(SubjectValidationError),

    /// A subject is not acceptable to the broker.
    #[error("invalid subject: {0}")]
    InvalidSubject(SubjectValidationError),

    /// The name is in use by a stream with a different configuration.
    #[error("stream name `{0}` already in use with a different configuration")]
    NameInUse(String),

    /// The stream does not exist.
    #[error("stream `{0}` not found")]
    NotFound(String),

    /// The subjects overlap with those of another stream.
    #[error("subjects overlap with an existing stream `{0}`")]
    SubjectOverlap(String),

    /// The broker is marked unavailable.
    #[error("broker unavailable")]
    Unavailable,
}

impl BrokerError for Error {
    fn kind(&self) -> BrokerErrorKind {
        match self {
            Self::InvalidName(_) | Self::InvalidSubject(_) => BrokerErrorKind::Rejected,
            Self::NameInUse(_) => BrokerErrorKind::AlreadyExists,
            Self::NotFound(_) => BrokerErrorKind::NotFound,
            Self::SubjectOverlap(_) => BrokerErrorKind::SubjectOverlap,
            Self::Unavailable => BrokerErrorKind::Unavailable,
        }
    }
}
