use std::time::Duration;

use async_nats::jetstream::ErrorCode;
use async_nats::jetstream::context::{
    CreateStreamError, CreateStreamErrorKind, GetStreamError, GetStreamErrorKind, RequestError,
};
use proven_streams::{BrokerError, BrokerErrorKind};
use thiserror::Error;

/// Errors that can occur when talking to NATS `JetStream`.
#[derive(Debug, Error)]
pub enum Error {
    /// Error creating a stream.
    #[error("NATS JetStream create stream error: {0}")]
    Create(#[from] CreateStreamError),

    /// Error deleting a stream. `JetStream` reports these with the same type as lookups.
    #[error("NATS JetStream delete stream error: {0}")]
    Delete(#[source] GetStreamError),

    /// Error fetching a stream.
    #[error("NATS JetStream get stream error: {0}")]
    Get(#[from] GetStreamError),

    /// Error listing streams.
    #[error("NATS JetStream list streams error: {0}")]
    List(#[from] RequestError),

    /// The operation did not complete within the configured timeout.
    #[error("NATS {operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The configured bound.
        timeout: Duration,
    },
}

impl BrokerError for Error {
    fn kind(&self) -> BrokerErrorKind {
        match self {
            Self::Create(e) => match e.kind() {
                CreateStreamErrorKind::JetStream(js) => classify_jetstream_error(&js),
                CreateStreamErrorKind::JetStreamUnavailable
                | CreateStreamErrorKind::TimedOut
                | CreateStreamErrorKind::Response => BrokerErrorKind::Unavailable,
                _ => BrokerErrorKind::Rejected,
            },
            Self::Delete(e) | Self::Get(e) => match e.kind() {
                GetStreamErrorKind::JetStream(js) => classify_jetstream_error(&js),
                GetStreamErrorKind::Request => BrokerErrorKind::Unavailable,
                _ => BrokerErrorKind::Rejected,
            },
            // stream listing only fails at the request layer
            Self::List(_) | Self::Timeout { .. } => BrokerErrorKind::Unavailable,
        }
    }
}

fn classify_jetstream_error(error: &async_nats::jetstream::Error) -> BrokerErrorKind {
    let code = error.error_code();

    if code == ErrorCode::STREAM_NOT_FOUND {
        BrokerErrorKind::NotFound
    } else if code == ErrorCode::STREAM_NAME_EXIST {
        BrokerErrorKind::AlreadyExists
    } else if code == ErrorCode::STREAM_SUBJECT_OVERLAP {
        BrokerErrorKind::SubjectOverlap
    } else if is_retriable_jetstream_error(&error.to_string()) {
        BrokerErrorKind::Unavailable
    } else {
        BrokerErrorKind::Rejected
    }
}

fn is_retriable_jetstream_error(error_str: &str) -> bool {
    let error_str = error_str.to_ascii_lowercase();

    error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("connection")
        || error_str.contains("unavailable")
        || error_str.contains("no responders")
        || error_str.contains("temporary")
}
