use crate::logic::types::RobotStatus;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure to establish a session with the fleet service
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session endpoint responded with HTTP {0}")]
    Status(u16),
    #[error("session request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("session response carried no session_id")]
    MissingSessionId,
    #[error("could not persist session id: {0}")]
    Storage(#[from] io::Error),
}

/// Failure of a data or mutation call
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{operation} responded with HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("{operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned an unreadable body: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{operation} could not build request URL: {source}")]
    InvalidUrl {
        operation: &'static str,
        #[source]
        source: url::ParseError,
    },
}

impl TransportError {
    pub(crate) fn from_reqwest(operation: &'static str, err: reqwest::Error, after: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout { operation, after }
        } else {
            TransportError::Request {
                operation,
                source: err,
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::Status { status: 401, .. })
    }
}

/// Failure surfaced by the fleet and detail stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// Refresh failed; the message is what the store recorded as its user-facing error.
    #[error("{0}")]
    Refresh(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("task text is empty")]
    EmptyTask,
    #[error("robot {id} is {status} and cannot take tasks")]
    RobotUnavailable { id: String, status: RobotStatus },
    #[error("task rejected by fleet service: {0}")]
    TaskRejected(String),
}
