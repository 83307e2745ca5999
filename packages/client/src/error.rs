//! Client error type.
//!
//! Every failure carries an [`ErrorKind`] so callers can tell "the request
//! never got a usable answer" apart from "the peer evaluated it and said no"
//! without inspecting messages.

use serde_json::Value;
use vortex::CallError;
use vortex_session::StateError;

/// Broad failure category of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure, timeout, non-2xx status, or an unreadable body.
    Transport,
    /// The peer evaluated the request and reported an application error.
    RemoteEvaluation,
    /// A local precondition failed; nothing was sent.
    State,
    /// Caller-supplied input was rejected before anything was sent.
    InvalidInput,
}

/// An error returned by [`crate::PeerClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The peer answered with a non-2xx status.
    #[error("{operation} failed: {status} {status_text}")]
    Status {
        operation: &'static str,
        status: u16,
        status_text: String,
    },

    /// The request could not be completed (connect, timeout, decode).
    #[error("{operation} failed: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The response carried a non-empty `errorCode`.
    #[error("{operation} error: {message}")]
    Remote {
        operation: &'static str,
        code: String,
        message: String,
    },

    /// The connection test returned the wrong value.
    #[error("peer connection test failed: expected {expected}, got {got}")]
    HandshakeMismatch { expected: i64, got: Value },

    /// The peer returned a value of the wrong shape.
    #[error("unexpected value from peer: {0}")]
    UnexpectedValue(Value),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Call(#[from] CallError),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Status { .. } | ClientError::Network { .. } => ErrorKind::Transport,
            ClientError::Remote { .. }
            | ClientError::HandshakeMismatch { .. }
            | ClientError::UnexpectedValue(_) => ErrorKind::RemoteEvaluation,
            ClientError::State(_) => ErrorKind::State,
            ClientError::Call(_) => ErrorKind::InvalidInput,
        }
    }

    /// `true` when the request was aborted by the client-side deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Network { source, .. } if source.is_timeout())
    }

    /// The peer's error code, for [`ErrorKind::RemoteEvaluation`] failures.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            ClientError::Remote { code, .. } => Some(code),
            _ => None,
        }
    }
}
