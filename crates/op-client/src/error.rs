//! Client errors.

use std::time::Duration;

use op_core::Topic;
use op_protocol::{CodecError, NegativeAck};
use op_transport::TransportError;
use thiserror::Error;

/// Errors returned by [`crate::Client`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dialing the controller failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A telegram could not be built or the response could not be decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The controller answered with a negative acknowledge.
    #[error(transparent)]
    Rejected(#[from] NegativeAck),

    /// The controller answered with a MID the command does not expect.
    #[error("Unexpected MID {actual:04}, expected {expected:04}")]
    UnexpectedMid { expected: u16, actual: u16 },

    /// The topic already has a subscription stream in this session.
    #[error("Already subscribed to {0}")]
    AlreadySubscribed(Topic),

    /// The session is closed.
    #[error("Connection closed")]
    Closed,

    /// No response arrived before the command deadline.
    #[error("No response within {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// The negative acknowledge, if the controller rejected the command.
    #[must_use]
    pub fn negative_ack(&self) -> Option<&NegativeAck> {
        match self {
            ClientError::Rejected(nak) => Some(nak),
            _ => None,
        }
    }

    /// Whether the error reports session closure rather than a protocol failure.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, ClientError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use op_protocol::ErrorCode;

    #[test]
    fn test_rejected_message() {
        let err = ClientError::from(NegativeAck {
            mid_number: 60,
            error_code: ErrorCode::from_code(9),
        });
        assert_eq!(err.negative_ack().unwrap().mid_number, 60);
        assert_eq!(
            err.to_string(),
            "get error response on mid 60: Last tightening result subscription already exists"
        );
        assert!(!err.is_closed());
    }

    #[test]
    fn test_unexpected_mid_message() {
        let err = ClientError::UnexpectedMid {
            expected: 2,
            actual: 5,
        };
        assert_eq!(err.to_string(), "Unexpected MID 0005, expected 0002");
        assert!(ClientError::Closed.is_closed());
    }
}
