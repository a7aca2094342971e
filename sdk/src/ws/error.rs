//! WebSocket protocol error types.
//!
//! Errors raised while decoding inbound frames. None of them are fatal: the
//! router logs the error and drops the frame.

use std::fmt;

/// Frame decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is not valid JSON.
    Malformed(String),

    /// Frame is JSON but has no string `type` field.
    MissingType,

    /// Frame declares a type this client does not handle.
    UnknownType(String),

    /// Frame declares a known type but its payload does not match.
    InvalidPayload {
        /// Declared message type.
        kind: String,
        /// Decoder message.
        reason: String,
    },
}

impl ProtocolError {
    /// Returns true if the frame should be ignored quietly rather than
    /// reported as a dropped frame.
    #[must_use]
    pub const fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownType(_))
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed frame: {}", msg),
            Self::MissingType => write!(f, "frame has no type field"),
            Self::UnknownType(kind) => write!(f, "unknown message type: {}", kind),
            Self::InvalidPayload { kind, reason } => {
                write!(f, "invalid {} payload: {}", kind, reason)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::Malformed("expected value".to_string());
        assert_eq!(err.to_string(), "malformed frame: expected value");
    }

    #[test]
    fn test_protocol_error_invalid_payload() {
        let err = ProtocolError::InvalidPayload {
            kind: "bid_update".to_string(),
            reason: "missing field `bid`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid bid_update payload: missing field `bid`"
        );
    }

    #[test]
    fn test_unknown_type() {
        assert!(ProtocolError::UnknownType("chat".to_string()).is_unknown_type());
        assert!(!ProtocolError::MissingType.is_unknown_type());
    }
}
