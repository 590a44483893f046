//! Transport-level errors reported by the signing gateway channel
//!
//! Every failure carries an explicit [`ErrorKind`]; whether it is worth
//! retrying is looked up in a static table rather than inferred from the
//! error's origin.

use std::fmt;

use rust_common::Retryable;
use thiserror::Error;
use tonic::Code;

/// Category of a failed gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection dropped, reset, or the channel was already unusable
    Connection,
    /// Open, send or receive deadline elapsed
    Timeout,
    /// Gateway address could not be reached
    EndpointUnreachable,
    /// Framing, encoding or unexpected protocol answer
    Protocol,
    /// Gateway refused the request shape
    MalformedRequest,
    /// Gateway-reported business error
    Rejected,
}

/// Retry class of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Likely to succeed on retry
    Transient,
    /// Never retried
    Fatal,
}

/// Classification of every error kind.
pub const CLASSIFICATION: [(ErrorKind, ErrorClass); 6] = [
    (ErrorKind::Connection, ErrorClass::Transient),
    (ErrorKind::Timeout, ErrorClass::Transient),
    (ErrorKind::EndpointUnreachable, ErrorClass::Transient),
    (ErrorKind::Protocol, ErrorClass::Fatal),
    (ErrorKind::MalformedRequest, ErrorClass::Fatal),
    (ErrorKind::Rejected, ErrorClass::Fatal),
];

impl ErrorKind {
    /// Looks up the retry class in [`CLASSIFICATION`].
    #[must_use]
    pub fn class(self) -> ErrorClass {
        CLASSIFICATION
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or(ErrorClass::Fatal, |(_, class)| *class)
    }

    /// Whether a failure of this kind leaves the channel permanently broken.
    ///
    /// Answers produced by the gateway itself do not; anything that went
    /// wrong on the wire does.
    #[must_use]
    pub const fn faults_channel(self) -> bool {
        matches!(
            self,
            Self::Connection | Self::Timeout | Self::EndpointUnreachable | Self::Protocol
        )
    }

    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::EndpointUnreachable => "endpoint_unreachable",
            Self::Protocol => "protocol",
            Self::MalformedRequest => "malformed_request",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call on a gateway channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    /// Failure category
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl GatewayError {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// Creates a `Timeout` error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Creates an `EndpointUnreachable` error.
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EndpointUnreachable, message)
    }

    /// Creates a `Protocol` error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Creates a `MalformedRequest` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRequest, message)
    }

    /// Creates a `Rejected` error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    /// Retry class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

impl Retryable for GatewayError {
    fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<tonic::Status> for GatewayError {
    fn from(status: tonic::Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::Unavailable => Self::unreachable(message),
            // tonic reports its own request deadline as Cancelled
            Code::DeadlineExceeded | Code::Cancelled => Self::timeout(message),
            Code::Unknown | Code::Internal | Code::Unimplemented | Code::DataLoss => {
                Self::protocol(message)
            }
            Code::InvalidArgument | Code::OutOfRange => Self::malformed(message),
            _ => Self::rejected(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert_eq!(ErrorKind::Connection.class(), ErrorClass::Transient);
        assert_eq!(ErrorKind::Timeout.class(), ErrorClass::Transient);
        assert_eq!(ErrorKind::EndpointUnreachable.class(), ErrorClass::Transient);
    }

    #[test]
    fn test_fatal_kinds() {
        assert_eq!(ErrorKind::Protocol.class(), ErrorClass::Fatal);
        assert_eq!(ErrorKind::MalformedRequest.class(), ErrorClass::Fatal);
        assert_eq!(ErrorKind::Rejected.class(), ErrorClass::Fatal);
    }

    #[test]
    fn test_table_covers_every_kind_once() {
        for (kind, _) in CLASSIFICATION {
            let entries = CLASSIFICATION.iter().filter(|(k, _)| *k == kind).count();
            assert_eq!(entries, 1, "{kind} listed {entries} times");
        }
    }

    #[test]
    fn test_gateway_answers_do_not_fault_channel() {
        assert!(!ErrorKind::MalformedRequest.faults_channel());
        assert!(!ErrorKind::Rejected.faults_channel());
        assert!(ErrorKind::Protocol.faults_channel());
        assert!(ErrorKind::Timeout.faults_channel());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (tonic::Status::unavailable("down"), ErrorKind::EndpointUnreachable),
            (tonic::Status::deadline_exceeded("slow"), ErrorKind::Timeout),
            (tonic::Status::cancelled("Timeout expired"), ErrorKind::Timeout),
            (tonic::Status::internal("h2 protocol error"), ErrorKind::Protocol),
            (tonic::Status::invalid_argument("bad pdf"), ErrorKind::MalformedRequest),
            (tonic::Status::failed_precondition("quota"), ErrorKind::Rejected),
            (tonic::Status::not_found("unknown id"), ErrorKind::Rejected),
        ];

        for (status, expected) in cases {
            assert_eq!(GatewayError::from(status).kind, expected);
        }
    }

    #[test]
    fn test_retryable_follows_table() {
        assert!(GatewayError::timeout("t").is_retryable());
        assert!(!GatewayError::malformed("m").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = GatewayError::unreachable("connection refused");
        assert_eq!(err.to_string(), "endpoint_unreachable: connection refused");
    }
}
