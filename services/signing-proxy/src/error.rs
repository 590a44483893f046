//! Error handling module
//!
//! Startup failures (configuration, certificate) abort client construction.
//! Per-call failures are scoped to the call that produced them.

use std::path::PathBuf;

use rust_common::RetryError;
use thiserror::Error;

use crate::gateway::{ErrorClass, ErrorKind, GatewayError};

/// Errors surfaced by the signing client.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SigningError {
    /// A required setting is missing
    #[error("Missing required configuration: {setting}")]
    Configuration {
        /// Name of the missing setting
        setting: String,
    },

    /// Certificate file does not exist at the resolved path
    #[error("Client certificate not found at {}", path.display())]
    CertificateNotFound {
        /// Resolved path
        path: PathBuf,
    },

    /// Certificate file exists but could not be loaded
    #[error("Failed to load client certificate {}: {reason}", path.display())]
    CertificateLoad {
        /// Resolved path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A gateway channel could not be constructed
    #[error("Failed to set up gateway channel: {reason}")]
    ChannelSetup {
        /// What went wrong
        reason: String,
    },

    /// Transient failures persisted through every retry
    #[error("Signing gateway unavailable after {attempts} attempts: {source}")]
    ServiceUnavailable {
        /// Attempts made, including the first
        attempts: u32,
        /// Error of the last attempt
        source: GatewayError,
    },

    /// Non-retryable transport or protocol failure
    #[error("Signing gateway communication failed: {0}")]
    Communication(GatewayError),

    /// The gateway refused the request
    #[error("Signing gateway rejected the request: {0}")]
    Rejected(GatewayError),

    /// The client has been shut down
    #[error("Signing client has been disposed")]
    Disposed,
}

/// Stable error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Missing setting
    Configuration,
    /// Certificate file missing
    CertificateNotFound,
    /// Certificate file unreadable or invalid
    CertificateLoad,
    /// Channel could not be built
    ChannelSetup,
    /// Retries exhausted
    ServiceUnavailable,
    /// Fatal transport or protocol failure
    Communication,
    /// Gateway refused the request
    Rejected,
    /// Client shut down
    Disposed,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::CertificateNotFound => "CERTIFICATE_NOT_FOUND",
            Self::CertificateLoad => "CERTIFICATE_LOAD_ERROR",
            Self::ChannelSetup => "CHANNEL_SETUP_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Communication => "GATEWAY_COMMUNICATION_ERROR",
            Self::Rejected => "GATEWAY_REJECTED",
            Self::Disposed => "CLIENT_DISPOSED",
        }
    }
}

impl SigningError {
    /// Creates a `Configuration` error.
    #[must_use]
    pub fn missing_setting(setting: impl Into<String>) -> Self {
        Self::Configuration {
            setting: setting.into(),
        }
    }

    /// Creates a `ChannelSetup` error.
    #[must_use]
    pub fn channel_setup(reason: impl Into<String>) -> Self {
        Self::ChannelSetup {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration { .. } => ErrorCode::Configuration,
            Self::CertificateNotFound { .. } => ErrorCode::CertificateNotFound,
            Self::CertificateLoad { .. } => ErrorCode::CertificateLoad,
            Self::ChannelSetup { .. } => ErrorCode::ChannelSetup,
            Self::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            Self::Communication(_) => ErrorCode::Communication,
            Self::Rejected(_) => ErrorCode::Rejected,
            Self::Disposed => ErrorCode::Disposed,
        }
    }

    /// Whether this error can only happen while building the client.
    #[must_use]
    pub const fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::CertificateNotFound { .. }
                | Self::CertificateLoad { .. }
        )
    }
}

impl From<GatewayError> for SigningError {
    /// Maps a single, non-retried failure by its kind.
    fn from(error: GatewayError) -> Self {
        match error.kind {
            ErrorKind::MalformedRequest | ErrorKind::Rejected => Self::Rejected(error),
            _ => Self::Communication(error),
        }
    }
}

impl From<RetryError<GatewayFailure>> for SigningError {
    fn from(error: RetryError<GatewayFailure>) -> Self {
        match error {
            RetryError::Fatal(GatewayFailure::Setup(e)) => e,
            RetryError::Fatal(GatewayFailure::Call(e)) => e.into(),
            RetryError::Exhausted { attempts, last } => match last {
                GatewayFailure::Call(source) => Self::ServiceUnavailable { attempts, source },
                GatewayFailure::Setup(e) => e,
            },
        }
    }
}

/// Failure of one resilient attempt: either obtaining a healthy channel or
/// the remote call itself.
#[derive(Error, Debug)]
pub enum GatewayFailure {
    /// Channel recreation failed; never retried
    #[error(transparent)]
    Setup(SigningError),
    /// The remote call failed
    #[error(transparent)]
    Call(GatewayError),
}

impl rust_common::Retryable for GatewayFailure {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Setup(_) => false,
            Self::Call(e) => e.class() == ErrorClass::Transient,
        }
    }
}

impl From<GatewayError> for GatewayFailure {
    fn from(error: GatewayError) -> Self {
        Self::Call(error)
    }
}

impl From<SigningError> for GatewayFailure {
    fn from(error: SigningError) -> Self {
        Self::Setup(error)
    }
}
