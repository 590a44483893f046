//! Signing Proxy Library
//!
//! Relays document signing requests to a remote signing gateway over a
//! certificate-authenticated gRPC channel. Broken channels are rebuilt
//! exactly once per fault and transient failures are retried with
//! exponential backoff.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod mtls;
pub mod retry;
pub mod shutdown;

pub use channel::{
    ChannelFactory, ChannelHealthMonitor, ChannelSettings, ChannelState, GatewayChannel,
    GatewayTransport, TonicChannelFactory,
};
pub use client::{SigningClient, build_redirect_url};
pub use config::{Config, ConfigError};
pub use error::{ErrorCode, GatewayFailure, SigningError};
pub use gateway::{
    CLASSIFICATION, ErrorClass, ErrorKind, GatewayError, PDF_CONTENT_TYPE, SignInitiateResult,
    SignResponse, SignStatus, SigningRequest, SubmitPayload,
};
pub use mtls::{CertificateLoader, ClientCertificate};
pub use retry::{RetryExecutor, signing_retry_config};
