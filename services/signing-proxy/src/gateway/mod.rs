//! Signing Gateway Contract
//!
//! Wire messages, domain models and the error taxonomy of the remote
//! signing gateway.

pub mod error;
pub mod models;
pub mod proto;

pub use error::{CLASSIFICATION, ErrorClass, ErrorKind, GatewayError};
pub use models::{
    PDF_CONTENT_TYPE, SignInitiateResult, SignResponse, SignStatus, SigningRequest, SubmitPayload,
};
