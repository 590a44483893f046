//! Shared library for cross-cutting concerns in signing-platform Rust services.
//!
//! This crate provides centralized implementations for:
//! - Retry policies with exponential backoff and pluggable error classification
//! - Tracing subscriber initialization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod retry;
pub mod tracing_config;

pub use retry::{RetryConfig, RetryError, RetryPolicy, Retryable, Sleeper, TokioSleeper};
pub use tracing_config::{TracingConfig, init_tracing};
