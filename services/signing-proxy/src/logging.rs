//! Structured logging helpers for signing operations
//!
//! Document bytes and certificate passwords never reach these helpers.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::SigningError;
use crate::gateway::GatewayError;
use crate::mtls::ClientCertificate;

/// Log a loaded client certificate.
pub fn log_certificate_loaded(certificate: &ClientCertificate, path: &Path) {
    if certificate.is_valid_at(Utc::now()) {
        info!(
            target: "signing",
            subject = %certificate.subject(),
            not_after = %certificate.not_after(),
            path = %path.display(),
            "Client certificate loaded"
        );
    } else {
        warn!(
            target: "signing",
            subject = %certificate.subject(),
            not_before = %certificate.not_before(),
            not_after = %certificate.not_after(),
            path = %path.display(),
            "Client certificate is outside its validity window"
        );
    }
}

/// Log that server certificate validation is disabled.
pub fn log_insecure_channel(target_address: &str) {
    warn!(
        target: "signing",
        target_address = %target_address,
        "Server certificate validation is DISABLED for the signing gateway channel"
    );
}

/// Log the replacement of a broken channel.
pub fn log_channel_recreated(old_id: u64, old_state: &str, new_id: u64) {
    info!(
        target: "signing",
        operation = "channel_recreate",
        old_channel = old_id,
        old_state = %old_state,
        new_channel = new_id,
        "Gateway channel recreated"
    );
}

/// Log a failed channel recreation.
pub fn log_channel_recreate_failed(old_id: u64, err: &SigningError) {
    error!(
        target: "signing",
        operation = "channel_recreate",
        old_channel = old_id,
        error_code = err.code().as_str(),
        error_message = %err,
        "Gateway channel recreation failed"
    );
}

/// Log a channel moving to the faulted state.
pub fn log_channel_faulted(channel_id: u64, err: &GatewayError) {
    debug!(
        target: "signing",
        channel = channel_id,
        error_kind = %err.kind,
        error_message = %err.message,
        "Gateway channel faulted"
    );
}

/// Log a failed graceful close during disposal.
pub fn log_disposal_failure(channel_id: u64, reason: &str) {
    warn!(
        target: "signing",
        operation = "dispose",
        channel = channel_id,
        reason = %reason,
        "Graceful close failed, aborting channel"
    );
}

/// Log a completed signing operation.
pub fn log_signing_operation(operation: &str, request_id: &str, duration: Duration) {
    info!(
        target: "signing",
        operation = %operation,
        request_id = %request_id,
        duration_ms = duration.as_millis() as u64,
        status = "success",
        "Signing gateway call completed"
    );
}

/// Log a failed signing operation.
pub fn log_signing_error(operation: &str, err: &SigningError, duration: Duration) {
    error!(
        target: "signing",
        operation = %operation,
        duration_ms = duration.as_millis() as u64,
        error_code = err.code().as_str(),
        error_message = %err,
        status = "error",
        "Signing gateway call failed"
    );
}
