//! Domain models exchanged with the signing gateway

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gateway::error::GatewayError;
use crate::gateway::proto;

/// Content type of every submitted document.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A document to sign, as handed over by the HTTP layer.
///
/// Inputs are already validated and decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Raw document bytes
    pub file_bytes: Vec<u8>,
    /// Original file name
    pub file_name: String,
    /// Short description shown to the signer
    pub description: String,
    /// Where the gateway sends the signer afterwards
    pub return_url: String,
}

/// Payload of the gateway `submit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitPayload {
    /// Document bytes
    pub content: Vec<u8>,
    /// File name
    pub file_name: String,
    /// Always [`PDF_CONTENT_TYPE`]
    pub content_type: String,
    /// Description
    pub description: String,
}

impl SubmitPayload {
    /// Builds the gateway payload for a request.
    #[must_use]
    pub fn from_request(request: &SigningRequest) -> Self {
        Self {
            content: request.file_bytes.clone(),
            file_name: request.file_name.clone(),
            content_type: PDF_CONTENT_TYPE.to_string(),
            description: request.description.clone(),
        }
    }

    pub(crate) fn to_proto(&self) -> proto::SubmitRequest {
        proto::SubmitRequest {
            content: self.content.clone(),
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            description: self.description.clone(),
        }
    }
}

/// Result of starting a signing process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInitiateResult {
    /// Gateway-generated signing request id
    pub identifier: String,
    /// URL the caller redirects the signer to
    pub redirect_url: String,
}

/// Status reported by the gateway for a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignStatus {
    /// Signer has not finished yet
    Pending,
    /// Document signed
    Success,
    /// Signing failed or was refused
    Failure,
    /// Request expired before completion
    Expired,
}

impl fmt::Display for SignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

impl TryFrom<i32> for SignStatus {
    type Error = GatewayError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match proto::SignStatus::try_from(value) {
            Ok(proto::SignStatus::Pending) => Ok(Self::Pending),
            Ok(proto::SignStatus::Success) => Ok(Self::Success),
            Ok(proto::SignStatus::Failure) => Ok(Self::Failure),
            Ok(proto::SignStatus::Expired) => Ok(Self::Expired),
            Ok(proto::SignStatus::Unspecified) | Err(_) => Err(GatewayError::protocol(format!(
                "gateway returned unknown sign status {value}"
            ))),
        }
    }
}

/// Gateway answer to a status query, passed through to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignResponse {
    /// Signing status
    pub status: SignStatus,
    /// Signed document (empty unless `status` is `Success`)
    pub signed_content: Vec<u8>,
    /// Gateway message
    pub message: String,
}

impl TryFrom<proto::QueryStatusResponse> for SignResponse {
    type Error = GatewayError;

    fn try_from(response: proto::QueryStatusResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            status: SignStatus::try_from(response.status)?,
            signed_content: response.signed_content,
            message: response.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::error::ErrorKind;

    #[test]
    fn test_payload_forces_pdf_content_type() {
        let request = SigningRequest {
            file_bytes: vec![1, 2, 3],
            file_name: "contract.pdf".to_string(),
            description: "Contract".to_string(),
            return_url: "https://app.example/done".to_string(),
        };

        let payload = SubmitPayload::from_request(&request);
        assert_eq!(payload.content_type, PDF_CONTENT_TYPE);
        assert_eq!(payload.content, vec![1, 2, 3]);
        assert_eq!(payload.file_name, "contract.pdf");
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(SignStatus::try_from(2).unwrap(), SignStatus::Success);
        assert_eq!(SignStatus::try_from(4).unwrap(), SignStatus::Expired);
    }

    #[test]
    fn test_unknown_status_is_protocol_error() {
        assert_eq!(SignStatus::try_from(0).unwrap_err().kind, ErrorKind::Protocol);
        assert_eq!(SignStatus::try_from(42).unwrap_err().kind, ErrorKind::Protocol);
    }

    #[test]
    fn test_response_passthrough() {
        let response = proto::QueryStatusResponse {
            status: proto::SignStatus::Success as i32,
            signed_content: b"%PDF-signed".to_vec(),
            message: "done".to_string(),
        };

        let converted = SignResponse::try_from(response).unwrap();
        assert_eq!(converted.status, SignStatus::Success);
        assert_eq!(converted.signed_content, b"%PDF-signed");
        assert_eq!(converted.message, "done");
    }
}
