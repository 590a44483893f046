//! Request and response bodies of the HTTP API

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::gateway::{SignResponse, SignStatus, SigningRequest};

/// Body of `POST /api/signing`.
///
/// Missing fields deserialize as empty and fail validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartSigningBody {
    /// Original file name
    pub file_name: String,
    /// Base64-encoded PDF
    pub file_content: String,
    /// Description shown to the signer
    pub description: String,
    /// Absolute http(s) URL the signer returns to
    pub return_url: String,
}

impl StartSigningBody {
    /// Validates the body and decodes the document.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn into_request(self) -> Result<SigningRequest, String> {
        let file_name = required("fileName", self.file_name)?;
        let description = required("description", self.description)?;
        let file_content = required("fileContent", self.file_content)?;
        let return_url = required("returnUrl", self.return_url)?;

        let file_bytes = STANDARD
            .decode(file_content.as_bytes())
            .map_err(|e| format!("fileContent is not valid base64: {e}"))?;
        if file_bytes.is_empty() {
            return Err("fileContent must not be empty".to_string());
        }

        let parsed = Url::parse(&return_url).map_err(|e| format!("returnUrl is invalid: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err("returnUrl must be an absolute http or https URL".to_string());
        }

        Ok(SigningRequest {
            file_bytes,
            file_name,
            description,
            return_url,
        })
    }
}

fn required(field: &str, value: String) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(value)
}

/// Query string of `GET /api/signing/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// Language for gateway messages
    pub language: Option<String>,
}

/// Status answer with the signed document base64-encoded.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponseBody {
    /// Signing status
    pub status: SignStatus,
    /// Base64-encoded signed document, empty until signed
    pub signed_content: String,
    /// Gateway message
    pub message: String,
}

impl From<SignResponse> for SignResponseBody {
    fn from(response: SignResponse) -> Self {
        Self {
            status: response.status,
            signed_content: STANDARD.encode(response.signed_content),
            message: response.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_body() -> StartSigningBody {
        StartSigningBody {
            file_name: "contract.pdf".to_string(),
            file_content: STANDARD.encode(b"%PDF-1.7"),
            description: "Contract".to_string(),
            return_url: "https://app.example/done".to_string(),
        }
    }

    #[test]
    fn test_valid_body_decodes() {
        let request = valid_body().into_request().unwrap();
        assert_eq!(request.file_bytes, b"%PDF-1.7");
        assert_eq!(request.return_url, "https://app.example/done");
    }

    #[test]
    fn test_blank_field_is_rejected() {
        let mut body = valid_body();
        body.description = "   ".to_string();
        assert_eq!(body.into_request().unwrap_err(), "description is required");
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let mut body = valid_body();
        body.file_content = "***".to_string();
        assert!(body.into_request().unwrap_err().contains("base64"));
    }

    #[test]
    fn test_relative_return_url_is_rejected() {
        let mut body = valid_body();
        body.return_url = "/done".to_string();
        assert!(body.into_request().unwrap_err().contains("returnUrl"));
    }

    #[test]
    fn test_non_web_return_url_is_rejected() {
        let mut body = valid_body();
        body.return_url = "javascript:alert(1)".to_string();
        assert!(body.into_request().is_err());
    }

    #[test]
    fn test_missing_fields_deserialize_empty() {
        let body: StartSigningBody = serde_json::from_str(r#"{"fileName":"a.pdf"}"#).unwrap();
        assert_eq!(body.into_request().unwrap_err(), "description is required");
    }

    #[test]
    fn test_response_body_encodes_content() {
        let body = SignResponseBody::from(SignResponse {
            status: SignStatus::Success,
            signed_content: b"signed".to_vec(),
            message: "ok".to_string(),
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["signedContent"], STANDARD.encode(b"signed"));
    }
}
