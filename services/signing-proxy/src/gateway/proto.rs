//! Wire types and gRPC client for `signing.v1.SigningGateway`.
//!
//! The messages are declared with prost derives, matching the field tags of
//! the gateway contract:
//!
//! ```text
//! service SigningGateway {
//!   rpc Submit(SubmitRequest) returns (SubmitResponse);
//!   rpc QueryStatus(QueryStatusRequest) returns (QueryStatusResponse);
//! }
//! ```

use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

const SUBMIT_PATH: &str = "/signing.v1.SigningGateway/Submit";
const QUERY_STATUS_PATH: &str = "/signing.v1.SigningGateway/QueryStatus";

/// Document submission.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitRequest {
    /// Document bytes
    #[prost(bytes = "vec", tag = "1")]
    pub content: Vec<u8>,
    /// File name
    #[prost(string, tag = "2")]
    pub file_name: String,
    /// MIME type
    #[prost(string, tag = "3")]
    pub content_type: String,
    /// Description
    #[prost(string, tag = "4")]
    pub description: String,
}

/// Gateway-generated request id.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitResponse {
    /// Signing request id
    #[prost(string, tag = "1")]
    pub request_id: String,
}

/// Status lookup.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryStatusRequest {
    /// Signing request id
    #[prost(string, tag = "1")]
    pub request_id: String,
    /// Language for gateway messages
    #[prost(string, tag = "2")]
    pub language: String,
}

/// Status answer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryStatusResponse {
    /// Signing status
    #[prost(enumeration = "SignStatus", tag = "1")]
    pub status: i32,
    /// Signed document, when available
    #[prost(bytes = "vec", tag = "2")]
    pub signed_content: Vec<u8>,
    /// Gateway message
    #[prost(string, tag = "3")]
    pub message: String,
}

/// Wire enumeration of signing states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SignStatus {
    /// Not set
    Unspecified = 0,
    /// Waiting for the signer
    Pending = 1,
    /// Signed
    Success = 2,
    /// Failed
    Failure = 3,
    /// Expired
    Expired = 4,
}

/// Unary client for the signing gateway.
#[derive(Clone)]
pub struct SigningGatewayClient {
    inner: tonic::client::Grpc<Channel>,
}

impl SigningGatewayClient {
    /// Wraps a channel, applying the message size limit in both directions.
    #[must_use]
    pub fn new(channel: Channel, max_message_bytes: usize) -> Self {
        let inner = tonic::client::Grpc::new(channel)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes);
        Self { inner }
    }

    /// Calls `Submit`.
    ///
    /// # Errors
    ///
    /// Returns the gRPC status of a failed call.
    pub async fn submit(&mut self, request: SubmitRequest) -> Result<SubmitResponse, tonic::Status> {
        self.ready().await?;
        let path = PathAndQuery::from_static(SUBMIT_PATH);
        let response = self
            .inner
            .unary(tonic::Request::new(request), path, ProstCodec::default())
            .await?;
        Ok(response.into_inner())
    }

    /// Calls `QueryStatus`.
    ///
    /// # Errors
    ///
    /// Returns the gRPC status of a failed call.
    pub async fn query_status(
        &mut self,
        request: QueryStatusRequest,
    ) -> Result<QueryStatusResponse, tonic::Status> {
        self.ready().await?;
        let path = PathAndQuery::from_static(QUERY_STATUS_PATH);
        let response = self
            .inner
            .unary(tonic::Request::new(request), path, ProstCodec::default())
            .await?;
        Ok(response.into_inner())
    }

    async fn ready(&mut self) -> Result<(), tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("gateway not ready: {e}")))
    }
}
