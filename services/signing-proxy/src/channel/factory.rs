//! Construction of gateway channels
//!
//! Every channel presents the client certificate. Server validation is either
//! strict (platform roots, SNI on the gateway host) or relaxed, where any
//! server certificate is accepted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint, Uri};
use url::{Host, Url};

use crate::channel::gateway_channel::{GatewayChannel, GatewayTransport};
use crate::error::SigningError;
use crate::gateway::proto::{QueryStatusRequest, SigningGatewayClient};
use crate::gateway::{GatewayError, SignResponse, SubmitPayload};
use crate::logging;
use crate::mtls::{ClientCertificate, insecure_client_config};

/// Default connection open timeout.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(15);
/// Default send timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(45);
/// Default receive timeout.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(45);
/// Default graceful close timeout.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);
/// Default message size limit in both directions (10 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Builds ready-to-use gateway channels.
pub trait ChannelFactory: Send + Sync {
    /// Creates a fresh channel in the `Created` state.
    ///
    /// # Errors
    ///
    /// Returns `ChannelSetup` if the channel cannot be constructed.
    fn create(&self) -> Result<GatewayChannel, SigningError>;
}

/// Transport settings applied to every channel.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Gateway address, always `https`
    pub target: Url,
    /// Connection open timeout
    pub open_timeout: Duration,
    /// Send timeout
    pub send_timeout: Duration,
    /// Receive timeout
    pub receive_timeout: Duration,
    /// Graceful close timeout
    pub close_timeout: Duration,
    /// Message size limit in both directions
    pub max_message_bytes: usize,
    /// Accept any server certificate
    pub insecure_skip_verify: bool,
}

impl ChannelSettings {
    /// Creates settings with default timeouts and limits.
    ///
    /// An `http` address is upgraded to `https`.
    #[must_use]
    pub fn new(target: Url) -> Self {
        Self {
            target: normalize_target(target),
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            insecure_skip_verify: false,
        }
    }

    /// Enables or disables relaxed server validation.
    #[must_use]
    pub const fn with_insecure_skip_verify(mut self, enabled: bool) -> Self {
        self.insecure_skip_verify = enabled;
        self
    }

    /// Deadline of a whole call, covering send and receive.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.send_timeout.max(self.receive_timeout)
    }

    fn host_and_port(&self) -> Result<(Host<String>, u16), SigningError> {
        let host = self
            .target
            .host()
            .ok_or_else(|| SigningError::channel_setup("gateway address has no host"))?
            .to_owned();
        let port = self
            .target
            .port_or_known_default()
            .ok_or_else(|| SigningError::channel_setup("gateway address has no port"))?;
        Ok((host, port))
    }
}

fn normalize_target(mut target: Url) -> Url {
    if target.scheme() == "http" {
        // Both schemes are special, so the switch cannot fail
        let _ = target.set_scheme("https");
    }
    target
}

/// Production factory building tonic channels.
pub struct TonicChannelFactory {
    settings: ChannelSettings,
    certificate: Arc<ClientCertificate>,
    next_id: AtomicU64,
}

impl TonicChannelFactory {
    /// Creates a factory for the given settings and client identity.
    ///
    /// # Errors
    ///
    /// Returns `ChannelSetup` if the address is not an `https` URL with a
    /// host.
    pub fn new(
        settings: ChannelSettings,
        certificate: Arc<ClientCertificate>,
    ) -> Result<Self, SigningError> {
        if settings.target.scheme() != "https" {
            return Err(SigningError::channel_setup(format!(
                "unsupported gateway scheme '{}'",
                settings.target.scheme()
            )));
        }
        settings.host_and_port()?;

        Ok(Self {
            settings,
            certificate,
            next_id: AtomicU64::new(1),
        })
    }

    /// Settings applied to every channel.
    #[must_use]
    pub const fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    fn endpoint(&self, uri: String) -> Result<Endpoint, SigningError> {
        Ok(Endpoint::from_shared(uri)
            .map_err(|e| SigningError::channel_setup(format!("invalid gateway address: {e}")))?
            .connect_timeout(self.settings.open_timeout)
            .timeout(self.settings.call_timeout()))
    }

    fn strict_channel(&self) -> Result<Channel, SigningError> {
        let (host, _) = self.settings.host_and_port()?;
        let tls = ClientTlsConfig::new()
            .with_native_roots()
            .identity(self.certificate.tonic_identity())
            .domain_name(host_name(&host));

        let channel = self
            .endpoint(self.settings.target.to_string())?
            .tls_config(tls)
            .map_err(|e| SigningError::channel_setup(format!("TLS configuration: {e}")))?
            .connect_lazy();
        Ok(channel)
    }

    fn relaxed_channel(&self) -> Result<Channel, SigningError> {
        let (host, port) = self.settings.host_and_port()?;
        let server_name = match &host {
            Host::Domain(domain) => ServerName::try_from(domain.clone())
                .map_err(|e| SigningError::channel_setup(format!("invalid server name: {e}")))?,
            Host::Ipv4(ip) => ServerName::IpAddress(std::net::IpAddr::V4(*ip).into()),
            Host::Ipv6(ip) => ServerName::IpAddress(std::net::IpAddr::V6(*ip).into()),
        };

        logging::log_insecure_channel(self.settings.target.as_str());

        let connector = TlsConnector::from(Arc::new(insecure_client_config(&self.certificate)?));
        let address = format!("{host}:{port}");
        let open_timeout = self.settings.open_timeout;

        // The connector does TLS itself, so tonic sees plain http
        let endpoint = self.endpoint(format!("http://{host}:{port}"))?;
        let channel = endpoint.connect_with_connector_lazy(tower::service_fn(move |_: Uri| {
            let connector = connector.clone();
            let server_name = server_name.clone();
            let address = address.clone();
            async move {
                let tls = tokio::time::timeout(open_timeout, async {
                    let tcp = TcpStream::connect(&address).await?;
                    connector.connect(server_name, tcp).await
                })
                .await
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "open timeout"))??;
                Ok::<_, std::io::Error>(TokioIo::new(tls))
            }
        }));
        Ok(channel)
    }
}

fn host_name(host: &Host<String>) -> String {
    match host {
        Host::Domain(domain) => domain.clone(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    }
}

impl ChannelFactory for TonicChannelFactory {
    fn create(&self) -> Result<GatewayChannel, SigningError> {
        let channel = if self.settings.insecure_skip_verify {
            self.relaxed_channel()?
        } else {
            self.strict_channel()?
        };

        let client = SigningGatewayClient::new(channel, self.settings.max_message_bytes);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(GatewayChannel::new(
            id,
            self.settings.target.as_str(),
            Box::new(TonicTransport::new(client)),
        ))
    }
}

/// [`GatewayTransport`] over a tonic channel.
///
/// The underlying HTTP/2 connection is released once every clone of the
/// client is dropped, so close and abort both just give up this handle.
pub struct TonicTransport {
    client: Mutex<Option<SigningGatewayClient>>,
}

impl TonicTransport {
    /// Wraps a gRPC client.
    #[must_use]
    pub const fn new(client: SigningGatewayClient) -> Self {
        Self {
            client: Mutex::new(Some(client)),
        }
    }

    fn client(&self) -> Result<SigningGatewayClient, GatewayError> {
        self.client
            .lock()
            .clone()
            .ok_or_else(|| GatewayError::connection("transport has been released"))
    }
}

#[async_trait]
impl GatewayTransport for TonicTransport {
    async fn submit(&self, payload: &SubmitPayload) -> Result<String, GatewayError> {
        let mut client = self.client()?;
        let response = client.submit(payload.to_proto()).await?;
        if response.request_id.is_empty() {
            return Err(GatewayError::protocol("gateway returned an empty request id"));
        }
        Ok(response.request_id)
    }

    async fn query_status(
        &self,
        request_id: &str,
        language: &str,
    ) -> Result<SignResponse, GatewayError> {
        let mut client = self.client()?;
        let response = client
            .query_status(QueryStatusRequest {
                request_id: request_id.to_string(),
                language: language.to_string(),
            })
            .await?;
        SignResponse::try_from(response)
    }

    async fn close(&self) -> Result<(), GatewayError> {
        self.client
            .lock()
            .take()
            .map(drop)
            .ok_or_else(|| GatewayError::connection("transport has been released"))
    }

    fn abort(&self) {
        self.client.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::state::ChannelState;
    use crate::mtls::CertificateLoader;
    use secrecy::SecretString;

    fn certificate() -> Arc<ClientCertificate> {
        let dir = tempfile::tempdir().unwrap();
        let certified = rcgen::generate_simple_self_signed(vec!["proxy.local".to_string()]).unwrap();
        let bundle = format!("{}{}", certified.cert.pem(), certified.key_pair.serialize_pem());
        std::fs::write(dir.path().join("client.pem"), bundle).unwrap();

        let loader = CertificateLoader::new(dir.path());
        let password = SecretString::from("unused".to_string());
        Arc::new(loader.load(Some("client.pem"), Some(&password)).unwrap())
    }

    fn settings(address: &str) -> ChannelSettings {
        ChannelSettings::new(Url::parse(address).unwrap())
    }

    #[test]
    fn test_http_address_is_upgraded() {
        let settings = settings("http://gateway.local:8443/");
        assert_eq!(settings.target.scheme(), "https");
        assert_eq!(settings.target.port(), Some(8443));
    }

    #[test]
    fn test_default_settings() {
        let settings = settings("https://gateway.local");
        assert_eq!(settings.open_timeout, Duration::from_secs(15));
        assert_eq!(settings.call_timeout(), Duration::from_secs(45));
        assert_eq!(settings.close_timeout, Duration::from_secs(10));
        assert_eq!(settings.max_message_bytes, 10 * 1024 * 1024);
        assert!(!settings.insecure_skip_verify);
        assert_eq!(settings.host_and_port().unwrap().1, 443);
    }

    #[test]
    fn test_unsupported_scheme_is_rejected() {
        let result = TonicChannelFactory::new(settings("ftp://gateway.local"), certificate());
        assert!(matches!(result, Err(SigningError::ChannelSetup { .. })));
    }

    #[tokio::test]
    async fn test_strict_channels_get_increasing_ids() {
        let factory =
            TonicChannelFactory::new(settings("https://gateway.local:443"), certificate()).unwrap();

        let first = factory.create().unwrap();
        let second = factory.create().unwrap();

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_eq!(first.state(), ChannelState::Created);
        assert_eq!(first.target(), "https://gateway.local/");
    }

    #[tokio::test]
    async fn test_relaxed_channel_is_built_lazily() {
        let settings = settings("https://127.0.0.1:9443").with_insecure_skip_verify(true);
        let factory = TonicChannelFactory::new(settings, certificate()).unwrap();

        let channel = factory.create().unwrap();
        assert_eq!(channel.state(), ChannelState::Created);
    }

    #[tokio::test]
    async fn test_released_transport_reports_connection_error() {
        let factory =
            TonicChannelFactory::new(settings("https://gateway.local"), certificate()).unwrap();
        let channel = factory.create().unwrap();

        channel.abort();
        assert_eq!(channel.state(), ChannelState::Closed);

        let err = channel.query_status("abc123", "en").await.unwrap_err();
        assert_eq!(err.kind, crate::gateway::ErrorKind::Connection);
    }
}
