//! Signing client facade
//!
//! Submits documents and queries signing status through the shared gateway
//! channel, with retries and channel recreation hidden from the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, instrument};
use url::Url;
use url::form_urlencoded;

use crate::channel::{ChannelFactory, ChannelHealthMonitor, ChannelState, TonicChannelFactory};
use crate::config::Config;
use crate::error::{GatewayFailure, SigningError};
use crate::gateway::{SignInitiateResult, SignResponse, SigningRequest, SubmitPayload};
use crate::logging;
use crate::mtls::CertificateLoader;
use crate::retry::RetryExecutor;

/// Client for the remote signing gateway.
///
/// Safe to share between tasks; all calls go through one channel.
pub struct SigningClient {
    channels: ChannelHealthMonitor,
    retry: RetryExecutor,
    redirect_base: Url,
    close_timeout: Duration,
    disposed: AtomicBool,
}

impl std::fmt::Debug for SigningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningClient")
            .field("channels", &self.channels)
            .field("redirect_base", &self.redirect_base.as_str())
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SigningClient {
    /// Loads the client certificate and opens the first gateway channel.
    ///
    /// # Errors
    ///
    /// Returns a configuration or certificate error before any network call
    /// is made, or `ChannelSetup` if the gateway address is unusable.
    pub fn connect(config: &Config) -> Result<Self, SigningError> {
        let loader = CertificateLoader::new(&config.cert_base_dir);
        let certificate =
            loader.load(config.cert_path.as_deref(), config.cert_password.as_ref())?;

        let settings = config.channel_settings();
        let close_timeout = settings.close_timeout;
        let factory = TonicChannelFactory::new(settings, Arc::new(certificate))?;

        Self::with_factory(
            Arc::new(factory),
            RetryExecutor::new(config.retry_config()),
            config.redirect_base_url.clone(),
            close_timeout,
        )
    }

    /// Builds a client on top of an arbitrary channel factory.
    ///
    /// # Errors
    ///
    /// Returns the factory error if the first channel cannot be built.
    pub fn with_factory(
        factory: Arc<dyn ChannelFactory>,
        retry: RetryExecutor,
        redirect_base: Url,
        close_timeout: Duration,
    ) -> Result<Self, SigningError> {
        Ok(Self {
            channels: ChannelHealthMonitor::new(factory)?,
            retry,
            redirect_base,
            close_timeout,
            disposed: AtomicBool::new(false),
        })
    }

    /// Submits a document and returns where to send the signer.
    ///
    /// A submit retried after a timeout may reach the gateway twice.
    ///
    /// # Errors
    ///
    /// - `Disposed` after [`dispose`](Self::dispose)
    /// - `ServiceUnavailable` when transient failures outlast the retries
    /// - `Rejected` or `Communication` on a fatal gateway failure
    #[instrument(skip_all, fields(file_name = %request.file_name))]
    pub async fn start_signing_process(
        &self,
        request: &SigningRequest,
    ) -> Result<SignInitiateResult, SigningError> {
        self.ensure_active()?;
        let started = Instant::now();
        let payload = &SubmitPayload::from_request(request);

        let submitted = self
            .retry
            .execute("submit", move || async move {
                let channel = self.channels.healthy_channel()?;
                let request_id = channel.submit(payload).await?;
                Ok::<_, GatewayFailure>(request_id)
            })
            .await;

        let result = submitted.and_then(|identifier| {
            let redirect_url =
                build_redirect_url(&self.redirect_base, &identifier, &request.return_url)?;
            Ok(SignInitiateResult {
                identifier,
                redirect_url: redirect_url.into(),
            })
        });

        match &result {
            Ok(r) => logging::log_signing_operation("submit", &r.identifier, started.elapsed()),
            Err(e) => logging::log_signing_error("submit", e, started.elapsed()),
        }
        result
    }

    /// Queries the status of a signing request; the gateway answer is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`start_signing_process`](Self::start_signing_process).
    #[instrument(skip(self))]
    pub async fn get_sign_response(
        &self,
        request_id: &str,
        language: &str,
    ) -> Result<SignResponse, SigningError> {
        self.ensure_active()?;
        let started = Instant::now();

        let result = self
            .retry
            .execute("query_status", move || async move {
                let channel = self.channels.healthy_channel()?;
                let response = channel.query_status(request_id, language).await?;
                Ok::<_, GatewayFailure>(response)
            })
            .await;

        match &result {
            Ok(_) => logging::log_signing_operation("query_status", request_id, started.elapsed()),
            Err(e) => logging::log_signing_error("query_status", e, started.elapsed()),
        }
        result
    }

    /// Shuts the client down. Only the first call has any effect.
    ///
    /// An open channel is closed gracefully within the close timeout; any
    /// other channel, or one whose close fails, is aborted. Nothing is
    /// reported to the caller. Calls still waiting between retries fail with
    /// `Disposed` instead of building a new channel.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let channel = self.channels.shut_down();
        if channel.state() == ChannelState::Open {
            match tokio::time::timeout(self.close_timeout, channel.close()).await {
                Ok(Ok(())) => {
                    info!(target: "signing", channel = channel.id(), "Gateway channel closed");
                    return;
                }
                Ok(Err(e)) => logging::log_disposal_failure(channel.id(), &e.to_string()),
                Err(_) => logging::log_disposal_failure(channel.id(), "close timed out"),
            }
        }
        channel.abort();
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_active(&self) -> Result<(), SigningError> {
        if self.is_disposed() {
            return Err(SigningError::Disposed);
        }
        Ok(())
    }
}

impl Drop for SigningClient {
    fn drop(&mut self) {
        if !*self.disposed.get_mut() {
            self.channels.current().abort();
        }
    }
}

/// Builds `<base>/<request_id>?returnUrl=<encoded return url>`.
///
/// The return URL is form-encoded as a whole, so its own `&`, `=` and `?`
/// never leak into the redirect query.
///
/// # Errors
///
/// Returns `Configuration` if `base` cannot carry a path.
pub fn build_redirect_url(
    base: &Url,
    request_id: &str,
    return_url: &str,
) -> Result<Url, SigningError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| SigningError::missing_setting("SIGNING_REDIRECT_BASE_URL"))?
        .pop_if_empty()
        .push(request_id);

    let encoded: String = form_urlencoded::byte_serialize(return_url.as_bytes()).collect();
    url.set_query(Some(&format!("returnUrl={encoded}")));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_url_template() {
        let base = Url::parse("https://signing-gateway.local").unwrap();
        let url = build_redirect_url(&base, "abc123", "https://app.example/done").unwrap();
        assert_eq!(
            url.as_str(),
            "https://signing-gateway.local/abc123?returnUrl=https%3A%2F%2Fapp.example%2Fdone"
        );
    }

    #[test]
    fn test_redirect_url_encodes_query_separators() {
        let base = Url::parse("https://signing-gateway.local/").unwrap();
        let url = build_redirect_url(&base, "abc123", "https://app.example/done?x=1&y=2").unwrap();

        assert!(url.as_str().contains("%3Fx%3D1%26y%3D2"));
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "returnUrl");
        assert_eq!(value, "https://app.example/done?x=1&y=2");
    }

    #[test]
    fn test_redirect_url_keeps_base_path() {
        let base = Url::parse("https://gateway.example/sign/").unwrap();
        let url = build_redirect_url(&base, "r-1", "https://a.b/").unwrap();
        assert_eq!(url.path(), "/sign/r-1");
    }

    #[test]
    fn test_identifier_is_path_escaped() {
        let base = Url::parse("https://gateway.example").unwrap();
        let url = build_redirect_url(&base, "a/b", "https://a.b/").unwrap();
        assert_eq!(url.path(), "/a%2Fb");
    }

    #[test]
    fn test_cannot_be_a_base_is_rejected() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(build_redirect_url(&base, "abc123", "https://a.b/").is_err());
    }
}
