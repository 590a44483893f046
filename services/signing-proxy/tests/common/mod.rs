//! Scripted gateway doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_common::Sleeper;
use tokio::sync::Notify;
use url::Url;

use signing_proxy::{
    ChannelFactory, GatewayChannel, GatewayError, GatewayTransport, RetryExecutor, SignResponse,
    SignStatus, SigningClient, SigningError, SigningRequest, SubmitPayload,
};

pub const GATEWAY_HOST: &str = "https://signing-gateway.local";

/// Outcomes handed out in order to every channel of a factory.
///
/// Once a queue runs dry, submits answer `abc123` and queries answer a
/// successful signature.
#[derive(Default)]
pub struct Script {
    pub submits: Mutex<VecDeque<Result<String, GatewayError>>>,
    pub queries: Mutex<VecDeque<Result<SignResponse, GatewayError>>>,
    pub payloads: Mutex<Vec<SubmitPayload>>,
    pub languages: Mutex<Vec<String>>,
    pub submit_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub abort_calls: AtomicUsize,
    pub close_error: Mutex<Option<GatewayError>>,
    pub close_hangs: AtomicBool,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_submit(&self, outcome: Result<String, GatewayError>) {
        self.submits.lock().push_back(outcome);
    }

    pub fn push_query(&self, outcome: Result<SignResponse, GatewayError>) {
        self.queries.lock().push_back(outcome);
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.abort_calls.load(Ordering::SeqCst)
    }
}

pub fn signed_response() -> SignResponse {
    SignResponse {
        status: SignStatus::Success,
        signed_content: b"%PDF-signed".to_vec(),
        message: "Document signed".to_string(),
    }
}

pub struct ScriptedTransport {
    script: Arc<Script>,
}

#[async_trait]
impl GatewayTransport for ScriptedTransport {
    async fn submit(&self, payload: &SubmitPayload) -> Result<String, GatewayError> {
        self.script.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.script.payloads.lock().push(payload.clone());
        let next = self.script.submits.lock().pop_front();
        next.unwrap_or_else(|| Ok("abc123".to_string()))
    }

    async fn query_status(
        &self,
        _request_id: &str,
        language: &str,
    ) -> Result<SignResponse, GatewayError> {
        self.script.query_calls.fetch_add(1, Ordering::SeqCst);
        self.script.languages.lock().push(language.to_string());
        let next = self.script.queries.lock().pop_front();
        next.unwrap_or_else(|| Ok(signed_response()))
    }

    async fn close(&self) -> Result<(), GatewayError> {
        self.script.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.close_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match self.script.close_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn abort(&self) {
        self.script.abort_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory counting how many channels it built.
pub struct ScriptedFactory {
    pub script: Arc<Script>,
    pub created: AtomicUsize,
    next_id: AtomicU64,
    first_faulted: bool,
    fail_after: Option<usize>,
    build_delay: Duration,
}

impl ScriptedFactory {
    pub fn new(script: Arc<Script>) -> Self {
        Self {
            script,
            created: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            first_faulted: false,
            fail_after: None,
            build_delay: Duration::ZERO,
        }
    }

    /// The first channel is handed out already faulted.
    pub const fn with_faulted_first_channel(mut self) -> Self {
        self.first_faulted = true;
        self
    }

    /// Every build after the first `count` fails.
    pub const fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Blocks each build for `delay`.
    pub const fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ChannelFactory for ScriptedFactory {
    fn create(&self) -> Result<GatewayChannel, SigningError> {
        let count = self.created.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| count >= limit) {
            return Err(SigningError::channel_setup("certificate rejected by provider"));
        }
        if !self.build_delay.is_zero() {
            std::thread::sleep(self.build_delay);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let channel = GatewayChannel::new(
            id,
            GATEWAY_HOST,
            Box::new(ScriptedTransport {
                script: Arc::clone(&self.script),
            }),
        );
        if self.first_faulted && count == 0 {
            channel.mark_faulted();
        }
        Ok(channel)
    }
}

/// Records requested delays instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

/// Parks every backoff until the test lets it go.
#[derive(Default)]
pub struct GatedSleeper {
    pub parked: Notify,
    pub release: Notify,
}

#[async_trait]
impl Sleeper for GatedSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.parked.notify_one();
        self.release.notified().await;
    }
}

pub struct Harness {
    pub client: SigningClient,
    pub factory: Arc<ScriptedFactory>,
    pub sleeper: Arc<RecordingSleeper>,
    pub script: Arc<Script>,
}

pub fn harness_with(factory: ScriptedFactory) -> Harness {
    let script = Arc::clone(&factory.script);
    let factory = Arc::new(factory);
    let sleeper = Arc::new(RecordingSleeper::default());
    let retry = RetryExecutor::default().with_sleeper(sleeper.clone());

    let client = SigningClient::with_factory(
        factory.clone(),
        retry,
        Url::parse(GATEWAY_HOST).unwrap(),
        Duration::from_secs(10),
    )
    .unwrap();

    Harness {
        client,
        factory,
        sleeper,
        script,
    }
}

pub fn harness() -> Harness {
    harness_with(ScriptedFactory::new(Script::new()))
}

pub fn contract_request() -> SigningRequest {
    SigningRequest {
        file_bytes: b"%PDF-1.7 contract".to_vec(),
        file_name: "contract.pdf".to_string(),
        description: "Contract".to_string(),
        return_url: "https://app.example/done".to_string(),
    }
}
