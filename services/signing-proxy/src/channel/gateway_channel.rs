//! A single connection to the signing gateway and its lifecycle

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use crate::channel::state::ChannelState;
use crate::gateway::{GatewayError, SignResponse, SubmitPayload};
use crate::logging;

/// Raw gateway operations over one connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// Submits a document and returns the gateway request id.
    async fn submit(&self, payload: &SubmitPayload) -> Result<String, GatewayError>;

    /// Looks up the status of a signing request.
    async fn query_status(
        &self,
        request_id: &str,
        language: &str,
    ) -> Result<SignResponse, GatewayError>;

    /// Gracefully closes the connection.
    async fn close(&self) -> Result<(), GatewayError>;

    /// Drops the connection immediately.
    fn abort(&self);
}

/// A gateway connection with a tracked [`ChannelState`].
pub struct GatewayChannel {
    id: u64,
    target: String,
    state: AtomicU8,
    transport: Box<dyn GatewayTransport>,
}

impl fmt::Debug for GatewayChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayChannel")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl GatewayChannel {
    /// Wraps a transport in a fresh `Created` channel.
    #[must_use]
    pub fn new(id: u64, target: impl Into<String>, transport: Box<dyn GatewayTransport>) -> Self {
        Self {
            id,
            target: target.into(),
            state: AtomicU8::new(ChannelState::Created as u8),
            transport,
        }
    }

    /// Channel id, unique per factory.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Gateway address.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether new calls may be issued.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.state().is_usable()
    }

    /// Submits a document.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or `Connection` if the channel is
    /// already faulted or closed.
    pub async fn submit(&self, payload: &SubmitPayload) -> Result<String, GatewayError> {
        self.begin_call()?;
        let result = self.transport.submit(payload).await;
        self.settle(result)
    }

    /// Queries the status of a signing request.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or `Connection` if the channel is
    /// already faulted or closed.
    pub async fn query_status(
        &self,
        request_id: &str,
        language: &str,
    ) -> Result<SignResponse, GatewayError> {
        self.begin_call()?;
        let result = self.transport.query_status(request_id, language).await;
        self.settle(result)
    }

    /// Gracefully closes the channel.
    ///
    /// Success moves the channel to `Closed`, failure to `Faulted`.
    ///
    /// # Errors
    ///
    /// Returns the transport error of a failed close.
    pub async fn close(&self) -> Result<(), GatewayError> {
        match self.transport.close().await {
            Ok(()) => {
                self.transition(ChannelState::Closed);
                Ok(())
            }
            Err(e) => {
                self.transition(ChannelState::Faulted);
                Err(e)
            }
        }
    }

    /// Drops the connection without a handshake.
    pub fn abort(&self) {
        self.transport.abort();
        self.transition(ChannelState::Closed);
    }

    /// Marks the channel as broken.
    pub fn mark_faulted(&self) {
        self.transition(ChannelState::Faulted);
    }

    fn begin_call(&self) -> Result<(), GatewayError> {
        let state = self.state();
        if state.is_terminal() {
            return Err(GatewayError::connection(format!(
                "channel {} is {state}",
                self.id
            )));
        }
        // Losing this race means another caller already opened it
        let _ = self.state.compare_exchange(
            ChannelState::Created as u8,
            ChannelState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        Ok(())
    }

    fn settle<T>(&self, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
        if let Err(e) = &result {
            if e.kind.faults_channel() {
                logging::log_channel_faulted(self.id, e);
                self.transition(ChannelState::Faulted);
            }
        }
        result
    }

    /// Moves to a terminal state unless one was already reached.
    fn transition(&self, to: ChannelState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if ChannelState::from_u8(current).is_terminal() {
                    None
                } else {
                    Some(to as u8)
                }
            });
    }
}
