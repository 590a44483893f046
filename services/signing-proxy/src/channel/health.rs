//! Shared channel ownership and recreation
//!
//! Callers read the current channel without locking. Replacement happens
//! under a mutex with a second state check, so one fault episode produces
//! exactly one new channel no matter how many callers notice it. Once shut
//! down, the monitor hands out no channel and builds no replacement.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::channel::factory::ChannelFactory;
use crate::channel::gateway_channel::GatewayChannel;
use crate::error::SigningError;
use crate::logging;

/// Owner of the single current gateway channel.
pub struct ChannelHealthMonitor {
    current: ArcSwap<GatewayChannel>,
    factory: Arc<dyn ChannelFactory>,
    recreate: Mutex<()>,
    closed: AtomicBool,
}

impl fmt::Debug for ChannelHealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHealthMonitor")
            .field("current", &self.current.load_full())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ChannelHealthMonitor {
    /// Builds the initial channel.
    ///
    /// # Errors
    ///
    /// Returns the factory error if the first channel cannot be built.
    pub fn new(factory: Arc<dyn ChannelFactory>) -> Result<Self, SigningError> {
        let initial = factory.create()?;
        Ok(Self {
            current: ArcSwap::from_pointee(initial),
            factory,
            recreate: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// The current channel, whatever its state.
    #[must_use]
    pub fn current(&self) -> Arc<GatewayChannel> {
        self.current.load_full()
    }

    /// Returns a usable channel, replacing a faulted or closed one first.
    ///
    /// # Errors
    ///
    /// - `Disposed` once [`shut_down`](Self::shut_down) has run
    /// - the factory error if a replacement cannot be built; the broken
    ///   channel stays current so the next call tries again
    pub fn healthy_channel(&self) -> Result<Arc<GatewayChannel>, SigningError> {
        if self.is_closed() {
            return Err(SigningError::Disposed);
        }
        let current = self.current.load_full();
        if current.is_usable() {
            return Ok(current);
        }

        let _guard = self.recreate.lock();
        if self.is_closed() {
            return Err(SigningError::Disposed);
        }

        // Another caller may have replaced it while we waited
        let current = self.current.load_full();
        if current.is_usable() {
            return Ok(current);
        }

        let old_state = current.state();
        let fresh = match self.factory.create() {
            Ok(channel) => Arc::new(channel),
            Err(e) => {
                logging::log_channel_recreate_failed(current.id(), &e);
                return Err(e);
            }
        };

        self.current.store(Arc::clone(&fresh));
        current.abort();
        logging::log_channel_recreated(current.id(), old_state.as_str(), fresh.id());

        Ok(fresh)
    }

    /// Stops recreation and returns the channel left to release.
    ///
    /// Taken under the recreation lock, so no replacement built by a
    /// concurrent caller can slip past the returned channel.
    pub fn shut_down(&self) -> Arc<GatewayChannel> {
        let _guard = self.recreate.lock();
        self.closed.store(true, Ordering::Release);
        self.current.load_full()
    }

    /// Whether [`shut_down`](Self::shut_down) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
