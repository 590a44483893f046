//! Gateway channel lifecycle: construction, state tracking and recreation.

pub mod factory;
pub mod gateway_channel;
pub mod health;
pub mod state;

pub use factory::{ChannelFactory, ChannelSettings, TonicChannelFactory, TonicTransport};
pub use gateway_channel::{GatewayChannel, GatewayTransport};
pub use health::ChannelHealthMonitor;
pub use state::ChannelState;
