//! Communication state of a gateway channel

use std::fmt;

/// Lifecycle of a gateway channel.
///
/// `Faulted` and `Closed` are terminal: a channel never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChannelState {
    /// Built, no call made yet
    Created = 0,
    /// At least one call has gone through
    Open = 1,
    /// A transport failure broke the channel
    Faulted = 2,
    /// Closed or aborted
    Closed = 3,
}

impl ChannelState {
    /// Whether the channel can never be used again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Faulted | Self::Closed)
    }

    /// Whether calls may still be issued on the channel.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        !self.is_terminal()
    }

    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Open => "open",
            Self::Faulted => "faulted",
            Self::Closed => "closed",
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Open,
            2 => Self::Faulted,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ChannelState::Created.is_terminal());
        assert!(!ChannelState::Open.is_terminal());
        assert!(ChannelState::Faulted.is_terminal());
        assert!(ChannelState::Closed.is_terminal());
    }

    #[test]
    fn test_u8_mapping() {
        for state in [
            ChannelState::Created,
            ChannelState::Open,
            ChannelState::Faulted,
            ChannelState::Closed,
        ] {
            assert_eq!(ChannelState::from_u8(state as u8), state);
        }
    }
}
