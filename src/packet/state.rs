//! Packet Lifecycle States
//!
//! States are stored in PostgreSQL as upper-case strings.
//! Terminal state: REFUNDED. EXPIRED still owes the creator a transfer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Packet lifecycle state
///
/// Legal transitions: INITIAL -> PAID -> {EXPIRED | REFUNDED},
/// EXPIRED -> REFUNDED. A packet is never deleted and never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PacketState {
    /// Created, waiting for the funding payment to confirm
    Initial,
    /// Funded and claimable
    Paid,
    /// Past the 24h claim window with funds left; owes a refund transfer
    Expired,
    /// Terminal: fully claimed, or the refund transfer succeeded
    Refunded,
}

impl PacketState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PacketState::Refunded)
    }

    /// Check if the packet still holds claimable or refundable funds
    #[inline]
    pub fn holds_funds(&self) -> bool {
        matches!(self, PacketState::Paid | PacketState::Expired)
    }

    /// Get the string form stored in PostgreSQL
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketState::Initial => "INITIAL",
            PacketState::Paid => "PAID",
            PacketState::Expired => "EXPIRED",
            PacketState::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for PacketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PacketState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIAL" => Ok(PacketState::Initial),
            "PAID" => Ok(PacketState::Paid),
            "EXPIRED" => Ok(PacketState::Expired),
            "REFUNDED" => Ok(PacketState::Refunded),
            other => Err(format!("unknown packet state: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_roundtrip() {
        for state in [
            PacketState::Initial,
            PacketState::Paid,
            PacketState::Expired,
            PacketState::Refunded,
        ] {
            assert_eq!(state.as_str().parse::<PacketState>(), Ok(state));
        }
        assert!("PENDING".parse::<PacketState>().is_err());
    }

    #[test]
    fn test_terminal_and_funds() {
        assert!(PacketState::Refunded.is_terminal());
        assert!(!PacketState::Expired.is_terminal());
        assert!(PacketState::Paid.holds_funds());
        assert!(PacketState::Expired.holds_funds());
        assert!(!PacketState::Initial.holds_funds());
        assert!(!PacketState::Refunded.holds_funds());
    }
}
