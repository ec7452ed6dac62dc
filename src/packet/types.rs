//! Packet Core Types
//!
//! Type definitions for packets and their claims. Monetary values are
//! `rust_decimal::Decimal`, presented with at most 8 fractional digits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::PacketState;

/// Fractional digits every presented or persisted amount is floored to
pub const PRESENT_PRECISION: u32 = 8;

/// Maximum greeting length in Unicode code points
pub const MAX_GREETING_CHARS: usize = 36;

/// Smallest amount worth splitting randomly
#[inline]
pub fn min_unit() -> Decimal {
    Decimal::new(1, 6)
}

/// Smallest presentable amount (one unit at [`PRESENT_PRECISION`])
#[inline]
pub fn smallest_presentable() -> Decimal {
    Decimal::new(1, PRESENT_PRECISION)
}

/// Minimum amount a packet can be funded with
#[inline]
pub fn min_packet_amount() -> Decimal {
    Decimal::new(1, 4)
}

/// Check whether an amount is below the smallest presentable unit
///
/// An exhausted remainder means the packet is fully claimed for every
/// practical purpose, even if a sub-presentable dust value survives.
#[inline]
pub fn is_exhausted(amount: Decimal) -> bool {
    amount < smallest_presentable()
}

/// Packet ID type - UUIDv4 generated at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(Uuid);

impl PacketId {
    /// Generate a new unique PacketId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PacketId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PacketId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PacketId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// One funded gift, split into `total_count` claimable shares
///
/// Conservation invariant: `amount == remaining_amount + sum(participant
/// amounts)` after every committed write. The store is the sole writer;
/// instances held outside a transaction are read-only snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct Packet {
    pub packet_id: PacketId,
    /// Funding user; also the refund recipient
    pub creator_id: Uuid,
    pub asset_id: Uuid,
    /// Original total, fixed at creation
    pub amount: Decimal,
    pub greeting: String,
    pub total_count: i64,
    pub remaining_count: i64,
    pub remaining_amount: Decimal,
    pub state: PacketState,
    pub created_at: DateTime<Utc>,
}

impl Packet {
    /// Create a new INITIAL packet snapshot
    ///
    /// The amount must already be validated and floored to
    /// [`PRESENT_PRECISION`] by the caller.
    pub fn new(
        creator_id: Uuid,
        asset_id: Uuid,
        amount: Decimal,
        total_count: i64,
        greeting: String,
    ) -> Self {
        Self {
            packet_id: PacketId::new(),
            creator_id,
            asset_id,
            amount,
            greeting,
            total_count,
            remaining_count: total_count,
            remaining_amount: amount,
            state: PacketState::Initial,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet[{}] creator={} asset={} amount={} remaining={}/{} state={}",
            self.packet_id,
            self.creator_id,
            self.asset_id,
            self.amount,
            self.remaining_amount,
            self.remaining_count,
            self.state
        )
    }
}

/// One user's successful claim against a packet
///
/// Unique per `(packet_id, user_id)`; written exactly once inside the same
/// transaction that decrements the owning packet's remainder.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub packet_id: PacketId,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Read-only view of a community member
#[derive(Debug, Clone, Serialize)]
pub struct UserSnapshot {
    pub user_id: Uuid,
    pub full_name: String,
}

/// Read-only view of an asset known to the community
#[derive(Debug, Clone, Serialize)]
pub struct AssetSnapshot {
    pub asset_id: Uuid,
    pub symbol: String,
    pub name: String,
    pub price_usd: Decimal,
}

/// Packet joined with its creator, asset and claim history
#[derive(Debug, Clone, Serialize)]
pub struct PacketView {
    #[serde(flatten)]
    pub packet: Packet,
    pub creator: UserSnapshot,
    pub asset: AssetSnapshot,
    pub participants: Vec<Participant>,
}

/// Creation request from the API layer
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePacketRequest {
    pub asset_id: Uuid,
    /// Decimal string in JSON to avoid float precision issues
    pub amount: Decimal,
    pub total_count: i64,
    #[serde(default)]
    pub greeting: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_id_roundtrip() {
        let id = PacketId::new();
        let parsed: PacketId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<PacketId>().is_err());
    }

    #[test]
    fn test_new_packet_starts_full() {
        let amount = Decimal::new(10, 0);
        let packet = Packet::new(Uuid::new_v4(), Uuid::new_v4(), amount, 3, "hi".to_string());
        assert_eq!(packet.state, PacketState::Initial);
        assert_eq!(packet.remaining_count, packet.total_count);
        assert_eq!(packet.remaining_amount, packet.amount);
    }

    #[test]
    fn test_exhausted_boundary() {
        assert!(is_exhausted(Decimal::ZERO));
        assert!(is_exhausted(Decimal::new(9, 9))); // 0.000000009
        assert!(!is_exhausted(smallest_presentable()));
        assert!(!is_exhausted(min_unit()));
    }
}
