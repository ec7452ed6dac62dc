//! Refund Settlement
//!
//! Returns the unclaimed remainder of an expired packet to its creator.
//! The transfer trace id is a pure function of the packet id, so every
//! retry presents the same id and the payment network's deduplication makes
//! the call safe to repeat. No retry loop lives here - a failed transfer
//! leaves the packet EXPIRED for the sweeper's next cycle.

use std::sync::Arc;

use uuid::Uuid;

use crate::network::{TransferGateway, TransferOrder};

use super::error::PacketError;
use super::lifecycle;
use super::state::PacketState;
use super::store::PacketStore;
use super::types::{Packet, PacketId};

/// Salt distinguishing refund traces from any other derived id
const REFUND_TRACE_SALT: &str = "REFUND";

/// Derive the refund transfer trace id for a packet
///
/// md5 over the packet id and salt, with the version and variant nibbles
/// forced so the result is a well-formed UUID. Deterministic: the same
/// packet always yields the same trace.
pub fn refund_trace_id(packet_id: &PacketId) -> Uuid {
    let mut digest = md5::compute(format!("{}{}", packet_id, REFUND_TRACE_SALT)).0;
    digest[6] = (digest[6] & 0x0f) | 0x30;
    digest[8] = (digest[8] & 0x3f) | 0x80;
    Uuid::from_bytes(digest)
}

/// Drives expired packets through the refund transfer to REFUNDED
pub struct RefundSettler {
    store: Arc<PacketStore>,
    gateway: Arc<dyn TransferGateway>,
}

impl RefundSettler {
    pub fn new(store: Arc<PacketStore>, gateway: Arc<dyn TransferGateway>) -> Self {
        Self { store, gateway }
    }

    /// Settle one packet's refund
    ///
    /// No-op unless the packet is EXPIRED after the lifecycle check. On
    /// gateway success the REFUNDED transition is recorded; on gateway
    /// failure the error bubbles up and the packet stays EXPIRED.
    pub async fn settle(&self, packet_id: &PacketId) -> Result<Option<Packet>, PacketError> {
        let trace_id = refund_trace_id(packet_id);

        let Some(packet) = lifecycle::read_and_advance(&self.store, packet_id).await? else {
            return Ok(None);
        };
        if packet.state != PacketState::Expired {
            return Ok(Some(packet));
        }

        self.gateway
            .transfer(&TransferOrder {
                asset_id: packet.asset_id,
                recipient_id: packet.creator_id,
                amount: packet.remaining_amount,
                trace_id,
                memo: String::new(),
            })
            .await?;

        lifecycle::refund(&self.store, packet_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_is_deterministic() {
        let id = PacketId::new();
        assert_eq!(refund_trace_id(&id), refund_trace_id(&id));
    }

    #[test]
    fn test_trace_id_differs_per_packet() {
        assert_ne!(refund_trace_id(&PacketId::new()), refund_trace_id(&PacketId::new()));
    }

    #[test]
    fn test_trace_id_is_well_formed() {
        let trace = refund_trace_id(&PacketId::new());
        let bytes = trace.as_bytes();
        assert_eq!(bytes[6] & 0xf0, 0x30, "version nibble");
        assert_eq!(bytes[8] & 0xc0, 0x80, "variant bits");
    }

    #[test]
    fn test_trace_id_differs_from_packet_id() {
        let id = PacketId::new();
        assert_ne!(refund_trace_id(&id), id.as_uuid());
    }
}
