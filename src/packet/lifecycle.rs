//! Packet Lifecycle State Machine
//!
//! Transitions are derived opportunistically: every operation that touches
//! a packet re-reads it inside a transaction and runs [`advance`] first, so
//! no PAID packet is ever stale at rest and the core needs no timers. The
//! settlement sweep driving refunds lives in [`super::sweeper`].

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::PacketError;
use super::state::PacketState;
use super::store::{self, PacketStore};
use super::types::{Packet, PacketId, is_exhausted};

/// Claim window: a PAID packet older than this expires
const EXPIRE_HOURS: i64 = 24;

/// Derive the state a packet should be in at `now`
///
/// Pure and idempotent; safe to evaluate on every read.
pub fn next_state(packet: &Packet, now: DateTime<Utc>) -> PacketState {
    if packet.state != PacketState::Paid {
        return packet.state;
    }
    if packet.remaining_count == 0 || is_exhausted(packet.remaining_amount) {
        // Fully claimed: terminal with nothing owed back.
        PacketState::Refunded
    } else if packet.created_at < now - Duration::hours(EXPIRE_HOURS) {
        PacketState::Expired
    } else {
        PacketState::Paid
    }
}

/// Apply and persist the derived transition, if any
///
/// Must run inside the caller's transaction, before any other operation on
/// the freshly read packet.
pub(crate) async fn advance(
    conn: &mut sqlx::PgConnection,
    packet: &mut Packet,
    now: DateTime<Utc>,
) -> Result<(), PacketError> {
    let next = next_state(packet, now);
    if next == packet.state {
        return Ok(());
    }
    store::update_state(conn, &packet.packet_id, next).await?;
    tracing::info!(
        packet_id = %packet.packet_id,
        from = %packet.state,
        to = %next,
        "packet state advanced"
    );
    packet.state = next;
    Ok(())
}

/// Read a packet and advance its state in one transaction
///
/// The shared read path for claims and refund settlement.
pub(crate) async fn read_and_advance(
    store: &PacketStore,
    packet_id: &PacketId,
) -> Result<Option<Packet>, PacketError> {
    let mut tx = store.pool().begin().await?;
    let Some(mut packet) = store::read_packet(&mut tx, packet_id).await? else {
        return Ok(None);
    };
    advance(&mut tx, &mut packet, Utc::now()).await?;
    tx.commit().await?;
    Ok(Some(packet))
}

/// Confirm the funding payment for a packet
///
/// Idempotent against duplicate payment notifications: anything but an
/// INITIAL packet is a no-op. A mismatched asset or a short payment is
/// rejected silently - the caller must not re-credit. The expiration check
/// runs immediately after, so a packet created long ago and only now paid
/// lands directly in EXPIRED.
pub async fn pay(
    store: &PacketStore,
    packet_id: &PacketId,
    asset_id: Uuid,
    paid_amount: Decimal,
) -> Result<Option<Packet>, PacketError> {
    let mut tx = store.pool().begin().await?;
    let Some(mut packet) = store::read_packet_for_update(&mut tx, packet_id).await? else {
        return Ok(None);
    };
    if packet.state == PacketState::Initial {
        if asset_id != packet.asset_id || paid_amount < packet.amount {
            tracing::warn!(
                packet_id = %packet_id,
                asset_id = %asset_id,
                paid_amount = %paid_amount,
                "payment rejected: asset or amount mismatch"
            );
        } else {
            store::update_state(&mut tx, packet_id, PacketState::Paid).await?;
            packet.state = PacketState::Paid;
            advance(&mut tx, &mut packet, Utc::now()).await?;
        }
    }
    tx.commit().await?;
    Ok(Some(packet))
}

/// Record a completed refund
///
/// Bookkeeping only: transitions EXPIRED to REFUNDED. Money movement is the
/// transfer gateway's job and must have succeeded before this is called.
pub async fn refund(
    store: &PacketStore,
    packet_id: &PacketId,
) -> Result<Option<Packet>, PacketError> {
    let mut tx = store.pool().begin().await?;
    let Some(mut packet) = store::read_packet_for_update(&mut tx, packet_id).await? else {
        return Ok(None);
    };
    advance(&mut tx, &mut packet, Utc::now()).await?;
    if packet.state == PacketState::Expired {
        store::update_state(&mut tx, packet_id, PacketState::Refunded).await?;
        packet.state = PacketState::Refunded;
    }
    tx.commit().await?;
    Ok(Some(packet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn paid_packet(remaining_count: i64, remaining_amount: &str, age_hours: i64) -> Packet {
        let mut packet = Packet::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Decimal::from_str("10").unwrap(),
            3,
            "hi".to_string(),
        );
        packet.state = PacketState::Paid;
        packet.remaining_count = remaining_count;
        packet.remaining_amount = Decimal::from_str(remaining_amount).unwrap();
        packet.created_at = Utc::now() - Duration::hours(age_hours);
        packet
    }

    #[test]
    fn test_fresh_paid_packet_stays_paid() {
        let packet = paid_packet(3, "10", 1);
        assert_eq!(next_state(&packet, Utc::now()), PacketState::Paid);
    }

    #[test]
    fn test_drained_count_refunds() {
        let packet = paid_packet(0, "0.5", 1);
        assert_eq!(next_state(&packet, Utc::now()), PacketState::Refunded);
    }

    #[test]
    fn test_exhausted_amount_refunds() {
        // Shares left but the remainder is below the smallest presentable
        // unit: nothing is owed back.
        let packet = paid_packet(2, "0.000000001", 1);
        assert_eq!(next_state(&packet, Utc::now()), PacketState::Refunded);
    }

    #[test]
    fn test_stale_paid_packet_expires() {
        let packet = paid_packet(2, "3", 25);
        assert_eq!(next_state(&packet, Utc::now()), PacketState::Expired);
    }

    #[test]
    fn test_drain_wins_over_age() {
        // A drained packet is REFUNDED even past the claim window.
        let packet = paid_packet(0, "0", 30);
        assert_eq!(next_state(&packet, Utc::now()), PacketState::Refunded);
    }

    #[test]
    fn test_non_paid_states_unchanged() {
        for state in [
            PacketState::Initial,
            PacketState::Expired,
            PacketState::Refunded,
        ] {
            let mut packet = paid_packet(0, "0", 30);
            packet.state = state;
            assert_eq!(next_state(&packet, Utc::now()), state);
        }
    }

    #[test]
    fn test_idempotent() {
        let packet = paid_packet(2, "3", 25);
        let now = Utc::now();
        let first = next_state(&packet, now);
        let mut advanced = packet.clone();
        advanced.state = first;
        assert_eq!(next_state(&advanced, now), first);
    }
}
