//! Pure lifecycle scenarios
//!
//! Exercises the split algorithm and the state machine together, without a
//! database: the test plays the role of the store, applying each award to
//! an in-memory packet exactly the way the claim transaction does.

use chrono::{Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use uuid::Uuid;

use redpacket::packet::lifecycle::next_state;
use redpacket::packet::split::split_amount;
use redpacket::packet::types::Packet;
use redpacket::{PacketState, refund_trace_id};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn paid_packet(amount: &str, total_count: i64) -> Packet {
    let mut packet = Packet::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        dec(amount),
        total_count,
        "good luck".to_string(),
    );
    packet.state = PacketState::Paid;
    packet
}

/// Apply one claim the way the transactional body does
fn apply_claim(packet: &mut Packet, rng: &mut StdRng) -> Decimal {
    let award = split_amount(packet.remaining_amount, packet.remaining_count, rng);
    packet.remaining_count -= 1;
    packet.remaining_amount -= award;
    award
}

#[test]
fn three_share_packet_drains_exactly() {
    // amount=10, total_count=3: two random awards, the third takes the
    // rest, and the next state derivation lands on REFUNDED.
    let mut rng = StdRng::seed_from_u64(7);
    let mut packet = paid_packet("10", 3);

    let v1 = apply_claim(&mut packet, &mut rng);
    assert!(v1 > Decimal::ZERO && v1 <= dec("10"));
    assert_eq!(packet.remaining_count, 2);
    assert_eq!(packet.remaining_amount, dec("10") - v1);
    assert_eq!(next_state(&packet, Utc::now()), PacketState::Paid);

    let v2 = apply_claim(&mut packet, &mut rng);
    assert!(v2 > Decimal::ZERO && v2 <= dec("10") - v1);

    let v3 = apply_claim(&mut packet, &mut rng);
    assert_eq!(v3, dec("10") - v1 - v2, "final share is exact");
    assert_eq!(packet.remaining_count, 0);
    assert_eq!(packet.remaining_amount, Decimal::ZERO);
    assert_eq!(next_state(&packet, Utc::now()), PacketState::Refunded);
}

#[test]
fn conservation_holds_across_many_packets() {
    for seed in 0..50u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        // Amounts enter the store floored to 8 fractional digits.
        let mut packet = paid_packet("1.2345678", 10);
        let mut claimed = Decimal::ZERO;
        while packet.remaining_count > 0 && packet.remaining_amount > Decimal::ZERO {
            let before = packet.remaining_amount;
            let award = apply_claim(&mut packet, &mut rng);
            assert!(award > Decimal::ZERO);
            assert!(award <= before);
            claimed += award;
            assert_eq!(claimed + packet.remaining_amount, packet.amount);
        }
        assert_eq!(claimed, packet.amount);
        assert_eq!(next_state(&packet, Utc::now()), PacketState::Refunded);
    }
}

#[test]
fn stale_paid_packet_expires_on_read() {
    let mut packet = paid_packet("10", 3);
    packet.remaining_amount = dec("3");
    packet.created_at = Utc::now() - Duration::hours(25);
    assert_eq!(next_state(&packet, Utc::now()), PacketState::Expired);

    // The refund transfer for it always carries the same trace id.
    let trace = refund_trace_id(&packet.packet_id);
    assert_eq!(trace, refund_trace_id(&packet.packet_id));
}

#[test]
fn expiry_never_resurrects_terminal_states() {
    let mut packet = paid_packet("10", 3);
    packet.state = PacketState::Refunded;
    packet.created_at = Utc::now() - Duration::hours(100);
    assert_eq!(next_state(&packet, Utc::now()), PacketState::Refunded);

    packet.state = PacketState::Expired;
    assert_eq!(next_state(&packet, Utc::now()), PacketState::Expired);
}
