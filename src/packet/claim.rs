//! Claim Arbitration
//!
//! Serializes concurrent claims through sharded in-process locks on top of
//! the store's row locks. The shard lock keeps the "check duplicate, draw a
//! share, decrement" sequence single-file within the process and bounds the
//! number of transactions hammering one hot packet row; the `FOR UPDATE`
//! re-read inside the transaction stays the correctness backstop.
//!
//! Packets hash into a fixed shard space, so two hot packets can contend on
//! the same lock. That costs latency, never correctness.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::community;

use super::error::PacketError;
use super::split;
use super::state::PacketState;
use super::store::{self, PacketStore};
use super::types::{Packet, PacketId, UserSnapshot};

/// Upper bound on one claim: shard-lock wait plus transaction round-trip
const CLAIM_TIMEOUT: Duration = Duration::from_secs(5);

/// Size of the shard space; lock count never exceeds this
const SHARD_COUNT: u64 = 256;

/// Namespace salt folded into the shard hash
const SHARD_NAMESPACE: &str = "9b2a6c1e-6d1f-4b8b-9c3e-2f4a1d7e8c05";

/// Map a packet id onto its shard
pub(crate) fn shard_of(packet_id: &PacketId) -> u64 {
    let digest = md5::compute(format!("{}{}", SHARD_NAMESPACE, packet_id));
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.0[..8]);
    u64::from_be_bytes(prefix) % SHARD_COUNT
}

/// Arbitrates concurrent claim attempts
///
/// The lock table is process-wide, created lazily and never shrunk; the
/// concurrent map's entry API makes first-time shard creation atomic, so
/// two racing callers always end up on the same mutex.
pub struct ClaimArbiter {
    store: Arc<PacketStore>,
    /// "{} just opened a red packet" style template for the creator ping
    opened_template: String,
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl ClaimArbiter {
    pub fn new(store: Arc<PacketStore>, opened_template: String) -> Self {
        Self {
            store,
            opened_template,
            locks: DashMap::new(),
        }
    }

    /// Get (creating if absent) the lock for a shard
    fn shard_lock(&self, shard: u64) -> Arc<Mutex<()>> {
        self.locks
            .entry(shard)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Claim one share of a packet for `claimer`
    ///
    /// Returns the packet after the attempt. A packet that is not PAID, or
    /// that this user already claimed, comes back unchanged - callers tell
    /// "too early / already done" apart from failure by inspecting it.
    /// `None` means the packet (or its owner/asset) does not exist.
    pub async fn claim(
        &self,
        packet_id: &PacketId,
        claimer: &UserSnapshot,
    ) -> Result<Option<Packet>, PacketError> {
        // Cheap pre-check outside the lock; also advances expiry on reads.
        let Some(packet) = super::lifecycle::read_and_advance(&self.store, packet_id).await? else {
            return Ok(None);
        };
        if packet.state != PacketState::Paid {
            return Ok(Some(packet));
        }
        if packet.remaining_count > packet.total_count || packet.remaining_amount > packet.amount {
            return Err(PacketError::InsufficientBalance);
        }

        let lock = self.shard_lock(shard_of(packet_id));
        let attempt = async {
            let _guard = lock.lock().await;
            self.claim_in_tx(packet_id, claimer).await
            // Guard drops here on success and error alike.
        };
        match tokio::time::timeout(CLAIM_TIMEOUT, attempt).await {
            Ok(result) => result,
            // The transaction future is dropped mid-flight, which rolls it
            // back; the guard drops with it.
            Err(_) => Err(PacketError::MutexTimeout),
        }
    }

    /// The transactional claim body, run while holding the shard lock
    async fn claim_in_tx(
        &self,
        packet_id: &PacketId,
        claimer: &UserSnapshot,
    ) -> Result<Option<Packet>, PacketError> {
        let mut tx = self.store.pool().begin().await?;
        let Some(mut packet) = store::read_packet_for_update(&mut tx, packet_id).await? else {
            return Ok(None);
        };
        super::lifecycle::advance(&mut tx, &mut packet, Utc::now()).await?;
        if packet.state != PacketState::Paid {
            tx.commit().await?;
            return Ok(Some(packet));
        }
        if store::participant_exists(&mut tx, packet_id, claimer.user_id).await? {
            // Duplicate claim request; the first one won.
            tx.commit().await?;
            return Ok(Some(packet));
        }

        let award = {
            let mut rng = rand::thread_rng();
            split::split_amount(packet.remaining_amount, packet.remaining_count, &mut rng)
        };
        packet.remaining_count -= 1;
        packet.remaining_amount -= award;
        store::update_remainders(&mut tx, &packet).await?;
        store::insert_participant(&mut tx, packet_id, claimer.user_id, award).await?;

        if !community::read_prohibited_status(&mut tx).await? {
            community::enqueue_packet_opened(&mut tx, &packet, &claimer.full_name, &self.opened_template)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(
            packet_id = %packet_id,
            user_id = %claimer.user_id,
            award = %award,
            remaining_count = packet.remaining_count,
            "claim committed"
        );
        Ok(Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_is_stable_and_bounded() {
        let id = PacketId::new();
        let shard = shard_of(&id);
        assert_eq!(shard, shard_of(&id));
        assert!(shard < SHARD_COUNT);
    }

    #[test]
    fn test_shards_spread_across_space() {
        use std::collections::HashSet;
        let shards: HashSet<u64> = (0..1000).map(|_| shard_of(&PacketId::new())).collect();
        // 1000 random packets must not all collapse onto a few locks.
        assert!(shards.len() > 64, "only {} shards used", shards.len());
    }

    #[tokio::test]
    async fn test_shard_lock_get_or_create_is_shared() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/unused")
            .expect("lazy pool");
        let arbiter = ClaimArbiter::new(
            Arc::new(PacketStore::new(pool)),
            "{} opened".to_string(),
        );
        let a = arbiter.shard_lock(7);
        let b = arbiter.shard_lock(7);
        assert!(Arc::ptr_eq(&a, &b), "same shard must share one mutex");
        let c = arbiter.shard_lock(8);
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
