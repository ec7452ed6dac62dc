//! Refund Sweeper
//!
//! Periodically lists overdue packets and drives each through refund
//! settlement. Failures are logged and retried on the next cycle; the
//! deterministic trace id makes those retries safe.

use std::sync::Arc;

use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

use crate::config::PacketConfig;

use super::refund::RefundSettler;
use super::state::PacketState;
use super::store::PacketStore;

/// Background settlement loop
pub struct RefundSweeper {
    store: Arc<PacketStore>,
    settler: Arc<RefundSettler>,
    interval: Duration,
    batch_limit: i64,
}

impl RefundSweeper {
    pub fn new(store: Arc<PacketStore>, settler: Arc<RefundSettler>, config: &PacketConfig) -> Self {
        Self {
            store,
            settler,
            interval: Duration::from_secs(config.sweep_interval_secs),
            batch_limit: config.sweep_batch_limit,
        }
    }

    /// Run the sweep loop forever
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_limit = self.batch_limit,
            "refund sweeper starting"
        );
        loop {
            match self.sweep_once().await {
                Ok(settled) if settled > 0 => info!(settled, "sweep cycle settled refunds"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "sweep cycle failed"),
            }
            sleep(self.interval).await;
        }
    }

    /// One sweep cycle; returns how many packets reached REFUNDED
    pub async fn sweep_once(&self) -> Result<usize, super::error::PacketError> {
        let overdue = self.store.list_overdue(self.batch_limit).await?;
        let mut settled = 0;
        for packet_id in &overdue {
            match self.settler.settle(packet_id).await {
                Ok(Some(packet)) if packet.state == PacketState::Refunded => settled += 1,
                Ok(_) => {}
                Err(e) => {
                    // Stays EXPIRED; the next cycle retries with the same
                    // trace id.
                    warn!(packet_id = %packet_id, error = %e, "refund settlement failed");
                }
            }
        }
        Ok(settled)
    }
}
