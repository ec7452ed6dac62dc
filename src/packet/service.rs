//! Packet Service
//!
//! Creation validation and packet display. Everything here happens before
//! any write, so a rejected request leaves no trace.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::community;
use crate::config::AppConfig;
use crate::network::AssetLedger;

use super::error::PacketError;
use super::lifecycle;
use super::store::{self, PacketStore};
use super::types::{
    CreatePacketRequest, MAX_GREETING_CHARS, PRESENT_PRECISION, Packet, PacketId, PacketView,
    UserSnapshot, min_packet_amount,
};

/// Creation-side API of the packet engine
pub struct PacketService {
    store: Arc<PacketStore>,
    ledger: Arc<dyn AssetLedger>,
    /// Operators may fund packets even while the group is prohibited
    operators: Vec<Uuid>,
    /// Reject packets funded with assets the network has no price for
    price_assets_enable: bool,
}

impl PacketService {
    pub fn new(store: Arc<PacketStore>, ledger: Arc<dyn AssetLedger>, config: &AppConfig) -> Self {
        Self {
            store,
            ledger,
            operators: config.operators.clone(),
            price_assets_enable: config.packet.price_assets_enable,
        }
    }

    fn is_operator(&self, user_id: &Uuid) -> bool {
        self.operators.contains(user_id)
    }

    /// Validate and record a new INITIAL packet
    ///
    /// The packet is not claimable until the funding payment confirms via
    /// [`lifecycle::pay`].
    pub async fn create_packet(
        &self,
        creator: &UserSnapshot,
        request: CreatePacketRequest,
    ) -> Result<Packet, PacketError> {
        if !self.is_operator(&creator.user_id) {
            let mut conn = self.store.pool().acquire().await?;
            if community::read_prohibited_status(&mut conn).await? {
                return Err(PacketError::Forbidden);
            }
        }

        let funds = self
            .ledger
            .balance_and_price(creator.user_id, request.asset_id)
            .await?;
        if self.price_assets_enable && funds.price_usd <= Decimal::ZERO {
            return Err(PacketError::AssetNotPriced);
        }

        if request.amount < min_packet_amount() {
            return Err(PacketError::InvalidAmount(request.amount.to_string()));
        }
        if request.greeting.chars().count() > MAX_GREETING_CHARS {
            return Err(PacketError::GreetingTooLong);
        }
        let amount = request.amount.trunc_with_scale(PRESENT_PRECISION);
        if funds.balance < amount {
            return Err(PacketError::InsufficientBalance);
        }

        let subscribers = community::subscribers_count(self.store.pool()).await?;
        if request.total_count <= 0 || request.total_count > subscribers {
            return Err(PacketError::InvalidShareCount(request.total_count));
        }

        let packet = Packet::new(
            creator.user_id,
            request.asset_id,
            amount,
            request.total_count,
            request.greeting,
        );
        self.store.create(&packet).await?;
        tracing::info!(
            packet_id = %packet.packet_id,
            creator_id = %creator.user_id,
            amount = %packet.amount,
            total_count = packet.total_count,
            "packet created, awaiting payment"
        );
        Ok(packet)
    }

    /// Show a packet with its creator, asset and claim history
    ///
    /// Runs the lifecycle check like every other read, so stale packets
    /// expire the moment anyone looks at them.
    pub async fn show_packet(
        &self,
        packet_id: &PacketId,
    ) -> Result<Option<PacketView>, PacketError> {
        let mut tx = self.store.pool().begin().await?;
        let Some((mut packet, creator, asset)) =
            store::read_with_owner_and_asset(&mut tx, packet_id).await?
        else {
            return Ok(None);
        };
        lifecycle::advance(&mut tx, &mut packet, Utc::now()).await?;
        tx.commit().await?;

        let participants = self.store.participants(packet_id).await?;
        Ok(Some(PacketView {
            packet,
            creator,
            asset,
            participants,
        }))
    }
}
