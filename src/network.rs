//! Payment Network Client
//!
//! The packet engine never moves money itself: it reads balances through
//! [`AssetLedger`] and pushes refund transfers through [`TransferGateway`].
//! Both are traits so tests can swap the wire client for mocks.
//!
//! The network deduplicates transfers by `trace_id`, which makes a retried
//! refund call safe; the engine leans on that instead of local retry loops.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::NetworkConfig;
use crate::packet::error::PacketError;

/// A user's holdings of one asset, as the network reports them
#[derive(Debug, Clone, Deserialize)]
pub struct AssetFunds {
    pub balance: Decimal,
    pub price_usd: Decimal,
}

/// Outbound transfer order
#[derive(Debug, Clone, Serialize)]
pub struct TransferOrder {
    pub asset_id: Uuid,
    /// Receiving user on the payment network
    pub recipient_id: Uuid,
    pub amount: Decimal,
    /// Network-side idempotency key; same trace, same transfer
    pub trace_id: Uuid,
    pub memo: String,
}

/// Read-only view of a user's asset balance and price
#[async_trait]
pub trait AssetLedger: Send + Sync {
    async fn balance_and_price(
        &self,
        user_id: Uuid,
        asset_id: Uuid,
    ) -> Result<AssetFunds, PacketError>;
}

/// Executes outbound payments on the network
///
/// Must be safe to call twice with the same `trace_id`.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    async fn transfer(&self, order: &TransferOrder) -> Result<(), PacketError>;
}

/// REST client for the payment network
pub struct NetworkClient {
    api_base: String,
    client_id: Uuid,
    session_token: String,
    http: reqwest::Client,
}

impl NetworkClient {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id,
            session_token: config.session_token.clone(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AssetLedger for NetworkClient {
    async fn balance_and_price(
        &self,
        user_id: Uuid,
        asset_id: Uuid,
    ) -> Result<AssetFunds, PacketError> {
        let url = format!("{}/users/{}/assets/{}", self.api_base, user_id, asset_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.session_token)
            .send()
            .await
            .map_err(|e| PacketError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PacketError::Gateway(format!(
                "asset lookup failed: {}",
                response.status()
            )));
        }
        response
            .json::<AssetFunds>()
            .await
            .map_err(|e| PacketError::Gateway(e.to_string()))
    }
}

#[async_trait]
impl TransferGateway for NetworkClient {
    async fn transfer(&self, order: &TransferOrder) -> Result<(), PacketError> {
        let url = format!("{}/transfers", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.session_token)
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "asset_id": order.asset_id,
                "opponent_id": order.recipient_id,
                "amount": order.amount,
                "trace_id": order.trace_id,
                "memo": order.memo,
            }))
            .send()
            .await
            .map_err(|e| PacketError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PacketError::Gateway(format!(
                "transfer {} rejected: {}",
                order.trace_id,
                response.status()
            )));
        }
        tracing::info!(
            trace_id = %order.trace_id,
            asset_id = %order.asset_id,
            amount = %order.amount,
            "transfer accepted by payment network"
        );
        Ok(())
    }
}
