//! Packet HTTP Surface
//!
//! Thin axum glue over the engine: create, show, claim, and the payment
//! network's confirmation webhook. All money logic lives below this layer.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::claim::ClaimArbiter;
use super::error::PacketError;
use super::lifecycle;
use super::service::PacketService;
use super::store::PacketStore;
use super::types::{CreatePacketRequest, Packet, PacketId, PacketView, UserSnapshot};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PacketStore>,
    pub service: Arc<PacketService>,
    pub arbiter: Arc<ClaimArbiter>,
}

/// Unified API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            code: "OK".to_string(),
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

/// Handler-level error: engine errors plus the HTTP-only not-found case
pub struct ApiError {
    status: StatusCode,
    code: String,
    msg: String,
}

impl ApiError {
    fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND".to_string(),
            msg: msg.to_string(),
        }
    }
}

impl From<PacketError> for ApiError {
    fn from(e: PacketError) -> Self {
        Self {
            status: StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: e.code().to_string(),
            msg: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            code: self.code,
            msg: self.msg,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreatePacketBody {
    user_id: Uuid,
    #[serde(flatten)]
    request: CreatePacketRequest,
}

#[derive(Debug, Deserialize)]
struct ClaimBody {
    user_id: Uuid,
}

/// Payment network confirmation for a packet's funding transfer
#[derive(Debug, Deserialize)]
struct PaymentNotification {
    packet_id: PacketId,
    asset_id: Uuid,
    amount: Decimal,
}

/// Build the packet router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/packets", post(create_packet))
        .route("/packets/{id}", get(show_packet))
        .route("/packets/{id}/claim", post(claim_packet))
        .route("/payments", post(payment_notification))
        .with_state(state)
}

/// POST /packets
async fn create_packet(
    State(state): State<AppState>,
    Json(body): Json<CreatePacketBody>,
) -> Result<Json<ApiResponse<Packet>>, ApiError> {
    let creator = require_user(&state, body.user_id).await?;
    let packet = state.service.create_packet(&creator, body.request).await?;
    Ok(Json(ApiResponse::ok(packet)))
}

/// GET /packets/{id}
async fn show_packet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PacketView>>, ApiError> {
    let view = state
        .service
        .show_packet(&PacketId::from(id))
        .await?
        .ok_or_else(|| ApiError::not_found("packet not found"))?;
    Ok(Json(ApiResponse::ok(view)))
}

/// POST /packets/{id}/claim
async fn claim_packet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ClaimBody>,
) -> Result<Json<ApiResponse<PacketView>>, ApiError> {
    let packet_id = PacketId::from(id);
    let claimer = require_user(&state, body.user_id).await?;
    state
        .arbiter
        .claim(&packet_id, &claimer)
        .await?
        .ok_or_else(|| ApiError::not_found("packet not found"))?;
    let view = state
        .service
        .show_packet(&packet_id)
        .await?
        .ok_or_else(|| ApiError::not_found("packet not found"))?;
    Ok(Json(ApiResponse::ok(view)))
}

/// POST /payments - payment network webhook, safe to deliver twice
async fn payment_notification(
    State(state): State<AppState>,
    Json(body): Json<PaymentNotification>,
) -> Result<Json<ApiResponse<Packet>>, ApiError> {
    let packet = lifecycle::pay(&state.store, &body.packet_id, body.asset_id, body.amount)
        .await?
        .ok_or_else(|| ApiError::not_found("packet not found"))?;
    Ok(Json(ApiResponse::ok(packet)))
}

async fn require_user(state: &AppState, user_id: Uuid) -> Result<UserSnapshot, ApiError> {
    state
        .store
        .read_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))
}
