//! Community Glue
//!
//! Read-only views of the chat side of the platform (members, assets, the
//! group-wide prohibited flag) plus the distributed-message queue the bot
//! drains to deliver notifications. The packet engine only ever enqueues
//! here; delivery is the message pipeline's problem.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::packet::error::PacketError;
use crate::packet::store::parse_uuid;
use crate::packet::types::{AssetSnapshot, Packet, UserSnapshot};

/// Property key for the group-wide "no messaging" switch
pub const PROHIBITED_PROPERTY: &str = "prohibited-message-property";

pub(crate) const USERS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id        VARCHAR(36) PRIMARY KEY,
    full_name      VARCHAR(512) NOT NULL DEFAULT '',
    subscribed_at  TIMESTAMPTZ
);
"#;

pub(crate) const ASSETS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS assets (
    asset_id   VARCHAR(36) PRIMARY KEY,
    symbol     VARCHAR(512) NOT NULL,
    name       VARCHAR(512) NOT NULL,
    price_usd  NUMERIC(38,8) NOT NULL DEFAULT 0
);
"#;

pub(crate) const PROPERTIES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS properties (
    key         VARCHAR(512) PRIMARY KEY,
    value       VARCHAR(8192) NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);
"#;

pub(crate) const DISTRIBUTED_MESSAGES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS distributed_messages (
    message_id    VARCHAR(36) PRIMARY KEY,
    recipient_id  VARCHAR(36) NOT NULL,
    category      VARCHAR(512) NOT NULL,
    data          TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS distributed_messages_recipientx
    ON distributed_messages(recipient_id, created_at);
"#;

/// Check the group-wide prohibited flag
///
/// Missing property means "not prohibited".
pub async fn read_prohibited_status(conn: &mut PgConnection) -> Result<bool, PacketError> {
    let row = sqlx::query("SELECT value FROM properties WHERE key = $1")
        .bind(PROHIBITED_PROPERTY)
        .fetch_optional(conn)
        .await?;
    Ok(row
        .map(|r| r.get::<String, _>("value") == "true")
        .unwrap_or(false))
}

/// Count members eligible to receive a packet
pub async fn subscribers_count(pool: &PgPool) -> Result<i64, PacketError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE subscribed_at IS NOT NULL")
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Read a member snapshot by id
pub async fn read_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<UserSnapshot>, PacketError> {
    let row = sqlx::query("SELECT user_id, full_name FROM users WHERE user_id = $1")
        .bind(user_id.to_string())
        .fetch_optional(conn)
        .await?;
    match row {
        Some(row) => Ok(Some(UserSnapshot {
            user_id: parse_uuid(row.get("user_id"))?,
            full_name: row.get("full_name"),
        })),
        None => Ok(None),
    }
}

/// Read an asset snapshot by id
pub async fn read_asset(
    conn: &mut PgConnection,
    asset_id: Uuid,
) -> Result<Option<AssetSnapshot>, PacketError> {
    let row = sqlx::query("SELECT asset_id, symbol, name, price_usd FROM assets WHERE asset_id = $1")
        .bind(asset_id.to_string())
        .fetch_optional(conn)
        .await?;
    match row {
        Some(row) => Ok(Some(AssetSnapshot {
            asset_id: parse_uuid(row.get("asset_id"))?,
            symbol: row.get("symbol"),
            name: row.get("name"),
            price_usd: row.get("price_usd"),
        })),
        None => Ok(None),
    }
}

/// Enqueue a "packet opened" notification to the packet's creator
///
/// Runs inside the claim transaction: the message and the claim commit
/// together. The text payload is base64-encoded the way the message
/// pipeline expects PLAIN_TEXT bodies.
pub async fn enqueue_packet_opened(
    conn: &mut PgConnection,
    packet: &Packet,
    opener_name: &str,
    template: &str,
) -> Result<(), PacketError> {
    let text = template.replacen("{}", opener_name, 1);
    sqlx::query(
        r#"
        INSERT INTO distributed_messages (message_id, recipient_id, category, data, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(packet.creator_id.to_string())
    .bind("PLAIN_TEXT")
    .bind(BASE64.encode(text))
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution_encodes() {
        let text = "Alice just opened a red packet".to_string();
        let encoded = BASE64.encode(&text);
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), text);
    }

    #[test]
    fn test_template_replaces_first_placeholder_only() {
        let template = "{} opened the packet from {}";
        assert_eq!(
            template.replacen("{}", "Alice", 1),
            "Alice opened the packet from {}"
        );
    }
}
