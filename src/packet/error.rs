//! Packet Error Types

use thiserror::Error;

use super::types::PacketId;

/// Packet engine error taxonomy
///
/// Store and gateway failures bubble up unmodified in kind; nothing here
/// retries internally. Missing rows are `Option::None` in read paths, not
/// errors.
#[derive(Error, Debug)]
pub enum PacketError {
    // === Validation Errors ===
    #[error("Community messaging is prohibited")]
    Forbidden,

    #[error("Invalid packet amount: {0}")]
    InvalidAmount(String),

    #[error("Greeting exceeds the maximum length")]
    GreetingTooLong,

    #[error("Invalid share count: {0}")]
    InvalidShareCount(i64),

    #[error("Asset has no quoted price")]
    AssetNotPriced,

    #[error("Insufficient balance")]
    InsufficientBalance,

    // === Store Errors ===
    #[error("Packet already exists: {0}")]
    Conflict(PacketId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // === Arbitration Errors ===
    #[error("Claim lock timeout")]
    MutexTimeout,

    // === External Errors ===
    #[error("Payment network error: {0}")]
    Gateway(String),

    #[error("Internal system error: {0}")]
    System(String),
}

impl PacketError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            PacketError::Forbidden => "FORBIDDEN",
            PacketError::InvalidAmount(_) => "INVALID_AMOUNT",
            PacketError::GreetingTooLong => "GREETING_TOO_LONG",
            PacketError::InvalidShareCount(_) => "INVALID_SHARE_COUNT",
            PacketError::AssetNotPriced => "ASSET_NOT_PRICED",
            PacketError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            PacketError::Conflict(_) => "PACKET_EXISTS",
            PacketError::Database(_) => "DATABASE_ERROR",
            PacketError::MutexTimeout => "CLAIM_TIMEOUT",
            PacketError::Gateway(_) => "GATEWAY_ERROR",
            PacketError::System(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            PacketError::Forbidden => 403,
            PacketError::InvalidAmount(_)
            | PacketError::GreetingTooLong
            | PacketError::InvalidShareCount(_)
            | PacketError::AssetNotPriced => 400,
            PacketError::InsufficientBalance => 422,
            PacketError::Conflict(_) => 409,
            PacketError::Database(_) | PacketError::MutexTimeout | PacketError::System(_) => 500,
            PacketError::Gateway(_) => 502,
        }
    }

    /// Whether the caller may safely retry the same request
    ///
    /// Only the claim-arbitration timeout is retryable as-is; store errors
    /// need operator attention and validation errors never change outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PacketError::MutexTimeout | PacketError::Gateway(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PacketError::Forbidden.code(), "FORBIDDEN");
        assert_eq!(PacketError::MutexTimeout.code(), "CLAIM_TIMEOUT");
        assert_eq!(
            PacketError::InsufficientBalance.code(),
            "INSUFFICIENT_BALANCE"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(PacketError::Forbidden.http_status(), 403);
        assert_eq!(PacketError::GreetingTooLong.http_status(), 400);
        assert_eq!(PacketError::InsufficientBalance.http_status(), 422);
        assert_eq!(PacketError::MutexTimeout.http_status(), 500);
        assert_eq!(PacketError::Gateway("down".into()).http_status(), 502);
    }

    #[test]
    fn test_retryable() {
        assert!(PacketError::MutexTimeout.is_retryable());
        assert!(!PacketError::GreetingTooLong.is_retryable());
    }
}
