//! # Order Service Errors
//!
//! One error type for everything a caller of the order core can see.
//!
//! ## Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    OrderError → ErrorCode                               │
//! │                                                                         │
//! │  Validation(..)            VALIDATION_ERROR   before any lock          │
//! │  ProductNotFound / Order.. NOT_FOUND          unit of work rolled back │
//! │  AlreadyCancelled          ALREADY_CANCELLED  terminal-state guard     │
//! │  InvalidStatus             CONFLICT                                     │
//! │  InsufficientStock         INSUFFICIENT_STOCK only with policy=reject  │
//! │  Database(Busy | Version.. CONFLICT           retryable                │
//! │  Database(..)              DATABASE_ERROR                               │
//! │  Config(..)                CONFIG_ERROR                                 │
//! │                                                                         │
//! │  A stock shortage under the default policy is not an error at all:    │
//! │  it comes back as a StockWarning next to the committed order.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tally_core::{CoreError, ValidationError};
use tally_db::DbError;
use thiserror::Error;

/// Result type alias for order operations.
pub type OrderResult<T> = Result<T, OrderError>;

/// Column whose UNIQUE index deduplicates client submissions.
pub(crate) const IDEMPOTENCY_KEY_COLUMN: &str = "orders.idempotency_key";

/// Column whose UNIQUE index catches order-code collisions.
pub(crate) const ORDER_CODE_COLUMN: &str = "orders.order_code";

/// Errors surfaced by the order processing core.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Malformed request; nothing was locked or written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A cart line references a product that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Cancel requested twice.
    #[error("Order already cancelled: {0}")]
    AlreadyCancelled(String),

    /// Order is in a state the operation does not accept.
    #[error("Order {order_id} is {status}, cannot perform operation")]
    InvalidStatus { order_id: String, status: String },

    /// Shortage under `StockPolicy::Reject`.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Storage failure. The unit of work has been rolled back.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OrderError {
    /// Machine-readable code for the caller.
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::Validation(_) => ErrorCode::ValidationError,
            OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => ErrorCode::NotFound,
            OrderError::AlreadyCancelled(_) => ErrorCode::AlreadyCancelled,
            OrderError::InvalidStatus { .. } => ErrorCode::Conflict,
            OrderError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            OrderError::Database(DbError::NotFound { .. }) => ErrorCode::NotFound,
            OrderError::Database(e) if e.is_transient() => ErrorCode::Conflict,
            OrderError::Database(_) => ErrorCode::DatabaseError,
            OrderError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Returns true if replaying the whole unit of work may succeed.
    ///
    /// Lock timeouts, stale stock versions, an exhausted pool and order-code
    /// collisions all qualify. An idempotency-key collision does not: it is
    /// resolved by replaying the winner's order instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Database(e) => e.is_transient() || e.is_unique_violation_on(ORDER_CODE_COLUMN),
            _ => false,
        }
    }

    /// True when a concurrent submission with the same idempotency key won.
    pub fn is_idempotency_conflict(&self) -> bool {
        matches!(self, OrderError::Database(e) if e.is_unique_violation_on(IDEMPOTENCY_KEY_COLUMN))
    }
}

impl From<CoreError> for OrderError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                product,
                available,
                requested,
            } => OrderError::InsufficientStock {
                product,
                available,
                requested,
            },
            CoreError::Validation(e) => OrderError::Validation(e),
        }
    }
}

impl From<std::io::Error> for OrderError {
    fn from(err: std::io::Error) -> Self {
        OrderError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for OrderError {
    fn from(err: toml::de::Error) -> Self {
        OrderError::Config(err.to_string())
    }
}

// =============================================================================
// Error Code
// =============================================================================

/// Error codes for callers of the order core.
///
/// ```json
/// { "code": "ALREADY_CANCELLED", "message": "Order already cancelled: 9b1d..." }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Product or order not found (404)
    NotFound,

    /// Cancel of a cancelled order (409)
    AlreadyCancelled,

    /// Hard stock enforcement refused the sale (422)
    InsufficientStock,

    /// Lost a race; safe to retry (409)
    Conflict,

    /// Storage failure (500)
    DatabaseError,

    /// Bad configuration
    ConfigError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyCancelled => "ALREADY_CANCELLED",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(OrderError::Database(DbError::Busy("database is locked".into())).is_retryable());
        assert!(OrderError::Database(DbError::VersionConflict {
            entity: "Product".into(),
            id: "p-1".into(),
            expected: 3,
        })
        .is_retryable());
        assert!(OrderError::Database(DbError::PoolExhausted).is_retryable());
        assert!(OrderError::Database(DbError::duplicate(ORDER_CODE_COLUMN, "TRX-1")).is_retryable());

        assert!(!OrderError::Database(DbError::duplicate(IDEMPOTENCY_KEY_COLUMN, "k")).is_retryable());
        assert!(!OrderError::ProductNotFound("p-1".into()).is_retryable());
        assert!(!OrderError::AlreadyCancelled("o-1".into()).is_retryable());
    }

    #[test]
    fn test_idempotency_conflict() {
        assert!(OrderError::Database(DbError::duplicate(IDEMPOTENCY_KEY_COLUMN, "k")).is_idempotency_conflict());
        assert!(!OrderError::Database(DbError::duplicate(ORDER_CODE_COLUMN, "c")).is_idempotency_conflict());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OrderError::OrderNotFound("x".into()).code(), ErrorCode::NotFound);
        assert_eq!(
            OrderError::Database(DbError::not_found("Order", "x")).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            OrderError::Database(DbError::Busy("locked".into())).code(),
            ErrorCode::Conflict
        );
        assert_eq!(
            OrderError::Database(DbError::QueryFailed("boom".into())).code(),
            ErrorCode::DatabaseError
        );
        assert_eq!(ErrorCode::AlreadyCancelled.to_string(), "ALREADY_CANCELLED");
        assert_eq!(
            serde_json::to_string(&ErrorCode::InsufficientStock).unwrap(),
            "\"INSUFFICIENT_STOCK\""
        );
    }

    #[test]
    fn test_from_core_error() {
        let err: OrderError = CoreError::InsufficientStock {
            product: "Latte".into(),
            available: 5,
            requested: 8,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert!(err.to_string().contains("Latte"));

        let err: OrderError = CoreError::Validation(ValidationError::AmountOverflow {
            field: "total_amount".into(),
        })
        .into();
        assert!(matches!(err, OrderError::Validation(ValidationError::AmountOverflow { .. })));
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
