//! # Idempotency Guard
//!
//! Makes resubmission of the same cart safe. Offline tills retry uploads
//! they never saw acknowledged; a retry must return the first order, not
//! sell the goods twice.
//!
//! ```text
//! create(key = "till-3-0042")
//!    │
//!    ├── lookup(key) ── found ──► replay stored order (no stock change)
//!    │
//!    └── not found ──► build + insert
//!                         │
//!                         └── UNIQUE(idempotency_key) violated
//!                               (a concurrent twin committed first)
//!                               │
//!                               ▼
//!                        roll back, recover(key) ──► winner's order
//! ```
//!
//! Deduplication is the store's UNIQUE index; there is no in-process lock.

use tally_db::{Database, DbError};
use tracing::info;

use crate::error::{OrderError, OrderResult};
use crate::response::OrderResponse;

#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    db: Database,
}

impl IdempotencyGuard {
    pub fn new(db: Database) -> Self {
        IdempotencyGuard { db }
    }

    /// Returns the order previously created with `key`, if any.
    ///
    /// Must run before anything is locked.
    pub async fn lookup(&self, key: &str) -> OrderResult<Option<OrderResponse>> {
        let orders = self.db.orders();
        let Some(order) = orders.find_by_idempotency_key(key).await? else {
            return Ok(None);
        };

        let items = orders.items_for(&order.id).await?;
        info!(
            idempotency_key = %key,
            order_id = %order.id,
            order_code = %order.order_code,
            "Replaying order for duplicate submission"
        );
        Ok(Some(OrderResponse::new(order, items)))
    }

    /// Resolves a lost race on `key` to the winning order.
    ///
    /// Called after the losing unit of work has been rolled back.
    pub async fn recover(&self, key: &str) -> OrderResult<OrderResponse> {
        self.lookup(key).await?.ok_or_else(|| {
            OrderError::Database(DbError::Internal(format!(
                "idempotency key '{}' reported as taken but no order holds it",
                key
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_db::DbConfig;

    #[tokio::test]
    async fn test_unknown_key() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let guard = IdempotencyGuard::new(db);

        assert!(guard.lookup("till-1-0001").await.unwrap().is_none());
        assert!(matches!(
            guard.recover("till-1-0001").await,
            Err(OrderError::Database(DbError::Internal(_)))
        ));
    }
}
