//! # Product Ledger
//!
//! The only code that changes `products.stock`.
//!
//! ## One Stock Change
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  inside an open unit of work (tx)                                       │
//! │                                                                         │
//! │  lock(tx, product_id)          UPDATE … RETURNING (writer lock taken)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  product.apply_stock_delta()   stock += delta, version += 1, stamp     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProductRepository::save       WHERE stock_version = expected          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MovementRepository::insert    exactly one movement per change         │
//! │                                                                         │
//! │  The caller commits or rolls back; stock and movement land together.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tally_core::validation::{validate_optional_text, validate_uuid};
use tally_core::{InventoryMovement, MovementType, Product, ReferenceType, ValidationError};
use tally_db::{generate_movement_id, Database, DbError, MovementRepository, ProductRepository};
use tracing::{debug, info};

use crate::config::RetrySettings;
use crate::error::{OrderError, OrderResult};
use crate::retry::with_retry;

/// Longest accepted adjustment note.
const MAX_ADJUSTMENT_NOTE_LEN: usize = 1_000;

/// Largest stock change a single adjustment may apply, either way.
const MAX_ADJUSTMENT_DELTA: i64 = 1_000_000;

/// Default number of movements returned by [`ProductLedger::movements`].
pub const DEFAULT_MOVEMENT_LIMIT: u32 = 50;

/// Describes one stock change for its audit movement.
#[derive(Debug, Clone, Copy)]
struct StockChange<'a> {
    delta: i64,
    movement_type: MovementType,
    reference_type: ReferenceType,
    reference_id: Option<&'a str>,
    user_id: Option<&'a str>,
    notes: Option<&'a str>,
}

/// Result of a manual adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct StockAdjustment {
    pub product: Product,
    pub movement: InventoryMovement,
}

/// Stock mutations paired with their inventory movements.
#[derive(Debug, Clone)]
pub struct ProductLedger {
    db: Database,
    retry: RetrySettings,
}

impl ProductLedger {
    pub fn new(db: Database, retry: RetrySettings) -> Self {
        ProductLedger { db, retry }
    }

    // =========================================================================
    // Unit-of-work operations
    // =========================================================================

    /// Locks a product row for the rest of the unit of work.
    ///
    /// Inactive products are still returned: a till may sell an item that was
    /// delisted after it last synced the catalog.
    pub async fn lock(conn: &mut SqliteConnection, product_id: &str) -> OrderResult<Product> {
        ProductRepository::get_for_update(conn, product_id)
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => OrderError::ProductNotFound(product_id.to_string()),
                other => OrderError::Database(other),
            })
    }

    /// Deducts a sold quantity from a product locked with [`Self::lock`].
    ///
    /// Unconditional: stock may go negative. Shortage policy is the caller's
    /// business.
    pub async fn deduct(
        conn: &mut SqliteConnection,
        product: &mut Product,
        quantity: i64,
        order_id: &str,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> OrderResult<InventoryMovement> {
        let change = StockChange {
            delta: -quantity,
            movement_type: MovementType::Out,
            reference_type: ReferenceType::Order,
            reference_id: Some(order_id),
            user_id,
            notes: None,
        };
        Self::apply(conn, product, change, now).await
    }

    /// Puts a cancelled line's quantity back.
    pub async fn restore(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        order_id: &str,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> OrderResult<InventoryMovement> {
        let mut product = Self::lock(conn, product_id).await?;
        let change = StockChange {
            delta: quantity,
            movement_type: MovementType::In,
            reference_type: ReferenceType::OrderCancel,
            reference_id: Some(order_id),
            user_id,
            notes: None,
        };
        Self::apply(conn, &mut product, change, now).await
    }

    async fn apply(
        conn: &mut SqliteConnection,
        product: &mut Product,
        change: StockChange<'_>,
        now: DateTime<Utc>,
    ) -> OrderResult<InventoryMovement> {
        let expected_version = product.apply_stock_delta(change.delta, now);
        ProductRepository::save(conn, product, expected_version).await?;

        let movement = InventoryMovement {
            id: generate_movement_id(),
            product_id: product.id.clone(),
            movement_type: change.movement_type,
            quantity: change.delta,
            reference_type: change.reference_type,
            reference_id: change.reference_id.map(str::to_string),
            user_id: change.user_id.map(str::to_string),
            notes: change.notes.map(str::to_string),
            created_at: now,
        };
        MovementRepository::insert(conn, &movement).await?;

        debug!(
            product_id = %product.id,
            delta = change.delta,
            stock = product.stock,
            version = product.stock_version,
            "Stock changed"
        );

        Ok(movement)
    }

    // =========================================================================
    // Standalone operations
    // =========================================================================

    /// Manual stock correction (stock take, breakage, delivery).
    ///
    /// Runs as its own unit of work and records an `adjustment` movement,
    /// typed `in` or `out` by the sign of `delta`.
    pub async fn adjust(
        &self,
        product_id: &str,
        delta: i64,
        user_id: Option<&str>,
        notes: Option<&str>,
    ) -> OrderResult<StockAdjustment> {
        validate_uuid("product_id", product_id)?;
        if delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            }
            .into());
        }
        if delta.unsigned_abs() > MAX_ADJUSTMENT_DELTA.unsigned_abs() {
            return Err(ValidationError::OutOfRange {
                field: "delta".to_string(),
                min: -MAX_ADJUSTMENT_DELTA,
                max: MAX_ADJUSTMENT_DELTA,
            }
            .into());
        }
        validate_optional_text("notes", notes, MAX_ADJUSTMENT_NOTE_LEN)?;

        let adjustment = with_retry(&self.retry, "adjust_stock", move |_| {
            self.adjust_once(product_id, delta, user_id, notes)
        })
        .await?;

        info!(
            product_id = %product_id,
            delta,
            stock = adjustment.product.stock,
            "Stock adjusted"
        );
        Ok(adjustment)
    }

    async fn adjust_once(
        &self,
        product_id: &str,
        delta: i64,
        user_id: Option<&str>,
        notes: Option<&str>,
    ) -> OrderResult<StockAdjustment> {
        let mut tx = self.db.begin().await?;

        let mut product = Self::lock(&mut tx, product_id).await?;
        let change = StockChange {
            delta,
            movement_type: if delta > 0 { MovementType::In } else { MovementType::Out },
            reference_type: ReferenceType::Adjustment,
            reference_id: None,
            user_id,
            notes,
        };
        let movement = Self::apply(&mut tx, &mut product, change, Utc::now()).await?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(StockAdjustment { product, movement })
    }

    /// Movement history of a product, newest first.
    pub async fn movements(&self, product_id: &str, limit: u32) -> OrderResult<Vec<InventoryMovement>> {
        let limit = if limit == 0 { DEFAULT_MOVEMENT_LIMIT } else { limit };
        Ok(self.db.movements().list_by_product(product_id, limit).await?)
    }
}
