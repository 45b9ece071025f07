//! # Order Service
//!
//! The sale transaction coordinator. Every write here is one unit of work:
//! all rows land or none do.
//!
//! ## Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate request ──► bad? ──► VALIDATION_ERROR (nothing locked)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  IdempotencyGuard::lookup ──► known key? ──► replay, no side effects   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─── attempt n ───────────────────────────────────────────────────┐   │
//! │  │  BEGIN                                                           │   │
//! │  │  OrderBuilder::build   (lock, check, deduct, movement per line) │   │
//! │  │  COMMIT                                                          │   │
//! │  │  any error ──► ROLLBACK                                          │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ├── busy / stale version / code collision ──► backoff, retry     │
//! │       ├── idempotency key taken ──► recover winner, replay             │
//! │       └── anything else ──► error to caller                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancel
//! `completed → cancelled` is the only transition. Each line with a product
//! still in the catalog gets its quantity back with an `in` movement; lines
//! whose product was deleted keep only their snapshot.

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tally_core::validation::validate_uuid;
use tally_core::{OrderFilters, OrderRequest, PaymentStatus, ValidationError};
use tally_db::{Database, DbError, OrderRepository};
use tracing::{debug, info, warn};

use crate::builder::{BuiltOrder, OrderBuilder};
use crate::config::OrderConfig;
use crate::error::{OrderError, OrderResult};
use crate::idempotency::IdempotencyGuard;
use crate::ledger::ProductLedger;
use crate::response::{CreateOrderOutcome, OrderPage, OrderResponse};
use crate::retry::with_retry;

/// Entry point of the order processing core.
///
/// Cheap to clone; clones share the database pool.
#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    config: OrderConfig,
    builder: OrderBuilder,
    guard: IdempotencyGuard,
    ledger: ProductLedger,
}

impl OrderService {
    pub fn new(db: Database, config: OrderConfig) -> Self {
        OrderService {
            builder: OrderBuilder::from_config(&config),
            guard: IdempotencyGuard::new(db.clone()),
            ledger: ProductLedger::new(db.clone(), config.retry.clone()),
            db,
            config,
        }
    }

    /// Opens the configured database and builds the service on it.
    pub async fn open(config: OrderConfig) -> OrderResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(
            path = %config.database.path.display(),
            stock_policy = %config.stock.policy,
            "Order service ready"
        );
        Ok(Self::new(db, config))
    }

    pub fn config(&self) -> &OrderConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Stock adjustments and movement history.
    pub fn ledger(&self) -> &ProductLedger {
        &self.ledger
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates an order from a cart.
    ///
    /// Stock shortages are not errors under the default policy: the order
    /// commits and the shortages come back as warnings.
    pub async fn create(
        &self,
        request: &OrderRequest,
        user_id: Option<&str>,
    ) -> OrderResult<CreateOrderOutcome> {
        request.validate(&self.config.cart_limits())?;

        let key = request.idempotency_key();
        if let Some(key) = key {
            if let Some(existing) = self.guard.lookup(key).await? {
                return Ok(Self::replayed(existing));
            }
        }

        let result = with_retry(&self.config.retry, "create_order", move |attempt| {
            self.create_once(request, user_id, attempt)
        })
        .await;

        match (result, key) {
            (Ok(built), _) => {
                info!(
                    order_id = %built.order.id,
                    order_code = %built.order.order_code,
                    final_cents = built.order.final_cents,
                    warnings = built.warnings.len(),
                    "Order created"
                );
                Ok(CreateOrderOutcome {
                    order: OrderResponse::new(built.order, built.items),
                    warnings: built.warnings,
                    replayed: false,
                })
            }
            (Err(e), Some(key)) if e.is_idempotency_conflict() => {
                info!(idempotency_key = %key, "Concurrent submission won the key, replaying it");
                let winner = self.guard.recover(key).await?;
                Ok(Self::replayed(winner))
            }
            (Err(e), _) => Err(e),
        }
    }

    async fn create_once(
        &self,
        request: &OrderRequest,
        user_id: Option<&str>,
        attempt: u32,
    ) -> OrderResult<BuiltOrder> {
        let mut tx = self.db.begin().await?;
        debug!(attempt, lines = request.items.len(), "Order unit of work started");

        match self.builder.build(&mut tx, request, user_id, Utc::now()).await {
            Ok(built) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(built)
            }
            Err(e) => {
                rollback(tx, "create_order", &e).await;
                Err(e)
            }
        }
    }

    fn replayed(order: OrderResponse) -> CreateOrderOutcome {
        CreateOrderOutcome {
            order,
            warnings: Vec::new(),
            replayed: true,
        }
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels a completed order and puts its stock back.
    ///
    /// ## Errors
    /// * `AlreadyCancelled` - second cancel of the same order
    /// * `OrderNotFound` - unknown id
    pub async fn cancel(&self, order_id: &str, user_id: Option<&str>) -> OrderResult<OrderResponse> {
        validate_uuid("order_id", order_id)?;

        let restored = with_retry(&self.config.retry, "cancel_order", move |_| {
            self.cancel_once(order_id, user_id)
        })
        .await?;

        info!(order_id = %order_id, restored_lines = restored, "Order cancelled");
        self.get_by_id(order_id).await
    }

    async fn cancel_once(&self, order_id: &str, user_id: Option<&str>) -> OrderResult<usize> {
        let mut tx = self.db.begin().await?;

        match Self::cancel_in(&mut tx, order_id, user_id).await {
            Ok(restored) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(restored)
            }
            Err(e) => {
                rollback(tx, "cancel_order", &e).await;
                Err(e)
            }
        }
    }

    /// Returns how many lines had stock restored.
    async fn cancel_in(
        conn: &mut SqliteConnection,
        order_id: &str,
        user_id: Option<&str>,
    ) -> OrderResult<usize> {
        let order = OrderRepository::get_for_update(conn, order_id)
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => OrderError::OrderNotFound(order_id.to_string()),
                other => OrderError::Database(other),
            })?;

        match order.payment_status {
            PaymentStatus::Completed => {}
            PaymentStatus::Cancelled => return Err(OrderError::AlreadyCancelled(order_id.to_string())),
            status => {
                return Err(OrderError::InvalidStatus {
                    order_id: order_id.to_string(),
                    status: status.to_string(),
                })
            }
        }

        let now = Utc::now();
        let items = OrderRepository::items_in(conn, order_id).await?;
        let mut restored = 0;

        for item in &items {
            let Some(product_id) = item.product_id.as_deref() else {
                debug!(order_id = %order_id, product = %item.product_name, "Product deleted, keeping snapshot only");
                continue;
            };
            ProductLedger::restore(conn, product_id, item.quantity, order_id, user_id, now).await?;
            restored += 1;
        }

        OrderRepository::update_status(conn, order_id, PaymentStatus::Completed, PaymentStatus::Cancelled, now)
            .await?;

        Ok(restored)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, order_id: &str) -> OrderResult<OrderResponse> {
        validate_uuid("order_id", order_id)?;

        let orders = self.db.orders();
        let order = orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        let items = orders.items_for(&order.id).await?;

        Ok(OrderResponse::new(order, items))
    }

    pub async fn get_by_code(&self, order_code: &str) -> OrderResult<OrderResponse> {
        let code = order_code.trim();
        if code.is_empty() {
            return Err(ValidationError::Required {
                field: "order_code".to_string(),
            }
            .into());
        }

        let orders = self.db.orders();
        let order = orders
            .find_by_code(code)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(code.to_string()))?;
        let items = orders.items_for(&order.id).await?;

        Ok(OrderResponse::new(order, items))
    }

    /// Lists orders newest first. `page` is 1-based; `page_size` 0 means the
    /// configured default, and anything above the maximum is capped.
    pub async fn list(&self, page: u32, page_size: u32, filters: &OrderFilters) -> OrderResult<OrderPage> {
        let (page, page_size) = self.config.clamp_page(page, page_size);

        let repo = self.db.orders();
        let (orders, total) = repo.list_filtered(page, page_size, filters).await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let items = repo.items_for(&order.id).await?;
            responses.push(OrderResponse::new(order, items));
        }

        Ok(OrderPage {
            orders: responses,
            total,
            page,
            page_size,
        })
    }
}

/// Rolls back a failed unit of work, logging why.
async fn rollback(tx: Transaction<'static, Sqlite>, operation: &'static str, cause: &OrderError) {
    warn!(operation, error = %cause, retryable = cause.is_retryable(), "Rolling back unit of work");
    if let Err(e) = tx.rollback().await {
        warn!(operation, error = %e, "Rollback failed; connection will discard the transaction");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
