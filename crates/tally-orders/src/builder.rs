//! # Order Builder
//!
//! Turns a validated cart into a persisted order graph inside the caller's
//! unit of work.
//!
//! ## Per-Line Flow
//! ```text
//! for line in cart (submission order):
//!
//!   lock product ──► not found? ──► ProductNotFound (caller rolls back)
//!        │
//!        ▼
//!   check_line ──► shortage? ──► policy = reject → InsufficientStock
//!        │                 └──► policy = allow  → StockWarning, continue
//!        ▼
//!   deduct (stock may go negative) + `out` movement
//!        │
//!        ▼
//!   snapshot line: catalog name, till price
//!
//! then: totals, order code, insert order + items
//! ```
//!
//! Locks are taken line by line, never for the whole cart up front.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tally_core::cart::format_order_code;
use tally_core::stock::{check_line, encode_stock_issues, enforce};
use tally_core::{
    InventoryMovement, Order, OrderItem, OrderRequest, PaymentStatus, StockPolicy, StockWarning,
};
use tally_db::{generate_order_id, generate_order_item_id, OrderRepository};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::OrderConfig;
use crate::error::OrderResult;
use crate::ledger::ProductLedger;

/// Random hex characters appended to every order code.
const ORDER_CODE_SUFFIX_LEN: usize = 4;

/// Everything one submission wrote.
#[derive(Debug, Clone)]
pub struct BuiltOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub warnings: Vec<StockWarning>,
    pub movements: Vec<InventoryMovement>,
}

#[derive(Debug, Clone)]
pub struct OrderBuilder {
    policy: StockPolicy,
    code_prefix: String,
}

impl OrderBuilder {
    pub fn new(policy: StockPolicy, code_prefix: impl Into<String>) -> Self {
        OrderBuilder {
            policy,
            code_prefix: code_prefix.into(),
        }
    }

    pub fn from_config(config: &OrderConfig) -> Self {
        Self::new(config.stock.policy, config.orders.code_prefix.trim())
    }

    pub fn policy(&self) -> StockPolicy {
        self.policy
    }

    /// Locks, checks and deducts every line, then inserts the order.
    ///
    /// The request must already be validated. Nothing is committed here: on
    /// error the caller rolls the unit of work back and every deduction made
    /// so far disappears with it.
    pub async fn build(
        &self,
        conn: &mut SqliteConnection,
        request: &OrderRequest,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> OrderResult<BuiltOrder> {
        let totals = request.totals()?;
        let order_id = generate_order_id();
        let mut items = Vec::with_capacity(request.items.len());
        let mut movements = Vec::with_capacity(request.items.len());
        let mut warnings = Vec::new();

        for line in &request.items {
            let mut product = ProductLedger::lock(conn, &line.product_id).await?;

            if let Some(warning) = check_line(&product, line.quantity) {
                enforce(self.policy, &warning)?;
                warn!(
                    order_id = %order_id,
                    product_id = %product.id,
                    available = warning.available_stock,
                    requested = warning.sold_quantity,
                    shortage = warning.shortage,
                    "Selling past available stock"
                );
                warnings.push(warning);
            }

            let movement =
                ProductLedger::deduct(conn, &mut product, line.quantity, &order_id, user_id, now).await?;
            movements.push(movement);

            items.push(OrderItem {
                id: generate_order_item_id(),
                order_id: order_id.clone(),
                product_id: Some(product.id.clone()),
                product_name: product.name.clone(),
                product_price_cents: line.unit_price_cents,
                quantity: line.quantity,
                subtotal_cents: line.subtotal()?.cents(),
                created_at: now,
            });
        }


        let order = Order {
            id: order_id,
            order_code: self.next_code(now),
            idempotency_key: request.idempotency_key().map(str::to_string),
            user_id: user_id.map(str::to_string),
            total_cents: totals.total.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            final_cents: totals.final_amount.cents(),
            payment_method: request.payment_method,
            payment_status: PaymentStatus::Completed,
            customer_name: request.customer_name.clone(),
            notes: request.notes.clone(),
            has_stock_issue: !warnings.is_empty(),
            stock_issue_details: encode_stock_issues(&warnings),
            created_at: now,
            updated_at: now,
        };

        OrderRepository::insert(conn, &order, &items).await?;

        debug!(
            order_id = %order.id,
            order_code = %order.order_code,
            lines = items.len(),
            final_cents = order.final_cents,
            "Order built"
        );

        Ok(BuiltOrder {
            order,
            items,
            warnings,
            movements,
        })
    }

    /// A fresh order code. Drawn again on every retry.
    fn next_code(&self, now: DateTime<Utc>) -> String {
        let random = Uuid::new_v4().simple().to_string();
        format_order_code(&self.code_prefix, now, &random[..ORDER_CODE_SUFFIX_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrderError;
    use tally_core::{CartLine, PaymentMethod, Product};
    use tally_db::{generate_product_id, Database, DbConfig};

    async fn product(db: &Database, name: &str, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: format!("SKU-{}", &generate_product_id()[..8]),
            name: name.to_string(),
            price_cents: 500,
            stock,
            stock_version: 0,
            last_stock_update: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        product
    }

    #[tokio::test]
    async fn test_build_snapshots_and_totals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let latte = product(&db, "Latte", 10).await;
        let bagel = product(&db, "Bagel", 3).await;

        let request = OrderRequest::new(
            vec![CartLine::new(&latte.id, 2, 450), CartLine::new(&bagel.id, 1, 300)],
            PaymentMethod::Card,
        )
        .with_adjustments(100, 50);

        let builder = OrderBuilder::new(StockPolicy::AllowNegative, "TRX");
        let mut tx = db.begin().await.unwrap();
        let built = builder
            .build(&mut tx, &request, Some("cashier-1"), Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(built.warnings.is_empty());
        assert!(!built.order.has_stock_issue);
        assert_eq!(built.order.stock_issue_details, "");
        assert_eq!(built.order.total_cents, 2 * 450 + 300);
        assert_eq!(built.order.final_cents, 1200 - 100 + 50);
        assert_eq!(built.order.payment_status, PaymentStatus::Completed);
        assert!(built.order.order_code.starts_with("TRX-"));

        // Name from the catalog, price from the till
        assert_eq!(built.items[0].product_name, "Latte");
        assert_eq!(built.items[0].product_price_cents, 450);
        assert_eq!(built.items[1].subtotal_cents, 300);

        assert_eq!(built.movements.len(), 2);
        assert!(built
            .movements
            .iter()
            .all(|m| m.reference_id.as_deref() == Some(built.order.id.as_str())));

        let stored = db.orders().find_by_id(&built.order.id).await.unwrap().unwrap();
        assert_eq!(stored.order_code, built.order.order_code);
        assert_eq!(db.products().get_by_id(&latte.id).await.unwrap().unwrap().stock, 8);
    }

    #[tokio::test]
    async fn test_reject_policy_refuses_shortage() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let beans = product(&db, "House Blend Beans", 5).await;

        let request = OrderRequest::new(vec![CartLine::new(&beans.id, 8, 1200)], PaymentMethod::Cash);
        let builder = OrderBuilder::new(StockPolicy::Reject, "TRX");

        let mut tx = db.begin().await.unwrap();
        let err = builder.build(&mut tx, &request, None, Utc::now()).await.unwrap_err();
        drop(tx);

        assert!(matches!(
            err,
            OrderError::InsufficientStock { available: 5, requested: 8, .. }
        ));
        assert_eq!(db.products().get_by_id(&beans.id).await.unwrap().unwrap().stock, 5);
    }

    #[test]
    fn test_order_code_shape() {
        let builder = OrderBuilder::new(StockPolicy::AllowNegative, "POS");
        let code = builder.next_code(Utc::now());
        let parts: Vec<&str> = code.split('-').collect();

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "POS");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), ORDER_CODE_SUFFIX_LEN);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
