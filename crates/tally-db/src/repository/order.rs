//! # Order Repository
//!
//! The Transaction Store: persistence of orders and their line items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE (inside the creation unit of work)                          │
//! │     └── insert(conn, order, items) → Order { status: Completed }       │
//! │         UNIQUE order_code / idempotency_key enforced here              │
//! │                                                                         │
//! │  2. READ (outside any unit of work)                                    │
//! │     └── find_by_id / find_by_code / find_by_idempotency_key            │
//! │     └── list_filtered(page, page_size, filters) → (orders, total)      │
//! │                                                                         │
//! │  3. CANCEL (inside the cancellation unit of work)                      │
//! │     └── get_for_update(conn, id) → lock the row                        │
//! │     └── update_status(conn, id, Completed → Cancelled)                 │
//! │                                                                         │
//! │  Orders are never deleted.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{Order, OrderFilters, OrderItem, PaymentStatus};

const ORDER_COLUMNS: &str = "id, order_code, idempotency_key, user_id, total_cents, \
     discount_cents, tax_cents, final_cents, payment_method, payment_status, customer_name, \
     notes, has_stock_issue, stock_issue_details, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, product_price_cents, \
     quantity, subtotal_cents, created_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        self.find_one("id", id).await
    }

    /// Gets an order by its human-readable code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Order>> {
        self.find_one("order_code", code).await
    }

    /// Gets the order created under a client idempotency key.
    pub async fn find_by_idempotency_key(&self, key: &str) -> DbResult<Option<Order>> {
        self.find_one("idempotency_key", key).await
    }

    async fn find_one(&self, column: &'static str, value: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE {} = ?1",
            ORDER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets the line items of an order in submission order.
    pub async fn items_for(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY line_no",
            ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists orders newest first, with the total count matching `filters`.
    ///
    /// `page` is 1-based; page 0 is treated as page 1.
    pub async fn list_filtered(
        &self,
        page: u32,
        page_size: u32,
        filters: &OrderFilters,
    ) -> DbResult<(Vec<Order>, i64)> {
        let offset = i64::from(page.max(1) - 1) * i64::from(page_size);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders WHERE 1 = 1");
        push_filters(&mut count_query, filters);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM orders WHERE 1 = 1", ORDER_COLUMNS));
        push_filters(&mut query, filters);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page_size))
            .push(" OFFSET ")
            .push_bind(offset);

        let orders = query.build_query_as::<Order>().fetch_all(&self.pool).await?;

        debug!(total, returned = orders.len(), page, "Listed orders");
        Ok((orders, total))
    }

    /// Counts all orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Unit-of-work primitives
    // =========================================================================

    /// Inserts an order and its items.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` on `orders.order_code` - code collision
    /// * `DbError::UniqueViolation` on `orders.idempotency_key` - another
    ///   submission with the same key committed first
    pub async fn insert(
        conn: &mut SqliteConnection,
        order: &Order,
        items: &[OrderItem],
    ) -> DbResult<()> {
        debug!(id = %order.id, order_code = %order.order_code, lines = items.len(), "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_code, idempotency_key, user_id,
                total_cents, discount_cents, tax_cents, final_cents,
                payment_method, payment_status, customer_name, notes,
                has_stock_issue, stock_issue_details, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_code)
        .bind(&order.idempotency_key)
        .bind(&order.user_id)
        .bind(order.total_cents)
        .bind(order.discount_cents)
        .bind(order.tax_cents)
        .bind(order.final_cents)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(&order.customer_name)
        .bind(&order.notes)
        .bind(order.has_stock_issue)
        .bind(&order.stock_issue_details)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        for (line_no, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id,
                    product_name, product_price_cents,
                    quantity, subtotal_cents, line_no, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.product_price_cents)
            .bind(item.quantity)
            .bind(item.subtotal_cents)
            .bind(line_no as i64)
            .bind(item.created_at)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Reads an order under the write lock (same technique as products).
    pub async fn get_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<Order> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET updated_at = updated_at WHERE id = ?1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        order.ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Items of an order, read on the unit-of-work connection.
    pub async fn items_in(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY line_no",
            ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// Moves an order from `from` to `to`.
    ///
    /// Guarded on the current status, so a transition never applies twice.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = ?3, updated_at = ?4 WHERE id = ?1 AND payment_status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("Order ({})", from), id));
        }

        Ok(())
    }
}

/// Appends `AND ...` clauses for every set filter.
fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filters: &OrderFilters) {
    if let Some(user_id) = &filters.user_id {
        query.push(" AND user_id = ").push_bind(user_id.clone());
    }
    if let Some(method) = filters.payment_method {
        query.push(" AND payment_method = ").push_bind(method);
    }
    if let Some(status) = filters.payment_status {
        query.push(" AND payment_status = ").push_bind(status);
    }
    if let Some(start) = filters.start_date {
        query.push(" AND created_at >= ").push_bind(start);
    }
    if let Some(end) = filters.end_date {
        query.push(" AND created_at <= ").push_bind(end);
    }
    if let Some(flag) = filters.has_stock_issue {
        query.push(" AND has_stock_issue = ").push_bind(flag);
    }
}

/// Generates a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new order item ID.
pub fn generate_order_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use tally_core::PaymentMethod;

    fn order(code: &str, key: Option<&str>, method: PaymentMethod, at: DateTime<Utc>) -> Order {
        Order {
            id: generate_order_id(),
            order_code: code.to_string(),
            idempotency_key: key.map(str::to_string),
            user_id: Some("cashier-1".to_string()),
            total_cents: 3_000,
            discount_cents: 0,
            tax_cents: 300,
            final_cents: 3_300,
            payment_method: method,
            payment_status: PaymentStatus::Completed,
            customer_name: None,
            notes: None,
            has_stock_issue: false,
            stock_issue_details: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    fn item(order_id: &str, name: &str) -> OrderItem {
        OrderItem {
            id: generate_order_item_id(),
            order_id: order_id.to_string(),
            product_id: None,
            product_name: name.to_string(),
            product_price_cents: 1_500,
            quantity: 2,
            subtotal_cents: 3_000,
            created_at: Utc::now(),
        }
    }

    async fn insert(db: &Database, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        let mut tx = db.begin().await?;
        OrderRepository::insert(&mut tx, order, items).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let o = order("TRX-1", Some("key-1"), PaymentMethod::Cash, Utc::now());
        let items = vec![item(&o.id, "Latte"), item(&o.id, "Bagel"), item(&o.id, "Juice")];

        insert(&db, &o, &items).await.unwrap();

        let repo = db.orders();
        assert_eq!(repo.find_by_id(&o.id).await.unwrap().unwrap().order_code, "TRX-1");
        assert_eq!(repo.find_by_code("TRX-1").await.unwrap().unwrap().id, o.id);
        assert_eq!(repo.find_by_idempotency_key("key-1").await.unwrap().unwrap().id, o.id);
        assert!(repo.find_by_idempotency_key("other").await.unwrap().is_none());

        let names: Vec<String> = repo
            .items_for(&o.id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.product_name)
            .collect();
        assert_eq!(names, vec!["Latte", "Bagel", "Juice"]);
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        insert(&db, &order("TRX-1", Some("same"), PaymentMethod::Cash, Utc::now()), &[])
            .await
            .unwrap();
        let err = insert(&db, &order("TRX-2", Some("same"), PaymentMethod::Cash, Utc::now()), &[])
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_on("orders.idempotency_key"));
        assert_eq!(db.orders().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keyless_orders_do_not_collide() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        insert(&db, &order("TRX-1", None, PaymentMethod::Cash, Utc::now()), &[])
            .await
            .unwrap();
        insert(&db, &order("TRX-2", None, PaymentMethod::Cash, Utc::now()), &[])
            .await
            .unwrap();

        assert_eq!(db.orders().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        insert(&db, &order("TRX-1", None, PaymentMethod::Cash, Utc::now()), &[])
            .await
            .unwrap();
        let err = insert(&db, &order("TRX-1", None, PaymentMethod::Card, Utc::now()), &[])
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_on("orders.order_code"));
    }

    #[tokio::test]
    async fn test_list_filtered_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let base = Utc::now();

        for i in 0..5 {
            let method = if i % 2 == 0 { PaymentMethod::Cash } else { PaymentMethod::Qris };
            let o = order(&format!("TRX-{}", i), None, method, base + Duration::seconds(i));
            insert(&db, &o, &[]).await.unwrap();
        }

        let repo = db.orders();

        let (page1, total) = repo.list_filtered(1, 2, &OrderFilters::default()).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].order_code, "TRX-4");
        assert_eq!(page1[1].order_code, "TRX-3");

        let (page3, _) = repo.list_filtered(3, 2, &OrderFilters::default()).await.unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].order_code, "TRX-0");

        let cash = OrderFilters {
            payment_method: Some(PaymentMethod::Cash),
            ..Default::default()
        };
        let (orders, total) = repo.list_filtered(1, 10, &cash).await.unwrap();
        assert_eq!(total, 3);
        assert!(orders.iter().all(|o| o.payment_method == PaymentMethod::Cash));

        let window = OrderFilters {
            start_date: Some(base + Duration::seconds(1)),
            end_date: Some(base + Duration::seconds(2)),
            ..Default::default()
        };
        let (_, total) = repo.list_filtered(1, 10, &window).await.unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_status_transition_guarded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let o = order("TRX-1", None, PaymentMethod::Card, Utc::now());
        insert(&db, &o, &[]).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let locked = OrderRepository::get_for_update(&mut tx, &o.id).await.unwrap();
        assert_eq!(locked.payment_status, PaymentStatus::Completed);

        OrderRepository::update_status(
            &mut tx,
            &o.id,
            PaymentStatus::Completed,
            PaymentStatus::Cancelled,
            Utc::now(),
        )
        .await
        .unwrap();

        let again = OrderRepository::update_status(
            &mut tx,
            &o.id,
            PaymentStatus::Completed,
            PaymentStatus::Cancelled,
            Utc::now(),
        )
        .await;
        assert!(again.is_err());
        tx.commit().await.unwrap();

        let after = db.orders().find_by_id(&o.id).await.unwrap().unwrap();
        assert!(after.is_cancelled());
    }
}
