//! # Product Repository
//!
//! The Product Store: catalog reads plus the two stock primitives used inside
//! a unit of work.
//!
//! ## Locking on SQLite
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              get_for_update() + save() inside one transaction           │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    UPDATE products SET stock_version = stock_version                   │
//! │      WHERE id = ? RETURNING *          ← first write takes the          │
//! │                                          database write lock; other    │
//! │                                          writers wait (busy_timeout)   │
//! │    ... check shortage, compute new stock ...                           │
//! │    UPDATE products SET stock = ?, stock_version = ?                    │
//! │      WHERE id = ? AND stock_version = ?expected                        │
//! │                                        ← 0 rows → VersionConflict      │
//! │  COMMIT                                ← lock released                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! SQLite has no `SELECT ... FOR UPDATE`. The no-op update is the row lock,
//! and the version compare-and-swap catches anything that slips past it.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::Product;

const PRODUCT_COLUMNS: &str = "id, sku, name, price_cents, stock, stock_version, \
     last_stock_update, is_active, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
/// let product = repo.get_by_id("uuid-here").await?;
///
/// // Inside a unit of work
/// let mut tx = db.begin().await?;
/// let mut p = ProductRepository::get_for_update(&mut tx, &id).await?;
/// let expected = p.apply_stock_delta(-2, Utc::now());
/// ProductRepository::save(&mut tx, &p, expected).await?;
/// tx.commit().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE sku = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
            PRODUCT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, stock, stock_version,
                last_stock_update, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.stock_version)
        .bind(product.last_stock_update)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.sku),
            other => other,
        })?;

        Ok(())
    }

    /// Soft deletes a product (sets is_active = false).
    ///
    /// Historical order lines keep their link and snapshot.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Removes a product row entirely.
    ///
    /// Order lines that referenced it keep their name/price snapshot with
    /// `product_id` set to NULL; movements keep the raw id.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts total products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Unit-of-work primitives
    // =========================================================================

    /// Reads a product under an exclusive write lock.
    ///
    /// Only meaningful on a connection inside an open transaction; the lock
    /// is held until that transaction commits or rolls back.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - no product with this id
    /// * `DbError::Busy` - another unit of work held the lock past busy_timeout
    pub async fn get_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET stock_version = stock_version WHERE id = ?1 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        product.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Writes back the stock columns of a locked product.
    ///
    /// Compare-and-swap on `stock_version`: succeeds only when the row still
    /// carries `expected_version`.
    ///
    /// ## Errors
    /// * `DbError::VersionConflict` - the row changed since it was read
    pub async fn save(
        conn: &mut SqliteConnection,
        product: &Product,
        expected_version: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                stock = ?2,
                stock_version = ?3,
                last_stock_update = ?4,
                updated_at = ?5
            WHERE id = ?1 AND stock_version = ?6
            "#,
        )
        .bind(&product.id)
        .bind(product.stock)
        .bind(product.stock_version)
        .bind(product.last_stock_update)
        .bind(product.updated_at)
        .bind(expected_version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::VersionConflict {
                entity: "Product".to_string(),
                id: product.id.clone(),
                expected: expected_version,
            });
        }

        Ok(())
    }
}

/// Generates a new product ID (UUID v4).
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample_product(sku: &str, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            price_cents: 1_500,
            stock,
            stock_version: 0,
            last_stock_update: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = sample_product("TEA-1", 10);

        repo.insert(&product).await.unwrap();

        let found = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.sku, "TEA-1");
        assert_eq!(found.stock, 10);
        assert!(repo.get_by_sku("TEA-1").await.unwrap().is_some());
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&sample_product("DUP", 1)).await.unwrap();
        let err = repo.insert(&sample_product("DUP", 1)).await.unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_lock_and_save_bumps_version() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample_product("MILK", 5);
        db.products().insert(&product).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let mut locked = ProductRepository::get_for_update(&mut tx, &product.id)
            .await
            .unwrap();
        let expected = locked.apply_stock_delta(-8, Utc::now());
        ProductRepository::save(&mut tx, &locked, expected).await.unwrap();
        tx.commit().await.unwrap();

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, -3);
        assert_eq!(after.stock_version, 1);
        assert!(after.last_stock_update.is_some());
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample_product("EGGS", 5);
        db.products().insert(&product).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let mut locked = ProductRepository::get_for_update(&mut tx, &product.id)
            .await
            .unwrap();
        locked.apply_stock_delta(-1, Utc::now());

        let err = ProductRepository::save(&mut tx, &locked, 7).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { expected: 7, .. }));
    }

    #[tokio::test]
    async fn test_lock_missing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let err = ProductRepository::get_for_update(&mut tx, "nope").await.unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rollback_on_drop() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample_product("BREAD", 4);
        db.products().insert(&product).await.unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            let mut locked = ProductRepository::get_for_update(&mut tx, &product.id)
                .await
                .unwrap();
            let expected = locked.apply_stock_delta(-4, Utc::now());
            ProductRepository::save(&mut tx, &locked, expected).await.unwrap();
            // dropped without commit
        }

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 4);
        assert_eq!(after.stock_version, 0);
    }
}
