//! # Movement Repository
//!
//! Append-only audit trail of stock changes. Rows are inserted inside the
//! same unit of work as the stock change they describe and never updated
//! or deleted.

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::{InventoryMovement, ReferenceType};

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, reference_type, \
     reference_id, user_id, notes, created_at";

/// Repository for inventory movement operations.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Movement history of a product, newest first.
    pub async fn list_by_product(&self, product_id: &str, limit: u32) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as::<_, InventoryMovement>(&format!(
            "SELECT {} FROM inventory_movements WHERE product_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Movements caused by one referenced entity, oldest first.
    pub async fn list_by_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as::<_, InventoryMovement>(&format!(
            "SELECT {} FROM inventory_movements WHERE reference_type = ?1 AND reference_id = ?2 \
             ORDER BY rowid",
            MOVEMENT_COLUMNS
        ))
        .bind(reference_type)
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Sum of all movement quantities for a product.
    ///
    /// Equals `stock - initial stock` when every change went through the ledger.
    pub async fn net_quantity(&self, product_id: &str) -> DbResult<i64> {
        let net: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM inventory_movements WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(net)
    }

    /// Appends a movement on the unit-of-work connection.
    pub async fn insert(conn: &mut SqliteConnection, movement: &InventoryMovement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, product_id, movement_type, quantity,
                reference_type, reference_id, user_id, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.reference_type)
        .bind(&movement.reference_id)
        .bind(&movement.user_id)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/// Generates a new movement ID.
pub fn generate_movement_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use tally_core::MovementType;

    fn movement(product_id: &str, quantity: i64, reference_id: &str) -> InventoryMovement {
        InventoryMovement {
            id: generate_movement_id(),
            product_id: product_id.to_string(),
            movement_type: if quantity < 0 { MovementType::Out } else { MovementType::In },
            quantity,
            reference_type: ReferenceType::Order,
            reference_id: Some(reference_id.to_string()),
            user_id: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        MovementRepository::insert(&mut tx, &movement("p-1", -2, "o-1")).await.unwrap();
        MovementRepository::insert(&mut tx, &movement("p-1", -3, "o-2")).await.unwrap();
        MovementRepository::insert(&mut tx, &movement("p-2", -1, "o-2")).await.unwrap();
        tx.commit().await.unwrap();

        let repo = db.movements();

        let history = repo.list_by_product("p-1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].quantity, -3);

        let by_order = repo.list_by_reference(ReferenceType::Order, "o-2").await.unwrap();
        assert_eq!(by_order.len(), 2);

        assert_eq!(repo.net_quantity("p-1").await.unwrap(), -5);
        assert_eq!(repo.net_quantity("unknown").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_adjustment_rows_decode() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stocktake = InventoryMovement {
            movement_type: MovementType::Adjustment,
            reference_type: ReferenceType::Adjustment,
            reference_id: None,
            notes: Some("stock take".to_string()),
            ..movement("p-3", 7, "unused")
        };

        let mut tx = db.begin().await.unwrap();
        MovementRepository::insert(&mut tx, &stocktake).await.unwrap();
        tx.commit().await.unwrap();

        let history = db.movements().list_by_product("p-3", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].movement_type, MovementType::Adjustment);
        assert_eq!(history[0].reference_type, ReferenceType::Adjustment);
        assert_eq!(history[0].reference_id, None);
    }
}
