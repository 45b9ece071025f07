//! # Domain Types
//!
//! Core domain types used throughout Tally POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    Product      │   │      Order      │   │     OrderItem       │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  order_id (FK)      │   │
//! │  │  stock (signed) │   │  order_code     │   │  product_id (opt)   │   │
//! │  │  stock_version  │   │  idempotency_key│   │  name/price frozen  │   │
//! │  └─────────────────┘   │  payment_status │   └─────────────────────┘   │
//! │                        └─────────────────┘                              │
//! │  ┌──────────────────────┐   ┌─────────────────┐   ┌─────────────────┐  │
//! │  │  InventoryMovement   │   │  PaymentStatus  │   │ PaymentMethod   │  │
//! │  │  ──────────────────  │   │  ─────────────  │   │  ─────────────  │  │
//! │  │  append-only audit   │   │  Pending        │   │  Cash           │  │
//! │  │  quantity (signed)   │   │  Completed      │   │  Card           │  │
//! │  │  reference_type/id   │   │  Cancelled      │   │  Qris           │  │
//! │  └──────────────────────┘   └─────────────────┘   └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: `sku`, `order_code` - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A catalog product as seen by the order processing core.
///
/// `stock` is signed: a till may sell past zero when bookkeeping has drifted.
/// `stock_version` increments exactly once per committed stock mutation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown to cashier and frozen onto order lines.
    pub name: String,

    /// Catalog price in cents.
    pub price_cents: i64,

    /// Current stock level. May be negative.
    pub stock: i64,

    /// Optimistic concurrency version of `stock`.
    pub stock_version: i64,

    /// When stock last changed.
    #[ts(as = "Option<String>")]
    pub last_stock_update: Option<DateTime<Utc>>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Applies a signed stock delta, bumping the version and stamp.
    ///
    /// Returns the version the row had before the change, which the store uses
    /// as the compare-and-swap guard.
    pub fn apply_stock_delta(&mut self, delta: i64, now: DateTime<Utc>) -> i64 {
        let expected_version = self.stock_version;
        self.stock += delta;
        self.stock_version += 1;
        self.last_stock_update = Some(now);
        self.updated_at = now;
        expected_version
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// QR code payment (QRIS).
    Qris,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Qris => "qris",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "qris" => Ok(PaymentMethod::Qris),
            other => Err(ValidationError::InvalidFormat {
                field: "payment_method".to_string(),
                reason: format!("unknown payment method '{}', expected cash, card or qris", other),
            }),
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Lifecycle of an order.
///
/// ```text
/// completed ──[cancel]──► cancelled
/// ```
/// Orders are created `Completed` immediately; `Pending` exists for stores
/// that record orders ahead of payment and is never produced by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(ValidationError::InvalidFormat {
                field: "payment_status".to_string(),
                reason: format!("unknown payment status '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A sale record (the "transaction" of the till).
///
/// `final_cents` is always `total_cents - discount_cents + tax_cents`,
/// computed by [`crate::cart::OrderTotals`], never taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub order_code: String,
    pub idempotency_key: Option<String>,
    /// Cashier who rang the sale.
    pub user_id: Option<String>,
    pub total_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub final_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub has_stock_issue: bool,
    /// JSON array of shortage messages, empty string when there were none.
    pub stock_issue_details: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.payment_status == PaymentStatus::Cancelled
    }

    /// Decodes `stock_issue_details` back into individual messages.
    pub fn stock_issues(&self) -> Vec<String> {
        crate::stock::decode_stock_issues(&self.stock_issue_details)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line of an order.
///
/// Uses the snapshot pattern: `product_name` and `product_price_cents` are
/// frozen at sale time and stay authoritative when `product_id` is gone.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// `None` once the product has been removed from the catalog.
    pub product_id: Option<String>,
    pub product_name: String,
    pub product_price_cents: i64,
    pub quantity: i64,
    /// `product_price_cents × quantity`.
    pub subtotal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Inventory Movement
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    /// Accepted by the `inventory_movements.movement_type` CHECK, so every
    /// stored row decodes. The ledger itself records manual adjustments as
    /// `In` or `Out` by sign, under [`ReferenceType::Adjustment`].
    Adjustment,
}

/// What caused a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Order,
    OrderCancel,
    Adjustment,
}

/// Immutable audit record of one stock change.
///
/// Every stock mutation commits together with exactly one movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Signed: negative for deductions.
    pub quantity: i64,
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
    pub user_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order Filters
// =============================================================================

/// Filters for listing orders. `None` means "don't filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFilters {
    pub user_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub has_stock_issue: Option<bool>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            sku: "BEAN-1KG".to_string(),
            name: "Coffee Beans 1kg".to_string(),
            price_cents: 12_500,
            stock,
            stock_version: 3,
            last_stock_update: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_apply_stock_delta_bumps_version() {
        let mut p = product(5);
        let now = Utc::now();

        let expected = p.apply_stock_delta(-8, now);

        assert_eq!(expected, 3);
        assert_eq!(p.stock, -3);
        assert_eq!(p.stock_version, 4);
        assert_eq!(p.last_stock_update, Some(now));
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!(" QRIS ".parse::<PaymentMethod>().unwrap(), PaymentMethod::Qris);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_status_roundtrip_str() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_reference_type_serde() {
        let json = serde_json::to_string(&ReferenceType::OrderCancel).unwrap();
        assert_eq!(json, "\"order_cancel\"");
    }
}
