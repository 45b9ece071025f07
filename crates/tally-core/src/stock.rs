//! # Stock Rules
//!
//! Decides what happens when a line asks for more than the recorded stock.
//!
//! ## Shortage Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Soft vs Hard Shortage                                │
//! │                                                                         │
//! │  locked product: stock = 5        line: quantity = 8                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  check_line() → StockWarning { shortage: 3 }                           │
//! │       │                                                                 │
//! │       ├── AllowNegative (default)                                      │
//! │       │     sale completes, stock → -3, has_stock_issue = true         │
//! │       │                                                                 │
//! │       └── Reject                                                        │
//! │             CoreError::InsufficientStock, order rolls back             │
//! │                                                                         │
//! │  A till must be able to sell even when another till has not synced    │
//! │  its counts yet, so the default never blocks the sale.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::Product;

// =============================================================================
// Stock Policy
// =============================================================================

/// What to do when a line's quantity exceeds stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Sell anyway, let stock go negative and attach a warning.
    #[default]
    AllowNegative,
    /// Refuse the whole order.
    Reject,
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockPolicy::AllowNegative => write!(f, "allow_negative"),
            StockPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for StockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow_negative" | "allow-negative" | "soft" => Ok(StockPolicy::AllowNegative),
            "reject" | "strict" | "hard" => Ok(StockPolicy::Reject),
            _ => Err(format!("Invalid stock policy: {}", s)),
        }
    }
}

// =============================================================================
// Stock Warning
// =============================================================================

/// Non-fatal signal that a sale went through despite insufficient stock.
///
/// Transient: returned with the order response, never persisted on its own.
/// The `message` is what ends up in the order's `stock_issue_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockWarning {
    pub product_id: String,
    pub product_name: String,
    pub sold_quantity: i64,
    pub available_stock: i64,
    /// `sold_quantity - available_stock`.
    pub shortage: i64,
    pub message: String,
}

/// Compares a line quantity against the locked product's current stock.
///
/// Returns `None` when stock covers the line.
pub fn check_line(product: &Product, quantity: i64) -> Option<StockWarning> {
    if quantity <= product.stock {
        return None;
    }

    let shortage = quantity - product.stock;
    Some(StockWarning {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        sold_quantity: quantity,
        available_stock: product.stock,
        shortage,
        message: format!(
            "Stock shortage detected for {}. Available: {}, Requested: {}, Short: {}",
            product.name, product.stock, quantity, shortage
        ),
    })
}

/// Turns a shortage into a hard error when the policy demands it.
pub fn enforce(policy: StockPolicy, warning: &StockWarning) -> CoreResult<()> {
    match policy {
        StockPolicy::AllowNegative => Ok(()),
        StockPolicy::Reject => Err(CoreError::InsufficientStock {
            product: warning.product_name.clone(),
            available: warning.available_stock,
            requested: warning.sold_quantity,
        }),
    }
}

// =============================================================================
// Stock Issue Details
// =============================================================================

/// Serializes shortage messages for `orders.stock_issue_details`.
///
/// Empty string when there were no shortages.
pub fn encode_stock_issues(warnings: &[StockWarning]) -> String {
    if warnings.is_empty() {
        return String::new();
    }
    let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
    serde_json::to_string(&messages).unwrap_or_default()
}

/// Inverse of [`encode_stock_issues`]. Malformed input decodes to no issues.
pub fn decode_stock_issues(details: &str) -> Vec<String> {
    if details.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(details).unwrap_or_default()
}

// =============================================================================
// Unit Tests
// =============================================================================
