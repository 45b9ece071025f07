//! Caller-facing response types.

use serde::{Deserialize, Serialize};
use tally_core::{Order, OrderItem, StockWarning};
use ts_rs::TS;

/// An order with its lines, as returned by every read and write path.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    /// Lines in submission order.
    pub items: Vec<OrderItem>,
    /// Shortage messages recorded when the order was created.
    pub stock_issues: Vec<String>,
}

impl OrderResponse {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        let stock_issues = order.stock_issues();
        OrderResponse {
            order,
            items,
            stock_issues,
        }
    }

    pub fn id(&self) -> &str {
        &self.order.id
    }
}

/// Result of a single create.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateOrderOutcome {
    pub order: OrderResponse,
    /// Empty when stock covered every line, and always empty on replay.
    pub warnings: Vec<StockWarning>,
    /// True when an earlier submission with the same idempotency key was
    /// returned instead of creating a new order.
    pub replayed: bool,
}

/// One page of the order list, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderPage {
    pub orders: Vec<OrderResponse>,
    /// Matching orders across all pages.
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl OrderPage {
    pub fn total_pages(&self) -> i64 {
        if self.page_size == 0 {
            return 0;
        }
        let size = i64::from(self.page_size);
        (self.total + size - 1) / size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        let page = |total, page_size| OrderPage {
            orders: Vec::new(),
            total,
            page: 1,
            page_size,
        };
        assert_eq!(page(0, 20).total_pages(), 0);
        assert_eq!(page(20, 20).total_pages(), 1);
        assert_eq!(page(21, 20).total_pages(), 2);
    }
}
