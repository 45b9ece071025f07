//! # Cart Module
//!
//! Incoming order requests and the arithmetic that turns them into totals.
//!
//! ## Totals
//! ```text
//! line subtotal = unit_price × quantity
//! total         = Σ line subtotals
//! final         = total − discount + tax
//! ```
//! `final` is always recomputed here; a client-supplied final amount does not
//! exist in the request type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::PaymentMethod;
use crate::validation::{
    validate_amount_cents, validate_cart_size, validate_idempotency_key, validate_optional_text,
    validate_quantity, validate_uuid, ValidationResult,
};
use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Longest accepted customer name.
const MAX_CUSTOMER_NAME_LEN: usize = 255;

/// Longest accepted order note.
const MAX_NOTES_LEN: usize = 1_000;

// =============================================================================
// Request Types
// =============================================================================

/// One line of a cart as submitted by a till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    /// Price charged at the till, frozen onto the order line.
    pub unit_price_cents: i64,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
            unit_price_cents,
        }
    }

    /// `unit_price × quantity`, or [`ValidationError::AmountOverflow`].
    #[inline]
    pub fn subtotal(&self) -> ValidationResult<Money> {
        Money::from_cents(self.unit_price_cents)
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| overflow("subtotal"))
    }
}

/// A cart submission: create one order from these lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderRequest {
    /// Client token making retries of this submission safe.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub items: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub tax_cents: i64,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OrderRequest {
    /// Starts a request with no discount, tax or idempotency key.
    pub fn new(items: Vec<CartLine>, payment_method: PaymentMethod) -> Self {
        OrderRequest {
            idempotency_key: None,
            items,
            payment_method,
            discount_cents: 0,
            tax_cents: 0,
            customer_name: None,
            notes: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_adjustments(mut self, discount_cents: i64, tax_cents: i64) -> Self {
        self.discount_cents = discount_cents;
        self.tax_cents = tax_cents;
        self
    }

    /// Trimmed idempotency key, with blank keys treated as absent.
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Checks the request shape. Runs before any product is locked.
    pub fn validate(&self, limits: &CartLimits) -> ValidationResult<()> {
        validate_cart_size(self.items.len(), limits.max_items)?;

        for line in &self.items {
            validate_uuid("product_id", &line.product_id)?;
            validate_quantity(line.quantity, limits.max_item_quantity)?;
            validate_amount_cents("unit_price", line.unit_price_cents)?;
        }

        validate_amount_cents("discount_amount", self.discount_cents)?;
        validate_amount_cents("tax_amount", self.tax_cents)?;

        if let Some(key) = self.idempotency_key() {
            validate_idempotency_key(key)?;
        }

        validate_optional_text("customer_name", self.customer_name.as_deref(), MAX_CUSTOMER_NAME_LEN)?;
        validate_optional_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?;

        // Limits are configurable, so the bounds above alone don't rule out overflow
        self.totals()?;

        Ok(())
    }

    /// Totals of this request at the cart prices.
    pub fn totals(&self) -> ValidationResult<OrderTotals> {
        let subtotals = self
            .items
            .iter()
            .map(CartLine::subtotal)
            .collect::<ValidationResult<Vec<_>>>()?;

        OrderTotals::compute(
            subtotals,
            Money::from_cents(self.discount_cents),
            Money::from_cents(self.tax_cents),
        )
    }
}

/// Size limits applied by [`OrderRequest::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLimits {
    pub max_items: usize,
    pub max_item_quantity: i64,
}

impl Default for CartLimits {
    fn default() -> Self {
        CartLimits {
            max_items: MAX_CART_ITEMS,
            max_item_quantity: MAX_ITEM_QUANTITY,
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// The monetary summary of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total: Money,
    pub discount: Money,
    pub tax: Money,
    pub final_amount: Money,
}

impl OrderTotals {
    /// Sums line subtotals and applies discount and tax.
    ///
    /// ## Errors
    /// [`ValidationError::AmountOverflow`] when a sum leaves the `i64` range.
    pub fn compute<I>(subtotals: I, discount: Money, tax: Money) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        let total = subtotals
            .into_iter()
            .try_fold(Money::zero(), Money::checked_add)
            .ok_or_else(|| overflow("total_amount"))?;

        let final_amount = total
            .checked_sub(discount)
            .and_then(|m| m.checked_add(tax))
            .ok_or_else(|| overflow("final_amount"))?;

        Ok(OrderTotals {
            total,
            discount,
            tax,
            final_amount,
        })
    }
}

fn overflow(field: &str) -> ValidationError {
    ValidationError::AmountOverflow {
        field: field.to_string(),
    }
}

// =============================================================================
// Order Code
// =============================================================================

/// Formats a human-readable order code: `TRX-20260131-142501-9F3A`.
///
/// The date-time part has second resolution, so `suffix` must carry enough
/// entropy to separate orders rung in the same second. The store still
/// enforces uniqueness.
pub fn format_order_code(prefix: &str, at: DateTime<Utc>, suffix: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        prefix,
        at.format("%Y%m%d"),
        at.format("%H%M%S"),
        suffix.to_uppercase()
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_AMOUNT_CENTS;
    use chrono::TimeZone;

    const PRODUCT_A: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn request() -> OrderRequest {
        OrderRequest::new(vec![CartLine::new(PRODUCT_A, 2, 1500)], PaymentMethod::Cash)
    }

    #[test]
    fn test_totals_match_line_sum() {
        let lines = [CartLine::new(PRODUCT_A, 2, 1500), CartLine::new(PRODUCT_A, 1, 250)];
        let totals = OrderTotals::compute(
            lines.iter().map(|l| l.subtotal().unwrap()),
            Money::from_cents(200),
            Money::from_cents(100),
        )
        .unwrap();

        assert_eq!(totals.total.cents(), 3250);
        assert_eq!(totals.final_amount.cents(), 3250 - 200 + 100);
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate(&CartLimits::default()).is_ok());
    }

    #[test]
    fn test_empty_cart_rejected() {
        let req = OrderRequest::new(vec![], PaymentMethod::Card);
        assert!(req.validate(&CartLimits::default()).is_err());
    }

    #[test]
    fn test_malformed_product_id_rejected() {
        let req = OrderRequest::new(vec![CartLine::new("abc", 1, 100)], PaymentMethod::Cash);
        assert!(req.validate(&CartLimits::default()).is_err());
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let limits = CartLimits::default();
        assert!(request().with_adjustments(-1, 0).validate(&limits).is_err());
        assert!(request().with_adjustments(0, -1).validate(&limits).is_err());

        let mut req = request();
        req.items[0].unit_price_cents = -5;
        assert!(req.validate(&limits).is_err());
    }

    #[test]
    fn test_oversized_amounts_rejected() {
        let limits = CartLimits::default();

        let mut req = request();
        req.items[0].unit_price_cents = i64::MAX / 2;
        assert!(matches!(
            req.validate(&limits),
            Err(ValidationError::OutOfRange { .. })
        ));

        assert!(request().with_adjustments(0, i64::MAX).validate(&limits).is_err());
    }

    #[test]
    fn test_overflowing_totals_rejected() {
        // Raised limits let each line pass on its own
        let limits = CartLimits {
            max_items: 100,
            max_item_quantity: i64::MAX,
        };
        let req = OrderRequest::new(
            vec![CartLine::new(PRODUCT_A, i64::MAX / 1_000, MAX_AMOUNT_CENTS)],
            PaymentMethod::Cash,
        );

        assert_eq!(
            req.validate(&limits),
            Err(ValidationError::AmountOverflow {
                field: "subtotal".to_string()
            })
        );

        let near_max = Money::from_cents(i64::MAX - 10);
        assert!(OrderTotals::compute([near_max, near_max], Money::zero(), Money::zero()).is_err());
        assert!(OrderTotals::compute([near_max], Money::zero(), Money::from_cents(20)).is_err());
    }

    #[test]
    fn test_blank_idempotency_key_is_absent() {
        let req = request().with_idempotency_key("   ");
        assert_eq!(req.idempotency_key(), None);
        assert!(req.validate(&CartLimits::default()).is_ok());

        let req = request().with_idempotency_key(" till-1:42 ");
        assert_eq!(req.idempotency_key(), Some("till-1:42"));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = format!(
            r#"{{"items":[{{"product_id":"{}","quantity":1,"unit_price_cents":500}}],"payment_method":"qris"}}"#,
            PRODUCT_A
        );
        let req: OrderRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Qris);
        assert_eq!(req.discount_cents, 0);
        assert!(req.idempotency_key.is_none());
    }

    #[test]
    fn test_format_order_code() {
        let at = Utc.with_ymd_and_hms(2026, 1, 31, 14, 25, 1).unwrap();
        assert_eq!(format_order_code("TRX", at, "9f3a"), "TRX-20260131-142501-9F3A");
    }
}
