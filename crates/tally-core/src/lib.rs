//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate holds the domain model of the order processing core as pure
//! functions and plain data. Locking, persistence and retries live in
//! `tally-db` and `tally-orders`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Till / HTTP layer (external)                    │   │
//! │  │        create order, cancel order, bulk sync, list orders       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-orders (order processing)                 │   │
//! │  │  idempotency guard ─► order builder ─► coordinator ─► bulk sync │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │   stock   │  │   │
//! │  │   │  Product  │  │   Money   │  │ OrderReq  │  │ Warnings  │  │   │
//! │  │   │   Order   │  │   Sums    │  │  Totals   │  │  Policy   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, OrderItem, InventoryMovement, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - Order requests, line subtotals and order totals
//! - [`stock`] - Shortage detection and the negative-stock policy
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::cart::OrderTotals;
//! use tally_core::money::Money;
//!
//! let totals = OrderTotals::compute(
//!     [Money::from_cents(1000), Money::from_cents(250)],
//!     Money::from_cents(100),
//!     Money::from_cents(50),
//! )?;
//!
//! assert_eq!(totals.total.cents(), 1250);
//! assert_eq!(totals.final_amount.cents(), 1200);
//! # Ok::<(), tally_core::ValidationError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartLimits, CartLine, OrderRequest, OrderTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use stock::{StockPolicy, StockWarning};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single order.
///
/// ## Business Reason
/// Prevents runaway carts and keeps a unit of work short enough that
/// per-product locks are not held for long. Overridable in the order config.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches typos at the till (10000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Largest accepted unit price, discount or tax, in cents.
///
/// With the quantity and cart-size limits this keeps every order total far
/// inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

/// Maximum length of a client-supplied idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 100;

/// Prefix of generated order codes (`TRX-20260131-142501-9F3A`).
pub const DEFAULT_ORDER_CODE_PREFIX: &str = "TRX";
