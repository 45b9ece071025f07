//! # tally-orders: Order Processing Core
//!
//! Turns till carts into committed orders without losing stock updates or
//! selling the same cart twice.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Order Flow                             │
//! │                                                                         │
//! │  till / sync upload                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   tally-orders (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   OrderService ── create / cancel / get / list / bulk_sync     │   │
//! │  │       │                                                         │   │
//! │  │       ├── IdempotencyGuard   replay of known submissions        │   │
//! │  │       ├── OrderBuilder       per-line lock, check, snapshot     │   │
//! │  │       └── ProductLedger      stock change + movement, adjust    │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tally-db (SQLite stores)          tally-core (rules, totals)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - Sale transaction coordinator
//! - [`bulk`] - Offline queue upload
//! - [`builder`] - Order assembly inside a unit of work
//! - [`idempotency`] - Duplicate submission handling
//! - [`ledger`] - Stock mutations and adjustments
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Error taxonomy and codes
//! - [`response`] - Caller-facing response types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_orders::{OrderConfig, OrderService};
//!
//! let service = OrderService::open(OrderConfig::load(None)?).await?;
//! let outcome = service.create(&request, Some(cashier_id)).await?;
//! for warning in &outcome.warnings {
//!     println!("{}", warning.message);
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod builder;
pub mod bulk;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod ledger;
pub mod response;
pub mod service;

mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use builder::{BuiltOrder, OrderBuilder};
pub use bulk::BulkSyncResponse;
pub use config::{DatabaseSettings, OrderConfig, OrderSettings, RetrySettings, StockSettings};
pub use error::{ErrorCode, OrderError, OrderResult};
pub use idempotency::IdempotencyGuard;
pub use ledger::{ProductLedger, StockAdjustment};
pub use response::{CreateOrderOutcome, OrderPage, OrderResponse};
pub use service::OrderService;
