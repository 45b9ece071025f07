//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  &self methods             → run on the pool, one statement each       │
//! │    db.orders().find_by_code("TRX-...")                                 │
//! │                                                                         │
//! │  associated fns (conn)     → run on a unit-of-work connection          │
//! │    ProductRepository::get_for_update(&mut tx, id)                      │
//! │    OrderRepository::insert(&mut tx, &order, &items)                    │
//! │    MovementRepository::insert(&mut tx, &movement)                      │
//! │                                                                         │
//! │  Anything that changes stock uses the second kind, so the change and   │
//! │  its movement commit or roll back together.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product Store
//! - [`OrderRepository`](order::OrderRepository) - Transaction Store
//! - [`MovementRepository`](movement::MovementRepository) - Inventory audit trail

pub mod movement;
pub mod order;
pub mod product;
