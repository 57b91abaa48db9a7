//! # Repository Module
//!
//! Transaction-scoped repositories for the storefront tables.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service (storefront-api)                                               │
//! │       │                                                                 │
//! │       │  uow.products().decrement_stock(id, qty)                        │
//! │       ▼                                                                 │
//! │  ProductRepository<'c>  ── borrows &mut SqliteConnection of the tx      │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! │                                                                         │
//! │  A repository cannot outlive its UnitOfWork, so no statement can        │
//! │  escape the transaction it was meant for.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`] - Users and addresses (read-mostly)
//! - [`ProductRepository`] - Catalog reads, row locks, stock movement
//! - [`CartRepository`] - Per-user cart and lines
//! - [`OrderRepository`] - Order header, item and customer snapshots
//! - [`PaymentRepository`] - The payment row of each order

pub mod cart;
pub mod order;
pub mod payment;
pub mod product;
pub mod user;

pub use cart::CartRepository;
pub use order::OrderRepository;
pub use payment::PaymentRepository;
pub use product::ProductRepository;
pub use user::UserRepository;
