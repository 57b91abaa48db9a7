//! # storefront-db
//!
//! Persistence for the storefront: catalog, users and addresses, carts,
//! orders and their payment records.
//!
//! ```text
//!   CartService / CheckoutService / Reconciler
//!                      │
//!                      ▼
//!   Database ──begin()──► UnitOfWork ──► carts() orders() payments()
//!   (SqlitePool)              │          products() users()
//!                             ▼
//!                    commit / rollback on drop
//! ```
//!
//! Everything a request changes goes through one [`UnitOfWork`], so a failed
//! checkout or notification leaves no partial writes behind.
//!
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("storefront.db")).await?;
//! let mut uow = db.begin().await?;
//! if uow.products().lock(&product_id).await? {
//!     uow.products().decrement_stock(&product_id, qty).await?;
//! }
//! uow.commit().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

pub use repository::{
    CartRepository, OrderRepository, PaymentRepository, ProductRepository, UserRepository,
};
