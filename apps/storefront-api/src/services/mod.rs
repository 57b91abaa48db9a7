//! Business services. Each owns a [`storefront_db::Database`] handle and runs
//! every operation inside one unit of work.

pub mod cart;
pub mod checkout;
pub mod reconciler;

pub use cart::{CartDetails, CartService};
pub use checkout::{CheckoutOutcome, CheckoutRequest, CheckoutService, CheckoutSummary, OrderSummary};
pub use reconciler::{ReconcileOutcome, Reconciler};
