//! # storefront-gateway: Hosted Payment Gateway Integration
//!
//! Everything that speaks the gateway's protocol lives here; the services
//! only see [`PaymentGateway`], [`SnapRequest`] and [`Notification`].
//!
//! ## Flow
//! ```text
//! ┌──────────────┐  SnapRequest   ┌──────────────────┐
//! │   checkout   │ ─────────────► │  Snap (hosted)   │ ── token, redirect_url
//! └──────────────┘                └──────────────────┘
//!                                          │ customer pays
//!                                          ▼
//! ┌──────────────┐  Notification  ┌──────────────────┐
//! │  reconciler  │ ◄───────────── │  gateway server  │
//! │              │ ─────────────► │  status API      │ ── TransactionCheck
//! └──────────────┘ check_transaction
//! ```
//!
//! ## Modules
//! - [`client`]: trait seam and reqwest implementation
//! - [`snap`]: request builder with rounding adjustment
//! - [`notification`]: callback decoding and SHA-512 signature
//! - [`error`]: error categories and retryability

pub mod client;
pub mod error;
pub mod notification;
pub mod snap;

pub use client::{Environment, MidtransClient, MidtransConfig, PaymentGateway, TransactionCheck};
pub use error::{GatewayError, GatewayResult};
pub use notification::Notification;
pub use snap::{SnapRequest, SnapResponse};
