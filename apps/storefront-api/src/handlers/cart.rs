//! Cart API Handlers
//!
//! Mutations always answer `303 See Other` to `/carts`; failures travel as
//! error flashes. `GET /carts` returns the view model with the flashes that
//! were pending, consuming them.

use std::collections::HashMap;

use axum::extract::State;
use axum::response::Redirect;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use storefront_core::{Cart, CoreError, Product, ValidationError, Weight};

use crate::error::{ApiError, ServiceResult};
use crate::handlers::CurrentUser;
use crate::sessions::{Flash, SessionStore};
use crate::AppState;

pub const CART_PATH: &str = "/carts";

// =============================================================================
// View Model
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub qty: i64,
    pub stock: i64,
    pub unit_price: String,
    pub discount_per_unit: String,
    pub final_unit_price: String,
    pub subtotal: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart_id: String,
    pub items: Vec<CartLineView>,
    pub total_items: i64,
    pub total_weight: Weight,
    pub tax_percent: String,
    pub base_total: String,
    pub tax_amount: String,
    pub grand_total: String,
    pub grand_total_cents: i64,
    pub flashes: Vec<Flash>,
}

impl CartView {
    pub fn new(cart: &Cart, products: &HashMap<String, Product>, flashes: Vec<Flash>) -> Self {
        let items = cart
            .items
            .iter()
            .map(|item| {
                let product = products.get(&item.product_id);
                CartLineView {
                    product_id: item.product_id.clone(),
                    name: product.map(|p| p.name.clone()).unwrap_or_default(),
                    sku: product.map(|p| p.sku.clone()).unwrap_or_default(),
                    qty: item.qty,
                    stock: product.map(|p| p.stock).unwrap_or_default(),
                    unit_price: item.unit_price.to_string(),
                    discount_per_unit: item.discount_per_unit.to_string(),
                    final_unit_price: item.final_unit_price.to_string(),
                    subtotal: item.subtotal.to_string(),
                }
            })
            .collect();

        CartView {
            cart_id: cart.id.clone(),
            items,
            total_items: cart.total_items,
            total_weight: cart.total_weight,
            tax_percent: cart.tax_percent.to_string(),
            base_total: cart.base_total.to_string(),
            tax_amount: cart.tax_amount.to_string(),
            grand_total: cart.grand_total.to_string(),
            grand_total_cents: cart.grand_total.cents(),
            flashes,
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CartForm {
    #[serde(default)]
    pub product_id: String,
    pub qty: Option<String>,
}

impl CartForm {
    fn product_id(&self) -> ServiceResult<&str> {
        let id = self.product_id.trim();
        if id.is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "product_id".to_string(),
            })
            .into());
        }
        Ok(id)
    }

    /// Quantity as a whole number; `default` applies when the field is absent.
    fn qty(&self, default: Option<i64>) -> ServiceResult<i64> {
        let raw = self.qty.as_deref().map(str::trim).filter(|q| !q.is_empty());
        match (raw, default) {
            (Some(raw), _) => raw.parse::<i64>().map_err(|_| {
                CoreError::from(ValidationError::InvalidFormat {
                    field: "qty".to_string(),
                    reason: format!("'{raw}' is not a whole number"),
                })
                .into()
            }),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(CoreError::from(ValidationError::Required {
                field: "qty".to_string(),
            })
            .into()),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /carts
pub async fn show(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<CartView>, ApiError> {
    let details = state.carts.get_user_cart(&user.id).await?;
    state.sessions.bind_cart(&user.id, &details.cart.id);

    let flashes = state.sessions.take_flashes(&user.id);
    Ok(Json(CartView::new(&details.cart, &details.products, flashes)))
}

/// POST /carts/add
pub async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CartForm>,
) -> Redirect {
    let result = async {
        let product_id = form.product_id()?;
        let qty = form.qty(Some(1))?;
        state.carts.add_item(&user.id, product_id, qty).await
    }
    .await;

    redirect_with_flash(&state.sessions, &user, result.map(|_| ()), "Product added to cart")
}

/// POST /carts/update
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CartForm>,
) -> Redirect {
    let result = async {
        let product_id = form.product_id()?;
        let qty = form.qty(None)?;
        state.carts.update_qty(&user.id, product_id, qty).await
    }
    .await;

    redirect_with_flash(&state.sessions, &user, result.map(|_| ()), "Cart updated")
}

/// POST /carts/delete
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CartForm>,
) -> Redirect {
    let result = async {
        let product_id = form.product_id()?;
        state.carts.remove_item(&user.id, product_id).await
    }
    .await;

    redirect_with_flash(&state.sessions, &user, result.map(|_| ()), "Product removed from cart")
}

fn redirect_with_flash(
    sessions: &SessionStore,
    user: &CurrentUser,
    result: ServiceResult<()>,
    success: &str,
) -> Redirect {
    match result {
        Ok(()) => sessions.push_flash(&user.id, Flash::success(success)),
        Err(err) => {
            let api = ApiError::from(err);
            tracing::debug!(user_id = %user.id, code = ?api.code, "Cart update rejected");
            sessions.push_flash(&user.id, Flash::error(api.message));
        }
    }
    Redirect::to(CART_PATH)
}

// =============================================================================
// Unit Tests
// =============================================================================
