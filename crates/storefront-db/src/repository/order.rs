//! # Order Repository
//!
//! Orders, their item and customer snapshots.
//!
//! Order rows are written once by checkout; afterwards only the status pair
//! (`status`, `payment_status`) changes, and only under [`OrderRepository::lock_by_code`].

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{Order, OrderCustomer, OrderDraft, OrderItem, OrderStatus, PaymentStatus};

const ORDER_COLUMNS: &str = "id, user_id, order_code, base_total, tax_percent, tax_amount, \
     discount_amount, shipping_cost, grand_total, shipping_service_code, \
     shipping_service_name, address_id, shipping_address, payment_status, status, \
     order_date, created_at, updated_at";

#[derive(Debug)]
pub struct OrderRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> OrderRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        OrderRepository { conn }
    }

    /// Inserts the order header, its items and the customer snapshot.
    ///
    /// The header goes first so an order-code collision fails before any
    /// child row is written.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation { field: "orders.order_code", .. })` -
    ///   code collision; the caller regenerates the code and retries
    pub async fn insert(&mut self, draft: &OrderDraft) -> DbResult<()> {
        let order = &draft.order;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, order_code, base_total, tax_percent, tax_amount,
                discount_amount, shipping_cost, grand_total,
                shipping_service_code, shipping_service_name, address_id,
                shipping_address, payment_status, status,
                order_date, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17, ?18
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.order_code)
        .bind(order.base_total)
        .bind(order.tax_percent)
        .bind(order.tax_amount)
        .bind(order.discount_amount)
        .bind(order.shipping_cost)
        .bind(order.grand_total)
        .bind(&order.shipping_service_code)
        .bind(&order.shipping_service_name)
        .bind(&order.address_id)
        .bind(&order.shipping_address)
        .bind(order.payment_status)
        .bind(order.status)
        .bind(order.order_date)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.conn)
        .await?;

        for item in &draft.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name, sku, qty,
                    price, base_total, discount_amount, tax_percent,
                    tax_amount, subtotal, grand_total, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            )
            .bind(&item.id)
            .bind(&order.id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(&item.sku)
            .bind(item.qty)
            .bind(item.price)
            .bind(item.base_total)
            .bind(item.discount_amount)
            .bind(item.tax_percent)
            .bind(item.tax_amount)
            .bind(item.subtotal)
            .bind(item.grand_total)
            .bind(item.created_at)
            .execute(&mut *self.conn)
            .await?;
        }

        let customer = &draft.customer;
        sqlx::query(
            r#"
            INSERT INTO order_customers (
                id, order_id, first_name, last_name, email, phone,
                address1, address2, location_id, location_name, post_code
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&customer.id)
        .bind(&order.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address1)
        .bind(&customer.address2)
        .bind(&customer.location_id)
        .bind(&customer.location_name)
        .bind(&customer.post_code)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            order_code = %order.order_code,
            items = draft.items.len(),
            "Order inserted"
        );
        Ok(())
    }

    /// Locks and loads an order by its code.
    pub async fn lock_by_code(&mut self, order_code: &str) -> DbResult<Option<Order>> {
        let locked = sqlx::query("UPDATE orders SET id = id WHERE order_code = ?1")
            .bind(order_code)
            .execute(&mut *self.conn)
            .await?;

        if locked.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_code(order_code).await
    }

    /// Loads an order by its code without locking it.
    pub async fn find_by_code(&mut self, order_code: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE order_code = ?1",
            ORDER_COLUMNS
        ))
        .bind(order_code)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(order)
    }

    pub async fn items(&mut self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, product_name, sku, qty, price,
                   base_total, discount_amount, tax_percent, tax_amount,
                   subtotal, grand_total, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(items)
    }

    pub async fn customer(&mut self, order_id: &str) -> DbResult<Option<OrderCustomer>> {
        let customer = sqlx::query_as::<_, OrderCustomer>(
            r#"
            SELECT id, order_id, first_name, last_name, email, phone,
                   address1, address2, location_id, location_name, post_code
            FROM order_customers
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(customer)
    }

    /// Writes the order's status pair.
    pub async fn update_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
        payment_status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?2, payment_status = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(order_id)
        .bind(status)
        .bind(payment_status)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }
}
