//! # Payment Repository
//!
//! Exactly one payment row per order (`UNIQUE (order_id)`). Writes happen
//! under the owning order's lock.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{Payment, PaymentStatus};

#[derive(Debug)]
pub struct PaymentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PaymentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PaymentRepository { conn }
    }

    pub async fn insert(&mut self, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, number, amount, method, status, token, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(&payment.number)
        .bind(payment.amount)
        .bind(&payment.method)
        .bind(payment.status)
        .bind(&payment.token)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(number = %payment.number, amount = %payment.amount, "Payment inserted");
        Ok(())
    }

    pub async fn find_by_order(&mut self, order_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, number, amount, method, status, token, created_at, updated_at
            FROM payments
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(payment)
    }

    /// Stores the gateway token returned for the payment.
    pub async fn set_token(
        &mut self,
        payment_id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE payments SET token = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(payment_id)
            .bind(token)
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", payment_id));
        }

        Ok(())
    }

    pub async fn update_status(
        &mut self,
        payment_id: &str,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE payments SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(payment_id)
            .bind(status)
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", payment_id));
        }

        Ok(())
    }
}
