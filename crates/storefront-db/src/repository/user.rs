//! # User Repository
//!
//! Users and their shipping addresses. Account management lives elsewhere;
//! checkout only reads these rows.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use storefront_core::{Address, User};

const ADDRESS_COLUMNS: &str = "id, user_id, name, address1, address2, location_id, \
     location_name, post_code, phone, email, is_primary, created_at";

#[derive(Debug)]
pub struct UserRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> UserRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        UserRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, first_name, last_name, email, phone, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(user)
    }

    pub async fn insert(&mut self, user: &User) -> DbResult<()> {
        debug!(user_id = %user.id, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email, phone, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets an address by ID regardless of owner; callers check `user_id`.
    pub async fn get_address(&mut self, id: &str) -> DbResult<Option<Address>> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {} FROM addresses WHERE id = ?1",
            ADDRESS_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(address)
    }

    /// Lists a user's addresses, primary first.
    pub async fn list_addresses(&mut self, user_id: &str) -> DbResult<Vec<Address>> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            "SELECT {} FROM addresses WHERE user_id = ?1 ORDER BY is_primary DESC, created_at",
            ADDRESS_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(addresses)
    }

    pub async fn insert_address(&mut self, address: &Address) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO addresses (
                id, user_id, name, address1, address2, location_id,
                location_name, post_code, phone, email, is_primary, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(&address.name)
        .bind(&address.address1)
        .bind(&address.address2)
        .bind(&address.location_id)
        .bind(&address.location_name)
        .bind(&address.post_code)
        .bind(&address.phone)
        .bind(&address.email)
        .bind(address.is_primary)
        .bind(address.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }
}
