//! Storage failures as seen by the checkout services.
//!
//! SQLite reports constraint failures as plain text
//! (`UNIQUE constraint failed: orders.order_code`). They are parsed here so
//! callers can branch on the constraint instead of on strings:
//!
//! ```text
//! sqlx::Error ──► DbError ──► ServiceError::kind() ──► HTTP status
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} {id} does not exist")]
    NotFound { entity: String, id: String },

    /// `field` is `table.column` exactly as SQLite names it. The order-code
    /// retry in checkout keys on `orders.order_code`.
    #[error("{field} must be unique (value '{value}' is taken)")]
    UniqueViolation { field: String, value: String },

    #[error("referenced row is missing: {message}")]
    ForeignKeyViolation { message: String },

    /// Raised by the `CHECK (stock >= 0)` and `CHECK (qty > 0)` guards.
    #[error("{0}")]
    CheckViolation(String),

    #[error("cannot reach database: {0}")]
    ConnectionFailed(String),

    #[error("schema migration error: {0}")]
    MigrationFailed(String),

    #[error("statement error: {0}")]
    QueryFailed(String),

    #[error("transaction error: {0}")]
    TransactionFailed(String),

    #[error("timed out waiting for a database connection")]
    PoolExhausted,

    #[error("database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a unique index on `column` (`table.column`) rejected the write.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        match self {
            Self::UniqueViolation { field, .. } => field == column,
            _ => false,
        }
    }

    /// Sorts a SQLite error message into a constraint variant.
    fn from_sqlite_message(msg: &str) -> Self {
        const UNIQUE: &str = "UNIQUE constraint failed: ";

        if let Some(columns) = msg.strip_prefix(UNIQUE) {
            // composite indexes list every column; the first one identifies it
            let field = columns.split(", ").next().unwrap_or(columns);
            return Self::duplicate(field, "?");
        }
        if msg.contains("FOREIGN KEY constraint failed") {
            return Self::ForeignKeyViolation {
                message: msg.to_owned(),
            };
        }
        if msg.starts_with("CHECK constraint failed") {
            return Self::CheckViolation(msg.to_owned());
        }
        Self::QueryFailed(msg.to_owned())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("Row", "?"),
            sqlx::Error::Database(db_err) => Self::from_sqlite_message(db_err.message()),
            sqlx::Error::PoolTimedOut => Self::PoolExhausted,
            sqlx::Error::PoolClosed => Self::ConnectionFailed("pool has been closed".to_owned()),
            sqlx::Error::Io(io) => Self::ConnectionFailed(io.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
