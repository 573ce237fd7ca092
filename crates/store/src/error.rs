use thiserror::Error;

use domain::ProductId;

/// Errors that can occur when interacting with the reservation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stock mutation would violate the zero-floor invariant or touch a
    /// missing product. Under ordered row locks this indicates a caller
    /// bug, not a race.
    #[error("Stock conflict for product {product_id}")]
    StockConflict { product_id: ProductId },

    /// Stored data could not be interpreted.
    #[error("Invalid stored data: {0}")]
    Invalid(String),

    /// The store is temporarily unavailable (used by failure injection in
    /// the in-memory implementation).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for reservation store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
