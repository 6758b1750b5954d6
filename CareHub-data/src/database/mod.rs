use thiserror::Error;

// Database modules
pub mod connection;
pub mod migrations;

// Re-export database connection functions
pub use connection::*;

/// Database error enum
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Required environment variable missing or empty
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Configuration value present but unusable
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Connection error
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    /// Migration error
    #[error("Database migration error: {0}")]
    MigrationError(String),

    /// Query error
    #[error("Database query error: {0}")]
    QueryError(#[from] sqlx::Error),

    /// Database pool already initialized
    #[error("Database pool is already initialized")]
    PoolAlreadyInitialized,

    /// Database pool not initialized
    #[error("Database pool is not initialized")]
    PoolNotInitialized,
}
