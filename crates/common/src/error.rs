use thiserror::Error;

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Mail delivery error: {0}")]
    Mail(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scheduling error: {0}")]
    Schedule(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
