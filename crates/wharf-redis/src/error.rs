//! Error types for the Redis plugin

use thiserror::Error;

/// Errors that can occur in the Redis plugin
#[derive(Error, Debug)]
pub enum RedisPluginError {
    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Connection failed: {0}")]
    Connect(#[from] redis::RedisError),

    #[error("Redis connection not initialized")]
    NotConnected,
}
