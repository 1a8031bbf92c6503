//! Error types for the directory flow
//!
//! Only caller-facing failures live here. Lookup failures are recovered
//! inside the flow and never reach this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("directory flow has been destroyed")]
    Destroyed,
}

impl FlowError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

/// Result type for directory flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
