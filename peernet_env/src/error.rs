//! Error types for the peernet transport abstraction.

use thiserror::Error;

/// Errors that can occur while creating links between actors.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The OS refused to create a socket pair
    #[error("Failed to create socket pair: {0}")]
    SocketPair(#[from] std::io::Error),

    /// The transport is not available on this platform
    #[error("Transport not supported on this platform: {0}")]
    Unsupported(String),
}

impl LinkError {
    /// Creates an unsupported-transport error.
    pub fn unsupported(transport: impl std::fmt::Display) -> Self {
        Self::Unsupported(transport.to_string())
    }
}
