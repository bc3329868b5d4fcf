//! Error types for the Tessera resource core

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Release error: {0}")]
    Release(String),

    #[error("Pick error: {0}")]
    Pick(String),

    #[error("Frame hand-off closed")]
    HandoffClosed,
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;
