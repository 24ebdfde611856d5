//! Error types for context providers and consumers.
//!
//! None of these are fatal to a broadcast in progress. Operations that can
//! fail return a `Result`, and the non-fatal wrappers log the error with
//! `tracing` and degrade to a no-op.

use thiserror::Error;

/// Errors raised by the context machinery.
#[derive(Debug, Error)]
pub enum ContextError {
    /// `subscribe` was handed no callable listener.
    #[error("expected a listener callback, got nothing")]
    InvalidListener,

    /// A consumer was rendered with an empty list of render functions.
    #[error("consumer needs a render function as its only child")]
    MissingRenderFunction,

    /// A configuration document could not be parsed.
    #[error("invalid context configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ContextError>;
