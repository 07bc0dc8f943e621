//! Framework error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant through `#[from]`.

use thiserror::Error;

/// The base error type shared by every `ms-*` crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad parameters detected at setup time.  Never recoverable mid-run.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `ms-core`.
pub type CoreResult<T> = Result<T, CoreError>;
