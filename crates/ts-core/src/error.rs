//! Framework base error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant via `#[from]`.

use thiserror::Error;

/// The error type for `ts-core` primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("priority counter overflow at {value}")]
    CounterOverflow { value: i32 },

    #[error("priority counter underflow at {value}")]
    CounterUnderflow { value: i32 },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `ts-core`.
pub type CoreResult<T> = Result<T, CoreError>;
