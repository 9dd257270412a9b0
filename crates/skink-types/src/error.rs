//! Type string parse errors

use thiserror::Error;

/// Error produced when an annotation type string cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("empty type string")]
    EmptyInput,

    #[error("unexpected character `{found}` at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("expected `{expected}` at offset {offset}")]
    Expected { expected: char, offset: usize },

    #[error("unexpected end of type string")]
    UnexpectedEnd,

    #[error("trailing characters after type at offset {offset}")]
    TrailingInput { offset: usize },
}
