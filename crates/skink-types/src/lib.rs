//! Skink Type Model
//!
//! Algebraic type representation for the Skink analyzer.
//!
//! This crate provides:
//! - [`Atomic`] parts: named scalars/specials, class names, generic
//!   containers, literal-keyed shapes
//! - [`Union`]: a canonical set of parts ("one of these")
//! - [`combine`]: the order-independent union merge rules
//! - [`parse`]: annotation type string parsing
//!
//! # Usage
//!
//! ```
//! use skink_types::parse;
//!
//! let ty = parse("array<int, string>|null").unwrap();
//! assert!(ty.is_nullable());
//! assert_eq!(ty.to_string(), "array<int, string>|null");
//!
//! let narrowed = ty.without("null").unwrap();
//! assert_eq!(narrowed.to_string(), "array<int, string>");
//! ```

pub mod atomic;
pub mod combine;
pub mod error;
pub mod parse;
pub mod union;

// Re-export main types
pub use atomic::Atomic;
pub use combine::{combine, combine_opt};
pub use error::TypeParseError;
pub use parse::parse;
pub use union::Union;
