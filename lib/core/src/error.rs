//! Error handling foundation for nodeflow.
//!
//! Only the `Result` alias lives here. Each crate owns its domain error enums
//! and converts lower-level failures into them; public fallible operations
//! return `Result<T, DomainError>`, which carries the error in a rootcause
//! `Report`.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
