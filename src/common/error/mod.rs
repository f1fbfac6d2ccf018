//! Unified error types for odstab.
//!
//! Fatal conditions are `Error`; store and formula failures have their own
//! enums so callers of those layers can match on them precisely.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, FormulaError, Result, StoreError};
