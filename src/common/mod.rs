//! Common types, traits, and utilities shared across the crate.
//!
//! This module provides the unified error type, the diagnostic channel used
//! by every parse stage, and XML text helpers.

// Submodule declarations
pub mod diagnostics;
pub mod error;
pub mod xml;

// Re-exports for convenience
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, FormulaError, Result, StoreError};
