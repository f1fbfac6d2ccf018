//! Unified error types for odstab.
//!
//! Parsing problems that only affect part of a document (a bad repeat count,
//! an unresolvable formula) are not errors at this level: they are reported
//! through [`crate::common::Diagnostics`] and the parse carries on. The types
//! here cover what the caller has to handle.
use thiserror::Error;

/// Main error type for odstab operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Corrupted or malformed document
    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    /// Package part not found
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// XML parsing error
    #[error("XML error: {0}")]
    XmlError(String),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// Feature store rejected an operation
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Formula could not be resolved
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Failures reported by a [`crate::store::FeatureStore`].
///
/// These never affect parser state; they surface to whoever called the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row carries the given identifier
    #[error("row {0} not found")]
    RowNotFound(u64),

    /// Column index past the schema
    #[error("column index {index} out of range ({count} columns)")]
    ColumnOutOfRange { index: usize, count: usize },

    /// More values than columns
    #[error("row has {got} values but the table has {expected} columns")]
    ArityMismatch { expected: usize, got: usize },

    /// Existing values cannot be represented in the requested type
    #[error("column {index} cannot be converted to {target}")]
    Conversion { index: usize, target: String },

    /// Write attempted on a read-only table
    #[error("table is read-only")]
    ReadOnly,
}

/// Failures while resolving a single formula cell.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    /// The evaluation chain came back to a cell it is still evaluating
    #[error("circular dependency through cell {0}")]
    Circular(String),

    /// Reference outside the sheet's rows or columns
    #[error("reference {0} is out of range")]
    OutOfRange(String),

    /// The evaluator produced something other than a constant
    #[error("formula did not reduce to a constant: {0}")]
    NonConstant(String),

    /// Expression nesting or the chain of referenced formulas is too deep
    #[error("formula nested deeper than {0} levels")]
    TooDeep(usize),

    /// The expression could not be parsed or evaluated
    #[error("{0}")]
    Evaluation(String),

    /// Writing the result back failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for odstab operations.
pub type Result<T> = std::result::Result<T, Error>;
