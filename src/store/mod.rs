//! Tabular feature store contract.
//!
//! The parser never owns rows directly: every sheet writes its columns and
//! records through a [`FeatureStore`]. [`MemoryTable`] is the in-memory
//! implementation used by default.

mod memory;
pub mod value;

pub use memory::MemoryTable;
pub use value::{ColumnDef, ColumnType, FieldSubType, FieldType, FieldValue};

use crate::common::StoreError;

/// Store-assigned row identifier (0-based, increasing in append order).
pub type RowId = u64;

/// One committed row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RowId,
    pub values: Vec<FieldValue>,
}

impl Record {
    /// Value of column `index`, `Null` when the row is shorter.
    pub fn get(&self, index: usize) -> &FieldValue {
        const NULL: &FieldValue = &FieldValue::Null;
        self.values.get(index).unwrap_or(NULL)
    }
}

/// A mutable table of typed records.
///
/// Rows are kept in append order; `row(ordinal)` addresses that order while
/// `row_by_id` addresses the identifier returned by `append_row`.
pub trait FeatureStore {
    /// Add a column at the end of the schema, returning its index.
    ///
    /// Existing rows read `Null` for the new column.
    fn create_column(&mut self, column: ColumnDef) -> Result<usize, StoreError>;

    fn columns(&self) -> &[ColumnDef];

    fn column_count(&self) -> usize {
        self.columns().len()
    }

    /// Change a column's declared type, converting stored values.
    ///
    /// Fails with [`StoreError::Conversion`] when a stored value cannot be
    /// represented in the new type; the column is left unchanged then.
    fn alter_column_type(&mut self, index: usize, column_type: ColumnType) -> Result<(), StoreError>;

    /// Append a record. Short rows are padded with `Null`.
    fn append_row(&mut self, values: Vec<FieldValue>) -> Result<RowId, StoreError>;

    fn row_count(&self) -> usize;

    /// Row at `ordinal` in append order.
    fn row(&self, ordinal: usize) -> Option<&Record>;

    fn row_by_id(&self, id: RowId) -> Option<&Record>;

    /// Overwrite all values of an existing record.
    fn replace_row(&mut self, id: RowId, values: Vec<FieldValue>) -> Result<(), StoreError>;

    fn delete_row(&mut self, id: RowId) -> Result<(), StoreError>;

    fn iter_rows(&self) -> Box<dyn Iterator<Item = &Record> + '_>;
}
