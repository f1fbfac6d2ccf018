//! Finished sheets and the dataset returned by a parse.

use crate::common::Diagnostics;
use crate::store::{ColumnDef, FeatureStore, FieldValue, MemoryTable, Record, RowId};

/// One named table rebuilt from a spreadsheet sheet.
#[derive(Debug, Clone)]
pub struct Sheet<S = MemoryTable> {
    name: String,
    has_header: bool,
    store: S,
}

impl<S: FeatureStore> Sheet<S> {
    pub fn new(name: impl Into<String>, has_header: bool, store: S) -> Self {
        Self {
            name: name.into(),
            has_header,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the first spreadsheet row was consumed as column names.
    pub fn has_header(&self) -> bool {
        self.has_header
    }

    pub fn columns(&self) -> &[ColumnDef] {
        self.store.columns()
    }

    pub fn column_count(&self) -> usize {
        self.store.column_count()
    }

    pub fn row_count(&self) -> usize {
        self.store.row_count()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Record> + '_ {
        self.store.iter_rows()
    }

    /// Value at a row ordinal and column index.
    pub fn value(&self, ordinal: usize, column: usize) -> Option<&FieldValue> {
        self.store.row(ordinal).map(|r| r.get(column))
    }

    /// Index of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name == name)
    }

    /// Number of spreadsheet rows above the first record (1 with a header).
    pub fn header_offset(&self) -> usize {
        usize::from(self.has_header)
    }

    /// 1-based spreadsheet row number of a stored record.
    ///
    /// ```
    /// use odstab::ods::Sheet;
    /// use odstab::store::MemoryTable;
    ///
    /// let sheet = Sheet::new("Data", true, MemoryTable::new());
    /// assert_eq!(sheet.external_row_id(0), 2);
    /// assert_eq!(sheet.store_row_id(2), Some(0));
    /// assert_eq!(sheet.store_row_id(1), None);
    /// ```
    pub fn external_row_id(&self, id: RowId) -> u64 {
        id + 1 + self.header_offset() as u64
    }

    /// Inverse of [`Self::external_row_id`]; `None` for the header or row 0.
    pub fn store_row_id(&self, external: u64) -> Option<RowId> {
        external.checked_sub(1 + self.header_offset() as u64)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

/// Sheets produced by one parse, in document order, with everything that
/// was reported along the way.
#[derive(Debug, Clone)]
pub struct Dataset<S = MemoryTable> {
    pub sheets: Vec<Sheet<S>>,
    pub diagnostics: Diagnostics,
}

impl<S: FeatureStore> Dataset<S> {
    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet<S>> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet<S>> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
