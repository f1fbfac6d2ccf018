use super::{ColumnDef, ColumnType, FeatureStore, FieldValue, Record, RowId};
use crate::common::StoreError;

/// In-memory [`FeatureStore`].
///
/// Records live in a `Vec` in append order. Identifiers only grow, so
/// lookups by id are a binary search even after deletions.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    columns: Vec<ColumnDef>,
    rows: Vec<Record>,
    next_id: RowId,
    read_only: bool,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every later mutation with [`StoreError::ReadOnly`].
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn position(&self, id: RowId) -> Option<usize> {
        self.rows.binary_search_by_key(&id, |r| r.id).ok()
    }

    fn fit_arity(&self, mut values: Vec<FieldValue>) -> Result<Vec<FieldValue>, StoreError> {
        if values.len() > self.columns.len() {
            return Err(StoreError::ArityMismatch {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        values.resize(self.columns.len(), FieldValue::Null);
        Ok(values)
    }
}

impl FeatureStore for MemoryTable {
    fn create_column(&mut self, column: ColumnDef) -> Result<usize, StoreError> {
        self.check_writable()?;
        self.columns.push(column);
        for row in &mut self.rows {
            row.values.push(FieldValue::Null);
        }
        Ok(self.columns.len() - 1)
    }

    fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    fn alter_column_type(&mut self, index: usize, column_type: ColumnType) -> Result<(), StoreError> {
        self.check_writable()?;
        let count = self.columns.len();
        if index >= count {
            return Err(StoreError::ColumnOutOfRange { index, count });
        }

        // Convert into a scratch column first so a failure leaves the table as it was.
        let mut converted = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let value = row.values[index]
                .convert(column_type)
                .ok_or_else(|| StoreError::Conversion {
                    index,
                    target: column_type.to_string(),
                })?;
            converted.push(value);
        }
        for (row, value) in self.rows.iter_mut().zip(converted) {
            row.values[index] = value;
        }
        self.columns[index].column_type = column_type;
        Ok(())
    }

    fn append_row(&mut self, values: Vec<FieldValue>) -> Result<RowId, StoreError> {
        self.check_writable()?;
        let values = self.fit_arity(values)?;
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push(Record { id, values });
        Ok(id)
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, ordinal: usize) -> Option<&Record> {
        self.rows.get(ordinal)
    }

    fn row_by_id(&self, id: RowId) -> Option<&Record> {
        self.position(id).map(|pos| &self.rows[pos])
    }

    fn replace_row(&mut self, id: RowId, values: Vec<FieldValue>) -> Result<(), StoreError> {
        self.check_writable()?;
        let pos = self.position(id).ok_or(StoreError::RowNotFound(id))?;
        let values = self.fit_arity(values)?;
        self.rows[pos].values = values;
        Ok(())
    }

    fn delete_row(&mut self, id: RowId) -> Result<(), StoreError> {
        self.check_writable()?;
        let pos = self.position(id).ok_or(StoreError::RowNotFound(id))?;
        self.rows.remove(pos);
        Ok(())
    }

    fn iter_rows(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        Box::new(self.rows.iter())
    }
}
