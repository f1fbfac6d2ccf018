//! Row buffering and sheet assembly.
//!
//! The parser hands every finished row to a [`SheetAssembler`], which decides
//! what the row becomes: the first-row snapshot, a header, a deferred empty
//! row or a committed record. Column types are widened as values arrive.

use super::expand::{LimitError, check_gap, check_growth};
use super::header::{detect_header, field_name, header_names};
use super::inference::{ValueKind, infer_type};
use super::options::{HeaderMode, OdsOptions};
use super::sheet::Sheet;
use crate::common::{Diagnostics, StoreError};
use crate::store::{ColumnDef, ColumnType, FeatureStore, FieldValue};
use tracing::debug;

/// Values and declared kinds of the row being read.
///
/// Blank cells are only counted until a non-empty cell follows them, so a
/// row's trailing blanks (typically a huge repeated filler cell) never
/// occupy memory. At most `max_columns` entries are stored.
#[derive(Debug, Clone)]
pub struct RowBuffer {
    values: Vec<String>,
    kinds: Vec<Option<ValueKind>>,
    pending_blank: u64,
    max_columns: usize,
    truncated: bool,
}

impl RowBuffer {
    pub fn new(max_columns: usize) -> Self {
        Self {
            values: Vec::new(),
            kinds: Vec::new(),
            pending_blank: 0,
            max_columns,
            truncated: false,
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.kinds.clear();
        self.pending_blank = 0;
        self.truncated = false;
    }

    /// Append `count` copies of a cell.
    pub fn push_cell(&mut self, value: String, kind: Option<ValueKind>, count: u64) {
        if value.is_empty() {
            self.push_blank(count);
            return;
        }

        let blanks = std::mem::take(&mut self.pending_blank);
        self.fill(String::new(), None, blanks);
        self.fill(value, kind, count);
    }

    /// Append `count` empty cells.
    pub fn push_blank(&mut self, count: u64) {
        self.pending_blank = self.pending_blank.saturating_add(count);
    }

    fn fill(&mut self, value: String, kind: Option<ValueKind>, count: u64) {
        let room = self.max_columns.saturating_sub(self.values.len());
        let n = usize::try_from(count).unwrap_or(usize::MAX);
        if n > room {
            self.truncated = true;
        }
        for _ in 0..n.min(room) {
            self.values.push(value.clone());
            self.kinds.push(kind);
        }
    }

    /// Stored cells; trailing blanks are never included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no cell of the row holds a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn kinds(&self) -> &[Option<ValueKind>] {
        &self.kinds
    }

    /// Whether cells were dropped because of the column cap.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Builds one sheet's columns and records in a [`FeatureStore`].
#[derive(Debug)]
pub struct SheetAssembler<S> {
    name: String,
    autodetect: bool,
    header_mode: HeaderMode,
    split_hint: bool,
    store: S,
    /// Spreadsheet rows seen so far, repeats included
    lines: u64,
    first_row: Option<RowBuffer>,
    has_header: bool,
    pending_empty: u64,
    /// Columns created from an empty value; their type is set by the first value.
    undetermined: Vec<bool>,
    truncation_reported: bool,
}

impl<S: FeatureStore> SheetAssembler<S> {
    pub fn new(name: impl Into<String>, options: &OdsOptions, split_hint: bool, store: S) -> Self {
        Self {
            name: name.into(),
            autodetect: options.autodetect_types,
            header_mode: options.header_mode,
            split_hint,
            store,
            lines: 0,
            first_row: None,
            has_header: false,
            pending_empty: 0,
            undetermined: Vec::new(),
            truncation_reported: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Take a finished row repeated `repeat` times.
    pub fn end_row(
        &mut self,
        row: &RowBuffer,
        repeat: u64,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), LimitError> {
        if row.is_truncated() && !self.truncation_reported {
            self.truncation_reported = true;
            diagnostics.warn(
                Some(&self.name),
                format!(
                    "row {} has more than {} columns; extra cells are ignored",
                    self.lines + 1,
                    row.max_columns
                ),
            );
        }

        if row.is_empty() && self.lines >= 2 {
            self.pending_empty = self.pending_empty.saturating_add(repeat);
            self.lines = self.lines.saturating_add(repeat);
            return Ok(());
        }

        if repeat > 1 {
            let fields = self.store.column_count().max(row.len()) as u64;
            check_gap(fields, repeat)?;
        }
        for _ in 0..repeat {
            self.handle_line(row)?;
        }
        Ok(())
    }

    fn handle_line(&mut self, row: &RowBuffer) -> Result<(), LimitError> {
        self.lines += 1;
        if self.lines == 1 {
            self.first_row = Some(row.clone());
            return Ok(());
        }

        if let Some(first) = self.first_row.take() {
            self.start_columns(&first, row)?;
            if !self.has_header {
                // an empty first row waits like any other empty row
                if first.is_empty() {
                    self.pending_empty += 1;
                } else {
                    self.commit(first.values(), first.kinds())?;
                }
            }
        }
        if row.is_empty() {
            self.pending_empty += 1;
        } else {
            self.flush_empty_rows()?;
            self.commit(row.values(), row.kinds())?;
        }
        Ok(())
    }

    /// Classify the first row and create the initial columns.
    fn start_columns(&mut self, first: &RowBuffer, second: &RowBuffer) -> Result<(), LimitError> {
        self.has_header = detect_header(
            first.kinds(),
            second.kinds(),
            second.values(),
            self.header_mode,
            self.split_hint,
        );
        debug!(sheet = %self.name, header = self.has_header, "classified first row");

        let (names, seed) = if self.has_header {
            (header_names(first.values()), second)
        } else {
            ((1..=first.len()).map(field_name).collect(), first)
        };
        for (i, name) in names.into_iter().enumerate() {
            self.create_column(name, seed.values().get(i), seed.kinds().get(i).copied().flatten())?;
        }
        Ok(())
    }

    fn create_column(
        &mut self,
        name: String,
        seed: Option<&String>,
        kind: Option<ValueKind>,
    ) -> Result<(), LimitError> {
        let (column_type, undetermined) = match seed {
            Some(value) if !value.is_empty() => (infer_type(value, kind, self.autodetect), false),
            _ => (ColumnType::STRING, true),
        };
        self.store.create_column(ColumnDef::new(name, column_type))?;
        self.undetermined.push(undetermined);
        Ok(())
    }

    fn flush_empty_rows(&mut self) -> Result<(), LimitError> {
        if self.pending_empty == 0 {
            return Ok(());
        }
        check_gap(self.store.column_count() as u64, self.pending_empty)?;
        for _ in 0..self.pending_empty {
            self.store.append_row(Vec::new())?;
        }
        self.pending_empty = 0;
        Ok(())
    }

    /// Append one record, growing and widening columns as needed.
    fn commit(&mut self, values: &[String], kinds: &[Option<ValueKind>]) -> Result<(), LimitError> {
        let existing = self.store.column_count();
        if values.len() > existing {
            check_growth(
                (values.len() - existing) as u64,
                self.store.row_count() as u64,
            )?;
            for i in existing..values.len() {
                self.create_column(field_name(i + 1), None, None)?;
            }
        }

        let mut record = Vec::with_capacity(values.len());
        for (i, (value, kind)) in values.iter().zip(kinds).enumerate() {
            if value.is_empty() {
                record.push(FieldValue::Null);
                continue;
            }

            let observed = infer_type(value, *kind, self.autodetect);
            let current = self.store.columns()[i].column_type;
            let target = if self.undetermined[i] {
                self.undetermined[i] = false;
                observed
            } else {
                current.join(observed)
            };
            if target != current {
                self.retype(i, target)?;
            }

            let column_type = self.store.columns()[i].column_type;
            let field = match FieldValue::parse(value, column_type) {
                Some(field) => field,
                None => {
                    self.retype(i, ColumnType::STRING)?;
                    FieldValue::String(value.clone())
                },
            };
            record.push(field);
        }

        self.store.append_row(record)?;
        Ok(())
    }

    fn retype(&mut self, index: usize, target: ColumnType) -> Result<(), LimitError> {
        match self.store.alter_column_type(index, target) {
            Ok(()) => {},
            Err(StoreError::Conversion { .. }) if target != ColumnType::STRING => {
                debug!(sheet = %self.name, column = index, %target, "stored values do not convert, using String");
                self.store.alter_column_type(index, ColumnType::STRING)?;
            },
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Close the sheet. Returns `None` when nothing worth keeping was read.
    pub fn finish(mut self, diagnostics: &mut Diagnostics) -> Option<Sheet<S>> {
        match self.lines {
            0 => {
                debug!(sheet = %self.name, "dropping sheet without rows");
                return None;
            },
            1 => {
                let first = self.first_row.take()?;
                if first.is_empty() {
                    debug!(sheet = %self.name, "dropping sheet with a single empty row");
                    return None;
                }
                // One row cannot be told apart from a header: keep it as data.
                if let Err(e) = self.commit(first.values(), first.kinds()) {
                    diagnostics.error(Some(&self.name), e.to_string());
                }
            },
            _ => {
                if self.pending_empty > 0 {
                    debug!(sheet = %self.name, rows = self.pending_empty, "dropping trailing empty rows");
                }
            },
        }

        if self.store.row_count() == 0 {
            debug!(sheet = %self.name, "dropping sheet without records");
            return None;
        }
        Some(Sheet::new(self.name, self.has_header, self.store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTable;

    const S: Option<ValueKind> = Some(ValueKind::String);
    const F: Option<ValueKind> = Some(ValueKind::Float);

    fn row(cells: &[(&str, Option<ValueKind>)]) -> RowBuffer {
        let mut buffer = RowBuffer::new(2000);
        for (value, kind) in cells {
            buffer.push_cell(value.to_string(), *kind, 1);
        }
        buffer
    }

    fn assembler() -> SheetAssembler<MemoryTable> {
        SheetAssembler::new("Sheet1", &OdsOptions::default(), false, MemoryTable::new())
    }

    #[test]
    fn test_row_buffer_defers_blanks() {
        let mut buffer = RowBuffer::new(10);
        buffer.push_cell("a".into(), S, 1);
        buffer.push_blank(2);
        buffer.push_cell("b".into(), S, 2);
        buffer.push_cell(String::new(), None, 5000);
        assert_eq!(buffer.values(), &["a", "", "", "b", "b"]);
        assert_eq!(buffer.kinds()[1], None);
        assert!(!buffer.is_truncated());
    }

    #[test]
    fn test_row_buffer_caps_columns() {
        let mut buffer = RowBuffer::new(3);
        buffer.push_cell("x".into(), S, 5);
        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_truncated());
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_truncated());
    }

    #[test]
    fn test_header_sheet() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        asm.end_row(&row(&[("Name", S), ("Age", S)]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[("Alice", S), ("30", F)]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[("Bob", S), ("41.5", F)]), 1, &mut diags).unwrap();
        let sheet = asm.finish(&mut diags).unwrap();

        assert!(sheet.has_header());
        let names: Vec<&str> = sheet.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Age"]);
        assert_eq!(sheet.columns()[1].column_type, ColumnType::REAL);
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.value(0, 1), Some(&FieldValue::Real(30.0)));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_widening_to_string_on_conflict() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        asm.end_row(&row(&[("1", F)]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[("2024-01-31", Some(ValueKind::Date))]), 1, &mut diags).unwrap();
        let sheet = asm.finish(&mut diags).unwrap();
        assert_eq!(sheet.columns()[0].column_type, ColumnType::STRING);
        assert_eq!(sheet.value(0, 0), Some(&FieldValue::String("1".into())));
        assert_eq!(sheet.value(1, 0), Some(&FieldValue::String("2024-01-31".into())));
    }

    #[test]
    fn test_time_then_date_falls_back_to_string() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        asm.end_row(&row(&[("10:00:00", Some(ValueKind::Time))]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[("2024-01-31", Some(ValueKind::Date))]), 1, &mut diags).unwrap();
        let sheet = asm.finish(&mut diags).unwrap();
        assert_eq!(sheet.columns()[0].column_type, ColumnType::STRING);
        assert_eq!(sheet.value(0, 0), Some(&FieldValue::String("10:00:00".into())));
    }

    #[test]
    fn test_empty_rows_deferred_and_flushed() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        asm.end_row(&row(&[("1", F)]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[("2", F)]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[]), 3, &mut diags).unwrap();
        asm.end_row(&row(&[("3", F)]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[]), 1000, &mut diags).unwrap();
        let sheet = asm.finish(&mut diags).unwrap();
        assert_eq!(sheet.row_count(), 6);
        assert_eq!(sheet.value(2, 0), Some(&FieldValue::Null));
        assert_eq!(sheet.value(5, 0), Some(&FieldValue::Integer(3)));
    }

    #[test]
    fn test_empty_column_stays_undetermined() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        asm.end_row(&row(&[("a", S), ("", None), ("x", S)]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[("b", S), ("7", F), ("y", S)]), 1, &mut diags).unwrap();
        let sheet = asm.finish(&mut diags).unwrap();
        assert!(!sheet.has_header());
        assert_eq!(sheet.columns()[1].column_type, ColumnType::INTEGER);
        assert_eq!(sheet.value(0, 1), Some(&FieldValue::Null));
    }

    #[test]
    fn test_single_row_sheet_keeps_row_as_data() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        asm.end_row(&row(&[("Name", S), ("Age", S)]), 1, &mut diags).unwrap();
        let sheet = asm.finish(&mut diags).unwrap();
        assert!(!sheet.has_header());
        assert_eq!(sheet.columns()[0].name, "Field1");
        assert_eq!(sheet.row_count(), 1);
    }

    #[test]
    fn test_empty_sheets_dropped() {
        let mut diags = Diagnostics::new();
        assert!(assembler().finish(&mut diags).is_none());

        let mut asm = assembler();
        asm.end_row(&row(&[]), 1, &mut diags).unwrap();
        assert!(asm.finish(&mut diags).is_none());
    }

    #[test]
    fn test_blank_rows_only_sheet_dropped() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        for _ in 0..3 {
            asm.end_row(&row(&[]), 1, &mut diags).unwrap();
        }
        assert!(asm.finish(&mut diags).is_none());

        let mut asm = assembler();
        asm.end_row(&row(&[]), 500, &mut diags).unwrap();
        assert!(asm.finish(&mut diags).is_none());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_leading_blank_row_becomes_null_record() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        asm.end_row(&row(&[]), 1, &mut diags).unwrap();
        asm.end_row(&row(&[("1", F), ("x", S)]), 1, &mut diags).unwrap();
        let sheet = asm.finish(&mut diags).unwrap();
        assert!(!sheet.has_header());
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.value(0, 0), Some(&FieldValue::Null));
        assert_eq!(sheet.value(1, 0), Some(&FieldValue::Integer(1)));
        assert_eq!(sheet.columns()[0].column_type, ColumnType::INTEGER);
    }

    #[test]
    fn test_repeated_row_gap() {
        let mut diags = Diagnostics::new();
        let mut asm = assembler();
        let wide = row(&[("v", S); 20]);
        let err = asm.end_row(&wide, 10_000, &mut diags).unwrap_err();
        assert!(matches!(err, LimitError::TooBigGap { .. }));
    }

    #[test]
    fn test_truncation_warned_once() {
        let options = OdsOptions::default().with_max_columns(2);
        let mut asm = SheetAssembler::new("Wide", &options, false, MemoryTable::new());
        let mut diags = Diagnostics::new();
        for _ in 0..3 {
            let mut buffer = RowBuffer::new(options.effective_max_columns());
            buffer.push_cell("1".into(), F, 4);
            asm.end_row(&buffer, 1, &mut diags).unwrap();
        }
        assert_eq!(diags.len(), 1);
        let sheet = asm.finish(&mut diags).unwrap();
        assert_eq!(sheet.column_count(), 2);
        assert_eq!(sheet.row_count(), 3);
    }
}
