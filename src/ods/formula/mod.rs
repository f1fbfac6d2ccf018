//! Formula resolution on finished sheets.
//!
//! Cells whose text starts with `of:=` are evaluated once the sheet is
//! complete. Evaluation may read other cells; a referenced formula cell is
//! resolved first, recursively, with a visited set per evaluation root so
//! that cycles end in [`FormulaError::Circular`] instead of recursing forever.
//! Chains of formulas referencing formulas are cut at
//! [`MAX_RESOLUTION_DEPTH`] cells.
//!
//! The expression language itself sits behind [`ExpressionEvaluator`]; this
//! module only decides when to call it and what to do with the result.

mod builtin;

pub use builtin::{BuiltinEvaluator, MAX_FORMULA_NESTING};

use super::constants::{FORMULA_NAMESPACE, FORMULA_PREFIX};
use super::datatype;
use super::sheet::Sheet;
use crate::common::{Diagnostics, FormulaError};
use crate::store::{FeatureStore, FieldValue};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Longest chain of formula cells resolved through one another.
pub const MAX_RESOLUTION_DEPTH: usize = 64;

/// Zero-based position on a sheet, header row included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: usize,
    pub column: usize,
}

impl CellAddress {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for CellAddress {
    /// A1 notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.column), self.row + 1)
    }
}

/// Spreadsheet column letters for a zero-based index.
///
/// ```
/// use odstab::ods::formula::column_name;
/// assert_eq!(column_name(0), "A");
/// assert_eq!(column_name(25), "Z");
/// assert_eq!(column_name(26), "AA");
/// assert_eq!(column_name(701), "ZZ");
/// ```
pub fn column_name(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// A cell value as seen by an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

/// Result of evaluating one expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Empty,
    Integer(i64),
    Real(f64),
    Text(String),
    /// Something that is not a single value (a range, an array); the cell
    /// keeps its formula.
    NonConstant(String),
}

/// Cell access handed to an evaluator.
pub trait CellSource {
    /// Values of the inclusive rectangle `first..=last`, row by row.
    fn read_range(
        &mut self,
        first: CellAddress,
        last: CellAddress,
    ) -> Result<Vec<Vec<CellValue>>, FormulaError>;

    fn read_cell(&mut self, address: CellAddress) -> Result<CellValue, FormulaError> {
        let mut rows = self.read_range(address, address)?;
        Ok(rows
            .pop()
            .and_then(|mut row| row.pop())
            .unwrap_or(CellValue::Empty))
    }
}

/// Compiles and evaluates formula expressions.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` (the formula text after `of:`, starting with `=`).
    fn evaluate(
        &self,
        expression: &str,
        cells: &mut dyn CellSource,
    ) -> Result<Evaluation, FormulaError>;
}

#[inline]
fn is_formula(value: Option<&FieldValue>) -> bool {
    matches!(value, Some(FieldValue::String(s)) if s.starts_with(FORMULA_PREFIX))
}

/// Walks a sheet and replaces formula cells by their values.
pub struct FormulaEngine<'e> {
    evaluator: &'e dyn ExpressionEvaluator,
}

impl<'e> FormulaEngine<'e> {
    pub fn new(evaluator: &'e dyn ExpressionEvaluator) -> Self {
        Self { evaluator }
    }

    /// Resolve every formula cell of `sheet` in row order.
    ///
    /// Each failure leaves that cell's formula text in place and is reported
    /// once as a warning. Returns the number of cells replaced.
    pub fn resolve_sheet<S: FeatureStore>(
        &self,
        sheet: &mut Sheet<S>,
        diagnostics: &mut Diagnostics,
    ) -> usize {
        let mut resolved = 0;
        for ordinal in 0..sheet.row_count() {
            for column in 0..sheet.column_count() {
                if !is_formula(sheet.value(ordinal, column)) {
                    continue;
                }
                let mut visited = HashSet::new();
                match self.resolve_cell(sheet, ordinal, column, &mut visited) {
                    Ok(true) => resolved += 1,
                    Ok(false) => {},
                    Err(e) => {
                        let address = CellAddress::new(ordinal + sheet.header_offset(), column);
                        diagnostics.warn(
                            Some(sheet.name()),
                            format!("formula in {} left unresolved: {}", address, e),
                        );
                    },
                }
            }
        }
        debug!(sheet = sheet.name(), resolved, "formulas resolved");
        resolved
    }

    /// Resolve one cell (row ordinal, column), recursing into referenced
    /// formula cells. Returns `false` when the cell holds no formula.
    ///
    /// `visited` holds the cells currently being evaluated, so its size is
    /// the resolution depth.
    pub fn resolve_cell<S: FeatureStore>(
        &self,
        sheet: &mut Sheet<S>,
        ordinal: usize,
        column: usize,
        visited: &mut HashSet<(usize, usize)>,
    ) -> Result<bool, FormulaError> {
        let text = match sheet.value(ordinal, column) {
            Some(FieldValue::String(s)) if s.starts_with(FORMULA_PREFIX) => s.clone(),
            _ => return Ok(false),
        };
        let address = CellAddress::new(ordinal + sheet.header_offset(), column);
        if visited.contains(&(ordinal, column)) {
            return Err(FormulaError::Circular(address.to_string()));
        }
        if visited.len() >= MAX_RESOLUTION_DEPTH {
            return Err(FormulaError::TooDeep(MAX_RESOLUTION_DEPTH));
        }
        visited.insert((ordinal, column));

        let expression = &text[FORMULA_NAMESPACE.len()..];
        let result = {
            let mut cells = SheetCells {
                engine: self,
                sheet: &mut *sheet,
                visited: &mut *visited,
            };
            self.evaluator.evaluate(expression, &mut cells)
        };
        visited.remove(&(ordinal, column));

        let value = match result? {
            Evaluation::NonConstant(what) => return Err(FormulaError::NonConstant(what)),
            Evaluation::Empty => None,
            Evaluation::Integer(v) => Some(itoa::Buffer::new().format(v).to_string()),
            Evaluation::Real(v) => Some(datatype::format_real(v)),
            Evaluation::Text(s) => Some(s),
        };
        Self::write_back(sheet, ordinal, column, value)?;
        debug!(sheet = sheet.name(), cell = %address, "formula resolved");
        Ok(true)
    }

    fn write_back<S: FeatureStore>(
        sheet: &mut Sheet<S>,
        ordinal: usize,
        column: usize,
        text: Option<String>,
    ) -> Result<(), FormulaError> {
        let column_type = sheet.columns()[column].column_type;
        let field = match text {
            None => FieldValue::Null,
            Some(text) => FieldValue::parse(&text, column_type).ok_or_else(|| {
                FormulaError::Evaluation(format!("result '{}' does not fit a {} column", text, column_type))
            })?,
        };

        let record = sheet
            .store()
            .row(ordinal)
            .ok_or_else(|| FormulaError::OutOfRange(format!("row {}", ordinal)))?;
        let id = record.id;
        let mut values = record.values.clone();
        values[column] = field;
        sheet.store_mut().replace_row(id, values)?;
        Ok(())
    }
}

/// [`CellSource`] over a sheet being resolved.
struct SheetCells<'a, 'e, S> {
    engine: &'a FormulaEngine<'e>,
    sheet: &'a mut Sheet<S>,
    visited: &'a mut HashSet<(usize, usize)>,
}

impl<S: FeatureStore> CellSource for SheetCells<'_, '_, S> {
    fn read_range(
        &mut self,
        first: CellAddress,
        last: CellAddress,
    ) -> Result<Vec<Vec<CellValue>>, FormulaError> {
        let (top, bottom) = (first.row.min(last.row), first.row.max(last.row));
        let (left, right) = (first.column.min(last.column), first.column.max(last.column));

        // The header row has no record behind it.
        let offset = self.sheet.header_offset();
        if top < offset
            || bottom - offset >= self.sheet.row_count()
            || right >= self.sheet.column_count()
        {
            let range = if first == last {
                first.to_string()
            } else {
                format!("{}:{}", first, last)
            };
            return Err(FormulaError::OutOfRange(range));
        }

        let mut rows = Vec::with_capacity(bottom - top + 1);
        for row in top..=bottom {
            let ordinal = row - offset;
            let mut values = Vec::with_capacity(right - left + 1);
            for column in left..=right {
                if is_formula(self.sheet.value(ordinal, column)) {
                    self.engine
                        .resolve_cell(self.sheet, ordinal, column, self.visited)?;
                }
                values.push(cell_value(self.sheet.value(ordinal, column)));
            }
            rows.push(values);
        }
        Ok(rows)
    }
}

/// Expression view of a stored value; numeric-looking text reads as a number.
fn cell_value(value: Option<&FieldValue>) -> CellValue {
    match value {
        None | Some(FieldValue::Null) => CellValue::Empty,
        Some(FieldValue::String(s)) => match datatype::parse_real(s.trim()) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(s.clone()),
        },
        Some(other) => match other.as_f64() {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(other.to_text()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ColumnDef, ColumnType, MemoryTable};

    fn sheet_of(rows: &[&[&str]], has_header: bool) -> Sheet {
        let mut store = MemoryTable::new();
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        for i in 0..width {
            store
                .create_column(ColumnDef::new(format!("Field{}", i + 1), ColumnType::STRING))
                .unwrap();
        }
        for row in rows {
            let values = row
                .iter()
                .map(|v| {
                    if v.is_empty() {
                        FieldValue::Null
                    } else {
                        FieldValue::String(v.to_string())
                    }
                })
                .collect();
            store.append_row(values).unwrap();
        }
        Sheet::new("Sheet1", has_header, store)
    }

    fn text(sheet: &Sheet, ordinal: usize, column: usize) -> String {
        sheet.value(ordinal, column).map(|v| v.to_text()).unwrap_or_default()
    }

    #[test]
    fn test_resolves_chain_in_any_order() {
        // C1 depends on B1 which depends on A1; walking order does not matter
        let mut sheet = sheet_of(&[&["2", "of:=[.A1]*3", "of:=[.B1]+1"]], false);
        let evaluator = BuiltinEvaluator::new();
        let mut diags = Diagnostics::new();
        let n = FormulaEngine::new(&evaluator).resolve_sheet(&mut sheet, &mut diags);
        assert_eq!(n, 2);
        assert_eq!(text(&sheet, 0, 1), "6");
        assert_eq!(text(&sheet, 0, 2), "7");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_cycle_left_unresolved() {
        let mut sheet = sheet_of(&[&["of:=[.B1]+1", "of:=[.A1]+1"]], false);
        let evaluator = BuiltinEvaluator::new();
        let mut diags = Diagnostics::new();
        let n = FormulaEngine::new(&evaluator).resolve_sheet(&mut sheet, &mut diags);
        assert_eq!(n, 0);
        assert_eq!(text(&sheet, 0, 0), "of:=[.B1]+1");
        assert_eq!(text(&sheet, 0, 1), "of:=[.A1]+1");
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.message.contains("circular")));
    }

    #[test]
    fn test_self_reference() {
        let mut sheet = sheet_of(&[&["of:=[.A1]"]], false);
        let evaluator = BuiltinEvaluator::new();
        let mut visited = HashSet::new();
        let err = FormulaEngine::new(&evaluator)
            .resolve_cell(&mut sheet, 0, 0, &mut visited)
            .unwrap_err();
        assert_eq!(err, FormulaError::Circular("A1".to_string()));
        assert!(visited.is_empty());
    }

    #[test]
    fn test_header_row_is_out_of_range() {
        // with a header, sheet row 1 is the header and the first record is row 2
        let mut sheet = sheet_of(&[&["5", "of:=[.A2]*2"], &["x", "of:=[.A1]"]], true);
        let evaluator = BuiltinEvaluator::new();
        let mut diags = Diagnostics::new();
        FormulaEngine::new(&evaluator).resolve_sheet(&mut sheet, &mut diags);
        assert_eq!(text(&sheet, 0, 1), "10");
        assert_eq!(text(&sheet, 1, 1), "of:=[.A1]");
        assert_eq!(diags.len(), 1);
        assert!(diags.iter().next().unwrap().message.contains("B3"));
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let mut sheet = sheet_of(&[&["1.5", "abc", "of:=[.A1]+1", "of:=[.B1]&\"!\""]], false);
        let evaluator = BuiltinEvaluator::new();
        let mut diags = Diagnostics::new();
        FormulaEngine::new(&evaluator).resolve_sheet(&mut sheet, &mut diags);
        assert_eq!(text(&sheet, 0, 2), "2.5");
        assert_eq!(text(&sheet, 0, 3), "abc!");
    }

    #[test]
    fn test_range_result_is_not_constant() {
        let mut sheet = sheet_of(&[&["1", "2", "of:=[.A1:.B1]"]], false);
        let evaluator = BuiltinEvaluator::new();
        let mut diags = Diagnostics::new();
        assert_eq!(FormulaEngine::new(&evaluator).resolve_sheet(&mut sheet, &mut diags), 0);
        assert_eq!(text(&sheet, 0, 2), "of:=[.A1:.B1]");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_deep_reference_chain_is_cut() {
        // each row adds one to the row below; the last row is a constant
        let formulas: Vec<String> = (0..99).map(|n| format!("of:=[.A{}]+1", n + 2)).collect();
        let mut rows: Vec<Vec<&str>> = formulas.iter().map(|f| vec![f.as_str()]).collect();
        rows.push(vec!["0"]);
        let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        let mut sheet = sheet_of(&rows, false);

        let evaluator = BuiltinEvaluator::new();
        let mut diags = Diagnostics::new();
        let n = FormulaEngine::new(&evaluator).resolve_sheet(&mut sheet, &mut diags);

        // roots from row 36 on reach the constant within the limit
        assert_eq!(n, MAX_RESOLUTION_DEPTH);
        assert_eq!(diags.len(), 99 - MAX_RESOLUTION_DEPTH);
        assert!(diags.iter().all(|d| d.message.contains("nested deeper")));
        assert_eq!(text(&sheet, 0, 0), "of:=[.A2]+1");
        assert_eq!(text(&sheet, 35, 0), "64");
        assert_eq!(text(&sheet, 98, 0), "1");
    }

    #[test]
    fn test_empty_result_becomes_null() {
        let mut sheet = sheet_of(&[&["", "of:=[.A1]"], &["x", ""]], false);
        let evaluator = BuiltinEvaluator::new();
        let mut diags = Diagnostics::new();
        FormulaEngine::new(&evaluator).resolve_sheet(&mut sheet, &mut diags);
        assert_eq!(sheet.value(0, 1), Some(&FieldValue::Null));
    }
}
