//! Streaming reader for `content.xml`.
//!
//! The document is pulled event by event through `quick-xml`; nothing but the
//! row being read and the sheet being assembled is kept in memory. Element
//! events drive a small explicit state machine:
//!
//! ```text
//! Default --table:table--> InSheet --table:table-row--> InRow
//!     InRow --table:table-cell--> InCell --text:p--> InText
//! ```
//!
//! Problems never surface as `Err` unless the input itself cannot be read:
//! corruption and resource bounds are reported through [`Diagnostics`] and
//! the sheets completed so far are returned.

use std::collections::HashSet;
use std::io::{BufReader, Read};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info};

use super::assembler::{RowBuffer, SheetAssembler};
use super::constants::{
    FORMULA_FALSE, FORMULA_NAMESPACE, FORMULA_PREFIX, FORMULA_TRUE, MAX_SPACE_COUNT,
    PARSER_BUF_SIZE,
};
use super::datatype::{Boolean, DurationOdf};
use super::expand::{LimitError, RepeatBudget, parse_repeat};
use super::formula::{BuiltinEvaluator, ExpressionEvaluator, FormulaEngine};
use super::inference::ValueKind;
use super::machine::{DataGuard, StateStack};
use super::options::OdsOptions;
use super::sheet::{Dataset, Sheet};
use super::tags::{Attributes, OdsAttr, OdsTag, match_tag};
use crate::common::xml::resolve_entity;
use crate::common::{Diagnostics, Error, Result};
use crate::store::{FeatureStore, MemoryTable};

/// Position of the reader in the document structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    Default,
    InSheet,
    InRow,
    InCell,
    InText,
}

/// Cell being read: declared kind, typed value attribute, formula and the
/// text of its paragraphs.
#[derive(Debug, Default)]
struct CellBuilder {
    kind: Option<ValueKind>,
    typed_value: Option<String>,
    formula: Option<String>,
    text: String,
    paragraphs: usize,
    repeat: u64,
    /// Element depth of the cell's direct children
    content_depth: usize,
}

impl CellBuilder {
    fn start(mut attrs: Attributes, repeat: u64, content_depth: usize) -> Self {
        let kind = attrs.get(OdsAttr::ValueType).map(ValueKind::parse);
        let typed_value = match kind {
            Some(ValueKind::Float | ValueKind::Currency | ValueKind::Percentage) => {
                attrs.take(OdsAttr::Value)
            },
            Some(ValueKind::Date) => attrs.take(OdsAttr::DateValue),
            Some(ValueKind::Time) => attrs
                .get(OdsAttr::TimeValue)
                .and_then(|v| DurationOdf::to_clock(v).ok()),
            Some(ValueKind::Bool) => attrs
                .get(OdsAttr::BooleanValue)
                .and_then(|v| Boolean::decode(v).ok())
                .map(|b| Boolean::as_digit(b).to_string()),
            Some(ValueKind::String) => attrs.take(OdsAttr::StringValue),
            _ => None,
        };
        Self {
            kind,
            typed_value,
            formula: attrs.take(OdsAttr::Formula),
            text: String::new(),
            paragraphs: 0,
            repeat,
            content_depth,
        }
    }

    /// Value and kind the cell contributes to its row.
    ///
    /// Booleans written as `of:=TRUE()` / `of:=FALSE()` become `1` / `0`;
    /// any other OpenFormula expression replaces the value until formula
    /// resolution runs. Formulas in other namespaces are ignored.
    fn finish(&mut self) -> (String, Option<ValueKind>) {
        let text = std::mem::take(&mut self.text);
        let mut value = self.typed_value.take().unwrap_or(text);
        let mut kind = self.kind;

        if let Some(formula) = self.formula.take() {
            if formula == FORMULA_TRUE {
                value = "1".to_string();
                kind = Some(ValueKind::Bool);
            } else if formula == FORMULA_FALSE {
                value = "0".to_string();
                kind = Some(ValueKind::Bool);
            } else if formula.starts_with(FORMULA_PREFIX) {
                value = formula;
                kind = Some(ValueKind::Formula);
            } else if !formula.starts_with(FORMULA_NAMESPACE) {
                debug!(formula = %formula, "ignoring formula outside the OpenFormula namespace");
            }
        }
        (value, kind)
    }
}

/// One pass over a `content.xml` stream.
///
/// A session owns all parse state; it can be reused for several documents
/// but is never shared between threads while parsing.
///
/// # Examples
///
/// ```
/// use odstab::ods::{OdsOptions, ParseSession};
///
/// let xml = r#"<office:document-content><office:body><office:spreadsheet>
///   <table:table table:name="People">
///     <table:table-row>
///       <table:table-cell office:value-type="string"><text:p>Name</text:p></table:table-cell>
///       <table:table-cell office:value-type="string"><text:p>Age</text:p></table:table-cell>
///     </table:table-row>
///     <table:table-row>
///       <table:table-cell office:value-type="string"><text:p>Alice</text:p></table:table-cell>
///       <table:table-cell office:value-type="float" office:value="30"><text:p>30</text:p></table:table-cell>
///     </table:table-row>
///   </table:table>
/// </office:spreadsheet></office:body></office:document-content>"#;
///
/// let dataset = ParseSession::new(OdsOptions::default()).parse(xml.as_bytes()).unwrap();
/// let sheet = dataset.sheet_by_name("People").unwrap();
/// assert!(sheet.has_header());
/// assert_eq!(sheet.columns()[1].name, "Age");
/// assert_eq!(sheet.row_count(), 1);
/// ```
pub struct ParseSession<S = MemoryTable> {
    options: OdsOptions,
    split_hints: HashSet<String>,
    evaluator: Box<dyn ExpressionEvaluator>,
    stack: StateStack<ContentState>,
    guard: DataGuard,
    budget: RepeatBudget,
    /// Sticky: once set, no further events are processed
    stop: bool,
    /// The current sheet hit a bound; skip to its end
    end_table_parsing: bool,
    sheet: Option<SheetAssembler<S>>,
    sheet_count: usize,
    row: RowBuffer,
    row_repeat: u64,
    cell: CellBuilder,
    sheets: Vec<Sheet<S>>,
    diagnostics: Diagnostics,
}

impl ParseSession<MemoryTable> {
    /// Session building sheets in [`MemoryTable`]s.
    pub fn new(options: OdsOptions) -> Self {
        Self::with_options(options)
    }
}

impl<S: FeatureStore + Default> ParseSession<S> {
    /// Session for any default-constructible store.
    pub fn with_options(options: OdsOptions) -> Self {
        let max_columns = options.effective_max_columns();
        Self {
            options,
            split_hints: HashSet::new(),
            evaluator: Box::new(BuiltinEvaluator::new()),
            stack: StateStack::new(ContentState::Default),
            guard: DataGuard::default(),
            budget: RepeatBudget::new(),
            stop: false,
            end_table_parsing: false,
            sheet: None,
            sheet_count: 0,
            row: RowBuffer::new(max_columns),
            row_repeat: 1,
            cell: CellBuilder::default(),
            sheets: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Names of sheets whose first row is frozen as a header (from
    /// `settings.xml`).
    pub fn with_split_hints(mut self, split_hints: HashSet<String>) -> Self {
        self.split_hints = split_hints;
        self
    }

    /// Replace the formula evaluator.
    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn options(&self) -> &OdsOptions {
        &self.options
    }

    /// Read a whole `content.xml` stream.
    ///
    /// Only a failing reader yields `Err`; everything else ends up in the
    /// returned dataset's diagnostics.
    pub fn parse<R: Read>(&mut self, reader: R) -> Result<Dataset<S>> {
        self.reset();

        let mut xml = Reader::from_reader(BufReader::with_capacity(PARSER_BUF_SIZE, reader));
        let config = xml.config_mut();
        config.expand_empty_elements = true;
        config.trim_text(false);

        let mut buf = Vec::with_capacity(PARSER_BUF_SIZE);
        while !self.stop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => self.start_element(e),
                Ok(Event::Empty(ref e)) => {
                    self.start_element(e);
                    self.end_element();
                },
                Ok(Event::End(_)) => self.end_element(),
                Ok(Event::Text(ref t)) => {
                    if self.data_event() {
                        self.characters(&String::from_utf8_lossy(t));
                    }
                },
                Ok(Event::CData(ref t)) => {
                    if self.data_event() {
                        self.characters(&String::from_utf8_lossy(t));
                    }
                },
                Ok(Event::GeneralRef(ref r)) => {
                    if self.data_event()
                        && let Some(c) = resolve_entity(r)
                    {
                        self.characters(c.encode_utf8(&mut [0u8; 4]));
                    }
                },
                Ok(Event::Eof) => break,
                Ok(_) => {},
                Err(quick_xml::Error::Io(e)) => {
                    return Err(Error::Io(std::io::Error::new(e.kind(), e.to_string())));
                },
                Err(e) => {
                    let message =
                        format!("XML error at position {}: {}", xml.error_position(), e);
                    self.corrupted(message);
                },
            }
            buf.clear();
        }

        // Whatever sheet was open when the stream ended keeps what it has.
        self.finish_sheet();

        info!(
            sheets = self.sheets.len(),
            diagnostics = self.diagnostics.len(),
            "content parsed"
        );
        Ok(Dataset {
            sheets: std::mem::take(&mut self.sheets),
            diagnostics: std::mem::take(&mut self.diagnostics),
        })
    }

    fn reset(&mut self) {
        self.stack = StateStack::new(ContentState::Default);
        self.guard = DataGuard::default();
        self.budget = RepeatBudget::new();
        self.stop = false;
        self.end_table_parsing = false;
        self.sheet = None;
        self.sheet_count = 0;
        self.row.clear();
        self.row_repeat = 1;
        self.cell = CellBuilder::default();
        self.sheets.clear();
        self.diagnostics = Diagnostics::new();
    }

    // ========================================================================
    // EVENT DISPATCH
    // ========================================================================

    fn start_element(&mut self, e: &BytesStart<'_>) {
        self.guard.element();
        let tag = match_tag(e.name().as_ref());

        let next = if tag == OdsTag::Unknown {
            None
        } else {
            match self.stack.top() {
                ContentState::Default => self.start_default(tag, e),
                _ if self.end_table_parsing => None,
                ContentState::InSheet => self.start_sheet_child(tag, e),
                ContentState::InRow => self.start_row_child(tag, e),
                ContentState::InCell => self.start_cell_child(tag),
                ContentState::InText => {
                    self.start_text_child(tag, e);
                    None
                },
            }
        };

        if let Some(state) = next
            && self.stack.push(state).is_err()
        {
            self.corrupted("element nesting too deep; file probably corrupted".to_string());
        }
        self.stack.enter_element();
    }

    fn end_element(&mut self) {
        self.guard.element();
        let Some(state) = self.stack.leave_element() else {
            return;
        };
        match state {
            ContentState::InSheet => {
                self.finish_sheet();
                self.end_table_parsing = false;
            },
            ContentState::InRow if !self.end_table_parsing => self.end_row(),
            ContentState::InCell if !self.end_table_parsing => self.end_cell(),
            _ => {},
        }
    }

    /// Count a character-data event; `false` once the run is too long.
    fn data_event(&mut self) -> bool {
        if self.guard.data() {
            return true;
        }
        self.corrupted("too much data inside one element; file probably corrupted".to_string());
        false
    }

    fn characters(&mut self, text: &str) {
        if self.stack.top() == ContentState::InText && !self.end_table_parsing {
            self.cell.text.push_str(text);
        }
    }

    // ========================================================================
    // STATE HANDLERS
    // ========================================================================

    fn start_default(&mut self, tag: OdsTag, e: &BytesStart<'_>) -> Option<ContentState> {
        if tag != OdsTag::Table {
            return None;
        }
        let mut attrs = self.attributes(e)?;
        self.sheet_count += 1;
        let name = attrs
            .take(OdsAttr::TableName)
            .unwrap_or_else(|| format!("Sheet{}", self.sheet_count));
        let split_hint = self.split_hints.contains(&name);
        debug!(sheet = %name, split_hint, "sheet started");

        self.end_table_parsing = false;
        self.sheet = Some(SheetAssembler::new(name, &self.options, split_hint, S::default()));
        Some(ContentState::InSheet)
    }

    fn start_sheet_child(&mut self, tag: OdsTag, e: &BytesStart<'_>) -> Option<ContentState> {
        if tag != OdsTag::TableRow {
            // header rows and row groups are transparent
            return None;
        }
        let attrs = self.attributes(e)?;
        match parse_repeat(attrs.get(OdsAttr::NumberRowsRepeated), "table:number-rows-repeated") {
            Ok(repeat) => {
                self.row_repeat = repeat;
                self.row.clear();
                Some(ContentState::InRow)
            },
            Err(err) => {
                self.limit_reached(err);
                None
            },
        }
    }

    fn start_row_child(&mut self, tag: OdsTag, e: &BytesStart<'_>) -> Option<ContentState> {
        match tag {
            OdsTag::TableCell => {
                let attrs = self.attributes(e)?;
                let repeat = match parse_repeat(
                    attrs.get(OdsAttr::NumberColumnsRepeated),
                    "table:number-columns-repeated",
                ) {
                    Ok(repeat) => repeat,
                    Err(err) => {
                        self.limit_reached(err);
                        return None;
                    },
                };
                self.cell = CellBuilder::start(attrs, repeat, self.stack.depth() + 1);
                Some(ContentState::InCell)
            },
            OdsTag::CoveredTableCell => {
                self.row.push_blank(1);
                None
            },
            _ => None,
        }
    }

    fn start_cell_child(&mut self, tag: OdsTag) -> Option<ContentState> {
        // paragraphs of annotations and nested frames are not cell text
        if tag != OdsTag::TextP || self.stack.depth() != self.cell.content_depth {
            return None;
        }
        if self.cell.paragraphs > 0 {
            self.cell.text.push('\n');
        }
        self.cell.paragraphs += 1;
        Some(ContentState::InText)
    }

    fn start_text_child(&mut self, tag: OdsTag, e: &BytesStart<'_>) {
        match tag {
            OdsTag::TextS => {
                let count = self
                    .attributes(e)
                    .and_then(|attrs| attrs.get(OdsAttr::TextC).and_then(|c| c.parse::<usize>().ok()))
                    .unwrap_or(1)
                    .min(MAX_SPACE_COUNT);
                self.cell.text.extend(std::iter::repeat_n(' ', count));
            },
            OdsTag::TextTab => self.cell.text.push('\t'),
            OdsTag::TextLineBreak => self.cell.text.push('\n'),
            _ => {},
        }
    }

    fn end_cell(&mut self) {
        let (value, kind) = self.cell.finish();
        let repeat = self.cell.repeat;
        if !value.is_empty()
            && let Err(err) = self.budget.charge(value.len(), repeat, self.row_repeat)
        {
            self.limit_reached(err);
            return;
        }
        self.row.push_cell(value, kind, repeat);
    }

    fn end_row(&mut self) {
        let Some(sheet) = self.sheet.as_mut() else {
            return;
        };
        if let Err(err) = sheet.end_row(&self.row, self.row_repeat, &mut self.diagnostics) {
            self.limit_reached(err);
        }
        self.row.clear();
    }

    fn finish_sheet(&mut self) {
        let Some(assembler) = self.sheet.take() else {
            return;
        };
        let Some(mut sheet) = assembler.finish(&mut self.diagnostics) else {
            return;
        };
        if self.options.resolve_formulas {
            let resolved =
                FormulaEngine::new(self.evaluator.as_ref()).resolve_sheet(&mut sheet, &mut self.diagnostics);
            if resolved > 0 {
                debug!(sheet = sheet.name(), resolved, "formulas resolved");
            }
        }
        debug!(
            sheet = sheet.name(),
            rows = sheet.row_count(),
            columns = sheet.column_count(),
            header = sheet.has_header(),
            "sheet finished"
        );
        self.sheets.push(sheet);
    }

    // ========================================================================
    // FAILURES
    // ========================================================================

    fn attributes(&mut self, e: &BytesStart<'_>) -> Option<Attributes> {
        match Attributes::from_start(e) {
            Ok(attrs) => Some(attrs),
            Err(err) => {
                self.corrupted(err.to_string());
                None
            },
        }
    }

    fn sheet_name(&self) -> Option<String> {
        self.sheet.as_ref().map(|s| s.name().to_string())
    }

    /// A resource bound: the sheet is abandoned, and for the document-wide
    /// memory ceiling so is the rest of the parse.
    fn limit_reached(&mut self, err: LimitError) {
        let sheet = self.sheet_name();
        if err.is_fatal() {
            self.diagnostics.fatal(sheet.as_deref(), err.to_string());
            self.stop = true;
        } else {
            self.diagnostics.error(sheet.as_deref(), err.to_string());
        }
        self.end_table_parsing = true;
    }

    /// Structural corruption stops the parse.
    fn corrupted(&mut self, message: String) {
        if self.stop {
            return;
        }
        let sheet = self.sheet_name();
        self.diagnostics.fatal(sheet.as_deref(), message);
        self.stop = true;
    }
}

/// Parse a bare `content.xml` stream into in-memory sheets.
///
/// `split_hints` names the sheets whose first row is a frozen header, as
/// found by [`crate::ods::settings::prescan_settings`].
pub fn parse_content<R: Read>(
    reader: R,
    split_hints: &HashSet<String>,
    options: &OdsOptions,
) -> Result<Dataset> {
    ParseSession::new(options.clone())
        .with_split_hints(split_hints.clone())
        .parse(reader)
}
