//! Fixed limits and literals used while reading and writing spreadsheets.

/// Maximum depth of the parser state stack.
pub const STACK_SIZE: usize = 5;

/// Chunk size of the buffered reader feeding the XML parser.
pub const PARSER_BUF_SIZE: usize = 8192;

/// Consecutive character-data events tolerated without an element event.
///
/// Entity-expansion floods show up as a very long run of text/reference
/// events; past this count the document is treated as corrupted.
pub const DATA_HANDLER_LIMIT: usize = 8192;

/// Largest accepted `table:number-columns-repeated` / `table:number-rows-repeated`.
pub const MAX_REPEAT: i64 = 10_000;

/// Ceiling on `columns × repeated rows` for a single repeated row.
pub const MAX_GAP_CELLS: u64 = 100_000;

/// Ceiling on `new columns × existing rows` when a late row widens the schema.
pub const MAX_GROWTH_CELLS: u64 = 100_000;

/// Byte ceiling on repeated content, per cell and accumulated per document.
pub const REPEAT_MEMORY_CEILING: u64 = 10 * 1024 * 1024;

/// Minimum cost of one repeated value, however short it is.
pub const MIN_REPEAT_COST: u64 = 16;

/// Default cap on the number of columns of a sheet.
pub const DEFAULT_MAX_COLUMNS: usize = 2000;

/// Hard ceiling the configured column cap is clamped to.
pub const MAX_COLUMNS_CEILING: usize = 1_000_000;

/// Largest `text:c` honoured on a `text:s` element.
pub const MAX_SPACE_COUNT: usize = 1000;

/// Prefix of an OpenFormula cell formula.
pub const FORMULA_PREFIX: &str = "of:=";

/// Namespace part of [`FORMULA_PREFIX`]; the evaluator receives what follows it.
pub const FORMULA_NAMESPACE: &str = "of:";

pub const FORMULA_TRUE: &str = "of:=TRUE()";
pub const FORMULA_FALSE: &str = "of:=FALSE()";

/// Prefix used for synthetic column names (`Field1`, `Field2`, ...).
pub const FIELD_NAME_PREFIX: &str = "Field";

/// Name of the `settings.xml` map listing per-table view settings.
pub const SETTINGS_TABLES_MAP: &str = "Tables";
pub const SETTINGS_SPLIT_MODE: &str = "VerticalSplitMode";
pub const SETTINGS_SPLIT_POSITION: &str = "VerticalSplitPosition";

// Package parts
pub const MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
pub const PART_MIMETYPE: &str = "mimetype";
pub const PART_CONTENT: &str = "content.xml";
pub const PART_SETTINGS: &str = "settings.xml";
pub const PART_STYLES: &str = "styles.xml";
pub const PART_META: &str = "meta.xml";
pub const PART_MANIFEST: &str = "META-INF/manifest.xml";
