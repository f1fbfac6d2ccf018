//! Odstab - Streaming reconstruction of typed tables from OpenDocument spreadsheets
//!
//! This library reads `.ods` documents (or a bare `content.xml`) as a stream
//! of XML events and rebuilds every sheet as a named table with typed columns,
//! without ever materializing the document tree.
//!
//! # Features
//!
//! - **Bounded streaming**: Repeat-compressed rows and cells are expanded
//!   under gap, growth and memory limits, so small hostile files cannot
//!   allocate without bound
//! - **Schema inference**: Column types follow declared cell kinds and widen
//!   monotonically (Integer to Integer64 to Real, Date to DateTime, anything
//!   to String)
//! - **Header detection**: A first row of labels over typed data becomes the
//!   column names; frozen view panes in `settings.xml` count as a hint
//! - **Formula resolution**: OpenFormula expressions are evaluated against
//!   the sheet with cycle detection
//! - **Pluggable storage**: Tables are built through the
//!   [`store::FeatureStore`] trait; [`store::MemoryTable`] is the default
//! - **Writing**: Tables render back to `content.xml` with the inverse type
//!   mapping and can be packaged as `.ods`
//!
//! # Example - Reading an ODS file
//!
//! ```no_run
//! use odstab::ods::Spreadsheet;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spreadsheet = Spreadsheet::open("data.ods")?;
//! for sheet in spreadsheet.sheets() {
//!     let names: Vec<&str> = sheet.columns().iter().map(|c| c.name.as_str()).collect();
//!     println!("{} ({} rows): {:?}", sheet.name(), sheet.row_count(), names);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Parsing content.xml with options
//!
//! ```
//! use std::collections::HashSet;
//! use odstab::ods::{HeaderMode, OdsOptions, parse_content};
//!
//! # fn main() -> odstab::Result<()> {
//! let xml = r#"<office:document-content><office:body><office:spreadsheet>
//!   <table:table table:name="Plain">
//!     <table:table-row><table:table-cell office:value-type="string"><text:p>id</text:p></table:table-cell></table:table-row>
//!     <table:table-row><table:table-cell office:value-type="string"><text:p>a1</text:p></table:table-cell></table:table-row>
//!   </table:table>
//! </office:spreadsheet></office:body></office:document-content>"#;
//!
//! let options = OdsOptions::default().with_header_mode(HeaderMode::Force);
//! let dataset = parse_content(xml.as_bytes(), &HashSet::new(), &options)?;
//! let sheet = &dataset.sheets[0];
//! assert_eq!(sheet.columns()[0].name, "id");
//! assert_eq!(sheet.row_count(), 1);
//! assert!(dataset.diagnostics.is_empty());
//! # Ok(())
//! # }
//! ```

/// Common types, traits, and utilities
///
/// Error types, the diagnostic channel, and XML text helpers.
pub mod common;

/// OpenDocument spreadsheet reading and writing
pub mod ods;

/// Tabular storage contract and the in-memory implementation
pub mod store;

// Re-export commonly used types for convenience
pub use common::{Diagnostic, Diagnostics, Error, Result, Severity};
pub use ods::{Dataset, HeaderMode, OdsOptions, ParseSession, Sheet, parse_content};
pub use store::{ColumnDef, ColumnType, FeatureStore, FieldType, FieldValue, MemoryTable};

#[cfg(feature = "package")]
pub use ods::{Spreadsheet, SpreadsheetWriter};
