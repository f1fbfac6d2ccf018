//! OpenDocument Spreadsheet reading into typed tables.
//!
//! `content.xml` is streamed through a bounded state machine
//! ([`ParseSession`]); every sheet becomes a [`Sheet`] backed by a
//! [`FeatureStore`](crate::store::FeatureStore) with inferred column types.
//! Repeat-compressed rows and cells are expanded under resource bounds,
//! header rows are detected, and formulas are resolved once a sheet is
//! complete.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashSet;
//! use odstab::ods::{OdsOptions, parse_content};
//! use odstab::store::ColumnType;
//!
//! let xml = r#"<office:document-content><office:body><office:spreadsheet>
//!   <table:table table:name="T">
//!     <table:table-row>
//!       <table:table-cell office:value-type="float" office:value="42"><text:p>42</text:p></table:table-cell>
//!     </table:table-row>
//!     <table:table-row>
//!       <table:table-cell office:value-type="float" office:value="2.5"><text:p>2.5</text:p></table:table-cell>
//!     </table:table-row>
//!   </table:table>
//! </office:spreadsheet></office:body></office:document-content>"#;
//!
//! let dataset = parse_content(xml.as_bytes(), &HashSet::new(), &OdsOptions::default()).unwrap();
//! assert_eq!(dataset.sheets[0].columns()[0].column_type, ColumnType::REAL);
//! ```

pub mod assembler;
pub mod constants;
pub mod datatype;
pub mod expand;
pub mod formula;
pub mod header;
pub mod inference;
pub mod machine;
pub mod options;
pub mod parser;
pub mod settings;
pub mod sheet;
pub mod tags;
pub mod writer;

#[cfg(feature = "package")]
pub mod package;

pub use formula::{BuiltinEvaluator, ExpressionEvaluator, FormulaEngine};
pub use inference::ValueKind;
pub use options::{HeaderMode, OdsOptions};
pub use parser::{ParseSession, parse_content};
pub use settings::prescan_settings;
pub use sheet::{Dataset, Sheet};
pub use writer::{write_content_xml, write_settings_xml};

#[cfg(feature = "package")]
pub use package::{Spreadsheet, SpreadsheetWriter};
