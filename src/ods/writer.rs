//! XML parts of a spreadsheet document written from finished sheets.
//!
//! Field rendering is the inverse of what the reader infers, so a written
//! document parses back into the same column types:
//!
//! | Column type        | Cell written as                                   |
//! |--------------------|---------------------------------------------------|
//! | Integer, Integer64 | `float` with `office:value`                       |
//! | Integer(Boolean)   | `float` with `table:formula="of:=TRUE()"` / FALSE |
//! | Real               | `float` with `office:value`                       |
//! | Date, DateTime     | `date` with `office:date-value`                   |
//! | Time               | `time` with `office:time-value="PTxxHxxMxxS"`     |
//! | String             | `string` paragraphs; `of:=` text as a formula     |
//!
//! Null fields become empty cells, and runs of them are repeat-compressed.

use super::constants::{FORMULA_FALSE, FORMULA_PREFIX, FORMULA_TRUE};
use super::datatype::{self, DateOdf, DateTimeOdf, DurationOdf, TimeOdf};
use super::sheet::Sheet;
use crate::common::xml::escape_xml;
use crate::store::{ColumnType, FeatureStore, FieldValue};

const CONTENT_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:of="urn:oasis:names:tc:opendocument:xmlns:of:1.2" office:version="1.3"><office:font-face-decls/><office:automatic-styles/><office:body><office:spreadsheet>"#;
const CONTENT_FOOTER: &str = "</office:spreadsheet></office:body></office:document-content>";

/// Render the `content.xml` part for `sheets`.
///
/// # Examples
///
/// ```
/// use odstab::ods::{Sheet, writer::write_content_xml};
/// use odstab::store::{ColumnDef, ColumnType, FeatureStore, FieldValue, MemoryTable};
///
/// let mut store = MemoryTable::new();
/// store.create_column(ColumnDef::new("n", ColumnType::INTEGER)).unwrap();
/// store.append_row(vec![FieldValue::Integer(7)]).unwrap();
///
/// let xml = write_content_xml(&[Sheet::new("Data", true, store)]);
/// assert!(xml.contains(r#"<table:table table:name="Data">"#));
/// assert!(xml.contains(r#"office:value-type="float" office:value="7""#));
/// ```
pub fn write_content_xml<S: FeatureStore>(sheets: &[Sheet<S>]) -> String {
    let cell_count: usize = sheets
        .iter()
        .map(|s| s.row_count().saturating_add(1) * s.column_count())
        .sum();
    let mut out = String::with_capacity(CONTENT_HEADER.len() + 256 + cell_count * 96);

    out.push_str(CONTENT_HEADER);
    for sheet in sheets {
        push_sheet(&mut out, sheet);
    }
    out.push_str(CONTENT_FOOTER);
    out
}

fn push_sheet<S: FeatureStore>(out: &mut String, sheet: &Sheet<S>) {
    out.push_str(&format!(r#"<table:table table:name="{}">"#, escape_xml(sheet.name())));
    match sheet.column_count() {
        0 => {},
        1 => out.push_str("<table:table-column/>"),
        n => out.push_str(&format!(
            r#"<table:table-column table:number-columns-repeated="{}"/>"#,
            n
        )),
    }

    if sheet.has_header() {
        out.push_str("<table:table-row>");
        for column in sheet.columns() {
            push_string_cell(out, &column.name);
        }
        out.push_str("</table:table-row>");
    }

    let types: Vec<ColumnType> = sheet.columns().iter().map(|c| c.column_type).collect();
    for record in sheet.rows() {
        out.push_str("<table:table-row>");
        let mut blanks = 0usize;
        for (value, column_type) in record.values.iter().zip(&types) {
            if value.is_null() {
                blanks += 1;
                continue;
            }
            push_blank_cells(out, std::mem::take(&mut blanks));
            push_cell(out, value, *column_type);
        }
        // trailing empty cells are implied
        out.push_str("</table:table-row>");
    }
    out.push_str("</table:table>");
}

fn push_blank_cells(out: &mut String, count: usize) {
    match count {
        0 => {},
        1 => out.push_str("<table:table-cell/>"),
        n => out.push_str(&format!(
            r#"<table:table-cell table:number-columns-repeated="{}"/>"#,
            n
        )),
    }
}

fn push_cell(out: &mut String, value: &FieldValue, column_type: ColumnType) {
    match value {
        FieldValue::Null => push_blank_cells(out, 1),
        FieldValue::Integer(v) if column_type.is_boolean() => {
            let formula = if *v != 0 { FORMULA_TRUE } else { FORMULA_FALSE };
            out.push_str(&format!(
                r#"<table:table-cell table:formula="{}" office:value-type="float" office:value="{}"><text:p>{}</text:p></table:table-cell>"#,
                formula,
                u8::from(*v != 0),
                if *v != 0 { "TRUE" } else { "FALSE" }
            ));
        },
        FieldValue::Integer(v) => push_float_cell(out, itoa::Buffer::new().format(*v), None),
        FieldValue::Integer64(v) => push_float_cell(out, itoa::Buffer::new().format(*v), None),
        FieldValue::Real(v) => {
            let text = datatype::format_real(*v);
            push_float_cell(out, &datatype::format_real_value(*v), Some(&text));
        },
        FieldValue::Date(d) => push_date_cell(out, &DateOdf::encode(d)),
        FieldValue::DateTime(dt) => push_date_cell(out, &DateTimeOdf::encode(dt)),
        FieldValue::Time(t) => {
            out.push_str(&format!(
                r#"<table:table-cell office:value-type="time" office:time-value="{}"><text:p>{}</text:p></table:table-cell>"#,
                DurationOdf::from_time(t),
                TimeOdf::encode(t)
            ));
        },
        FieldValue::String(s) if s.starts_with(FORMULA_PREFIX) => {
            out.push_str(&format!(r#"<table:table-cell table:formula="{}"/>"#, escape_xml(s)));
        },
        FieldValue::String(s) => push_string_cell(out, s),
    }
}

fn push_float_cell(out: &mut String, value: &str, text: Option<&str>) {
    out.push_str(&format!(
        r#"<table:table-cell office:value-type="float" office:value="{}"><text:p>{}</text:p></table:table-cell>"#,
        value,
        text.unwrap_or(value)
    ));
}

fn push_date_cell(out: &mut String, value: &str) {
    out.push_str(&format!(
        r#"<table:table-cell office:value-type="date" office:date-value="{0}"><text:p>{0}</text:p></table:table-cell>"#,
        value
    ));
}

fn push_string_cell(out: &mut String, text: &str) {
    out.push_str(r#"<table:table-cell office:value-type="string">"#);
    for line in text.split('\n') {
        out.push_str("<text:p>");
        push_paragraph_text(out, line);
        out.push_str("</text:p>");
    }
    out.push_str("</table:table-cell>");
}

/// Paragraph text with tabs and runs of spaces spelled as ODF elements.
fn push_paragraph_text(out: &mut String, line: &str) {
    let mut rest = line;
    while !rest.is_empty() {
        let Some(pos) = rest.find([' ', '\t']) else {
            out.push_str(&escape_xml(rest));
            break;
        };
        out.push_str(&escape_xml(&rest[..pos]));
        rest = &rest[pos..];
        if let Some(after) = rest.strip_prefix('\t') {
            out.push_str("<text:tab/>");
            rest = after;
            continue;
        }
        let spaces = rest.len() - rest.trim_start_matches(' ').len();
        if spaces == 1 {
            out.push(' ');
        } else {
            out.push_str(&format!(r#"<text:s text:c="{}"/>"#, spaces));
        }
        rest = &rest[spaces..];
    }
}

/// Render `settings.xml`, freezing the first row of every header sheet so
/// the header survives a round trip even when it cannot be detected.
pub fn write_settings_xml<S: FeatureStore>(sheets: &[Sheet<S>]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><office:document-settings xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:config="urn:oasis:names:tc:opendocument:xmlns:config:1.0" office:version="1.3"><office:settings><config:config-item-set config:name="ooo:view-settings"><config:config-item-map-indexed config:name="Views"><config:config-item-map-entry><config:config-item config:name="ViewId" config:type="string">view1</config:config-item><config:config-item-map-named config:name="Tables">"#,
    );
    for sheet in sheets.iter().filter(|s| s.has_header()) {
        out.push_str(&format!(
            r#"<config:config-item-map-entry config:name="{}"><config:config-item config:name="VerticalSplitMode" config:type="short">2</config:config-item><config:config-item config:name="VerticalSplitPosition" config:type="int">1</config:config-item><config:config-item config:name="ActiveSplitRange" config:type="short">2</config:config-item><config:config-item config:name="PositionTop" config:type="int">0</config:config-item><config:config-item config:name="PositionBottom" config:type="int">1</config:config-item></config:config-item-map-entry>"#,
            escape_xml(sheet.name())
        ));
    }
    out.push_str("</config:config-item-map-named></config:config-item-map-entry></config:config-item-map-indexed></config:config-item-set></office:settings></office:document-settings>");
    out
}

/// Minimal `styles.xml`.
pub fn write_styles_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?><office:document-styles xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" office:version="1.3"><office:styles/><office:automatic-styles/><office:master-styles/></office:document-styles>"#
        .to_string()
}

/// `meta.xml` stamped with the current time.
pub fn write_meta_xml() -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><office:document-meta xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:meta="urn:oasis:names:tc:opendocument:xmlns:meta:1.0" office:version="1.3"><office:meta><meta:generator>odstab/{}</meta:generator><meta:creation-date>{}</meta:creation-date><dc:date>{}</dc:date></office:meta></office:document-meta>"#,
        env!("CARGO_PKG_VERSION"),
        now,
        now
    )
}
