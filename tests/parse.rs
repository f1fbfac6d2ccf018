//! End-to-end parsing of content.xml streams.

use std::collections::HashSet;

use odstab::common::Severity;
use odstab::ods::{HeaderMode, OdsOptions, ParseSession, parse_content};
use odstab::store::{ColumnType, FeatureStore, FieldValue, MemoryTable};
use odstab::{Dataset, Sheet};

fn document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"><office:body><office:spreadsheet>{}</office:spreadsheet></office:body></office:document-content>"#,
        body
    )
}

fn s(text: &str) -> String {
    format!(
        r#"<table:table-cell office:value-type="string"><text:p>{}</text:p></table:table-cell>"#,
        text
    )
}

fn f(value: &str) -> String {
    format!(
        r#"<table:table-cell office:value-type="float" office:value="{0}"><text:p>{0}</text:p></table:table-cell>"#,
        value
    )
}

fn row(cells: &[String]) -> String {
    format!("<table:table-row>{}</table:table-row>", cells.concat())
}

fn table(name: &str, rows: &[String]) -> String {
    format!(r#"<table:table table:name="{}">{}</table:table>"#, name, rows.concat())
}

fn parse(xml: &str) -> Dataset {
    parse_content(xml.as_bytes(), &HashSet::new(), &OdsOptions::default()).unwrap()
}

fn types(sheet: &Sheet) -> Vec<ColumnType> {
    sheet.columns().iter().map(|c| c.column_type).collect()
}

#[test]
fn header_over_typed_row() {
    let xml = document(&table(
        "People",
        &[row(&[s("Name"), s("Age")]), row(&[s("Alice"), f("30")])],
    ));
    let dataset = parse(&xml);
    let sheet = dataset.sheet_by_name("People").unwrap();
    assert!(sheet.has_header());
    let names: Vec<&str> = sheet.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Name", "Age"]);
    assert_eq!(types(sheet), vec![ColumnType::STRING, ColumnType::INTEGER]);
    assert_eq!(sheet.row_count(), 1);
    assert_eq!(sheet.value(0, 0).and_then(FieldValue::as_str), Some("Alice"));
    assert_eq!(sheet.value(0, 1), Some(&FieldValue::Integer(30)));
    assert_eq!(sheet.external_row_id(0), 2);
}

#[test]
fn types_never_narrow() {
    let xml = document(&table(
        "T",
        &[
            row(&[f("1"), f("1")]),
            row(&[f("4294967296"), f("1.5")]),
            row(&[f("2"), f("3")]),
            row(&[s("text"), f("4")]),
        ],
    ));
    let dataset = parse(&xml);
    let sheet = &dataset.sheets[0];
    assert_eq!(types(sheet), vec![ColumnType::STRING, ColumnType::REAL]);
    assert_eq!(sheet.value(1, 0).and_then(FieldValue::as_str), Some("4294967296"));
    assert_eq!(sheet.value(0, 1), Some(&FieldValue::Real(1.0)));
    assert_eq!(sheet.row_count(), 4);
}

#[test]
fn autodetect_disabled_keeps_strings() {
    let xml = document(&table("T", &[row(&[f("1")]), row(&[f("2")])]));
    let options = OdsOptions::default().with_autodetect_types(false);
    let dataset = parse_content(xml.as_bytes(), &HashSet::new(), &options).unwrap();
    assert_eq!(types(&dataset.sheets[0]), vec![ColumnType::STRING]);
}

#[test]
fn repeats_expand_exactly() {
    let cell = r#"<table:table-cell table:number-columns-repeated="4" office:value-type="float" office:value="7"><text:p>7</text:p></table:table-cell>"#;
    let rows = format!(
        r#"<table:table-row table:number-rows-repeated="3">{}</table:table-row>"#,
        cell
    );
    let xml = document(&table("T", &[rows]));
    let dataset = parse(&xml);
    let sheet = &dataset.sheets[0];
    assert_eq!(sheet.column_count(), 4);
    assert_eq!(sheet.row_count(), 3);
    assert!(sheet.rows().all(|r| r.values.iter().all(|v| *v == FieldValue::Integer(7))));
}

#[test]
fn interior_empty_rows_kept_trailing_dropped() {
    let empty = r#"<table:table-row table:number-rows-repeated="2"><table:table-cell/></table:table-row>"#;
    let trailing = r#"<table:table-row table:number-rows-repeated="1000"><table:table-cell table:number-columns-repeated="1024"/></table:table-row>"#;
    let xml = document(&table(
        "T",
        &[
            row(&[s("a")]),
            row(&[s("b")]),
            empty.to_string(),
            row(&[s("c")]),
            trailing.to_string(),
        ],
    ));
    let dataset = parse(&xml);
    let sheet = &dataset.sheets[0];
    assert_eq!(sheet.row_count(), 5);
    assert!(sheet.value(2, 0).unwrap().is_null());
    assert!(sheet.value(3, 0).unwrap().is_null());
    assert_eq!(sheet.value(4, 0).and_then(FieldValue::as_str), Some("c"));
    assert!(dataset.diagnostics.is_empty());
}

#[test]
fn huge_gap_aborts_sheet() {
    let wide = r#"<table:table-cell table:number-columns-repeated="100" office:value-type="string"><text:p>x</text:p></table:table-cell>"#;
    let gap = format!(
        r#"<table:table-row table:number-rows-repeated="5000">{}</table:table-row>"#,
        wide
    );
    let xml = document(&format!(
        "{}{}",
        table("Gap", &[row(&[s("a")]), row(&[s("b")]), gap]),
        table("After", &[row(&[s("c")])]),
    ));
    let dataset = parse(&xml);
    assert_eq!(dataset.sheet_names(), vec!["Gap", "After"]);
    assert_eq!(dataset.sheets[0].row_count(), 2);
    let errors: Vec<_> = dataset
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].sheet.as_deref(), Some("Gap"));
    assert!(errors[0].message.contains("too big gap"));
}

#[test]
fn repeated_content_ceiling_stops_parse() {
    let big = "y".repeat(4096);
    let cell = format!(
        r#"<table:table-cell table:number-columns-repeated="1000" office:value-type="string"><text:p>{}</text:p></table:table-cell>"#,
        big
    );
    let heavy = format!("<table:table-row>{}</table:table-row>", cell);
    let xml = document(&format!(
        "{}{}{}",
        table("Kept", &[row(&[s("a")])]),
        table("Heavy", &[heavy.clone(), heavy.clone(), heavy.clone()]),
        table("Never", &[row(&[s("z")])]),
    ));
    let dataset = parse(&xml);
    assert!(dataset.diagnostics.has_fatal());
    assert!(dataset.sheet_by_name("Kept").is_some());
    assert!(dataset.sheet_by_name("Never").is_none());
}

#[test]
fn large_unrepeated_sheet_is_not_budgeted() {
    // 12 MB of plain cells, more than the repeated-content ceiling
    let text = "v".repeat(1200);
    let line = row(&vec![s(&text); 100]);
    let rows = vec![line; 100];
    let xml = document(&format!("{}{}", table("Big", &rows), table("After", &[row(&[s("a")])])));
    let dataset = parse(&xml);
    assert!(dataset.diagnostics.is_empty(), "{:?}", dataset.diagnostics);
    assert_eq!(dataset.sheet_by_name("Big").map(|s| s.row_count()), Some(100));
    assert!(dataset.sheet_by_name("After").is_some());
}

#[test]
fn max_columns_truncates_with_warning() {
    let cell = r#"<table:table-cell table:number-columns-repeated="50" office:value-type="string"><text:p>v</text:p></table:table-cell>"#;
    let xml = document(&table("T", &[row(&[cell.to_string()])]));
    let options = OdsOptions::default().with_max_columns(10);
    let dataset = parse_content(xml.as_bytes(), &HashSet::new(), &options).unwrap();
    assert_eq!(dataset.sheets[0].column_count(), 10);
    assert_eq!(dataset.diagnostics.count(Severity::Warning), 1);
}

#[test]
fn covered_cells_hold_their_position() {
    let merged = r#"<table:table-cell table:number-columns-spanned="2" office:value-type="string"><text:p>wide</text:p></table:table-cell><table:covered-table-cell/>"#;
    let xml = document(&table(
        "T",
        &[row(&[merged.to_string(), s("after")]), row(&[s("a"), s("b"), s("c")])],
    ));
    let dataset = parse(&xml);
    let sheet = &dataset.sheets[0];
    assert_eq!(sheet.value(0, 0).and_then(FieldValue::as_str), Some("wide"));
    assert!(sheet.value(0, 1).unwrap().is_null());
    assert_eq!(sheet.value(0, 2).and_then(FieldValue::as_str), Some("after"));
}

#[test]
fn header_modes() {
    let xml = document(&table("T", &[row(&[s("Name")]), row(&[f("1")])]));
    let detected = parse(&xml);
    assert!(detected.sheets[0].has_header());

    let options = OdsOptions::default().with_header_mode(HeaderMode::Disable);
    let disabled = parse_content(xml.as_bytes(), &HashSet::new(), &options).unwrap();
    let sheet = &disabled.sheets[0];
    assert!(!sheet.has_header());
    assert_eq!(sheet.columns()[0].name, "Field1");
    assert_eq!(sheet.row_count(), 2);
    assert_eq!(types(sheet), vec![ColumnType::STRING]);
}

#[test]
fn empty_sheets_are_dropped() {
    let xml = document(&format!(
        "{}{}",
        table("Empty", &[]),
        table("Blank", &[r#"<table:table-row><table:table-cell/></table:table-row>"#.to_string()]),
    ));
    assert!(parse(&xml).is_empty());

    let blank = r#"<table:table-row><table:table-cell/></table:table-row>"#.to_string();
    let repeated = r#"<table:table-row table:number-rows-repeated="40"><table:table-cell table:number-columns-repeated="3"/></table:table-row>"#.to_string();
    let xml = document(&format!(
        "{}{}",
        table("Blanks", &[blank.clone(), blank.clone(), blank]),
        table("Filler", &[repeated]),
    ));
    assert!(parse(&xml).is_empty());
}

#[test]
fn custom_store_through_session() {
    let xml = document(&table("T", &[row(&[s("a")]), row(&[s("b")])]));
    let mut session: ParseSession<MemoryTable> = ParseSession::with_options(OdsOptions::default());
    let dataset = session.parse(xml.as_bytes()).unwrap();
    let store = dataset.sheets.into_iter().next().unwrap().into_store();
    assert_eq!(store.row_count(), 2);
    assert!(store.row_by_id(1).is_some());
}

#[test]
fn io_failure_is_an_error() {
    struct Failing;
    impl std::io::Read for Failing {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk gone"))
        }
    }
    let result = ParseSession::new(OdsOptions::default()).parse(Failing);
    assert!(matches!(result, Err(odstab::Error::Io(_))));
}
