//! Write then read back: column types, row counts and values survive.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use odstab::ods::{OdsOptions, Sheet, Spreadsheet, SpreadsheetWriter, parse_content, write_content_xml};
use odstab::store::{ColumnDef, ColumnType, FeatureStore, FieldValue, MemoryTable};

fn typed_sheet() -> Sheet {
    let mut store = MemoryTable::new();
    for (name, ty) in [
        ("id", ColumnType::INTEGER),
        ("big", ColumnType::INTEGER64),
        ("score", ColumnType::REAL),
        ("active", ColumnType::BOOLEAN),
        ("born", ColumnType::DATE),
        ("seen", ColumnType::DATETIME),
        ("alarm", ColumnType::TIME),
        ("note", ColumnType::STRING),
    ] {
        store.create_column(ColumnDef::new(name, ty)).unwrap();
    }

    let date = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();
    store
        .append_row(vec![
            FieldValue::Integer(1),
            FieldValue::Integer64(5_000_000_000),
            FieldValue::Real(2.0),
            FieldValue::Integer(1),
            FieldValue::Date(date),
            FieldValue::DateTime(date.and_hms_opt(8, 30, 0).unwrap()),
            FieldValue::Time(NaiveTime::from_hms_opt(6, 45, 0).unwrap()),
            FieldValue::String("two  spaces & <tags>\nsecond line".into()),
        ])
        .unwrap();
    store
        .append_row(vec![
            FieldValue::Integer(2),
            FieldValue::Null,
            FieldValue::Real(0.125),
            FieldValue::Integer(0),
            FieldValue::Null,
            FieldValue::Null,
            FieldValue::Null,
            FieldValue::Null,
        ])
        .unwrap();
    store
        .append_row(vec![
            FieldValue::Integer(3),
            FieldValue::Integer64(-7_000_000_000),
            FieldValue::Real(-1.5),
            FieldValue::Integer(1),
            FieldValue::Date(date),
            FieldValue::DateTime(date.and_hms_opt(23, 59, 59).unwrap()),
            FieldValue::Time(NaiveTime::from_hms_opt(0, 0, 1).unwrap()),
            FieldValue::String("\tlead".into()),
        ])
        .unwrap();
    Sheet::new("Typed", true, store)
}

fn assert_same(original: &Sheet, read: &Sheet) {
    assert_eq!(read.name(), original.name());
    assert_eq!(read.has_header(), original.has_header());
    assert_eq!(read.columns(), original.columns());
    assert_eq!(read.row_count(), original.row_count());
    for (a, b) in original.rows().zip(read.rows()) {
        assert_eq!(a.values, b.values);
    }
}

#[test]
fn content_roundtrip_keeps_types_and_values() {
    let original = typed_sheet();
    let xml = write_content_xml(std::slice::from_ref(&original));
    let dataset = parse_content(xml.as_bytes(), &HashSet::new(), &OdsOptions::default()).unwrap();
    assert!(dataset.diagnostics.is_empty(), "{:?}", dataset.diagnostics);
    assert_same(&original, &dataset.sheets[0]);
}

#[test]
fn package_roundtrip_through_file() {
    let original = typed_sheet();
    let mut plain = MemoryTable::new();
    plain.create_column(ColumnDef::new("Field1", ColumnType::STRING)).unwrap();
    plain.create_column(ColumnDef::new("Field2", ColumnType::STRING)).unwrap();
    plain
        .append_row(vec![FieldValue::String("x".into()), FieldValue::String("y".into())])
        .unwrap();
    plain
        .append_row(vec![FieldValue::String("w".into()), FieldValue::String("z".into())])
        .unwrap();
    let plain = Sheet::new("Plain", false, plain);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.ods");
    odstab::ods::package::save(&path, &[typed_sheet(), plain.clone()]).unwrap();

    let read = Spreadsheet::open(&path).unwrap();
    assert!(read.diagnostics().is_empty());
    assert_eq!(read.dataset().sheet_names(), vec!["Typed", "Plain"]);
    assert_same(&original, read.sheet_by_name("Typed").unwrap());
    assert_same(&plain, read.sheet_by_name("Plain").unwrap());
}

#[test]
fn unresolved_formula_text_roundtrips() {
    let mut store = MemoryTable::new();
    store.create_column(ColumnDef::new("Field1", ColumnType::STRING)).unwrap();
    store
        .append_row(vec![FieldValue::String("of:=[.A1]".into())])
        .unwrap();
    let sheet = Sheet::new("Loop", false, store);

    let mut writer = SpreadsheetWriter::new();
    writer.add_sheets(std::slice::from_ref(&sheet));
    let bytes = writer.finish_to_bytes().unwrap();

    let options = OdsOptions::default().with_resolve_formulas(false);
    let read = Spreadsheet::from_reader(std::io::Cursor::new(bytes), &options).unwrap();
    assert_same(&sheet, &read.sheets()[0]);
}

#[test]
fn fractional_seconds_survive() {
    let mut store = MemoryTable::new();
    store.create_column(ColumnDef::new("Field1", ColumnType::TIME)).unwrap();
    for millis in [500, 250] {
        store
            .append_row(vec![FieldValue::Time(
                NaiveTime::from_hms_milli_opt(1, 2, 3, millis).unwrap(),
            )])
            .unwrap();
    }
    let original = Sheet::new("Laps", false, store);

    let xml = write_content_xml(std::slice::from_ref(&original));
    assert!(xml.contains(r#"office:time-value="PT01H02M03.500S""#));
    let dataset = parse_content(xml.as_bytes(), &HashSet::new(), &OdsOptions::default()).unwrap();
    assert_same(&original, &dataset.sheets[0]);
}
