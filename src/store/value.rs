//! Column types, typed field values and their text forms.

use crate::ods::datatype;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Abstract type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    String,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    Integer64,
    Real,
    Date,
    DateTime,
    Time,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::String => "String",
            FieldType::Integer => "Integer",
            FieldType::Integer64 => "Integer64",
            FieldType::Real => "Real",
            FieldType::Date => "Date",
            FieldType::DateTime => "DateTime",
            FieldType::Time => "Time",
        };
        f.write_str(s)
    }
}

/// Refinement of a [`FieldType`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldSubType {
    #[default]
    None,
    /// Integer column holding only 0/1 truth values
    Boolean,
}

/// A column's full type: base type plus subtype.
///
/// Column types form a join-semilattice with `String` on top:
///
/// ```text
///            String
///       /      |      \
///   Real   DateTime    (everything else)
///     |     /    \
/// Integer64 Date Time
///     |
///  Integer
///     |
///  Integer(Boolean)
/// ```
///
/// Widening a column is `current.join(observed)`, which never moves down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnType {
    pub field_type: FieldType,
    pub subtype: FieldSubType,
}

impl ColumnType {
    pub const STRING: ColumnType = ColumnType::new(FieldType::String);
    pub const INTEGER: ColumnType = ColumnType::new(FieldType::Integer);
    pub const INTEGER64: ColumnType = ColumnType::new(FieldType::Integer64);
    pub const REAL: ColumnType = ColumnType::new(FieldType::Real);
    pub const DATE: ColumnType = ColumnType::new(FieldType::Date);
    pub const DATETIME: ColumnType = ColumnType::new(FieldType::DateTime);
    pub const TIME: ColumnType = ColumnType::new(FieldType::Time);
    pub const BOOLEAN: ColumnType = ColumnType {
        field_type: FieldType::Integer,
        subtype: FieldSubType::Boolean,
    };

    pub const fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            subtype: FieldSubType::None,
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.subtype == FieldSubType::Boolean
    }

    /// Least type able to represent values of both `self` and `other`.
    ///
    /// Commutative, associative and idempotent; `String` is absorbing.
    pub fn join(self, other: ColumnType) -> ColumnType {
        use FieldType::*;

        if self == other {
            return self;
        }
        match (self.field_type, other.field_type) {
            // Same base type, different subtypes: only Integer has one.
            (Integer, Integer) => ColumnType::INTEGER,
            (Integer | Integer64, Integer | Integer64) => ColumnType::INTEGER64,
            (Integer | Integer64 | Real, Integer | Integer64 | Real) => ColumnType::REAL,
            (Date | Time | DateTime, Date | Time | DateTime) => ColumnType::DATETIME,
            _ => ColumnType::STRING,
        }
    }

    /// Whether `self` is at least as wide as `other`.
    pub fn covers(self, other: ColumnType) -> bool {
        self.join(other) == self
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subtype {
            FieldSubType::None => write!(f, "{}", self.field_type),
            FieldSubType::Boolean => write!(f, "{}(Boolean)", self.field_type),
        }
    }
}

/// Name and type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.column_type.field_type
    }
}

/// A typed value stored in one field of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i32),
    Integer64(i64),
    Real(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Convert raw cell text to a value of the given column type.
    ///
    /// Returns `None` when the text does not fit the type. Empty text is
    /// always `Null`.
    pub fn parse(text: &str, column_type: ColumnType) -> Option<FieldValue> {
        if text.is_empty() {
            return Some(FieldValue::Null);
        }
        let value = match column_type.field_type {
            FieldType::String => FieldValue::String(text.to_string()),
            FieldType::Integer => FieldValue::Integer(datatype::parse_integer(text)?.try_into().ok()?),
            FieldType::Integer64 => FieldValue::Integer64(datatype::parse_integer(text)?),
            FieldType::Real => FieldValue::Real(datatype::parse_real(text)?),
            FieldType::Date => FieldValue::Date(datatype::DateOdf::decode(text).ok()?),
            FieldType::DateTime => FieldValue::DateTime(datatype::DateTimeOdf::decode(text).ok()?),
            FieldType::Time => FieldValue::Time(datatype::TimeOdf::decode(text).ok()?),
        };
        Some(value)
    }

    /// Convert this value so it can live in a column of `target` type.
    ///
    /// Used when a column is widened after rows were already stored.
    pub fn convert(&self, target: ColumnType) -> Option<FieldValue> {
        let converted = match (self, target.field_type) {
            (FieldValue::Null, _) => FieldValue::Null,
            (value, FieldType::String) => FieldValue::String(value.to_text()),
            (FieldValue::Integer(v), FieldType::Integer) => FieldValue::Integer(*v),
            (FieldValue::Integer(v), FieldType::Integer64) => FieldValue::Integer64(i64::from(*v)),
            (FieldValue::Integer(v), FieldType::Real) => FieldValue::Real(f64::from(*v)),
            (FieldValue::Integer64(v), FieldType::Integer64) => FieldValue::Integer64(*v),
            (FieldValue::Integer64(v), FieldType::Real) => FieldValue::Real(*v as f64),
            (FieldValue::Real(v), FieldType::Real) => FieldValue::Real(*v),
            (FieldValue::Date(d), FieldType::Date) => FieldValue::Date(*d),
            (FieldValue::Date(d), FieldType::DateTime) => FieldValue::DateTime(d.and_time(NaiveTime::MIN)),
            (FieldValue::DateTime(dt), FieldType::DateTime) => FieldValue::DateTime(*dt),
            (FieldValue::Time(t), FieldType::Time) => FieldValue::Time(*t),
            _ => return None,
        };
        Some(converted)
    }

    /// Text form of the value, the inverse of [`FieldValue::parse`].
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Integer(v) => itoa::Buffer::new().format(*v).to_string(),
            FieldValue::Integer64(v) => itoa::Buffer::new().format(*v).to_string(),
            FieldValue::Real(v) => datatype::format_real(*v),
            FieldValue::String(s) => s.clone(),
            FieldValue::Date(d) => datatype::DateOdf::encode(d),
            FieldValue::DateTime(dt) => datatype::DateTimeOdf::encode(dt),
            FieldValue::Time(t) => datatype::TimeOdf::encode(t),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(f64::from(*v)),
            FieldValue::Integer64(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_column_type() -> impl Strategy<Value = ColumnType> {
        prop_oneof![
            Just(ColumnType::STRING),
            Just(ColumnType::INTEGER),
            Just(ColumnType::INTEGER64),
            Just(ColumnType::REAL),
            Just(ColumnType::DATE),
            Just(ColumnType::DATETIME),
            Just(ColumnType::TIME),
            Just(ColumnType::BOOLEAN),
        ]
    }

    #[test]
    fn test_join_rules() {
        assert_eq!(ColumnType::DATE.join(ColumnType::DATETIME), ColumnType::DATETIME);
        assert_eq!(ColumnType::TIME.join(ColumnType::DATETIME), ColumnType::DATETIME);
        assert_eq!(ColumnType::INTEGER.join(ColumnType::REAL), ColumnType::REAL);
        assert_eq!(ColumnType::INTEGER64.join(ColumnType::REAL), ColumnType::REAL);
        assert_eq!(ColumnType::INTEGER.join(ColumnType::INTEGER64), ColumnType::INTEGER64);
        assert_eq!(ColumnType::BOOLEAN.join(ColumnType::INTEGER), ColumnType::INTEGER);
        assert_eq!(ColumnType::BOOLEAN.join(ColumnType::REAL), ColumnType::REAL);
        assert_eq!(ColumnType::REAL.join(ColumnType::DATE), ColumnType::STRING);
        assert_eq!(ColumnType::STRING.join(ColumnType::INTEGER), ColumnType::STRING);
    }

    #[test]
    fn test_parse_and_text() {
        assert_eq!(FieldValue::parse("42", ColumnType::INTEGER), Some(FieldValue::Integer(42)));
        assert_eq!(FieldValue::parse("3000000000", ColumnType::INTEGER), None);
        assert_eq!(
            FieldValue::parse("3000000000", ColumnType::INTEGER64),
            Some(FieldValue::Integer64(3_000_000_000))
        );
        assert_eq!(FieldValue::parse("", ColumnType::REAL), Some(FieldValue::Null));
        assert_eq!(FieldValue::parse("abc", ColumnType::REAL), None);
        assert_eq!(FieldValue::Real(3.5).to_text(), "3.5");
        assert_eq!(FieldValue::Real(3.0).to_text(), "3");
    }

    #[test]
    fn test_convert_on_widening() {
        let d = FieldValue::parse("2024-01-31", ColumnType::DATE).unwrap();
        let dt = d.convert(ColumnType::DATETIME).unwrap();
        assert_eq!(dt.to_text(), "2024-01-31T00:00:00");
        assert_eq!(FieldValue::Integer(7).convert(ColumnType::REAL), Some(FieldValue::Real(7.0)));
        assert_eq!(
            FieldValue::Integer(7).convert(ColumnType::STRING),
            Some(FieldValue::String("7".to_string()))
        );
        let t = FieldValue::parse("12:30:00", ColumnType::TIME).unwrap();
        assert_eq!(t.convert(ColumnType::DATETIME), None);
    }

    proptest! {
        #[test]
        fn prop_join_commutative(a in any_column_type(), b in any_column_type()) {
            prop_assert_eq!(a.join(b), b.join(a));
        }

        #[test]
        fn prop_join_associative(
            a in any_column_type(),
            b in any_column_type(),
            c in any_column_type(),
        ) {
            prop_assert_eq!(a.join(b).join(c), a.join(b.join(c)));
        }

        #[test]
        fn prop_join_never_narrows(
            start in any_column_type(),
            seen in proptest::collection::vec(any_column_type(), 0..20),
        ) {
            let mut current = start;
            for observed in seen {
                let next = current.join(observed);
                prop_assert!(next.covers(current));
                prop_assert!(next.covers(observed));
                current = next;
            }
        }
    }
}
