//! Column type inference from declared cell kinds.

use super::datatype::{self, DateOdf};
use crate::store::ColumnType;
use std::fmt;

/// Declared kind of a cell (`office:value-type`), plus `Formula` for cells
/// whose value is an unresolved formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Float,
    Currency,
    Percentage,
    Date,
    Time,
    Bool,
    Formula,
    /// A value type this reader does not know
    Other,
}

impl ValueKind {
    /// Parse an `office:value-type` value; ODF's `boolean` is read as `Bool`.
    pub fn parse(value_type: &str) -> ValueKind {
        match value_type {
            "string" => ValueKind::String,
            "float" => ValueKind::Float,
            "currency" => ValueKind::Currency,
            "percentage" => ValueKind::Percentage,
            "date" => ValueKind::Date,
            "time" => ValueKind::Time,
            "bool" | "boolean" => ValueKind::Bool,
            _ => ValueKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Float => "float",
            ValueKind::Currency => "currency",
            ValueKind::Percentage => "percentage",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::Bool => "bool",
            ValueKind::Formula => "formula",
            ValueKind::Other => "other",
        }
    }

    #[inline]
    pub fn is_string(kind: Option<ValueKind>) -> bool {
        kind == Some(ValueKind::String)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column type a value of this declared kind calls for.
///
/// # Examples
///
/// ```
/// use odstab::ods::inference::{infer_type, ValueKind};
/// use odstab::store::ColumnType;
///
/// assert_eq!(infer_type("42", Some(ValueKind::Float), true), ColumnType::INTEGER);
/// assert_eq!(infer_type("4294967296", Some(ValueKind::Float), true), ColumnType::INTEGER64);
/// assert_eq!(infer_type("3.14", Some(ValueKind::Float), true), ColumnType::REAL);
/// assert_eq!(infer_type("42", Some(ValueKind::Float), false), ColumnType::STRING);
/// assert_eq!(infer_type("42", None, true), ColumnType::STRING);
/// ```
pub fn infer_type(value: &str, kind: Option<ValueKind>, autodetect: bool) -> ColumnType {
    let Some(kind) = kind.filter(|_| autodetect) else {
        return ColumnType::STRING;
    };
    match kind {
        ValueKind::Float | ValueKind::Currency => {
            if let Some(v) = datatype::parse_integer(value) {
                if datatype::fits_i32(v) {
                    ColumnType::INTEGER
                } else {
                    ColumnType::INTEGER64
                }
            } else if datatype::parse_real(value).is_some() {
                ColumnType::REAL
            } else {
                ColumnType::STRING
            }
        },
        ValueKind::Percentage => ColumnType::REAL,
        ValueKind::Date if value.len() == DateOdf::TEXT_LEN => ColumnType::DATE,
        ValueKind::Date => ColumnType::DATETIME,
        ValueKind::Time => ColumnType::TIME,
        ValueKind::Bool => ColumnType::BOOLEAN,
        ValueKind::String | ValueKind::Formula | ValueKind::Other => ColumnType::STRING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(ValueKind::parse("boolean"), ValueKind::Bool);
        assert_eq!(ValueKind::parse("bool"), ValueKind::Bool);
        assert_eq!(ValueKind::parse("void"), ValueKind::Other);
    }

    #[test]
    fn test_infer_temporal() {
        assert_eq!(infer_type("2024-01-31", Some(ValueKind::Date), true), ColumnType::DATE);
        assert_eq!(
            infer_type("2024-01-31T10:00:00", Some(ValueKind::Date), true),
            ColumnType::DATETIME
        );
        assert_eq!(infer_type("10:00:00", Some(ValueKind::Time), true), ColumnType::TIME);
    }

    #[test]
    fn test_infer_other_kinds() {
        assert_eq!(infer_type("1", Some(ValueKind::Bool), true), ColumnType::BOOLEAN);
        assert_eq!(infer_type("0.25", Some(ValueKind::Percentage), true), ColumnType::REAL);
        assert_eq!(infer_type("12 EUR", Some(ValueKind::Currency), true), ColumnType::STRING);
        assert_eq!(infer_type("of:=A1", Some(ValueKind::Formula), true), ColumnType::STRING);
    }
}
