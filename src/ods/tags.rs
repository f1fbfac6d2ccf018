//! Compile-time lookup of the element and attribute names the readers act on.
//!
//! Names are matched on their qualified byte form (`table:table-cell`) through
//! `phf` maps, so handlers dispatch on small enums instead of comparing
//! strings. Anything not listed is `Unknown` and ignored by the state machine.

use crate::common::{Error, Result};
use phf::{Map, phf_map};
use quick_xml::events::BytesStart;
use smallvec::SmallVec;
use std::borrow::Cow;

// ============================================================================
// ELEMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OdsTag {
    // content.xml
    Table,
    TableRow,
    TableCell,
    CoveredTableCell,
    TableHeaderRows,
    TableRowGroup,
    TextP,
    TextSpan,
    TextS,
    TextTab,
    TextLineBreak,

    // settings.xml
    ConfigItemMapNamed,
    ConfigItemMapEntry,
    ConfigItem,

    Unknown,
}

static TAG_MAP: Map<&'static [u8], OdsTag> = phf_map! {
    b"table:table" => OdsTag::Table,
    b"table:table-row" => OdsTag::TableRow,
    b"table:table-cell" => OdsTag::TableCell,
    b"table:covered-table-cell" => OdsTag::CoveredTableCell,
    b"table:table-header-rows" => OdsTag::TableHeaderRows,
    b"table:table-row-group" => OdsTag::TableRowGroup,
    b"text:p" => OdsTag::TextP,
    b"text:span" => OdsTag::TextSpan,
    b"text:s" => OdsTag::TextS,
    b"text:tab" => OdsTag::TextTab,
    b"text:line-break" => OdsTag::TextLineBreak,

    b"config:config-item-map-named" => OdsTag::ConfigItemMapNamed,
    b"config:config-item-map-entry" => OdsTag::ConfigItemMapEntry,
    b"config:config-item" => OdsTag::ConfigItem,
};

/// Match a qualified element name.
///
/// ```
/// use odstab::ods::tags::{match_tag, OdsTag};
/// assert_eq!(match_tag(b"table:table-cell"), OdsTag::TableCell);
/// assert_eq!(match_tag(b"draw:frame"), OdsTag::Unknown);
/// ```
#[inline(always)]
pub fn match_tag(tag: &[u8]) -> OdsTag {
    TAG_MAP.get(tag).copied().unwrap_or(OdsTag::Unknown)
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OdsAttr {
    TableName,
    NumberRowsRepeated,
    NumberColumnsRepeated,
    ValueType,
    Value,
    DateValue,
    TimeValue,
    BooleanValue,
    StringValue,
    Formula,
    TextC,
    ConfigName,
    Unknown,
}

static ATTR_MAP: Map<&'static [u8], OdsAttr> = phf_map! {
    b"table:name" => OdsAttr::TableName,
    b"table:number-rows-repeated" => OdsAttr::NumberRowsRepeated,
    b"table:number-columns-repeated" => OdsAttr::NumberColumnsRepeated,
    b"office:value-type" => OdsAttr::ValueType,
    b"office:value" => OdsAttr::Value,
    b"office:date-value" => OdsAttr::DateValue,
    b"office:time-value" => OdsAttr::TimeValue,
    b"office:boolean-value" => OdsAttr::BooleanValue,
    b"office:string-value" => OdsAttr::StringValue,
    b"table:formula" => OdsAttr::Formula,
    b"text:c" => OdsAttr::TextC,
    b"config:name" => OdsAttr::ConfigName,
};

#[inline(always)]
pub fn match_attr(name: &[u8]) -> OdsAttr {
    ATTR_MAP.get(name).copied().unwrap_or(OdsAttr::Unknown)
}

/// The known attributes of one start tag, unescaped.
///
/// Unknown attributes are skipped while collecting, so handlers only ever
/// see typed keys.
#[derive(Debug, Default, Clone)]
pub struct Attributes {
    entries: SmallVec<[(OdsAttr, String); 6]>,
}

impl Attributes {
    pub fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let mut entries = SmallVec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = match_attr(attr.key.as_ref());
            if key == OdsAttr::Unknown {
                continue;
            }
            entries.push((key, unescape_bytes(&attr.value)?.into_owned()));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: OdsAttr) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove and return a value, avoiding a copy.
    pub fn take(&mut self, key: OdsAttr) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unescape_bytes(raw: &[u8]) -> Result<Cow<'_, str>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| Error::XmlError(format!("attribute is not UTF-8: {}", e)))?;
    quick_xml::escape::unescape(text)
        .map_err(|e| Error::XmlError(format!("invalid escape in attribute: {}", e)))
}
