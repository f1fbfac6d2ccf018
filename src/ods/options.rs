//! Reader configuration.

use super::constants::{DEFAULT_MAX_COLUMNS, MAX_COLUMNS_CEILING};
use crate::common::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the first row of each sheet is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderMode {
    /// Decide per sheet from cell kinds and split hints
    #[default]
    Auto,
    /// Always treat the first row as column names
    Force,
    /// Never treat the first row as column names
    Disable,
}

impl FromStr for HeaderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AUTO" => Ok(HeaderMode::Auto),
            "FORCE" => Ok(HeaderMode::Force),
            "DISABLE" => Ok(HeaderMode::Disable),
            _ => Err(Error::Other(format!("unknown header mode '{}'", s))),
        }
    }
}

/// Options controlling how a spreadsheet becomes tables.
///
/// # Examples
///
/// ```
/// use odstab::ods::{HeaderMode, OdsOptions};
///
/// let options = OdsOptions::default()
///     .with_header_mode(HeaderMode::Force)
///     .with_max_columns(50);
/// assert!(options.autodetect_types);
/// assert_eq!(options.effective_max_columns(), 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdsOptions {
    /// Infer column types from cell value kinds; when off every column is a string.
    pub autodetect_types: bool,
    pub header_mode: HeaderMode,
    /// Cells past this column are dropped (clamped to 1,000,000).
    pub max_columns: usize,
    /// Evaluate `of:=` formulas once a sheet is complete.
    pub resolve_formulas: bool,
}

impl Default for OdsOptions {
    fn default() -> Self {
        Self {
            autodetect_types: true,
            header_mode: HeaderMode::Auto,
            max_columns: DEFAULT_MAX_COLUMNS,
            resolve_formulas: true,
        }
    }
}

impl OdsOptions {
    pub fn with_autodetect_types(mut self, autodetect: bool) -> Self {
        self.autodetect_types = autodetect;
        self
    }

    pub fn with_header_mode(mut self, mode: HeaderMode) -> Self {
        self.header_mode = mode;
        self
    }

    pub fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = max_columns;
        self
    }

    pub fn with_resolve_formulas(mut self, resolve: bool) -> Self {
        self.resolve_formulas = resolve;
        self
    }

    /// Column cap actually applied.
    pub fn effective_max_columns(&self) -> usize {
        self.max_columns.min(MAX_COLUMNS_CEILING)
    }

    /// Defaults overridden from the process environment.
    ///
    /// - `ODS_FIELD_TYPES`: `AUTO` (default) or `STRING`
    /// - `ODS_HEADERS`: `AUTO`, `FORCE` or `DISABLE`
    /// - `ODS_MAX_FIELD_COUNT`: positive integer
    ///
    /// Unrecognized values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(types) = lookup("ODS_FIELD_TYPES") {
            options.autodetect_types = !types.eq_ignore_ascii_case("STRING");
        }
        if let Some(headers) = lookup("ODS_HEADERS") {
            match headers.parse() {
                Ok(mode) => options.header_mode = mode,
                Err(e) => tracing::warn!("ignoring ODS_HEADERS: {}", e),
            }
        }
        if let Some(max) = lookup("ODS_MAX_FIELD_COUNT") {
            match max.trim().parse::<usize>() {
                Ok(n) if n > 0 => options.max_columns = n,
                _ => tracing::warn!("ignoring ODS_MAX_FIELD_COUNT '{}'", max),
            }
        }
        options
    }
}
