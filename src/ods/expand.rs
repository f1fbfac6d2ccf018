//! Bounds on repeat-compressed rows and cells.
//!
//! `table:number-columns-repeated` and `table:number-rows-repeated` let a few
//! bytes of markup stand for millions of cells. Every repeat goes through the
//! checks here before anything is expanded.

use super::constants::{
    MAX_GAP_CELLS, MAX_GROWTH_CELLS, MAX_REPEAT, MIN_REPEAT_COST, REPEAT_MEMORY_CEILING,
};
use crate::common::StoreError;
use thiserror::Error;

/// A resource bound was hit while assembling a sheet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("invalid value for {attribute} = {value}")]
    InvalidRepeat { attribute: &'static str, value: String },

    #[error("too big gap with previous valid row ({fields} columns repeated {rows} times)")]
    TooBigGap { fields: u64, rows: u64 },

    #[error("repeated cell content too large ({cost} bytes)")]
    CellTooLarge { cost: u64 },

    #[error("too much repeated content in document ({total} bytes)")]
    MemoryExhausted { total: u64 },

    #[error("too many columns ({new_columns}) added for {existing_rows} existing rows")]
    TooManyColumns { new_columns: u64, existing_rows: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LimitError {
    /// Whether the whole parse must stop, not just the current sheet.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LimitError::MemoryExhausted { .. })
    }
}

/// Read a repeat attribute; absent means 1.
///
/// ```
/// use odstab::ods::expand::parse_repeat;
///
/// assert_eq!(parse_repeat(None, "table:number-columns-repeated"), Ok(1));
/// assert_eq!(parse_repeat(Some("3"), "table:number-columns-repeated"), Ok(3));
/// assert!(parse_repeat(Some("0"), "table:number-columns-repeated").is_err());
/// assert!(parse_repeat(Some("10001"), "table:number-rows-repeated").is_err());
/// ```
pub fn parse_repeat(value: Option<&str>, attribute: &'static str) -> Result<u64, LimitError> {
    let Some(value) = value else {
        return Ok(1);
    };
    match atoi_simd::parse_skipped::<i64>(value.trim().as_bytes()) {
        Ok(n) if (1..=MAX_REPEAT).contains(&n) => Ok(n as u64),
        _ => Err(LimitError::InvalidRepeat {
            attribute,
            value: value.to_string(),
        }),
    }
}

/// Reject a row of `fields` columns repeated `rows` times when it would
/// stand for more than 100,000 cells.
pub fn check_gap(fields: u64, rows: u64) -> Result<(), LimitError> {
    if fields > 0 && rows > MAX_GAP_CELLS / fields {
        return Err(LimitError::TooBigGap { fields, rows });
    }
    Ok(())
}

/// Reject schema growth of `new_columns` over `existing_rows` already stored.
pub fn check_growth(new_columns: u64, existing_rows: u64) -> Result<(), LimitError> {
    if existing_rows > 0 && new_columns > MAX_GROWTH_CELLS / existing_rows {
        return Err(LimitError::TooManyColumns {
            new_columns,
            existing_rows,
        });
    }
    Ok(())
}

/// Running cost of repeated content across one document parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeatBudget {
    total: u64,
}

impl RepeatBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Charge one cell of `len` bytes repeated `cells` times inside a row
    /// repeated `rows` times.
    ///
    /// A cell that stands for itself only costs nothing. A single cell over
    /// the ceiling is [`LimitError::CellTooLarge`]; the document total over
    /// the ceiling is [`LimitError::MemoryExhausted`].
    pub fn charge(&mut self, len: usize, cells: u64, rows: u64) -> Result<(), LimitError> {
        if cells <= 1 && rows <= 1 {
            return Ok(());
        }
        let cost = (len as u64)
            .max(MIN_REPEAT_COST)
            .saturating_mul(cells.max(1))
            .saturating_mul(rows.max(1));
        if cost > REPEAT_MEMORY_CEILING {
            return Err(LimitError::CellTooLarge { cost });
        }
        self.total = self.total.saturating_add(cost);
        if self.total > REPEAT_MEMORY_CEILING {
            return Err(LimitError::MemoryExhausted { total: self.total });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeat_rejects_garbage() {
        let attr = "table:number-columns-repeated";
        assert!(parse_repeat(Some("-2"), attr).is_err());
        assert!(parse_repeat(Some("many"), attr).is_err());
        assert_eq!(parse_repeat(Some("10000"), attr), Ok(10_000));
    }

    #[test]
    fn test_gap() {
        assert!(check_gap(0, 10_000).is_ok());
        assert!(check_gap(10, 10_000).is_ok());
        assert_eq!(
            check_gap(11, 10_000),
            Err(LimitError::TooBigGap { fields: 11, rows: 10_000 })
        );
    }

    #[test]
    fn test_growth() {
        assert!(check_growth(5_000, 0).is_ok());
        assert!(check_growth(100, 1_000).is_ok());
        assert!(check_growth(101, 1_000).is_err());
    }

    #[test]
    fn test_budget_minimum_cost() {
        let mut budget = RepeatBudget::new();
        budget.charge(1, 2, 1).unwrap();
        assert_eq!(budget.total(), 2 * MIN_REPEAT_COST);
        budget.charge(100, 2, 3).unwrap();
        assert_eq!(budget.total(), 2 * MIN_REPEAT_COST + 600);
    }

    #[test]
    fn test_budget_ignores_unrepeated_cells() {
        let mut budget = RepeatBudget::new();
        for _ in 0..1_000_000 {
            budget.charge(64, 1, 1).unwrap();
        }
        assert_eq!(budget.total(), 0);
        budget.charge(1, 1, 2).unwrap();
        assert_eq!(budget.total(), 2 * MIN_REPEAT_COST);
    }

    #[test]
    fn test_budget_ceilings() {
        let mut budget = RepeatBudget::new();
        let err = budget.charge(2 * 1024 * 1024, 10, 1).unwrap_err();
        assert!(matches!(err, LimitError::CellTooLarge { .. }));
        assert!(!err.is_fatal());
        assert_eq!(budget.total(), 0);

        // 1 MiB per charge: the eleventh one crosses 10 MiB
        for _ in 0..10 {
            budget.charge(1024, 1024, 1).unwrap();
        }
        let err = budget.charge(1024, 1024, 1).unwrap_err();
        assert!(err.is_fatal());
    }
}
