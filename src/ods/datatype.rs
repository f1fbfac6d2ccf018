//! ODF data type conversions (numbers, dates, date-times, times, durations).
//!
//! This module provides conversion utilities between the text forms found in
//! ODF cell attributes and Rust native types. Everything here is total: a
//! failed conversion is `Err`/`None`, never a panic.

use crate::common::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

// ============================================================================
// NUMBERS
// ============================================================================

/// Parse an integer written in plain decimal notation.
#[inline]
pub fn parse_integer(text: &str) -> Option<i64> {
    atoi_simd::parse_skipped::<i64>(text.as_bytes()).ok()
}

/// Parse a finite real number; the whole text must be consumed.
#[inline]
pub fn parse_real(text: &str) -> Option<f64> {
    fast_float2::parse::<f64, _>(text)
        .ok()
        .filter(|v| v.is_finite())
}

/// Whether an integer fits the 32-bit signed range.
#[inline]
pub fn fits_i32(value: i64) -> bool {
    i32::try_from(value).is_ok()
}

/// Shortest text form of a real; whole numbers drop the fractional part.
pub fn format_real(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        itoa::Buffer::new().format(value as i64).to_string()
    } else {
        ryu::Buffer::new().format(value).to_string()
    }
}

/// Text form of a real that keeps it recognizably non-integral (`3.0`).
///
/// Used for `office:value` so a real column stays real when read back.
pub fn format_real_value(value: f64) -> String {
    ryu::Buffer::new().format(value).to_string()
}

// ============================================================================
// BOOLEAN CONVERSION
// ============================================================================

/// Boolean data type conversion utilities
///
/// Converts between ODF boolean format ("true"/"false") and Rust bool.
pub struct Boolean;

impl Boolean {
    /// Decode ODF boolean string to Rust bool
    ///
    /// ```
    /// use odstab::ods::datatype::Boolean;
    ///
    /// assert_eq!(Boolean::decode("true").unwrap(), true);
    /// assert_eq!(Boolean::decode("false").unwrap(), false);
    /// assert!(Boolean::decode("invalid").is_err());
    /// ```
    pub fn decode(data: &str) -> Result<bool> {
        match data {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(Error::Other(format!(
                "boolean '{}' is invalid, expected 'true' or 'false'",
                data
            ))),
        }
    }

    /// Stored form of a truth value in a boolean-subtyped integer column.
    #[inline]
    pub fn as_digit(value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }
}

// ============================================================================
// DATE CONVERSION
// ============================================================================

/// Date data type conversion utilities
///
/// Converts between ODF date format (ISO 8601: "YYYY-MM-DD") and chrono::NaiveDate.
pub struct DateOdf;

impl DateOdf {
    /// Length of a date-only `office:date-value`.
    pub const TEXT_LEN: usize = 10;

    /// Decode ODF date string to chrono::NaiveDate
    ///
    /// ```
    /// use odstab::ods::datatype::DateOdf;
    /// use chrono::NaiveDate;
    ///
    /// let date = DateOdf::decode("2024-01-31").unwrap();
    /// assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    /// ```
    pub fn decode(data: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(data, "%Y-%m-%d")
            .map_err(|e| Error::Other(format!("Failed to parse ODF date '{}': {}", data, e)))
    }

    #[inline]
    pub fn encode(value: &NaiveDate) -> String {
        value.format("%Y-%m-%d").to_string()
    }
}

// ============================================================================
// DATETIME CONVERSION
// ============================================================================

/// DateTime data type conversion utilities
///
/// ODF date-values carry no time zone in practice; values with an offset are
/// reduced to their local wall-clock time.
pub struct DateTimeOdf;

impl DateTimeOdf {
    /// Decode ODF datetime string to chrono::NaiveDateTime
    ///
    /// A bare date decodes to midnight.
    ///
    /// ```
    /// use odstab::ods::datatype::DateTimeOdf;
    ///
    /// assert!(DateTimeOdf::decode("2024-01-31T15:30:00").is_ok());
    /// assert!(DateTimeOdf::decode("2024-01-31T15:30:00.250").is_ok());
    /// assert!(DateTimeOdf::decode("2024-01-31T15:30:00+01:00").is_ok());
    /// assert!(DateTimeOdf::decode("2024-01-31").is_ok());
    /// ```
    pub fn decode(data: &str) -> Result<NaiveDateTime> {
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(data, format) {
                return Ok(dt);
            }
        }

        // Handle 'Z' suffix and explicit offsets
        if let Ok(dt) = DateTime::parse_from_rfc3339(data) {
            return Ok(dt.naive_local());
        }

        if data.len() == DateOdf::TEXT_LEN {
            return DateOdf::decode(data).map(|d| d.and_time(NaiveTime::MIN));
        }

        Err(Error::Other(format!("Failed to parse ODF datetime '{}'", data)))
    }

    #[inline]
    pub fn encode(value: &NaiveDateTime) -> String {
        value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }
}

// ============================================================================
// TIME CONVERSION
// ============================================================================

/// Time-of-day conversion utilities (`HH:MM:SS`).
pub struct TimeOdf;

impl TimeOdf {
    pub fn decode(data: &str) -> Result<NaiveTime> {
        for format in ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"] {
            if let Ok(t) = NaiveTime::parse_from_str(data, format) {
                return Ok(t);
            }
        }
        Err(Error::Other(format!("Failed to parse time '{}'", data)))
    }

    /// `HH:MM:SS`, with fractional seconds only when there are some.
    #[inline]
    pub fn encode(value: &NaiveTime) -> String {
        value.format("%H:%M:%S%.f").to_string()
    }
}

// ============================================================================
// DURATION CONVERSION
// ============================================================================

/// `office:time-value` conversion utilities.
///
/// Spreadsheet time cells store an ISO 8601 duration ("PT12H30M00S"); the
/// table keeps them as a clock time "12:30:00".
pub struct DurationOdf;

impl DurationOdf {
    /// Normalize an ISO 8601 duration to `HH:MM:SS[.fff]`.
    ///
    /// Day components are folded into hours; hours past 23 are kept as-is,
    /// so such values no longer decode as a [`TimeOdf`].
    ///
    /// ```
    /// use odstab::ods::datatype::DurationOdf;
    ///
    /// assert_eq!(DurationOdf::to_clock("PT12H30M00S").unwrap(), "12:30:00");
    /// assert_eq!(DurationOdf::to_clock("PT1H2M3.5S").unwrap(), "01:02:03.5");
    /// assert!(DurationOdf::to_clock("12:30").is_err());
    /// ```
    pub fn to_clock(data: &str) -> Result<String> {
        let data = data.strip_prefix('-').unwrap_or(data);
        let body = data.strip_prefix('P').ok_or_else(|| {
            Error::Other(format!("Invalid duration format '{}', must start with 'P'", data))
        })?;

        let mut days = 0u64;
        let mut hours = 0u64;
        let mut minutes = 0u64;
        let mut seconds = 0u64;
        let mut fraction = String::new();

        let mut buffer = String::new();
        let mut in_time = false;
        for c in body.chars() {
            match c {
                '0'..='9' => buffer.push(c),
                '.' | ',' if in_time => {
                    seconds = Self::component(&buffer, "seconds")?;
                    buffer.clear();
                    fraction.push('.');
                },
                'D' if !in_time => {
                    days = Self::component(&buffer, "days")?;
                    buffer.clear();
                },
                'T' => in_time = true,
                'H' if in_time => {
                    hours = Self::component(&buffer, "hours")?;
                    buffer.clear();
                },
                'M' if in_time => {
                    minutes = Self::component(&buffer, "minutes")?;
                    buffer.clear();
                },
                'S' if in_time => {
                    if fraction.is_empty() {
                        seconds = Self::component(&buffer, "seconds")?;
                    } else {
                        fraction.push_str(&buffer);
                    }
                    buffer.clear();
                },
                _ => {
                    return Err(Error::Other(format!(
                        "Invalid character '{}' in duration '{}'",
                        c, data
                    )));
                },
            }
        }

        let hours = days.saturating_mul(24).saturating_add(hours);
        let fraction = if fraction.len() > 1 { fraction } else { String::new() };
        Ok(format!("{:02}:{:02}:{:02}{}", hours, minutes, seconds, fraction))
    }

    /// Encode a clock time as an ODF duration.
    ///
    /// ```
    /// use odstab::ods::datatype::DurationOdf;
    /// use chrono::NaiveTime;
    ///
    /// let t = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
    /// assert_eq!(DurationOdf::from_time(&t), "PT09H05M00S");
    /// let t = NaiveTime::from_hms_milli_opt(1, 2, 3, 500).unwrap();
    /// assert_eq!(DurationOdf::from_time(&t), "PT01H02M03.500S");
    /// ```
    pub fn from_time(value: &NaiveTime) -> String {
        format!(
            "PT{:02}H{:02}M{:02}{}S",
            value.hour(),
            value.minute(),
            value.second(),
            value.format("%.f")
        )
    }

    fn component(buffer: &str, what: &str) -> Result<u64> {
        if buffer.is_empty() {
            return Ok(0);
        }
        buffer
            .parse()
            .map_err(|_| Error::Other(format!("Invalid {} in duration", what)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("-17"), Some(-17));
        assert_eq!(parse_integer("3.14"), None);
        assert_eq!(parse_integer(""), None);
        assert!(fits_i32(2_147_483_647));
        assert!(!fits_i32(2_147_483_648));
    }

    #[test]
    fn test_parse_real() {
        assert_eq!(parse_real("3.14"), Some(3.14));
        assert_eq!(parse_real("1e3"), Some(1000.0));
        assert_eq!(parse_real("12abc"), None);
        assert_eq!(parse_real("inf"), None);
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(2.0), "2");
        assert_eq!(format_real(-0.5), "-0.5");
        assert_eq!(format_real_value(2.0), "2.0");
    }

    #[test]
    fn test_datetime_forms() {
        let dt = DateTimeOdf::decode("2024-01-31T15:30:00").unwrap();
        assert_eq!(DateTimeOdf::encode(&dt), "2024-01-31T15:30:00");

        let midnight = DateTimeOdf::decode("2024-01-31").unwrap();
        assert_eq!(DateTimeOdf::encode(&midnight), "2024-01-31T00:00:00");

        assert!(DateTimeOdf::decode("yesterday").is_err());
    }

    #[test]
    fn test_time_forms() {
        let t = TimeOdf::decode("07:45:10").unwrap();
        assert_eq!(TimeOdf::encode(&t), "07:45:10");
        let t = TimeOdf::decode("01:02:03.5").unwrap();
        assert_eq!(TimeOdf::encode(&t), "01:02:03.500");
        assert!(TimeOdf::decode("25:00:00").is_err());
    }

    #[test]
    fn test_duration_to_clock() {
        assert_eq!(DurationOdf::to_clock("PT00H00M01S").unwrap(), "00:00:01");
        assert_eq!(DurationOdf::to_clock("P1DT2H").unwrap(), "26:00:00");
        assert!(DurationOdf::to_clock("PT1X").is_err());

        // fractional seconds survive clock -> duration -> clock
        let clock = DurationOdf::to_clock("PT1H2M3.5S").unwrap();
        let t = TimeOdf::decode(&clock).unwrap();
        let back = DurationOdf::to_clock(&DurationOdf::from_time(&t)).unwrap();
        assert_eq!(TimeOdf::decode(&back).unwrap(), t);
    }
}
