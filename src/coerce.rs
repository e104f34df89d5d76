//! Field Coercion
//!
//! Turns raw CSV text into typed property values. Blank and absent fields are
//! the same thing: numeric fields fall back to 0, dates to "no value", text to
//! the empty string. A non-empty numeric field that does not parse is an error.
//! Free text is stored exactly as read; only keys, numbers, dates and list
//! items are trimmed.

use crate::error::CoerceError;
use chrono::NaiveDate;
use tracing::debug;

const LIST_SEPARATOR: char = '|';
const DATE_FORMAT: &str = "%Y-%m-%d";

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_int(field: &'static str, raw: &str) -> Result<i64, CoerceError> {
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    // Accept "120.0" the way Cypher's toInteger does, truncating toward zero
    match raw.parse::<f64>().map(f64::trunc) {
        Ok(v) if v >= i64::MIN as f64 && v < i64::MAX as f64 => Ok(v as i64),
        _ => Err(CoerceError::InvalidNumber {
            field,
            expected: "integer",
            value: raw.to_string(),
        }),
    }
}

fn parse_float(field: &'static str, raw: &str) -> Result<f64, CoerceError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CoerceError::InvalidNumber {
            field,
            expected: "number",
            value: raw.to_string(),
        }),
    }
}

/// Key fields: must be present and integral.
pub fn required_int(field: &'static str, value: Option<&str>) -> Result<i64, CoerceError> {
    let raw = present(value).ok_or(CoerceError::MissingField(field))?;
    parse_int(field, raw)
}

pub fn int_or_zero(field: &'static str, value: Option<&str>) -> Result<i64, CoerceError> {
    present(value).map_or(Ok(0), |raw| parse_int(field, raw))
}

pub fn float_or_zero(field: &'static str, value: Option<&str>) -> Result<f64, CoerceError> {
    present(value).map_or(Ok(0.0), |raw| parse_float(field, raw))
}

pub fn optional_int(field: &'static str, value: Option<&str>) -> Result<Option<i64>, CoerceError> {
    present(value).map(|raw| parse_int(field, raw)).transpose()
}

/// ISO dates. Blank or unparseable yields `None`.
pub fn optional_date(field: &'static str, value: Option<&str>) -> Option<NaiveDate> {
    let raw = present(value)?;
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            debug!("Ignoring unparseable date in `{}` ({:?}): {}", field, raw, e);
            None
        }
    }
}

pub fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// `Comedy|Drama` style lists; blank items are dropped.
pub fn text_list(value: Option<&str>) -> Vec<String> {
    present(value)
        .map(|raw| {
            raw.split(LIST_SEPARATOR)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_int() {
        assert_eq!(required_int("movieId", Some("10")), Ok(10));
        assert_eq!(required_int("movieId", Some(" 42 ")), Ok(42));
        assert_eq!(required_int("movieId", None), Err(CoerceError::MissingField("movieId")));
        assert_eq!(required_int("movieId", Some("")), Err(CoerceError::MissingField("movieId")));
        assert!(matches!(
            required_int("movieId", Some("ten")),
            Err(CoerceError::InvalidNumber { field: "movieId", .. })
        ));
    }

    #[test]
    fn test_numeric_defaults_to_zero() {
        assert_eq!(int_or_zero("runtime", None), Ok(0));
        assert_eq!(int_or_zero("runtime", Some("  ")), Ok(0));
        assert_eq!(int_or_zero("runtime", Some("118")), Ok(118));
        assert_eq!(float_or_zero("budget", None), Ok(0.0));
        assert_eq!(float_or_zero("budget", Some("6.0E7")), Ok(60_000_000.0));
    }

    #[test]
    fn test_integer_accepts_float_text() {
        assert_eq!(int_or_zero("imdbVotes", Some("120.0")), Ok(120));
        assert_eq!(int_or_zero("year", Some("1995.9")), Ok(1995));
    }

    #[test]
    fn test_malformed_number_is_an_error() {
        assert!(float_or_zero("revenue", Some("lots")).is_err());
        assert!(float_or_zero("revenue", Some("NaN")).is_err());
        assert!(int_or_zero("runtime", Some("2h")).is_err());
    }

    #[test]
    fn test_integer_out_of_range_is_an_error() {
        assert!(matches!(
            int_or_zero("imdbVotes", Some("1e30")),
            Err(CoerceError::InvalidNumber { field: "imdbVotes", .. })
        ));
        assert!(int_or_zero("imdbVotes", Some("-1e19")).is_err());
        assert!(required_int("movieId", Some("inf")).is_err());
        assert_eq!(int_or_zero("imdbVotes", Some("9.2e5")), Ok(920_000));
    }

    #[test]
    fn test_optional_int() {
        assert_eq!(optional_int("movie_tmdbId", None), Ok(None));
        assert_eq!(optional_int("movie_tmdbId", Some("949")), Ok(Some(949)));
        assert!(optional_int("movie_tmdbId", Some("x")).is_err());
    }

    #[test]
    fn test_dates_fall_back_to_no_value() {
        assert_eq!(
            optional_date("born", Some("1956-07-09")),
            NaiveDate::from_ymd_opt(1956, 7, 9)
        );
        assert_eq!(optional_date("born", None), None);
        assert_eq!(optional_date("born", Some("")), None);
        assert_eq!(optional_date("died", Some("sometime in 1990")), None);
    }

    #[test]
    fn test_text_and_lists() {
        assert_eq!(text(None), "");
        assert_eq!(text(Some("Tom Hanks")), "Tom Hanks");
        assert_eq!(text(Some("  An ex-con plans one last job. ")), "  An ex-con plans one last job. ");
        assert_eq!(text_list(Some("Crime| Drama ||Thriller")), vec!["Crime", "Drama", "Thriller"]);
        assert!(text_list(None).is_empty());
        assert!(text_list(Some("")).is_empty());
    }
}
