//! Vendor date(time) normalization
//!
//! The vendor formats dates several ways (`01-JAN-20`, `20230724 15:25:33`,
//! `2023-06-27`). These helpers rewrite declared keys of a JSON object into
//! ISO-8601, which deserializes straight into `chrono::NaiveDate` /
//! `NaiveDateTime`. Empty strings become `null`.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Whether a key holds a calendar date or a full timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Date,
    DateTime,
}

/// chrono pattern plus the kind it yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormat {
    pub pattern: &'static str,
    pub kind: DateKind,
}

impl DateFormat {
    pub const fn date(pattern: &'static str) -> Self {
        Self {
            pattern,
            kind: DateKind::Date,
        }
    }

    pub const fn datetime(pattern: &'static str) -> Self {
        Self {
            pattern,
            kind: DateKind::DateTime,
        }
    }

    fn parse(&self, key: &str, raw: &str) -> Result<Value> {
        let error = |source| ClientError::DateFormat {
            key: key.to_string(),
            value: raw.to_string(),
            source,
        };
        let parsed = match self.kind {
            DateKind::Date => {
                serde_json::to_value(NaiveDate::parse_from_str(raw, self.pattern).map_err(error)?)
            }
            DateKind::DateTime => serde_json::to_value(
                NaiveDateTime::parse_from_str(raw, self.pattern).map_err(error)?,
            ),
        };
        Ok(parsed?)
    }
}

/// `01-JAN-20`
pub const ACCOUNT_DATE: DateFormat = DateFormat::date("%d-%b-%y");
/// `2023-06-27`
pub const ISO_DATE: DateFormat = DateFormat::date("%Y-%m-%d");
/// `20230724 15:25:33`
pub const COMPACT_DATETIME: DateFormat = DateFormat::datetime("%Y%m%d %H:%M:%S");

/// Key → expected format
pub type DateFormats = HashMap<&'static str, DateFormat>;

/// Build a format map from `(key, format)` pairs
pub fn formats(pairs: &[(&'static str, DateFormat)]) -> DateFormats {
    pairs.iter().copied().collect()
}

/// Parse the declared date(time) keys of `source` in place
///
/// Absent keys and `null` values are left alone, keys without a declared
/// format pass through unchanged.
pub fn parse_datetime_keys(
    mut source: Map<String, Value>,
    formats: &DateFormats,
) -> Result<Map<String, Value>> {
    for (key, format) in formats {
        let Some(value) = source.get_mut(*key) else {
            continue;
        };
        let parsed = match value {
            Value::String(raw) if raw.is_empty() => Value::Null,
            Value::String(raw) => format.parse(key, raw)?,
            _ => continue,
        };
        *value = parsed;
    }
    Ok(source)
}

/// [`parse_datetime_keys`] over each object of a list; other values pass through
pub fn parse_list_datetime_keys(source: Vec<Value>, formats: &DateFormats) -> Result<Vec<Value>> {
    source
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => parse_datetime_keys(map, formats).map(Value::Object),
            other => Ok(other),
        })
        .collect()
}

/// Apply [`parse_datetime_keys`] to a value that should be an object
pub(crate) fn parse_value(value: Value, formats: &DateFormats) -> Result<Value> {
    match value {
        Value::Object(map) => parse_datetime_keys(map, formats).map(Value::Object),
        Value::Array(items) => parse_list_datetime_keys(items, formats).map(Value::Array),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_format() {
        let source = object(json!({"a": "20230724 15:25:33", "b": "2023-06-27"}));
        let formats = formats(&[("a", COMPACT_DATETIME), ("b", ISO_DATE)]);

        let result = parse_datetime_keys(source, &formats).unwrap();

        let a: NaiveDateTime = serde_json::from_value(result["a"].clone()).unwrap();
        let b: NaiveDate = serde_json::from_value(result["b"].clone()).unwrap();
        assert_eq!(
            a,
            NaiveDate::from_ymd_opt(2023, 7, 24)
                .and_then(|d| d.and_hms_opt(15, 25, 33))
                .unwrap()
        );
        assert_eq!(b, NaiveDate::from_ymd_opt(2023, 6, 27).unwrap());
    }

    #[test]
    fn test_missing_in_source() {
        let result = parse_datetime_keys(Map::new(), &formats(&[("a", ISO_DATE)])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_passthrough() {
        let source = object(json!({"b": "2023-06-27"}));
        let result = parse_datetime_keys(source.clone(), &DateFormats::new()).unwrap();
        assert_eq!(result, source);
    }

    #[test]
    fn test_empty_value() {
        let source = object(json!({"a": "", "b": ""}));
        let result = parse_datetime_keys(source, &formats(&[("a", ISO_DATE)])).unwrap();
        assert_eq!(Value::Object(result), json!({"a": null, "b": ""}));
    }

    #[test]
    fn test_null_untouched() {
        let source = object(json!({"a": null}));
        let result = parse_datetime_keys(source, &formats(&[("a", ISO_DATE)])).unwrap();
        assert_eq!(Value::Object(result), json!({"a": null}));
    }

    #[test]
    fn test_account_date() {
        let source = object(json!({"first_login_app": "01-JAN-20"}));
        let result = parse_datetime_keys(source, &formats(&[("first_login_app", ACCOUNT_DATE)])).unwrap();
        assert_eq!(result["first_login_app"], json!("2020-01-01"));
    }

    #[test]
    fn test_unparsable_value() {
        let source = object(json!({"a": "yesterday"}));
        match parse_datetime_keys(source, &formats(&[("a", ISO_DATE)])) {
            Err(ClientError::DateFormat { key, value, .. }) => {
                assert_eq!(key, "a");
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_list() {
        let formats = formats(&[("a", COMPACT_DATETIME), ("b", ISO_DATE)]);
        let source = vec![
            json!({"a": ""}),
            json!({"b": "2023-06-27"}),
            json!({"a": "20230724 15:25:33"}),
        ];

        let result = parse_list_datetime_keys(source, &formats).unwrap();

        assert_eq!(
            result,
            vec![
                json!({"a": null}),
                json!({"b": "2023-06-27"}),
                json!({"a": "2023-07-24T15:25:33"}),
            ]
        );
    }
}
