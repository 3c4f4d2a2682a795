//! Typed front matter values.
//!
//! YAML is dynamically typed; notes are not. Every front matter value is
//! converted into the closed [`FieldValue`] type, which keeps mapping key
//! order and recognizes ISO dates and timestamps.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_yaml::Value;
use std::cmp::Ordering;
use std::fmt;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A front matter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// A calendar date (`2024-01-05`).
    Date(NaiveDate),
    /// A point in time (`2024-01-05T10:00:00+02:00`, `2024-01-05 10:00`).
    DateTime(DateTime<FixedOffset>),
    Sequence(Vec<FieldValue>),
    /// Key/value pairs in document order.
    Mapping(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Convert a parsed YAML value.
    pub fn from_yaml(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::from_scalar_str(s),
            Value::Sequence(items) => {
                FieldValue::Sequence(items.iter().map(Self::from_yaml).collect())
            }
            Value::Mapping(map) => FieldValue::Mapping(
                map.iter()
                    .map(|(k, v)| (yaml_key_to_string(k), Self::from_yaml(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
        }
    }

    /// Interpret a string scalar, recognizing dates and timestamps.
    pub fn from_scalar_str(s: &str) -> Self {
        if let Some(date) = parse_date(s) {
            return FieldValue::Date(date);
        }
        if let Some(dt) = parse_datetime(s) {
            return FieldValue::DateTime(dt);
        }
        FieldValue::String(s.to_string())
    }

    /// Convert back to YAML for writing.
    pub fn to_yaml(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::Number((*i).into()),
            FieldValue::Float(f) => Value::Number((*f).into()),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            FieldValue::Sequence(items) => {
                Value::Sequence(items.iter().map(FieldValue::to_yaml).collect())
            }
            FieldValue::Mapping(entries) => Value::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.to_yaml()))
                    .collect(),
            ),
        }
    }

    /// Name of the variant, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) | FieldValue::Float(_) => "number",
            FieldValue::String(_) => "string",
            FieldValue::Date(_) | FieldValue::DateTime(_) => "date",
            FieldValue::Sequence(_) => "sequence",
            FieldValue::Mapping(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Look up a key of a mapping value.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Mapping(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// The value as a point in time, if it is (or spells) a date.
    ///
    /// Dates map to midnight UTC.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))),
            FieldValue::DateTime(dt) => Some(dt.with_timezone(&Utc)),
            FieldValue::String(s) => match Self::from_scalar_str(s.trim()) {
                FieldValue::String(_) => None,
                other => other.as_datetime(),
            },
            _ => None,
        }
    }

    /// Flatten a string or sequence of strings into string items.
    ///
    /// A single string is split on commas, so `tags: a, b` yields two items.
    pub fn string_items(&self) -> Vec<String> {
        match self {
            FieldValue::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            FieldValue::Sequence(items) => items
                .iter()
                .filter_map(|item| match item {
                    FieldValue::Null | FieldValue::Sequence(_) | FieldValue::Mapping(_) => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            FieldValue::Null | FieldValue::Mapping(_) => Vec::new(),
            other => vec![other.to_string()],
        }
    }

    /// Equality that treats `3` and `3.0`, and a date and its string
    /// spelling, as the same value.
    pub fn loose_eq(&self, other: &FieldValue) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }

    /// Order two values of compatible kinds: numbers numerically, dates
    /// chronologically, strings lexicographically, booleans false < true.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b);
        }
        let is_date = |v: &FieldValue| matches!(v, FieldValue::Date(_) | FieldValue::DateTime(_));
        if is_date(self) || is_date(other) {
            return match (self.as_datetime(), other.as_datetime()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            };
        }
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Null, FieldValue::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            FieldValue::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            FieldValue::Mapping(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_unit(),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(x) => serializer.serialize_f64(*x),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Date(_) | FieldValue::DateTime(_) => {
                serializer.serialize_str(&self.to_string())
            }
            FieldValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            FieldValue::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Parse an ISO calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    // Cheap shape check before handing to chrono
    if s.len() != 10 || s.as_bytes().get(4) != Some(&b'-') {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DD HH:MM[:SS]` one taken
/// as UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    if s.len() < 16 || !s.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

fn yaml_key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> FieldValue {
        FieldValue::from_yaml(&serde_yaml::from_str::<Value>(text).unwrap())
    }

    #[test]
    fn test_scalar_types() {
        assert_eq!(yaml("42"), FieldValue::Integer(42));
        assert_eq!(yaml("4.5"), FieldValue::Float(4.5));
        assert_eq!(yaml("true"), FieldValue::Bool(true));
        assert_eq!(yaml("~"), FieldValue::Null);
        assert_eq!(yaml("hello"), FieldValue::String("hello".into()));
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            yaml("2024-01-05"),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
        match yaml("2024-01-05T10:30:00+02:00") {
            FieldValue::DateTime(dt) => assert_eq!(dt.offset().local_minus_utc(), 7200),
            other => panic!("expected datetime, got {:?}", other),
        }
        assert!(matches!(yaml("2024-01-05 10:30"), FieldValue::DateTime(_)));
        assert_eq!(yaml("2024-13-45"), FieldValue::String("2024-13-45".into()));
    }

    #[test]
    fn test_mapping_keeps_order() {
        let value = yaml("zeta: 1\nalpha: 2\nmid: 3");
        match value {
            FieldValue::Mapping(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
            }
            other => panic!("expected mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_string_items() {
        assert_eq!(yaml("[a, b]").string_items(), vec!["a", "b"]);
        assert_eq!(yaml("\"a, b\"").string_items(), vec!["a", "b"]);
        assert_eq!(yaml("2024").string_items(), vec!["2024"]);
        assert!(yaml("~").string_items().is_empty());
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            FieldValue::Integer(3).compare(&FieldValue::Float(3.5)),
            Some(Ordering::Less)
        );
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert!(date.loose_eq(&FieldValue::String("2024-01-05".into())));
        assert_eq!(
            date.compare(&FieldValue::String("2024-02-01".into())),
            Some(Ordering::Less)
        );
        assert_eq!(FieldValue::Bool(true).compare(&FieldValue::Integer(1)), None);
    }

    #[test]
    fn test_as_datetime() {
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(date.as_datetime().unwrap().to_rfc3339(), "2024-01-05T00:00:00+00:00");
        assert!(FieldValue::String("soon".into()).as_datetime().is_none());
    }

    #[test]
    fn test_serialize_json() {
        let value = yaml("title: Hello\ncreated: 2024-01-05\ntags: [a]\n");
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"title":"Hello","created":"2024-01-05","tags":["a"]}"#
        );
    }
}
