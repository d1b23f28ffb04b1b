//! Common GraphQL types

use async_graphql::{Scalar, ScalarType, Value};
use chrono::{DateTime as ChronoDateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// DateTime scalar
///
/// Serialized as RFC 3339. Row store timestamps also arrive as bare dates
/// (`date` columns) or without an offset (`timestamp` columns); both are read
/// as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime(pub ChronoDateTime<Utc>);

impl DateTime {
    pub fn now() -> Self {
        DateTime(Utc::now())
    }

    /// Parse any timestamp shape the row store produces.
    pub fn parse_str(s: &str) -> Result<Self, String> {
        if let Ok(dt) = ChronoDateTime::parse_from_rfc3339(s) {
            return Ok(DateTime(dt.with_timezone(&Utc)));
        }
        // Postgres may render a space instead of `T`.
        if let Ok(dt) = ChronoDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Ok(DateTime(dt.with_timezone(&Utc)));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(DateTime(naive.and_utc()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(DateTime(naive.and_utc()));
            }
        }
        Err(format!("Invalid DateTime: {}", s))
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

#[Scalar]
impl ScalarType for DateTime {
    fn parse(value: Value) -> async_graphql::InputValueResult<Self> {
        if let Value::String(s) = value {
            Ok(DateTime::parse_str(&s)?)
        } else {
            Err("Expected string for DateTime".into())
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<DateTime> for serde_json::Value {
    fn from(dt: DateTime) -> Self {
        serde_json::Value::String(dt.to_rfc3339())
    }
}

/// Read a JSON column as text.
///
/// `metadata` columns hold arbitrary JSON; strings are kept verbatim and any
/// other value is rendered back to JSON text.
pub fn json_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Normalize JSON text, falling back to the raw text when it doesn't parse.
pub fn reparse_json(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => Some(value.to_string()),
        Err(_) => Some(raw.to_string()),
    }
}

/// Store JSON text as a JSON value when it parses, as a string otherwise.
pub fn json_column(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}
