//! Native leaf values and the coercions between form text, SQL and JSON.

use std::fmt;

use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Native kind of a leaf setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Integer,
    Boolean,
}

/// A leaf value moving between a record and one of its representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl Value {
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Text => Self::Text(String::new()),
            ValueKind::Integer => Self::Integer(0),
            ValueKind::Boolean => Self::Bool(false),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Integer(_) => ValueKind::Integer,
            Self::Bool(_) => ValueKind::Boolean,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Integer(i) => *i == 0,
            Self::Bool(b) => !b,
        }
    }

    /// Parse a declared default. Unparsable integers yield `None`.
    pub fn parse_default(kind: ValueKind, text: &str) -> Option<Self> {
        match kind {
            ValueKind::Text => Some(Self::Text(text.to_string())),
            ValueKind::Integer => text.parse().ok().map(Self::Integer),
            ValueKind::Boolean => Some(Self::Bool(text == "true" || text == "1")),
        }
    }

    /// Coerce a submitted form value. An empty integer falls back to
    /// `default`; an unparsable one yields `None` and is left unset.
    pub fn from_form(kind: ValueKind, raw: &str, default: &str) -> Option<Self> {
        match kind {
            ValueKind::Text => Some(Self::Text(raw.to_string())),
            ValueKind::Integer if raw.is_empty() => default.parse().ok().map(Self::Integer),
            ValueKind::Integer => raw.parse().ok().map(Self::Integer),
            ValueKind::Boolean => Some(Self::Bool(matches!(raw, "on" | "true" | "1"))),
        }
    }

    /// Widening-safe conversion from a stored column. NULL yields `None`.
    pub fn from_sql(kind: ValueKind, raw: &SqlValue) -> Option<Self> {
        match (kind, raw) {
            (_, SqlValue::Null | SqlValue::Blob(_)) => None,
            (ValueKind::Text, SqlValue::Text(s)) => Some(Self::Text(s.clone())),
            (ValueKind::Text, SqlValue::Integer(i)) => Some(Self::Text(i.to_string())),
            (ValueKind::Text, SqlValue::Real(f)) => Some(Self::Text(f.to_string())),
            (ValueKind::Integer, SqlValue::Integer(i)) => Some(Self::Integer(*i)),
            (ValueKind::Integer, SqlValue::Real(f)) => Some(Self::Integer(*f as i64)),
            (ValueKind::Integer, SqlValue::Text(s)) => s.trim().parse().ok().map(Self::Integer),
            (ValueKind::Boolean, SqlValue::Integer(i)) => Some(Self::Bool(*i != 0)),
            (ValueKind::Boolean, SqlValue::Real(f)) => Some(Self::Bool(*f != 0.0)),
            (ValueKind::Boolean, SqlValue::Text(s)) => Some(Self::Bool(s == "true" || s == "1")),
        }
    }

    pub fn into_sql(self) -> SqlValue {
        match self {
            Self::Text(s) => SqlValue::Text(s),
            Self::Integer(i) => SqlValue::Integer(i),
            Self::Bool(b) => SqlValue::Integer(i64::from(b)),
        }
    }

    /// Lenient conversion from an array item's JSON member.
    pub fn from_json(kind: ValueKind, raw: &JsonValue) -> Option<Self> {
        match (kind, raw) {
            (_, JsonValue::Null) => None,
            (ValueKind::Text, JsonValue::String(s)) => Some(Self::Text(s.clone())),
            (ValueKind::Text, JsonValue::Number(n)) => Some(Self::Text(n.to_string())),
            (ValueKind::Text, JsonValue::Bool(b)) => Some(Self::Text(b.to_string())),
            (ValueKind::Integer, JsonValue::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Self::Integer),
            (ValueKind::Integer, JsonValue::String(s)) => s.trim().parse().ok().map(Self::Integer),
            (ValueKind::Boolean, JsonValue::Bool(b)) => Some(Self::Bool(*b)),
            (ValueKind::Boolean, JsonValue::Number(n)) => n.as_f64().map(|f| Self::Bool(f != 0.0)),
            (ValueKind::Boolean, JsonValue::String(s)) => Some(Self::Bool(s == "true" || s == "1")),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Integer(i) => JsonValue::from(*i),
            Self::Bool(b) => JsonValue::Bool(*b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_boolean_spellings() {
        for raw in ["on", "true", "1"] {
            assert_eq!(
                Value::from_form(ValueKind::Boolean, raw, ""),
                Some(Value::Bool(true))
            );
        }
        assert_eq!(
            Value::from_form(ValueKind::Boolean, "", ""),
            Some(Value::Bool(false))
        );
        assert_eq!(
            Value::from_form(ValueKind::Boolean, "yes", ""),
            Some(Value::Bool(false))
        );
    }

    #[test]
    fn test_form_integer_falls_back_to_default() {
        assert_eq!(
            Value::from_form(ValueKind::Integer, "", "30"),
            Some(Value::Integer(30))
        );
        assert_eq!(Value::from_form(ValueKind::Integer, "", ""), None);
        assert_eq!(Value::from_form(ValueKind::Integer, "abc", "30"), None);
        assert_eq!(
            Value::from_form(ValueKind::Integer, "120", "30"),
            Some(Value::Integer(120))
        );
    }

    #[test]
    fn test_sql_coercions() {
        assert_eq!(
            Value::from_sql(ValueKind::Integer, &SqlValue::Real(42.9)),
            Some(Value::Integer(42))
        );
        assert_eq!(
            Value::from_sql(ValueKind::Boolean, &SqlValue::Integer(2)),
            Some(Value::Bool(true))
        );
        assert_eq!(Value::from_sql(ValueKind::Text, &SqlValue::Null), None);
        assert_eq!(Value::Bool(true).into_sql(), SqlValue::Integer(1));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            Value::parse_default(ValueKind::Boolean, "1"),
            Some(Value::Bool(true))
        );
        assert_eq!(Value::parse_default(ValueKind::Integer, "x"), None);
    }

    #[test]
    fn test_zero_values() {
        assert!(Value::zero(ValueKind::Text).is_zero());
        assert!(Value::zero(ValueKind::Integer).is_zero());
        assert!(!Value::Text("x".into()).is_zero());
        assert_eq!(Value::Integer(5).to_string(), "5");
    }
}
