//! FactValue - Typed values the condition evaluator operates on
//!
//! A fact map is a flat `name -> FactValue` snapshot. A fact that cannot be
//! resolved is represented by the `Absent` sentinel rather than being dropped
//! from the map, so comparison operators can treat "missing" uniformly
//! (compare false, never error) while existence operators see it explicitly.

use std::collections::HashMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A resolved fact snapshot: fact name to typed value.
pub type FactMap = HashMap<String, FactValue>;

/// A typed fact value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    /// Numeric value with decimal precision
    Number(Decimal),
    /// Case-sensitive text value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// List of values (operands of `in`/`not_in`/`between`)
    List(Vec<FactValue>),
    /// The fact could not be resolved
    Absent,
}

impl FactValue {
    /// Whether this is the absent sentinel
    pub fn is_absent(&self) -> bool {
        matches!(self, FactValue::Absent)
    }

    /// Numeric view, if this value is a number
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FactValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text view, if this value is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FactValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view, if this value is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a loose JSON value into a typed fact value.
    ///
    /// Numbers become decimals (integers losslessly, floats via the decimal
    /// conversion), `null` becomes `Absent`. Nested objects are not valid
    /// fact values and also map to `Absent`.
    pub fn from_json(value: &serde_json::Value) -> FactValue {
        match value {
            serde_json::Value::Null => FactValue::Absent,
            serde_json::Value::Bool(b) => FactValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FactValue::Number(Decimal::from(i))
                } else if let Some(f) = n.as_f64() {
                    Decimal::from_f64(f).map(FactValue::Number).unwrap_or(FactValue::Absent)
                } else {
                    FactValue::Absent
                }
            }
            serde_json::Value::String(s) => FactValue::Text(s.clone()),
            serde_json::Value::Array(items) => {
                FactValue::List(items.iter().map(FactValue::from_json).collect())
            }
            serde_json::Value::Object(_) => FactValue::Absent,
        }
    }
}

impl From<Decimal> for FactValue {
    fn from(value: Decimal) -> Self {
        FactValue::Number(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        FactValue::Text(value.to_string())
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        FactValue::Text(value)
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        FactValue::Bool(value)
    }
}

impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactValue::Number(n) => write!(f, "{}", n),
            FactValue::Text(s) => write!(f, "\"{}\"", s),
            FactValue::Bool(b) => write!(f, "{}", b),
            FactValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            FactValue::Absent => write!(f, "<absent>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_views() {
        assert_eq!(FactValue::Number(dec!(10)).as_number(), Some(dec!(10)));
        assert_eq!(FactValue::Text("IR".into()).as_text(), Some("IR"));
        assert_eq!(FactValue::Bool(true).as_bool(), Some(true));
        assert_eq!(FactValue::Text("x".into()).as_number(), None);
        assert!(FactValue::Absent.is_absent());
    }

    #[test]
    fn test_from_json_numbers() {
        let v = FactValue::from_json(&serde_json::json!(15000));
        assert_eq!(v, FactValue::Number(dec!(15000)));

        let v = FactValue::from_json(&serde_json::json!(10.5));
        assert_eq!(v.as_number(), Some(dec!(10.5)));
    }

    #[test]
    fn test_from_json_null_and_object_are_absent() {
        assert!(FactValue::from_json(&serde_json::Value::Null).is_absent());
        assert!(FactValue::from_json(&serde_json::json!({"a": 1})).is_absent());
    }

    #[test]
    fn test_from_json_list() {
        let v = FactValue::from_json(&serde_json::json!(["IR", "KP"]));
        assert_eq!(
            v,
            FactValue::List(vec![FactValue::Text("IR".into()), FactValue::Text("KP".into())])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(FactValue::Number(dec!(10)).to_string(), "10");
        assert_eq!(FactValue::Text("DE".into()).to_string(), "\"DE\"");
        assert_eq!(FactValue::Absent.to_string(), "<absent>");
        assert_eq!(
            FactValue::List(vec![FactValue::Number(dec!(1)), FactValue::Number(dec!(2))]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn test_serialization_round_trip() {
        let v = FactValue::List(vec![FactValue::Number(dec!(1)), FactValue::Text("a".into())]);
        let json = serde_json::to_string(&v).unwrap();
        let parsed: FactValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, v);
    }
}
