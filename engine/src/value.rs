//! FILENAME: engine/src/value.rs
//! PURPOSE: Defines the cell value types of the grade table.
//! CONTEXT: `RawValue` is what a raw (stored) cell holds: a number or a string,
//! with the empty string as the "ungraded" sentinel. `Grade` is a computed cell:
//! a raw value or the error marker produced by a failed formula.

use serde::{Deserialize, Serialize};

use crate::result::Errors;

/// A raw grade-sheet entry: a number or a string.
///
/// Missing information is the empty string `""`, never an absence marker. The
/// `Null` variant exists only so a JSON `null` arriving at the boundary can be
/// rejected by validation with a typed error; it never survives an upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// The "no grade yet" sentinel.
    pub fn missing() -> Self {
        RawValue::Text(String::new())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Text(s) if s.is_empty())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by formulas: the ungraded sentinel and any other
    /// non-numeric value count as 0.
    pub fn numeric_or_zero(&self) -> f64 {
        match self {
            RawValue::Number(n) => *n,
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Null => Ok(()),
            RawValue::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            RawValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

/// A computed grade cell: a raw value, or the error marker left behind by a
/// formula that failed for this cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grade {
    Value(RawValue),
    Error(Errors),
}

impl Grade {
    pub fn is_error(&self) -> bool {
        matches!(self, Grade::Error(_))
    }

    pub fn as_value(&self) -> Option<&RawValue> {
        match self {
            Grade::Value(v) => Some(v),
            Grade::Error(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        self.as_value().and_then(RawValue::as_number)
    }

    pub fn as_text(&self) -> Option<&str> {
        self.as_value().and_then(RawValue::as_text)
    }

    pub fn errors(&self) -> Option<&Errors> {
        match self {
            Grade::Error(e) => Some(e),
            Grade::Value(_) => None,
        }
    }
}

impl From<RawValue> for Grade {
    fn from(v: RawValue) -> Self {
        Grade::Value(v)
    }
}

impl From<f64> for Grade {
    fn from(n: f64) -> Self {
        Grade::Value(RawValue::Number(n))
    }
}

impl From<&str> for Grade {
    fn from(s: &str) -> Self {
        Grade::Value(RawValue::Text(s.to_string()))
    }
}
