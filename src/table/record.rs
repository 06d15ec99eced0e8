use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{EocError, Location, Result};

/// Literal written wherever a value is undefined (first EOC row, skipped rates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentinel {
    #[default]
    None,
    Nan,
}

impl Sentinel {
    pub fn literal(self) -> &'static str {
        match self {
            Sentinel::None => "none",
            Sentinel::Nan => "nan",
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

impl FromStr for Sentinel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(Sentinel::None),
            "nan" => Ok(Sentinel::Nan),
            other => Err(format!("unknown sentinel `{}` (expected none or nan)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Undefined,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Text(s) => s.trim().parse().ok(),
            Value::Number(x) => Some(*x),
            Value::Undefined => None,
        }
    }

    pub fn render(&self, sentinel: Sentinel) -> Cow<'_, str> {
        match self {
            Value::Text(s) => Cow::Borrowed(s.as_str()),
            Value::Number(x) => Cow::Owned(format_number(*x)),
            Value::Undefined => Cow::Borrowed(sentinel.literal()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

/// Shortest decimal that parses back to the same `f64`. Exponent notation
/// outside `[1e-5, 1e16)` keeps tiny error norms readable.
pub fn format_number(x: f64) -> String {
    let magnitude = x.abs();
    if x == 0.0 || !x.is_finite() || (1e-5..1e16).contains(&magnitude) {
        format!("{}", x)
    } else {
        format!("{:e}", x)
    }
}

/// One row of a table. Fields keep the order in which they were inserted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
    origin: Option<Location>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Record::new();
        for (k, v) in pairs {
            record.insert(k, v);
        }
        record
    }

    pub fn located(mut self, location: Location) -> Self {
        self.origin = Some(location);
        self
    }

    pub fn origin(&self) -> Option<&Location> {
        self.origin.as_ref()
    }

    /// Sets `column`, replacing an existing value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Provenance for error messages; records built in memory report row 0.
    pub fn location(&self) -> Location {
        self.origin.clone().unwrap_or_else(|| Location {
            path: "<memory>".into(),
            row: 0,
        })
    }

    pub fn describe(&self) -> String {
        match &self.origin {
            Some(location) => location.to_string(),
            None => "record".to_string(),
        }
    }

    pub fn require(&self, column: &str) -> Result<&Value> {
        self.get(column).ok_or_else(|| EocError::IncompleteRecord {
            column: column.to_string(),
            context: self.describe(),
        })
    }

    /// Reads `column` as a finite, strictly positive number.
    pub fn positive(&self, column: &str) -> Result<f64> {
        let value = self.require(column)?;
        match value.as_f64() {
            Some(x) if x.is_finite() && x > 0.0 => Ok(x),
            _ => Err(EocError::InvalidMeasurement {
                column: column.to_string(),
                value: value.render(Sentinel::Nan).into_owned(),
                location: self.location(),
            }),
        }
    }
}
