//! The scalar value domain shared by expressions and answer contexts.

use std::fmt;

use chrono::NaiveDate;

/// A value an expression can mention or produce. Answers are converted to
/// this domain before evaluation; context layers hold nothing richer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  None,
  Bool(bool),
  Int(i64),
  Str(String),
  Date(NaiveDate),
  /// An ordered collection — checkbox answers and set literals.
  List(Vec<Value>),
}

impl Value {
  /// Human-readable kind name for error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::None => "none",
      Self::Bool(_) => "bool",
      Self::Int(_) => "integer",
      Self::Str(_) => "string",
      Self::Date(_) => "date",
      Self::List(_) => "list",
    }
  }

  /// Best-effort conversion from a stored JSON value. Objects are not part
  /// of the scalar domain and map to `None`.
  pub fn from_json(v: &serde_json::Value) -> Self {
    match v {
      serde_json::Value::Null => Self::None,
      serde_json::Value::Bool(b) => Self::Bool(*b),
      serde_json::Value::Number(n) => {
        n.as_i64().map(Self::Int).unwrap_or(Self::None)
      }
      serde_json::Value::String(s) => Self::Str(s.clone()),
      serde_json::Value::Array(items) => {
        Self::List(items.iter().map(Self::from_json).collect())
      }
      serde_json::Value::Object(_) => Self::None,
    }
  }
}

impl fmt::Display for Value {
  /// The rendering spliced into interpolated text.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::None => Ok(()),
      Self::Bool(b) => write!(f, "{b}"),
      Self::Int(n) => write!(f, "{n}"),
      Self::Str(s) => write!(f, "{s}"),
      Self::Date(d) => write!(f, "{}", d.format("%-d %B %Y")),
      Self::List(items) => {
        let mut first = true;
        for item in items {
          if !first {
            write!(f, ", ")?;
          }
          write!(f, "{item}")?;
          first = false;
        }
        Ok(())
      }
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self { Self::Int(n) }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Str(s.to_string()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::Str(s) }
}

impl From<NaiveDate> for Value {
  fn from(d: NaiveDate) -> Self { Self::Date(d) }
}
