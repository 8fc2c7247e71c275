//! Typed answers and their JSON round-trip.
//!
//! `Submission.data` stores answers as plain JSON keyed by question id; the
//! question's data type picks the decoding. Decoding failures are schema
//! corruption, not user error.

use chrono::NaiveDate;
use formwork_expr::Value;
use serde::{Deserialize, Serialize};

use crate::{
  component::{DataSource, QuestionDataType},
  error::{Error, Result},
};

/// A decoded answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
  /// All free-text data types (single/multi line, email, URL).
  Text(String),
  Integer(i64),
  YesNo(bool),
  /// A data-source item key (RADIOS).
  SingleChoice(String),
  /// Data-source item keys in selection order (CHECKBOXES).
  MultipleChoice(Vec<String>),
  Date(NaiveDate),
}

impl Answer {
  /// Serialise for the `Submission.data` JSON blob.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Self::Text(s) | Self::SingleChoice(s) => {
        serde_json::Value::String(s.clone())
      }
      Self::Integer(n) => serde_json::Value::Number((*n).into()),
      Self::YesNo(b) => serde_json::Value::Bool(*b),
      Self::MultipleChoice(keys) => serde_json::Value::Array(
        keys
          .iter()
          .map(|k| serde_json::Value::String(k.clone()))
          .collect(),
      ),
      Self::Date(d) => serde_json::Value::String(d.to_string()),
    }
  }

  /// Decode a stored JSON value using the question's data type.
  pub fn from_json(
    data_type: QuestionDataType,
    value: &serde_json::Value,
  ) -> Result<Self> {
    use QuestionDataType as T;

    let fail = |detail: &str| Error::AnswerDecode {
      data_type,
      detail: detail.to_string(),
    };

    match data_type {
      T::TextSingleLine | T::TextMultiLine | T::Email | T::Url => value
        .as_str()
        .map(|s| Self::Text(s.to_string()))
        .ok_or_else(|| fail("expected a string")),
      T::Integer => value
        .as_i64()
        .map(Self::Integer)
        .ok_or_else(|| fail("expected an integer")),
      T::YesNo => value
        .as_bool()
        .map(Self::YesNo)
        .ok_or_else(|| fail("expected a boolean")),
      T::Radios => value
        .as_str()
        .map(|s| Self::SingleChoice(s.to_string()))
        .ok_or_else(|| fail("expected an item key")),
      T::Checkboxes => value
        .as_array()
        .map(|items| {
          items
            .iter()
            .map(|v| {
              v.as_str()
                .map(str::to_string)
                .ok_or_else(|| fail("expected item keys"))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::MultipleChoice)
        })
        .ok_or_else(|| fail("expected an array"))?,
      T::Date => {
        let s = value.as_str().ok_or_else(|| fail("expected a date"))?;
        s.parse::<NaiveDate>()
          .map(Self::Date)
          .map_err(|e| fail(&e.to_string()))
      }
    }
  }

  /// Convert to the expression value domain for condition evaluation.
  pub fn to_value(&self) -> Value {
    match self {
      Self::Text(s) | Self::SingleChoice(s) => Value::Str(s.clone()),
      Self::Integer(n) => Value::Int(*n),
      Self::YesNo(b) => Value::Bool(*b),
      Self::MultipleChoice(keys) => {
        Value::List(keys.iter().map(|k| Value::Str(k.clone())).collect())
      }
      Self::Date(d) => Value::Date(*d),
    }
  }

  /// Human-readable rendering for interpolation and export. Choice keys are
  /// resolved to labels through the question's data source.
  pub fn display(&self, data_source: Option<&DataSource>) -> String {
    let label_for = |key: &str| -> String {
      data_source
        .and_then(|ds| ds.item_by_key(key))
        .map(|item| item.label.clone())
        .unwrap_or_else(|| key.to_string())
    };
    match self {
      Self::Text(s) => s.clone(),
      Self::Integer(n) => n.to_string(),
      Self::YesNo(true) => "Yes".into(),
      Self::YesNo(false) => "No".into(),
      Self::SingleChoice(key) => label_for(key),
      Self::MultipleChoice(keys) => keys
        .iter()
        .map(|k| label_for(k))
        .collect::<Vec<_>>()
        .join(", "),
      Self::Date(d) => d.format("%-d %B %Y").to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn answers_round_trip_for_every_data_type() {
    use QuestionDataType as T;

    let cases: Vec<(QuestionDataType, Answer)> = vec![
      (T::TextSingleLine, Answer::Text("a line".into())),
      (T::TextMultiLine, Answer::Text("two\nlines".into())),
      (T::Email, Answer::Text("grants@example.com".into())),
      (T::Url, Answer::Text("https://example.com".into())),
      (T::Integer, Answer::Integer(42)),
      (T::YesNo, Answer::YesNo(true)),
      (T::YesNo, Answer::YesNo(false)),
      (T::Radios, Answer::SingleChoice("b".into())),
      (
        T::Checkboxes,
        Answer::MultipleChoice(vec!["a".into(), "c".into()]),
      ),
      (
        T::Date,
        Answer::Date(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()),
      ),
    ];

    for (data_type, answer) in cases {
      let json = answer.to_json();
      let back = Answer::from_json(data_type, &json).unwrap();
      assert_eq!(back, answer, "{data_type}");
    }
  }

  #[test]
  fn decode_failure_names_the_data_type() {
    let err = Answer::from_json(
      QuestionDataType::Integer,
      &serde_json::Value::String("not a number".into()),
    )
    .unwrap_err();
    assert!(matches!(
      err,
      Error::AnswerDecode {
        data_type: QuestionDataType::Integer,
        ..
      }
    ));
  }

  #[test]
  fn display_resolves_choice_labels() {
    use crate::component::{DataSource, DataSourceItem};
    use uuid::Uuid;

    let ds = DataSource {
      items: vec![
        DataSourceItem {
          id:    Uuid::new_v4(),
          key:   "a".into(),
          label: "Option A".into(),
        },
        DataSourceItem {
          id:    Uuid::new_v4(),
          key:   "b".into(),
          label: "Option B".into(),
        },
      ],
    };
    let answer = Answer::MultipleChoice(vec!["a".into(), "b".into()]);
    assert_eq!(answer.display(Some(&ds)), "Option A, Option B");
  }
}
