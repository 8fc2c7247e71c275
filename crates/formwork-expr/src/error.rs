//! Error types for `formwork-expr`.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
  /// A name in the expression resolved through none of the context layers.
  #[error("undefined variable in expression: {0}")]
  UndefinedVariable(String),

  /// The expression used a token or construct outside the sandbox grammar,
  /// or an operation the value kinds involved do not support.
  #[error("disallowed expression: {0}")]
  Disallowed(String),

  /// `evaluate` produced something other than a strict boolean. Conditions
  /// and validations must not coerce truthiness.
  #[error("expression did not evaluate to a boolean: {0}")]
  InvalidEvaluationResult(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
