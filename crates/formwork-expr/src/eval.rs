//! Tree-walking evaluator, statement entry points, and `((...))`
//! interpolation.

use crate::{
  context::LayeredContext,
  error::{Error, Result},
  parse::{BoolOp, CmpOp, Expr, parse},
  value::Value,
};

// ─── Entry points ────────────────────────────────────────────────────────────

/// Evaluate `statement` against `ctx` and require a strict boolean result.
pub fn evaluate(statement: &str, ctx: &LayeredContext) -> Result<bool> {
  let expr = parse(statement)?;
  match eval(&expr, ctx, false)? {
    Value::Bool(b) => Ok(b),
    other => Err(Error::InvalidEvaluationResult(format!(
      "{statement:?} produced a {} value",
      other.kind()
    ))),
  }
}

/// Replace each non-greedy `((...))` span in `text` with the stringified
/// evaluation of its content. Spans may cross newlines. Question-name
/// fallback is enabled so unanswered questions render as a readable
/// placeholder instead of failing.
pub fn interpolate(text: &str, ctx: &LayeredContext) -> Result<String> {
  let mut out = String::with_capacity(text.len());
  let mut rest = text;

  while let Some(open) = rest.find("((") {
    let Some(close_rel) = rest[open + 2..].find("))") else {
      // No matching close; emit the remainder untouched.
      break;
    };
    let close = open + 2 + close_rel;
    out.push_str(&rest[..open]);

    let span = &rest[open + 2..close];
    let expr = parse(span)?;
    let value = eval(&expr, ctx, true)?;
    out.push_str(&value.to_string());

    rest = &rest[close + 2..];
  }

  out.push_str(rest);
  Ok(out)
}

/// Validate that `span` (the content of a `((...))` token in free text) is
/// a bare identifier reference and nothing more. Free-text fields only ever
/// hold direct references; complex expressions belong in statements.
pub fn simple_reference(span: &str) -> Result<String> {
  let trimmed = span.trim();
  let mut chars = trimmed.chars();
  let valid = match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {
      chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
    _ => false,
  };
  if !valid || trimmed.starts_with("__") {
    return Err(Error::Disallowed(format!(
      "not a simple reference: {trimmed:?}"
    )));
  }
  Ok(trimmed.to_string())
}

// ─── Evaluator ───────────────────────────────────────────────────────────────

/// Evaluate a parsed expression. `fallback_question_names` controls whether
/// name lookups may fall through to the placeholder layer.
pub fn eval(
  expr: &Expr,
  ctx: &LayeredContext,
  fallback_question_names: bool,
) -> Result<Value> {
  match expr {
    Expr::Literal(v) => Ok(v.clone()),

    Expr::Name(name) => ctx
      .get(name, fallback_question_names)
      .cloned()
      .ok_or_else(|| Error::UndefinedVariable(name.clone())),

    Expr::Not(inner) => {
      match eval(inner, ctx, fallback_question_names)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Err(Error::Disallowed(format!(
          "cannot apply `not` to a {} value",
          other.kind()
        ))),
      }
    }

    Expr::Neg(inner) => {
      match eval(inner, ctx, fallback_question_names)? {
        Value::Int(n) => Ok(Value::Int(-n)),
        other => Err(Error::Disallowed(format!(
          "cannot negate a {} value",
          other.kind()
        ))),
      }
    }

    Expr::Bool { lhs, op, rhs } => {
      let left = require_bool(eval(lhs, ctx, fallback_question_names)?)?;
      // Short-circuit, matching the source grammar's semantics.
      match (op, left) {
        (BoolOp::And, false) => Ok(Value::Bool(false)),
        (BoolOp::Or, true) => Ok(Value::Bool(true)),
        _ => {
          let right = require_bool(eval(rhs, ctx, fallback_question_names)?)?;
          Ok(Value::Bool(right))
        }
      }
    }

    Expr::Compare { lhs, op, rhs } => {
      let left = eval(lhs, ctx, fallback_question_names)?;
      let right = eval(rhs, ctx, fallback_question_names)?;
      compare(&left, *op, &right).map(Value::Bool)
    }

    Expr::Set(items) => {
      let values = items
        .iter()
        .map(|item| eval(item, ctx, fallback_question_names))
        .collect::<Result<Vec<_>>>()?;
      Ok(Value::List(values))
    }
  }
}

fn require_bool(v: Value) -> Result<bool> {
  match v {
    Value::Bool(b) => Ok(b),
    other => Err(Error::Disallowed(format!(
      "boolean operator applied to a {} value",
      other.kind()
    ))),
  }
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> Result<bool> {
  match op {
    CmpOp::Eq => Ok(left == right),
    CmpOp::Ne => Ok(left != right),
    CmpOp::In => membership(left, right),
    CmpOp::NotIn => membership(left, right).map(|b| !b),
    CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
      let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        _ => {
          return Err(Error::Disallowed(format!(
            "cannot order a {} value against a {} value",
            left.kind(),
            right.kind()
          )));
        }
      };
      Ok(match op {
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Ge => ordering.is_ge(),
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
        _ => unreachable!(),
      })
    }
  }
}

/// `left in right`. The container may be a set literal or a list answer
/// (checkboxes); anything else cannot hold members.
fn membership(left: &Value, right: &Value) -> Result<bool> {
  match right {
    Value::List(items) => Ok(items.contains(left)),
    other => Err(Error::Disallowed(format!(
      "`in` requires a collection on the right, got a {} value",
      other.kind()
    ))),
  }
}
