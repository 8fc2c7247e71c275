//! The layered evaluation context.
//!
//! Up to four read-only layers overlay each other without merging:
//!
//! 1. `form` — data just submitted on the current page, not yet persisted
//! 2. `submission` — all previously persisted answers
//! 3. `expression` — the literal context blob of the expression being
//!    evaluated
//! 4. `question_names` — fallback placeholder strings (`(( question name ))`)
//!    per question, consulted only when fallback lookups are enabled
//!
//! Lookup walks the layers in that order and stops at the first hit, so
//! draft form data always shadows persisted answers. Layers are swapped
//! individually rather than rebuilt: the form runner injects "the data I am
//! about to validate" as layer 1, and the dependency validator swaps a
//! specific expression's own blob into layer 3.

use crate::value::Value;

// ─── Layer ───────────────────────────────────────────────────────────────────

/// One flat, insertion-ordered mapping. Linear lookup — a layer holds at
/// most one entry per question on a page.
#[derive(Debug, Clone, Default)]
pub struct ContextLayer(Vec<(String, Value)>);

impl ContextLayer {
  pub fn new() -> Self { Self::default() }

  /// Insert or replace; replacement keeps the key's original position.
  pub fn insert(&mut self, key: impl Into<String>, value: Value) {
    let key = key.into();
    match self.0.iter_mut().find(|(k, _)| *k == key) {
      Some(entry) => entry.1 = value,
      None => self.0.push((key, value)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
  }

  pub fn contains(&self, key: &str) -> bool { self.get(key).is_some() }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl FromIterator<(String, Value)> for ContextLayer {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    let mut layer = Self::new();
    for (k, v) in iter {
      layer.insert(k, v);
    }
    layer
  }
}

// ─── LayeredContext ──────────────────────────────────────────────────────────

/// The four-layer overlay exposed to the evaluator as a single mapping.
#[derive(Debug, Clone, Default)]
pub struct LayeredContext {
  form:           ContextLayer,
  submission:     ContextLayer,
  expression:     ContextLayer,
  question_names: ContextLayer,
  /// Cached key union in first-seen order across layers 1→4. Recomputed on
  /// every layer swap; ordering is semantically visible to callers.
  keys:           Vec<String>,
}

impl LayeredContext {
  pub fn new(
    form: ContextLayer,
    submission: ContextLayer,
    expression: ContextLayer,
    question_names: ContextLayer,
  ) -> Self {
    let mut ctx = Self {
      form,
      submission,
      expression,
      question_names,
      keys: Vec::new(),
    };
    ctx.recompute_keys();
    ctx
  }

  pub fn set_form_layer(&mut self, layer: ContextLayer) {
    self.form = layer;
    self.recompute_keys();
  }

  pub fn set_submission_layer(&mut self, layer: ContextLayer) {
    self.submission = layer;
    self.recompute_keys();
  }

  pub fn set_expression_layer(&mut self, layer: ContextLayer) {
    self.expression = layer;
    self.recompute_keys();
  }

  pub fn set_question_names_layer(&mut self, layer: ContextLayer) {
    self.question_names = layer;
    self.recompute_keys();
  }

  fn recompute_keys(&mut self) {
    let mut keys: Vec<String> = Vec::new();
    for layer in [
      &self.form,
      &self.submission,
      &self.expression,
      &self.question_names,
    ] {
      for (k, _) in layer.iter() {
        if !keys.iter().any(|seen| seen == k) {
          keys.push(k.to_string());
        }
      }
    }
    self.keys = keys;
  }

  /// Priority-ordered lookup. The fallback layer is consulted only when
  /// `fallback_question_names` is set.
  pub fn get(&self, key: &str, fallback_question_names: bool) -> Option<&Value> {
    self
      .form
      .get(key)
      .or_else(|| self.submission.get(key))
      .or_else(|| self.expression.get(key))
      .or_else(|| {
        if fallback_question_names {
          self.question_names.get(key)
        } else {
          None
        }
      })
  }

  pub fn contains(&self, key: &str) -> bool {
    self.keys.iter().any(|k| k == key)
  }

  /// Key union across all four layers, first-seen order preserved.
  pub fn keys(&self) -> &[String] { &self.keys }

  pub fn len(&self) -> usize { self.keys.len() }

  pub fn is_empty(&self) -> bool { self.keys.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self
      .keys
      .iter()
      .filter_map(|k| self.get(k, true).map(|v| (k.as_str(), v)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn layer(pairs: &[(&str, Value)]) -> ContextLayer {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.clone()))
      .collect()
  }

  #[test]
  fn form_layer_shadows_submission_layer() {
    let mut ctx = LayeredContext::new(
      layer(&[("a", Value::Int(1))]),
      layer(&[("a", Value::Int(2)), ("b", Value::Int(3))]),
      ContextLayer::new(),
      ContextLayer::new(),
    );
    assert_eq!(ctx.get("a", false), Some(&Value::Int(1)));

    // Removing the key from the form layer re-exposes the submission value.
    ctx.set_form_layer(ContextLayer::new());
    assert_eq!(ctx.get("a", false), Some(&Value::Int(2)));
  }

  #[test]
  fn fallback_layer_only_used_when_enabled() {
    let ctx = LayeredContext::new(
      ContextLayer::new(),
      ContextLayer::new(),
      ContextLayer::new(),
      layer(&[("q", Value::Str("(( question name ))".into()))]),
    );
    assert_eq!(ctx.get("q", false), None);
    assert_eq!(
      ctx.get("q", true),
      Some(&Value::Str("(( question name ))".into()))
    );
  }

  #[test]
  fn keys_are_first_seen_union_in_layer_order() {
    let mut ctx = LayeredContext::new(
      layer(&[("b", Value::Int(1))]),
      layer(&[("a", Value::Int(2)), ("b", Value::Int(3))]),
      layer(&[("c", Value::Int(4))]),
      ContextLayer::new(),
    );
    assert_eq!(ctx.keys(), &["b", "a", "c"]);
    assert_eq!(ctx.len(), 3);

    ctx.set_expression_layer(ContextLayer::new());
    assert_eq!(ctx.keys(), &["b", "a"]);
  }
}
