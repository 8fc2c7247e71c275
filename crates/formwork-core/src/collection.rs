//! The hydrated schema tree: collection → sections → forms → components.
//!
//! Hydration (loading every section, form, question, and expression) is the
//! storage layer's job; this module only navigates the loaded tree.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::component::{Component, Group, Question};

// ─── Tree ────────────────────────────────────────────────────────────────────

/// A versioned schema. Identity is `(id, version)`; only the highest version
/// is current by default. Always has at least one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
  pub id:       Uuid,
  pub version:  u32,
  pub name:     String,
  pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
  pub id:    Uuid,
  pub title: String,
  pub slug:  String,
  pub order: u32,
  pub forms: Vec<Form>,
}

/// A "task" in the tasklist: an ordered list of top-level components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
  pub id:         Uuid,
  pub title:      String,
  pub slug:       String,
  pub order:      u32,
  pub components: Vec<Component>,
}

impl Form {
  /// All questions in the form in display order, groups flattened
  /// depth-first.
  pub fn questions(&self) -> Vec<&Question> {
    let mut out = Vec::new();
    collect_questions(&self.components, &mut out);
    out
  }

  pub fn component_by_id(&self, id: Uuid) -> Option<&Component> {
    find_component(&self.components, id)
  }
}

fn collect_questions<'a>(
  components: &'a [Component],
  out: &mut Vec<&'a Question>,
) {
  for component in components {
    match component {
      Component::Question(q) => out.push(q),
      Component::Group(g) => collect_questions(&g.components, out),
    }
  }
}

fn find_component(components: &[Component], id: Uuid) -> Option<&Component> {
  for component in components {
    if component.id() == id {
      return Some(component);
    }
    if let Component::Group(g) = component
      && let Some(found) = find_component(&g.components, id)
    {
      return Some(found);
    }
  }
  None
}

// ─── Navigation ──────────────────────────────────────────────────────────────

impl Collection {
  pub fn forms(&self) -> impl Iterator<Item = &Form> {
    self.sections.iter().flat_map(|s| s.forms.iter())
  }

  pub fn form_by_id(&self, id: Uuid) -> Option<&Form> {
    self.forms().find(|f| f.id == id)
  }

  pub fn component_by_id(&self, id: Uuid) -> Option<&Component> {
    self.forms().find_map(|f| f.component_by_id(id))
  }

  pub fn question_by_id(&self, id: Uuid) -> Option<&Question> {
    self.component_by_id(id).and_then(Component::as_question)
  }

  /// Resolve a `q_<hex>` reference to its question.
  pub fn question_by_safe_qid(&self, safe_qid: &str) -> Option<&Question> {
    let id = crate::component::parse_safe_qid(safe_qid)?;
    self.question_by_id(id)
  }

  /// All questions in the whole collection in display order.
  pub fn all_questions(&self) -> Vec<&Question> {
    self.forms().flat_map(|f| f.questions()).collect()
  }

  /// The form whose tree contains `component_id`.
  pub fn form_containing(&self, component_id: Uuid) -> Option<&Form> {
    self
      .forms()
      .find(|f| f.component_by_id(component_id).is_some())
  }

  /// Ancestor groups of a component, outermost first.
  pub fn ancestors_of(&self, component_id: Uuid) -> Vec<&Group> {
    for form in self.forms() {
      let mut path = Vec::new();
      if ancestors_in(&form.components, component_id, &mut path) {
        return path;
      }
    }
    Vec::new()
  }

  /// The nearest enclosing repeatable container (the component itself if it
  /// is repeatable, else the innermost `add_another` ancestor group).
  pub fn add_another_container_of(&self, component_id: Uuid) -> Option<Uuid> {
    if let Some(component) = self.component_by_id(component_id)
      && component.add_another()
    {
      return Some(component_id);
    }
    self
      .ancestors_of(component_id)
      .iter()
      .rev()
      .find(|g| g.add_another)
      .map(|g| g.id)
  }

  /// Lexicographic display position of a component:
  /// `[section order, form order, component path orders…]`.
  ///
  /// A component strictly precedes another iff its position compares less.
  /// A group precedes everything inside it (prefix ordering).
  pub fn display_position(&self, component_id: Uuid) -> Option<Vec<u32>> {
    for section in &self.sections {
      for form in &section.forms {
        let mut path = vec![section.order, form.order];
        if position_in(&form.components, component_id, &mut path) {
          return Some(path);
        }
      }
    }
    None
  }
}

fn ancestors_in<'a>(
  components: &'a [Component],
  target: Uuid,
  path: &mut Vec<&'a Group>,
) -> bool {
  for component in components {
    if component.id() == target {
      return true;
    }
    if let Component::Group(g) = component {
      path.push(g);
      if ancestors_in(&g.components, target, path) {
        return true;
      }
      path.pop();
    }
  }
  false
}

fn position_in(
  components: &[Component],
  target: Uuid,
  path: &mut Vec<u32>,
) -> bool {
  for component in components {
    if component.id() == target {
      path.push(component.order());
      return true;
    }
    if let Component::Group(g) = component {
      path.push(g.order);
      if position_in(&g.components, target, path) {
        return true;
      }
      path.pop();
    }
  }
  false
}
