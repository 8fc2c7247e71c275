//! The dependency & reference validator.
//!
//! Every create/update of a component or expression runs through here, in
//! the same transaction as the write. The validator extracts all
//! `((question_ref))` interpolations and managed-expression references,
//! checks that each points at an earlier, compatible, correctly-scoped
//! question, and returns the fresh reference set. Stored reference rows are
//! always fully recomputed (delete-then-insert) by the caller — never
//! incrementally patched — so the index cannot drift from the stored text.
//!
//! The same extraction doubles as the input to the structural guards
//! (reorder, delete, option removal, same-page display, add-another), which
//! walk the reference edges forward before allowing a write.

use uuid::Uuid;

use crate::{
  collection::Collection,
  component::{Component, MAX_GROUP_DEPTH, Question},
  error::{DataSourceItemDependency, Error, Result},
  expression::{Expression, ExpressionKind},
};

// ─── Reference edges ─────────────────────────────────────────────────────────

/// One denormalized dependency edge, recomputed on every write to the
/// owning component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentReference {
  pub component_id:            Uuid,
  pub depends_on_component_id: Uuid,
  /// Set when the edge comes from a managed expression rather than a
  /// free-text interpolation.
  pub expression_id:           Option<Uuid>,
  /// Set when the expression pins a specific data-source item.
  pub depends_on_data_source_item_id: Option<Uuid>,
}

// ─── Span extraction ─────────────────────────────────────────────────────────

/// The contents of each non-greedy `((...))` span in `text`, in order.
/// An unclosed `((` is ignored (interpolation leaves it untouched too).
pub fn find_interpolation_spans(text: &str) -> Vec<&str> {
  let mut spans = Vec::new();
  let mut rest = text;
  while let Some(open) = rest.find("((") {
    let Some(close_rel) = rest[open + 2..].find("))") else {
      break;
    };
    let close = open + 2 + close_rel;
    spans.push(&rest[open + 2..close]);
    rest = &rest[close + 2..];
  }
  spans
}

// ─── Component validation ────────────────────────────────────────────────────

/// Validate every reference a component makes (free-text interpolations and
/// all attached expressions) and return the fresh edge set. Any failure
/// means the caller must roll back; no edges are ever partially applied.
pub fn validate_and_sync_component_references(
  collection: &Collection,
  component_id: Uuid,
) -> Result<Vec<ComponentReference>> {
  let component = collection
    .component_by_id(component_id)
    .ok_or(Error::ComponentNotFound(component_id))?;

  let mut references = Vec::new();

  // 1. Free-text interpolation spans: bare references only.
  for (field, text) in component.interpolatable_fields() {
    for span in find_interpolation_spans(text) {
      let invalid = |reference: &str| Error::InvalidReference {
        field:     field.to_string(),
        reference: reference.to_string(),
      };
      let name = formwork_expr::simple_reference(span)
        .map_err(|_| invalid(span))?;
      let question = collection
        .question_by_safe_qid(&name)
        .ok_or_else(|| invalid(&name))?;
      if question.id == component_id {
        return Err(invalid(&name));
      }
      check_strictly_earlier(collection, component, question)?;
      check_repeat_scope(collection, component_id, question)?;
      references.push(ComponentReference {
        component_id,
        depends_on_component_id: question.id,
        expression_id: None,
        depends_on_data_source_item_id: None,
      });
    }
  }

  // 2. Managed expressions, including pairwise duplicate detection.
  let expressions = component.expressions();
  for (i, expression) in expressions.iter().enumerate() {
    validate_expression_uniqueness(&expressions[..i], expression)?;
    references.extend(validate_expression_references(
      collection,
      component_id,
      expression,
    )?);
  }

  Ok(references)
}

/// Validate one expression's references and return its edge set.
pub fn validate_expression_references(
  collection: &Collection,
  owner_id: Uuid,
  expression: &Expression,
) -> Result<Vec<ComponentReference>> {
  let owner = collection
    .component_by_id(owner_id)
    .ok_or(Error::ComponentNotFound(owner_id))?;
  let managed = expression.managed()?;
  let referenced = collection
    .question_by_id(managed.referenced_question_id())
    .ok_or(Error::ComponentNotFound(managed.referenced_question_id()))?;

  let mut references = Vec::new();

  match expression.kind {
    ExpressionKind::Condition => {
      let supported = managed.supported_condition_data_types();
      if !supported.contains(&referenced.data_type) {
        return Err(Error::IncompatibleDataType {
          question_id: referenced.id,
          data_type:   referenced.data_type,
          expression:  managed.name(),
          kind:        expression.kind,
        });
      }
      check_strictly_earlier(collection, owner, referenced)?;
      check_repeat_scope(collection, owner_id, referenced)?;
      references.push(ComponentReference {
        component_id: owner_id,
        depends_on_component_id: referenced.id,
        expression_id: Some(expression.id),
        depends_on_data_source_item_id: None,
      });
    }
    ExpressionKind::Validation => {
      // A validation constrains the owner's own answer.
      if referenced.id != owner_id {
        return Err(Error::InvalidBuilderInput {
          field:  "question_id".into(),
          detail: "a validation must reference its own question".into(),
        });
      }
      let supported = managed.supported_validator_data_types();
      if !supported.contains(&referenced.data_type) {
        return Err(Error::IncompatibleDataType {
          question_id: referenced.id,
          data_type:   referenced.data_type,
          expression:  managed.name(),
          kind:        expression.kind,
        });
      }
    }
  }

  // Comparison values referencing other questions (e.g. "greater than the
  // answer to q_Y") behave like condition references regardless of kind.
  for cmp_id in managed.comparison_question_ids() {
    let cmp_question = collection
      .question_by_id(cmp_id)
      .ok_or(Error::ComponentNotFound(cmp_id))?;
    if !managed
      .supported_condition_data_types()
      .contains(&cmp_question.data_type)
    {
      return Err(Error::IncompatibleDataType {
        question_id: cmp_question.id,
        data_type:   cmp_question.data_type,
        expression:  managed.name(),
        kind:        expression.kind,
      });
    }
    check_strictly_earlier(collection, owner, cmp_question)?;
    check_repeat_scope(collection, owner_id, cmp_question)?;
    references.push(ComponentReference {
      component_id: owner_id,
      depends_on_component_id: cmp_id,
      expression_id: Some(expression.id),
      depends_on_data_source_item_id: None,
    });
  }

  // Data-source items pinned by AnyOf/Specifically.
  for key in managed.referenced_data_source_keys() {
    let data_source = referenced.data_source.as_ref().ok_or_else(|| {
      Error::UnknownDataSourceItem {
        question_id: referenced.id,
        key:         key.to_string(),
      }
    })?;
    let item = data_source.item_by_key(key).ok_or_else(|| {
      Error::UnknownDataSourceItem {
        question_id: referenced.id,
        key:         key.to_string(),
      }
    })?;
    references.push(ComponentReference {
      component_id: owner_id,
      depends_on_component_id: referenced.id,
      expression_id: Some(expression.id),
      depends_on_data_source_item_id: Some(item.id),
    });
  }

  Ok(references)
}

/// Two managed expressions of the same kind are duplicates if they share a
/// name — and, for conditions, also target the same referenced question.
pub fn validate_expression_uniqueness(
  existing: &[Expression],
  candidate: &Expression,
) -> Result<()> {
  let managed = candidate.managed()?;
  for other in existing {
    if other.kind != candidate.kind {
      continue;
    }
    let Ok(other_managed) = other.managed() else {
      continue;
    };
    if other_managed.name() != managed.name() {
      continue;
    }
    let duplicate = match candidate.kind {
      ExpressionKind::Validation => true,
      ExpressionKind::Condition => {
        other_managed.referenced_question_id()
          == managed.referenced_question_id()
      }
    };
    if duplicate {
      return Err(Error::DuplicateValue {
        field: "expression".into(),
        value: format!("{} {}", candidate.kind, managed.name()),
      });
    }
  }
  Ok(())
}

/// Recompute every reference edge in the collection. Doubles as full-tree
/// validation: any invalid reference anywhere fails the whole call.
pub fn collect_all_references(
  collection: &Collection,
) -> Result<Vec<ComponentReference>> {
  let mut all = Vec::new();
  for form in collection.forms() {
    let mut stack: Vec<&Component> = form.components.iter().collect();
    while let Some(component) = stack.pop() {
      all.extend(validate_and_sync_component_references(
        collection,
        component.id(),
      )?);
      if let Component::Group(g) = component {
        stack.extend(g.components.iter());
      }
    }
  }
  Ok(all)
}

// ─── Ordering and scope checks ───────────────────────────────────────────────

/// All dependencies must be strictly earlier in display order.
fn check_strictly_earlier(
  collection: &Collection,
  dependent: &Component,
  referenced: &Question,
) -> Result<()> {
  let dependent_pos = collection
    .display_position(dependent.id())
    .ok_or(Error::ComponentNotFound(dependent.id()))?;
  let referenced_pos = collection
    .display_position(referenced.id)
    .ok_or(Error::ComponentNotFound(referenced.id))?;
  if referenced_pos < dependent_pos {
    Ok(())
  } else {
    Err(Error::DependencyOrder {
      component_id:    dependent.id(),
      component_name:  dependent.name().to_string(),
      depends_on_id:   referenced.id,
      depends_on_name: referenced.name.clone(),
    })
  }
}

/// Repeatable answers are per-entry: a question inside an "add another"
/// container may only be referenced from inside the same container.
fn check_repeat_scope(
  collection: &Collection,
  dependent_id: Uuid,
  referenced: &Question,
) -> Result<()> {
  let Some(container) = collection.add_another_container_of(referenced.id)
  else {
    return Ok(());
  };
  if collection.add_another_container_of(dependent_id) == Some(container) {
    Ok(())
  } else {
    Err(Error::AddAnotherDependency {
      component_id:           dependent_id,
      referenced_question_id: referenced.id,
    })
  }
}

// ─── Structural guards ───────────────────────────────────────────────────────

/// A new group may only be created under `parent_group_id` if the parent is
/// not same-page and the nesting limit is respected.
pub fn check_group_can_nest(
  collection: &Collection,
  parent_group_id: Option<Uuid>,
) -> Result<()> {
  let Some(parent_id) = parent_group_id else {
    return Ok(());
  };
  let parent = collection
    .component_by_id(parent_id)
    .and_then(Component::as_group)
    .ok_or(Error::ComponentNotFound(parent_id))?;
  if parent.show_questions_on_the_same_page {
    return Err(Error::NestedGroupDisplayTypeSamePage(parent_id));
  }
  let parent_depth = collection.ancestors_of(parent_id).len() + 1;
  if parent_depth > MAX_GROUP_DEPTH {
    return Err(Error::NestedGroup {
      group_id:  parent_id,
      max_depth: MAX_GROUP_DEPTH,
    });
  }
  Ok(())
}

/// A group can only switch to same-page display if it holds no nested group
/// and none of its direct questions depend on each other.
pub fn check_group_same_page_display(
  collection: &Collection,
  group_id: Uuid,
) -> Result<()> {
  let group = collection
    .component_by_id(group_id)
    .and_then(Component::as_group)
    .ok_or(Error::ComponentNotFound(group_id))?;
  if group.contains_group() {
    return Err(Error::NestedGroupDisplayTypeSamePage(group_id));
  }

  let direct_ids: Vec<Uuid> = group.questions().map(|q| q.id).collect();
  for question in group.questions() {
    let references =
      validate_and_sync_component_references(collection, question.id)?;
    for reference in references {
      if direct_ids.contains(&reference.depends_on_component_id) {
        let depends_on = collection
          .question_by_id(reference.depends_on_component_id)
          .ok_or(Error::ComponentNotFound(
            reference.depends_on_component_id,
          ))?;
        return Err(Error::DependencyOrder {
          component_id:    question.id,
          component_name:  question.name.clone(),
          depends_on_id:   depends_on.id,
          depends_on_name: depends_on.name.clone(),
        });
      }
    }
  }
  Ok(())
}

/// A component may only become repeatable if it neither contains nor sits
/// inside another repeatable container, and nothing outside it references a
/// question inside it.
pub fn check_add_another_allowed(
  collection: &Collection,
  component_id: Uuid,
) -> Result<()> {
  let component = collection
    .component_by_id(component_id)
    .ok_or(Error::ComponentNotFound(component_id))?;

  if let Component::Group(g) = component
    && g.contains_add_another()
  {
    return Err(Error::GroupContainsAddAnother(component_id));
  }
  if collection
    .ancestors_of(component_id)
    .iter()
    .any(|g| g.add_another)
  {
    return Err(Error::AddAnotherNotValid(component_id));
  }

  // Nothing outside may depend on a question inside the new container.
  let inside: Vec<Uuid> = match component {
    Component::Question(q) => vec![q.id],
    Component::Group(g) => {
      let mut ids = vec![component_id];
      let mut stack: Vec<&Component> = g.components.iter().collect();
      while let Some(c) = stack.pop() {
        ids.push(c.id());
        if let Component::Group(inner) = c {
          stack.extend(inner.components.iter());
        }
      }
      ids
    }
  };

  for reference in collect_all_references(collection)? {
    if inside.contains(&reference.depends_on_component_id)
      && !inside.contains(&reference.component_id)
    {
      return Err(Error::AddAnotherDependency {
        component_id:           reference.component_id,
        referenced_question_id: reference.depends_on_component_id,
      });
    }
  }
  Ok(())
}

/// Deletion guard: nothing else may reference the component or anything
/// inside it.
pub fn check_component_has_no_dependencies(
  collection: &Collection,
  component_id: Uuid,
) -> Result<()> {
  let component = collection
    .component_by_id(component_id)
    .ok_or(Error::ComponentNotFound(component_id))?;

  let mut inside = vec![component_id];
  if let Component::Group(g) = component {
    let mut stack: Vec<&Component> = g.components.iter().collect();
    while let Some(c) = stack.pop() {
      inside.push(c.id());
      if let Component::Group(inner) = c {
        stack.extend(inner.components.iter());
      }
    }
  }

  let mut dependents: Vec<Uuid> = Vec::new();
  for reference in collect_all_references(collection)? {
    if inside.contains(&reference.depends_on_component_id)
      && !inside.contains(&reference.component_id)
      && !dependents.contains(&reference.component_id)
    {
      dependents.push(reference.component_id);
    }
  }
  if dependents.is_empty() {
    Ok(())
  } else {
    Err(Error::ComponentHasDependencies {
      component_id,
      dependents,
    })
  }
}

/// Option-removal guard: enumerate every question whose expressions pin one
/// of the `removed_keys` before raising.
pub fn check_data_source_items_not_referenced(
  collection: &Collection,
  question_id: Uuid,
  removed_keys: &[String],
) -> Result<()> {
  let mut dependents: Vec<DataSourceItemDependency> = Vec::new();

  for question in collection.all_questions() {
    let mut pinned: Vec<String> = Vec::new();
    for expression in &question.expressions {
      let Ok(managed) = expression.managed() else {
        continue;
      };
      if managed.referenced_question_id() != question_id {
        continue;
      }
      for key in managed.referenced_data_source_keys() {
        if removed_keys.iter().any(|k| k == key)
          && !pinned.iter().any(|k| k == key)
        {
          pinned.push(key.to_string());
        }
      }
    }
    if !pinned.is_empty() {
      dependents.push(DataSourceItemDependency {
        question_id:   question.id,
        question_name: question.name.clone(),
        item_keys:     pinned,
      });
    }
  }

  if dependents.is_empty() {
    Ok(())
  } else {
    Err(Error::DataSourceItemReference {
      question_id,
      dependents,
    })
  }
}

// ─── Reorder guards ──────────────────────────────────────────────────────────

/// Reorder guard: simulate swapping two sibling components and re-validate
/// every reference edge against the new display order.
pub fn check_component_swap(
  collection: &Collection,
  a_id: Uuid,
  b_id: Uuid,
) -> Result<()> {
  let mut simulated = collection.clone();
  for section in &mut simulated.sections {
    for form in &mut section.forms {
      if swap_in(&mut form.components, a_id, b_id) {
        collect_all_references(&simulated)?;
        return Ok(());
      }
    }
  }
  Err(Error::ComponentNotFound(a_id))
}

/// Reorder guard for whole forms within a section.
pub fn check_form_swap(
  collection: &Collection,
  a_id: Uuid,
  b_id: Uuid,
) -> Result<()> {
  let mut simulated = collection.clone();
  for section in &mut simulated.sections {
    let a = section.forms.iter().position(|f| f.id == a_id);
    let b = section.forms.iter().position(|f| f.id == b_id);
    if let (Some(a), Some(b)) = (a, b) {
      let order_a = section.forms[a].order;
      section.forms[a].order = section.forms[b].order;
      section.forms[b].order = order_a;
      section.forms.swap(a, b);
      collect_all_references(&simulated)?;
      return Ok(());
    }
  }
  Err(Error::FormNotFound(a_id))
}

/// Reorder guard for whole sections.
pub fn check_section_swap(
  collection: &Collection,
  a_id: Uuid,
  b_id: Uuid,
) -> Result<()> {
  let mut simulated = collection.clone();
  let a = simulated.sections.iter().position(|s| s.id == a_id);
  let b = simulated.sections.iter().position(|s| s.id == b_id);
  let (Some(a), Some(b)) = (a, b) else {
    return Err(Error::ComponentNotFound(a_id));
  };
  let order_a = simulated.sections[a].order;
  simulated.sections[a].order = simulated.sections[b].order;
  simulated.sections[b].order = order_a;
  simulated.sections.swap(a, b);
  collect_all_references(&simulated)?;
  Ok(())
}

/// Swap two siblings (order fields and positions) anywhere in a component
/// tree. Returns `true` if both were found in the same parent.
fn swap_in(components: &mut Vec<Component>, a_id: Uuid, b_id: Uuid) -> bool {
  let a = components.iter().position(|c| c.id() == a_id);
  let b = components.iter().position(|c| c.id() == b_id);
  if let (Some(a), Some(b)) = (a, b) {
    let order_a = components[a].order();
    let order_b = components[b].order();
    *components[a].order_mut() = order_b;
    *components[b].order_mut() = order_a;
    components.swap(a, b);
    return true;
  }
  for component in components.iter_mut() {
    if let Component::Group(g) = component
      && swap_in(&mut g.components, a_id, b_id)
    {
      return true;
    }
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    collection::{Form, Section},
    component::{
      DataSource, DataSourceItem, QuestionDataType, safe_qid,
    },
    expression::{Expression, ExpressionKind},
    managed::{ComparisonValue, ManagedExpression},
  };

  fn question(name: &str, data_type: QuestionDataType, order: u32) -> Question {
    Question {
      id: Uuid::new_v4(),
      name: name.into(),
      slug: name.into(),
      text: format!("{name}?"),
      hint: None,
      data_type,
      presentation: Default::default(),
      data_source: None,
      expressions: Vec::new(),
      add_another: false,
      order,
    }
  }

  fn collection_with(components: Vec<Component>) -> Collection {
    Collection {
      id:       Uuid::new_v4(),
      version:  1,
      name:     "test".into(),
      sections: vec![Section {
        id:    Uuid::new_v4(),
        title: "s".into(),
        slug:  "s".into(),
        order: 0,
        forms: vec![Form {
          id: Uuid::new_v4(),
          title: "f".into(),
          slug: "f".into(),
          order: 0,
          components,
        }],
      }],
    }
  }

  fn condition(managed: &ManagedExpression) -> Expression {
    Expression::new_managed(ExpressionKind::Condition, managed).unwrap()
  }

  #[test]
  fn valid_backward_reference_produces_an_edge() {
    let earlier = question("amount", QuestionDataType::Integer, 0);
    let earlier_id = earlier.id;
    let mut later = question("detail", QuestionDataType::TextSingleLine, 1);
    later.expressions.push(condition(
      &ManagedExpression::GreaterThan {
        question_id:   earlier_id,
        minimum_value: ComparisonValue::Literal(100),
        inclusive:     false,
      },
    ));
    let later_id = later.id;
    let collection = collection_with(vec![
      Component::Question(earlier),
      Component::Question(later),
    ]);

    let refs =
      validate_and_sync_component_references(&collection, later_id).unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].depends_on_component_id, earlier_id);
    assert!(refs[0].expression_id.is_some());
  }

  #[test]
  fn forward_reference_is_a_dependency_order_error() {
    let mut earlier = question("detail", QuestionDataType::TextSingleLine, 0);
    let later = question("choice", QuestionDataType::YesNo, 1);
    let later_id = later.id;
    earlier.expressions.push(condition(
      &ManagedExpression::IsYes { question_id: later_id },
    ));
    let earlier_id = earlier.id;
    let collection = collection_with(vec![
      Component::Question(earlier),
      Component::Question(later),
    ]);

    let err = validate_and_sync_component_references(&collection, earlier_id)
      .unwrap_err();
    assert!(matches!(err, Error::DependencyOrder { .. }));
  }

  #[test]
  fn complex_expression_in_free_text_is_invalid() {
    let amount = question("amount", QuestionDataType::Integer, 0);
    let qid = safe_qid(amount.id);
    let mut later = question("detail", QuestionDataType::TextSingleLine, 1);
    later.text = format!("You asked for (({qid} and true)) pounds");
    let later_id = later.id;
    let collection = collection_with(vec![
      Component::Question(amount),
      Component::Question(later),
    ]);

    let err = validate_and_sync_component_references(&collection, later_id)
      .unwrap_err();
    let Error::InvalidReference { field, reference } = err else {
      panic!("expected InvalidReference");
    };
    assert_eq!(field, "text");
    assert!(reference.contains("and true"));
  }

  #[test]
  fn simple_text_reference_to_earlier_question_is_valid() {
    let amount = question("amount", QuestionDataType::Integer, 0);
    let amount_id = amount.id;
    let qid = safe_qid(amount_id);
    let mut later = question("detail", QuestionDataType::TextSingleLine, 1);
    later.text = format!("You asked for (({qid})) pounds");
    let later_id = later.id;
    let collection = collection_with(vec![
      Component::Question(amount),
      Component::Question(later),
    ]);

    let refs =
      validate_and_sync_component_references(&collection, later_id).unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].depends_on_component_id, amount_id);
    assert!(refs[0].expression_id.is_none());
  }

  #[test]
  fn incompatible_data_type_is_rejected() {
    let text_q = question("words", QuestionDataType::TextSingleLine, 0);
    let text_q_id = text_q.id;
    let mut later = question("detail", QuestionDataType::TextSingleLine, 1);
    later.expressions.push(condition(
      &ManagedExpression::GreaterThan {
        question_id:   text_q_id,
        minimum_value: ComparisonValue::Literal(1),
        inclusive:     false,
      },
    ));
    let later_id = later.id;
    let collection = collection_with(vec![
      Component::Question(text_q),
      Component::Question(later),
    ]);

    assert!(matches!(
      validate_and_sync_component_references(&collection, later_id),
      Err(Error::IncompatibleDataType { .. })
    ));
  }

  #[test]
  fn duplicate_condition_on_same_question_is_rejected() {
    let yes_no = question("likes_cheese", QuestionDataType::YesNo, 0);
    let yes_no_id = yes_no.id;
    let mut later = question("detail", QuestionDataType::TextSingleLine, 1);
    later.expressions.push(condition(
      &ManagedExpression::IsYes { question_id: yes_no_id },
    ));
    later.expressions.push(condition(
      &ManagedExpression::IsYes { question_id: yes_no_id },
    ));
    let later_id = later.id;
    let collection = collection_with(vec![
      Component::Question(yes_no),
      Component::Question(later),
    ]);

    assert!(matches!(
      validate_and_sync_component_references(&collection, later_id),
      Err(Error::DuplicateValue { .. })
    ));
  }

  #[test]
  fn swap_that_breaks_a_dependency_is_rejected() {
    let yes_no = question("likes_cheese", QuestionDataType::YesNo, 0);
    let yes_no_id = yes_no.id;
    let mut dependent = question("email", QuestionDataType::Email, 1);
    dependent.expressions.push(condition(
      &ManagedExpression::IsYes { question_id: yes_no_id },
    ));
    let dependent_id = dependent.id;
    let collection = collection_with(vec![
      Component::Question(yes_no),
      Component::Question(dependent),
    ]);

    let err =
      check_component_swap(&collection, yes_no_id, dependent_id).unwrap_err();
    let Error::DependencyOrder {
      component_id,
      depends_on_id,
      ..
    } = err
    else {
      panic!("expected DependencyOrder");
    };
    assert_eq!(component_id, dependent_id);
    assert_eq!(depends_on_id, yes_no_id);
  }

  #[test]
  fn removing_referenced_data_source_items_is_enumerated() {
    let mut radios = question("choice", QuestionDataType::Radios, 0);
    radios.data_source = Some(DataSource {
      items: ["a", "b", "c"]
        .iter()
        .map(|k| DataSourceItem {
          id:    Uuid::new_v4(),
          key:   (*k).into(),
          label: k.to_uppercase(),
        })
        .collect(),
    });
    let radios_id = radios.id;
    let mut dependent = question("detail", QuestionDataType::TextSingleLine, 1);
    dependent.expressions.push(condition(
      &ManagedExpression::AnyOf {
        question_id: radios_id,
        keys:        vec!["b".into()],
      },
    ));
    let dependent_id = dependent.id;
    let collection = collection_with(vec![
      Component::Question(radios),
      Component::Question(dependent),
    ]);

    let err = check_data_source_items_not_referenced(
      &collection,
      radios_id,
      &["b".to_string()],
    )
    .unwrap_err();
    let Error::DataSourceItemReference { dependents, .. } = err else {
      panic!("expected DataSourceItemReference");
    };
    assert_eq!(dependents.len(), 1);
    assert_eq!(dependents[0].question_id, dependent_id);
    assert_eq!(dependents[0].item_keys, ["b"]);

    // Removing an unreferenced item is fine.
    check_data_source_items_not_referenced(
      &collection,
      radios_id,
      &["c".to_string()],
    )
    .unwrap();
  }

  #[test]
  fn referencing_into_a_repeatable_container_is_rejected() {
    use crate::component::Group;

    let inner = question("contact_name", QuestionDataType::TextSingleLine, 0);
    let inner_id = inner.id;
    let repeat_group = Group {
      id: Uuid::new_v4(),
      name: "contacts".into(),
      slug: "contacts".into(),
      text: "Contacts".into(),
      guidance_heading: None,
      guidance_body: None,
      show_questions_on_the_same_page: false,
      add_another: true,
      expressions: Vec::new(),
      components: vec![Component::Question(inner)],
      order: 0,
    };
    let mut outside = question("summary", QuestionDataType::TextMultiLine, 1);
    outside.text = format!("Tell us about (({}))", safe_qid(inner_id));
    let outside_id = outside.id;
    let collection = collection_with(vec![
      Component::Group(repeat_group),
      Component::Question(outside),
    ]);

    assert!(matches!(
      validate_and_sync_component_references(&collection, outside_id),
      Err(Error::AddAnotherDependency { .. })
    ));
  }

  #[test]
  fn deletion_guard_lists_dependents() {
    let yes_no = question("gate", QuestionDataType::YesNo, 0);
    let yes_no_id = yes_no.id;
    let mut dependent = question("detail", QuestionDataType::TextSingleLine, 1);
    dependent.expressions.push(condition(
      &ManagedExpression::IsYes { question_id: yes_no_id },
    ));
    let dependent_id = dependent.id;
    let collection = collection_with(vec![
      Component::Question(yes_no),
      Component::Question(dependent),
    ]);

    let err = check_component_has_no_dependencies(&collection, yes_no_id)
      .unwrap_err();
    let Error::ComponentHasDependencies { dependents, .. } = err else {
      panic!("expected ComponentHasDependencies");
    };
    assert_eq!(dependents, [dependent_id]);

    check_component_has_no_dependencies(&collection, dependent_id).unwrap();
  }
}
