//! The submission state engine.
//!
//! [`SubmissionHelper`] owns one hydrated collection and one submission and
//! answers every derived question about them: which questions are visible,
//! what the answers are, whether a form is complete, what the submission
//! status is. Nothing derived is ever stored; the helper recomputes (and
//! caches) on demand.
//!
//! Visibility is fail-closed: a condition that cannot be evaluated because
//! it references an unanswered question hides the component and logs a
//! warning. Conditional chains therefore collapse safely instead of
//! surfacing questions whose gate is unknowable.

use formwork_core::{
  Error, Result,
  answer::Answer,
  collection::Collection,
  component::{Component, Question, safe_qid},
  expression::{Expression, ExpressionKind},
  submission::{EventKey, FormStatus, Submission, SubmissionStatus},
};
use formwork_expr::{ContextLayer, LayeredContext, Value};
use uuid::Uuid;

use crate::{
  cache::DerivedCache,
  export::{ExportRow, ExportValue},
};

pub struct SubmissionHelper {
  collection: Collection,
  submission: Submission,
  /// Strict lookup context for condition/validation evaluation.
  evaluation_ctx:    LayeredContext,
  /// Same answers plus the question-name placeholder layer, for
  /// interpolating display text.
  interpolation_ctx: LayeredContext,
  cache: DerivedCache,
}

impl SubmissionHelper {
  pub fn new(collection: Collection, submission: Submission) -> Result<Self> {
    let mut helper = Self {
      collection,
      submission,
      evaluation_ctx: LayeredContext::default(),
      interpolation_ctx: LayeredContext::default(),
      cache: DerivedCache::default(),
    };
    helper.rebuild_contexts()?;
    Ok(helper)
  }

  pub fn collection(&self) -> &Collection { &self.collection }

  pub fn submission(&self) -> &Submission { &self.submission }

  /// Hand the (possibly mutated) submission back for persistence.
  pub fn into_submission(self) -> Submission { self.submission }

  pub fn evaluation_context(&self) -> &LayeredContext { &self.evaluation_ctx }

  /// Interpolate `((...))` spans in display text against the current
  /// answers, falling back to question-name placeholders.
  pub fn interpolate(&self, text: &str) -> Result<String> {
    Ok(formwork_expr::interpolate(text, &self.interpolation_ctx)?)
  }

  // ── Contexts ────────────────────────────────────────────────────────────

  /// Rebuild both evaluation contexts from the submission data. Answers
  /// inside add-another containers are per-entry and excluded here; entry
  /// evaluation overlays them via [`Self::visible_questions_for_entry`].
  fn rebuild_contexts(&mut self) -> Result<()> {
    let mut answers = ContextLayer::new();
    let mut names = ContextLayer::new();
    for question in self.collection.all_questions() {
      names.insert(
        question.safe_qid(),
        Value::Str(format!("(( {} ))", question.name)),
      );
      if self.collection.add_another_container_of(question.id).is_some() {
        continue;
      }
      if let Some(json) = self.submission.answer_json(question.id) {
        let answer = Answer::from_json(question.data_type, json)?;
        answers.insert(question.safe_qid(), answer.to_value());
      }
    }
    self.evaluation_ctx.set_submission_layer(answers.clone());
    self.interpolation_ctx.set_submission_layer(answers);
    self.interpolation_ctx.set_question_names_layer(names);
    Ok(())
  }

  /// One repeat entry's answers as a context layer keyed by safe qid.
  fn entry_layer(
    &self,
    container_id: Uuid,
    index: usize,
  ) -> Result<ContextLayer> {
    let entries = self.submission.add_another_entries(container_id);
    let entry = entries.get(index).ok_or(Error::IndexOutOfRange {
      index,
      len: entries.len(),
    })?;
    let mut layer = ContextLayer::new();
    for (key, json) in entry.iter() {
      let Ok(question_id) = Uuid::parse_str(key) else {
        continue;
      };
      let Some(question) = self.collection.question_by_id(question_id) else {
        continue;
      };
      let answer = Answer::from_json(question.data_type, json)?;
      layer.insert(safe_qid(question_id), answer.to_value());
    }
    Ok(layer)
  }

  // ── Visibility ──────────────────────────────────────────────────────────

  /// Visible questions of a form in display order. Conditions are evaluated
  /// outside-in: an ancestor group's failing condition hides everything
  /// below it without evaluating the children.
  pub fn ordered_visible_questions(
    &mut self,
    form_id: Uuid,
  ) -> Result<Vec<Uuid>> {
    if let Some(cached) = self.cache.visible.get(&form_id) {
      return Ok(cached.clone());
    }
    let form = self
      .collection
      .form_by_id(form_id)
      .ok_or(Error::FormNotFound(form_id))?;
    let mut visible = Vec::new();
    for question in form.questions() {
      if self.question_visible(question.id, &self.evaluation_ctx)? {
        visible.push(question.id);
      }
    }
    self.cache.visible.insert(form_id, visible.clone());
    Ok(visible)
  }

  /// Visible questions of one repeat entry, with that entry's answers
  /// overlaid so in-container conditions see their own entry.
  pub fn visible_questions_for_entry(
    &self,
    container_id: Uuid,
    index: usize,
  ) -> Result<Vec<Uuid>> {
    let mut ctx = self.evaluation_ctx.clone();
    ctx.set_form_layer(self.entry_layer(container_id, index)?);

    let container = self
      .collection
      .component_by_id(container_id)
      .ok_or(Error::ComponentNotFound(container_id))?;
    let mut questions: Vec<&Question> = Vec::new();
    collect_questions(std::slice::from_ref(container), &mut questions);

    let mut visible = Vec::new();
    for question in questions {
      if self.question_visible(question.id, &ctx)? {
        visible.push(question.id);
      }
    }
    Ok(visible)
  }

  fn question_visible(
    &self,
    question_id: Uuid,
    ctx: &LayeredContext,
  ) -> Result<bool> {
    for group in self.collection.ancestors_of(question_id) {
      for expression in condition_expressions(&group.expressions) {
        if !self.condition_holds(expression, ctx)? {
          return Ok(false);
        }
      }
    }
    let component = self
      .collection
      .component_by_id(question_id)
      .ok_or(Error::ComponentNotFound(question_id))?;
    for expression in condition_expressions(component.expressions()) {
      if !self.condition_holds(expression, ctx)? {
        return Ok(false);
      }
    }
    Ok(true)
  }

  fn condition_holds(
    &self,
    expression: &Expression,
    ctx: &LayeredContext,
  ) -> Result<bool> {
    let statement = expression.managed()?.statement();
    match formwork_expr::evaluate(&statement, ctx) {
      Ok(holds) => Ok(holds),
      Err(formwork_expr::Error::UndefinedVariable(name)) => {
        // Fail closed: an unanswerable gate hides the component.
        tracing::warn!(
          name = %name,
          statement = %statement,
          "condition references an unanswered question, hiding component"
        );
        Ok(false)
      }
      Err(e) => Err(e.into()),
    }
  }

  // ── Answers ─────────────────────────────────────────────────────────────

  /// The decoded answer to a top-level question, `None` if unanswered.
  pub fn answer_for_question(
    &mut self,
    question_id: Uuid,
  ) -> Result<Option<Answer>> {
    if let Some(cached) = self.cache.answers.get(&question_id) {
      return Ok(cached.clone());
    }
    let question = self
      .collection
      .question_by_id(question_id)
      .ok_or(Error::ComponentNotFound(question_id))?;
    let answer = match self.submission.answer_json(question_id) {
      Some(json) => Some(Answer::from_json(question.data_type, json)?),
      None => None,
    };
    self.cache.answers.insert(question_id, answer.clone());
    Ok(answer)
  }

  /// Per-entry answers to a question inside a repeat container, one slot
  /// per entry.
  pub fn add_another_answers(
    &self,
    container_id: Uuid,
    question_id: Uuid,
  ) -> Result<Vec<Option<Answer>>> {
    let question = self
      .collection
      .question_by_id(question_id)
      .ok_or(Error::ComponentNotFound(question_id))?;
    let mut answers = Vec::new();
    for entry in self.submission.add_another_entries(container_id) {
      answers.push(match entry.get(&question_id.to_string()) {
        Some(json) => Some(Answer::from_json(question.data_type, json)?),
        None => None,
      });
    }
    Ok(answers)
  }

  pub fn all_questions_answered_for_form(
    &mut self,
    form_id: Uuid,
  ) -> Result<bool> {
    if let Some(&cached) = self.cache.all_answered.get(&form_id) {
      return Ok(cached);
    }
    let visible = self.ordered_visible_questions(form_id)?;
    let mut all = true;
    for question_id in visible {
      if !self.question_answered(question_id)? {
        all = false;
        break;
      }
    }
    self.cache.all_answered.insert(form_id, all);
    Ok(all)
  }

  fn question_answered(&mut self, question_id: Uuid) -> Result<bool> {
    match self.collection.add_another_container_of(question_id) {
      None => Ok(self.answer_for_question(question_id)?.is_some()),
      Some(container_id) => {
        let entries = self.submission.add_another_entries(container_id);
        Ok(
          !entries.is_empty()
            && entries
              .iter()
              .all(|e| e.contains_key(&question_id.to_string())),
        )
      }
    }
  }

  // ── Status derivation ───────────────────────────────────────────────────

  pub fn form_status(&mut self, form_id: Uuid) -> Result<FormStatus> {
    let marked = self
      .submission
      .has_event(EventKey::FormCompleted, Some(form_id));
    if marked {
      // The event alone is not enough: a later gate edit can reveal a
      // question that was never answered, and a form with no questions
      // cannot be complete. Re-check on every read.
      let has_questions = !self
        .collection
        .form_by_id(form_id)
        .ok_or(Error::FormNotFound(form_id))?
        .questions()
        .is_empty();
      if has_questions && self.all_questions_answered_for_form(form_id)? {
        return Ok(FormStatus::Completed);
      }
      return Ok(FormStatus::InProgress);
    }
    for question_id in self.ordered_visible_questions(form_id)? {
      if self.question_answered(question_id)? {
        return Ok(FormStatus::InProgress);
      }
    }
    Ok(FormStatus::NotStarted)
  }

  /// Derived from the per-form statuses: completed only when the submitted
  /// event exists *and* every form still checks out as completed.
  pub fn status(&mut self) -> Result<SubmissionStatus> {
    let form_ids: Vec<Uuid> = self.collection.forms().map(|f| f.id).collect();
    let mut statuses = Vec::with_capacity(form_ids.len());
    for form_id in form_ids {
      statuses.push(self.form_status(form_id)?);
    }
    if self.submission.is_submitted()
      && statuses.iter().all(|s| *s == FormStatus::Completed)
    {
      Ok(SubmissionStatus::Completed)
    } else if statuses.iter().all(|s| *s == FormStatus::NotStarted) {
      Ok(SubmissionStatus::NotStarted)
    } else {
      Ok(SubmissionStatus::InProgress)
    }
  }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Store an answer to a top-level question. Rejected once the submission
  /// is submitted.
  pub fn submit_answer(
    &mut self,
    question_id: Uuid,
    answer: Answer,
  ) -> Result<()> {
    self.check_writable()?;
    let question = self
      .collection
      .question_by_id(question_id)
      .ok_or(Error::ComponentNotFound(question_id))?;
    if self.collection.add_another_container_of(question_id).is_some() {
      return Err(Error::InvalidBuilderInput {
        field:  "question_id".into(),
        detail: "answer belongs to an add-another entry".into(),
      });
    }
    check_choice_keys(question, &answer)?;
    self.submission.set_answer(question_id, answer.to_json());
    self.invalidate_after_answer_write()
  }

  /// Store one field of one repeat entry.
  pub fn submit_add_another_answer(
    &mut self,
    container_id: Uuid,
    index: usize,
    question_id: Uuid,
    answer: Answer,
  ) -> Result<()> {
    self.check_writable()?;
    let question = self
      .collection
      .question_by_id(question_id)
      .ok_or(Error::ComponentNotFound(question_id))?;
    if self.collection.add_another_container_of(question_id)
      != Some(container_id)
    {
      return Err(Error::InvalidBuilderInput {
        field:  "question_id".into(),
        detail: "question is not inside this add-another container".into(),
      });
    }
    check_choice_keys(question, &answer)?;
    self.submission.set_add_another_answer(
      container_id,
      index,
      question_id,
      answer.to_json(),
    );
    self.invalidate_after_answer_write()
  }

  /// Remove one repeat entry; later entries shift down.
  pub fn remove_add_another_entry(
    &mut self,
    container_id: Uuid,
    index: usize,
  ) -> Result<()> {
    self.check_writable()?;
    self.submission.remove_add_another_entry(container_id, index)?;
    self.invalidate_after_answer_write()
  }

  /// Mark a form complete or incomplete. No-op when already in the
  /// requested state; completing requires at least one question and every
  /// visible question answered.
  pub fn toggle_form_completed(
    &mut self,
    form_id: Uuid,
    user: &str,
    complete: bool,
  ) -> Result<()> {
    self.check_writable()?;
    let has_questions = !self
      .collection
      .form_by_id(form_id)
      .ok_or(Error::FormNotFound(form_id))?
      .questions()
      .is_empty();
    let already = self
      .submission
      .has_event(EventKey::FormCompleted, Some(form_id));
    match (complete, already) {
      (true, true) | (false, false) => Ok(()),
      (true, false) => {
        if !has_questions || !self.all_questions_answered_for_form(form_id)? {
          return Err(Error::IncompleteForm(form_id));
        }
        self
          .submission
          .append_event(EventKey::FormCompleted, user, Some(form_id));
        Ok(())
      }
      (false, true) => {
        self
          .submission
          .remove_events(EventKey::FormCompleted, Some(form_id));
        Ok(())
      }
    }
  }

  /// Submit the whole submission. Idempotent; requires every form to be
  /// marked complete.
  pub fn submit(&mut self, user: &str) -> Result<()> {
    if self.submission.is_submitted() {
      return Ok(());
    }
    let form_ids: Vec<Uuid> = self.collection.forms().map(|f| f.id).collect();
    for form_id in form_ids {
      if self.form_status(form_id)? != FormStatus::Completed {
        return Err(Error::FormsNotCompleted(self.submission.id));
      }
    }
    self
      .submission
      .append_event(EventKey::SubmissionSubmitted, user, None);
    Ok(())
  }

  fn check_writable(&self) -> Result<()> {
    if self.submission.is_submitted() {
      Err(Error::SubmissionCompleted(self.submission.id))
    } else {
      Ok(())
    }
  }

  fn invalidate_after_answer_write(&mut self) -> Result<()> {
    self.cache.invalidate_answers();
    self.cache.invalidate_all_answered();
    // Visibility depends on answers too: a changed gate answer can hide or
    // reveal downstream questions.
    self.cache.invalidate_visible();
    self.rebuild_contexts()
  }

  // ── Navigation ──────────────────────────────────────────────────────────

  pub fn get_next_question(
    &mut self,
    form_id: Uuid,
    question_id: Uuid,
  ) -> Result<Option<Uuid>> {
    let visible = self.ordered_visible_questions(form_id)?;
    Ok(
      visible
        .iter()
        .position(|&id| id == question_id)
        .and_then(|i| visible.get(i + 1))
        .copied(),
    )
  }

  pub fn get_previous_question(
    &mut self,
    form_id: Uuid,
    question_id: Uuid,
  ) -> Result<Option<Uuid>> {
    let visible = self.ordered_visible_questions(form_id)?;
    Ok(
      visible
        .iter()
        .position(|&id| id == question_id)
        .filter(|&i| i > 0)
        .and_then(|i| visible.get(i - 1))
        .copied(),
    )
  }

  // ── Export ──────────────────────────────────────────────────────────────

  /// One row per question in display order, over *all* questions. A hidden
  /// question exports as `NotAsked`, a visible unanswered one as
  /// `NotAnswered`; the two are deliberately distinct.
  pub fn export_rows(&mut self) -> Result<Vec<ExportRow>> {
    let mut visible = Vec::new();
    let form_ids: Vec<Uuid> = self.collection.forms().map(|f| f.id).collect();
    for form_id in form_ids {
      visible.extend(self.ordered_visible_questions(form_id)?);
    }

    let question_ids: Vec<Uuid> =
      self.collection.all_questions().iter().map(|q| q.id).collect();
    let mut rows = Vec::new();
    for question_id in question_ids {
      let answer = self.answer_for_question(question_id)?;
      let question = self
        .collection
        .question_by_id(question_id)
        .ok_or(Error::ComponentNotFound(question_id))?;
      let value = if !visible.contains(&question_id) {
        ExportValue::NotAsked
      } else if let Some(container_id) =
        self.collection.add_another_container_of(question_id)
      {
        let mut parts = Vec::new();
        for entry in self.submission.add_another_entries(container_id) {
          if let Some(json) = entry.get(&question_id.to_string()) {
            let answer = Answer::from_json(question.data_type, json)?;
            parts.push(answer.display(question.data_source.as_ref()));
          }
        }
        if parts.is_empty() {
          ExportValue::NotAnswered
        } else {
          ExportValue::Answered(parts.join("; "))
        }
      } else {
        match answer {
          Some(answer) => {
            ExportValue::Answered(answer.display(question.data_source.as_ref()))
          }
          None => ExportValue::NotAnswered,
        }
      };
      rows.push(ExportRow {
        header: question.name.clone(),
        value,
      });
    }
    Ok(rows)
  }
}

fn condition_expressions(
  expressions: &[Expression],
) -> impl Iterator<Item = &Expression> {
  expressions
    .iter()
    .filter(|e| e.kind == ExpressionKind::Condition)
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

/// Choice answers must use keys that exist in the question's data source.
fn check_choice_keys(question: &Question, answer: &Answer) -> Result<()> {
  let keys: Vec<&str> = match answer {
    Answer::SingleChoice(key) => vec![key.as_str()],
    Answer::MultipleChoice(keys) => keys.iter().map(String::as_str).collect(),
    _ => return Ok(()),
  };
  let data_source = question.data_source.as_ref();
  for key in keys {
    if data_source.and_then(|ds| ds.item_by_key(key)).is_none() {
      return Err(Error::UnknownDataSourceItem {
        question_id: question.id,
        key:         key.to_string(),
      });
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use formwork_core::{
    collection::{Form, Section},
    component::{Group, QuestionDataType},
    expression::{Expression, ExpressionKind},
    managed::ManagedExpression,
    submission::SubmissionMode,
  };

  use super::*;

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

  fn condition(managed: &ManagedExpression) -> Expression {
    Expression::new_managed(ExpressionKind::Condition, managed).unwrap()
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

  fn helper_for(collection: Collection) -> SubmissionHelper {
    let submission = Submission::new(
      collection.id,
      collection.version,
      SubmissionMode::Test,
      "tester",
    );
    SubmissionHelper::new(collection, submission).unwrap()
  }

  /// A yes/no gate and a dependent question: unanswered hides (fail
  /// closed), "yes" reveals, "no" hides again.
  #[test]
  fn conditional_question_follows_its_gate() {
    let gate = question("gate", QuestionDataType::YesNo, 0);
    let gate_id = gate.id;
    let mut dependent =
      question("detail", QuestionDataType::TextSingleLine, 1);
    dependent
      .expressions
      .push(condition(&ManagedExpression::IsYes { question_id: gate_id }));
    let dependent_id = dependent.id;
    let collection = collection_with(vec![
      Component::Question(gate),
      Component::Question(dependent),
    ]);
    let form_id = collection.forms().next().unwrap().id;
    let mut helper = helper_for(collection);

    assert_eq!(
      helper.ordered_visible_questions(form_id).unwrap(),
      [gate_id]
    );

    helper.submit_answer(gate_id, Answer::YesNo(true)).unwrap();
    assert_eq!(
      helper.ordered_visible_questions(form_id).unwrap(),
      [gate_id, dependent_id]
    );

    helper.submit_answer(gate_id, Answer::YesNo(false)).unwrap();
    assert_eq!(
      helper.ordered_visible_questions(form_id).unwrap(),
      [gate_id]
    );
  }

  /// A failing group condition hides every nested question without
  /// evaluating their own conditions.
  #[test]
  fn group_condition_hides_children() {
    let gate = question("gate", QuestionDataType::YesNo, 0);
    let gate_id = gate.id;
    let inner = question("inner", QuestionDataType::TextSingleLine, 0);
    let inner_id = inner.id;
    let group = Group {
      id: Uuid::new_v4(),
      name: "section".into(),
      slug: "section".into(),
      text: "Section".into(),
      guidance_heading: None,
      guidance_body: None,
      show_questions_on_the_same_page: false,
      add_another: false,
      expressions: vec![condition(&ManagedExpression::IsYes {
        question_id: gate_id,
      })],
      components: vec![Component::Question(inner)],
      order: 1,
    };
    let collection = collection_with(vec![
      Component::Question(gate),
      Component::Group(group),
    ]);
    let form_id = collection.forms().next().unwrap().id;
    let mut helper = helper_for(collection);

    helper.submit_answer(gate_id, Answer::YesNo(false)).unwrap();
    assert_eq!(
      helper.ordered_visible_questions(form_id).unwrap(),
      [gate_id]
    );

    helper.submit_answer(gate_id, Answer::YesNo(true)).unwrap();
    assert_eq!(
      helper.ordered_visible_questions(form_id).unwrap(),
      [gate_id, inner_id]
    );
  }

  #[test]
  fn completion_and_submit_guards() {
    let q1 = question("one", QuestionDataType::TextSingleLine, 0);
    let q1_id = q1.id;
    let collection = collection_with(vec![Component::Question(q1)]);
    let form_id = collection.forms().next().unwrap().id;
    let mut helper = helper_for(collection);

    assert_eq!(helper.form_status(form_id).unwrap(), FormStatus::NotStarted);
    assert_eq!(helper.status().unwrap(), SubmissionStatus::NotStarted);

    // Completing with an unanswered question is rejected.
    assert!(matches!(
      helper.toggle_form_completed(form_id, "tester", true),
      Err(Error::IncompleteForm(_))
    ));

    helper
      .submit_answer(q1_id, Answer::Text("hello".into()))
      .unwrap();
    assert_eq!(helper.form_status(form_id).unwrap(), FormStatus::InProgress);
    assert_eq!(helper.status().unwrap(), SubmissionStatus::InProgress);

    // Submitting before the form is marked complete is rejected.
    assert!(matches!(
      helper.submit("tester"),
      Err(Error::FormsNotCompleted(_))
    ));

    helper.toggle_form_completed(form_id, "tester", true).unwrap();
    assert_eq!(helper.form_status(form_id).unwrap(), FormStatus::Completed);
    // Toggling to the same state is a no-op.
    helper.toggle_form_completed(form_id, "tester", true).unwrap();

    helper.submit("tester").unwrap();
    assert_eq!(helper.status().unwrap(), SubmissionStatus::Completed);
    // Idempotent.
    helper.submit("tester").unwrap();

    // All writes are rejected after submission.
    assert!(matches!(
      helper.submit_answer(q1_id, Answer::Text("late".into())),
      Err(Error::SubmissionCompleted(_))
    ));
    assert!(matches!(
      helper.toggle_form_completed(form_id, "tester", false),
      Err(Error::SubmissionCompleted(_))
    ));
  }

  #[test]
  fn uncompleting_a_form_reopens_it() {
    let q1 = question("one", QuestionDataType::TextSingleLine, 0);
    let q1_id = q1.id;
    let collection = collection_with(vec![Component::Question(q1)]);
    let form_id = collection.forms().next().unwrap().id;
    let mut helper = helper_for(collection);

    helper
      .submit_answer(q1_id, Answer::Text("hello".into()))
      .unwrap();
    helper.toggle_form_completed(form_id, "tester", true).unwrap();
    helper.toggle_form_completed(form_id, "tester", false).unwrap();
    assert_eq!(helper.form_status(form_id).unwrap(), FormStatus::InProgress);
    assert!(matches!(
      helper.submit("tester"),
      Err(Error::FormsNotCompleted(_))
    ));
  }

  /// Completing a form pins nothing: editing a gate answer afterwards can
  /// reveal an unanswered question, and the form must fall back to in
  /// progress until it is answered.
  #[test]
  fn editing_a_gate_answer_reopens_a_completed_form() {
    let gate = question("gate", QuestionDataType::YesNo, 0);
    let gate_id = gate.id;
    let mut dependent =
      question("detail", QuestionDataType::TextSingleLine, 1);
    dependent
      .expressions
      .push(condition(&ManagedExpression::IsYes { question_id: gate_id }));
    let dependent_id = dependent.id;
    let collection = collection_with(vec![
      Component::Question(gate),
      Component::Question(dependent),
    ]);
    let form_id = collection.forms().next().unwrap().id;
    let mut helper = helper_for(collection);

    helper.submit_answer(gate_id, Answer::YesNo(false)).unwrap();
    helper.toggle_form_completed(form_id, "tester", true).unwrap();
    assert_eq!(helper.form_status(form_id).unwrap(), FormStatus::Completed);

    // Flipping the gate reveals the dependent question, unanswered.
    helper.submit_answer(gate_id, Answer::YesNo(true)).unwrap();
    assert_eq!(helper.form_status(form_id).unwrap(), FormStatus::InProgress);
    assert_eq!(helper.status().unwrap(), SubmissionStatus::InProgress);
    assert!(matches!(
      helper.submit("tester"),
      Err(Error::FormsNotCompleted(_))
    ));

    helper
      .submit_answer(dependent_id, Answer::Text("filled in".into()))
      .unwrap();
    assert_eq!(helper.form_status(form_id).unwrap(), FormStatus::Completed);
    helper.submit("tester").unwrap();
  }

  /// A form with no questions has nothing to answer and can never be
  /// completed or counted towards submission.
  #[test]
  fn a_form_without_questions_cannot_be_completed() {
    let collection = collection_with(Vec::new());
    let form_id = collection.forms().next().unwrap().id;
    let mut helper = helper_for(collection);

    assert!(matches!(
      helper.toggle_form_completed(form_id, "tester", true),
      Err(Error::IncompleteForm(_))
    ));
    assert_eq!(helper.form_status(form_id).unwrap(), FormStatus::NotStarted);
    assert_eq!(helper.status().unwrap(), SubmissionStatus::NotStarted);
    assert!(matches!(
      helper.submit("tester"),
      Err(Error::FormsNotCompleted(_))
    ));
  }

  #[test]
  fn export_distinguishes_not_asked_from_not_answered() {
    let gate = question("gate", QuestionDataType::YesNo, 0);
    let gate_id = gate.id;
    let mut hidden = question("hidden", QuestionDataType::TextSingleLine, 1);
    hidden
      .expressions
      .push(condition(&ManagedExpression::IsYes { question_id: gate_id }));
    let unanswered = question("unanswered", QuestionDataType::Integer, 2);
    let collection = collection_with(vec![
      Component::Question(gate),
      Component::Question(hidden),
      Component::Question(unanswered),
    ]);
    let mut helper = helper_for(collection);

    helper.submit_answer(gate_id, Answer::YesNo(false)).unwrap();
    let rows = helper.export_rows().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].header, "gate");
    assert_eq!(rows[0].value, ExportValue::Answered("No".into()));
    assert_eq!(rows[1].value, ExportValue::NotAsked);
    assert_eq!(rows[2].value, ExportValue::NotAnswered);
  }

  #[test]
  fn add_another_entries_are_per_entry_and_splice_on_remove() {
    let name_q = question("contact", QuestionDataType::TextSingleLine, 0);
    let name_q_id = name_q.id;
    let container = Group {
      id: Uuid::new_v4(),
      name: "contacts".into(),
      slug: "contacts".into(),
      text: "Contacts".into(),
      guidance_heading: None,
      guidance_body: None,
      show_questions_on_the_same_page: false,
      add_another: true,
      expressions: Vec::new(),
      components: vec![Component::Question(name_q)],
      order: 0,
    };
    let container_id = container.id;
    let collection = collection_with(vec![Component::Group(container)]);
    let mut helper = helper_for(collection);

    for (i, name) in ["alice", "bob", "carol"].iter().enumerate() {
      helper
        .submit_add_another_answer(
          container_id,
          i,
          name_q_id,
          Answer::Text((*name).into()),
        )
        .unwrap();
    }
    helper.remove_add_another_entry(container_id, 1).unwrap();

    let answers = helper
      .add_another_answers(container_id, name_q_id)
      .unwrap();
    assert_eq!(
      answers,
      [
        Some(Answer::Text("alice".into())),
        Some(Answer::Text("carol".into())),
      ]
    );
  }

  #[test]
  fn entry_conditions_see_their_own_entry() {
    let gate = question("entry_gate", QuestionDataType::YesNo, 0);
    let gate_id = gate.id;
    let mut dependent =
      question("entry_detail", QuestionDataType::TextSingleLine, 1);
    dependent
      .expressions
      .push(condition(&ManagedExpression::IsYes { question_id: gate_id }));
    let dependent_id = dependent.id;
    let container = Group {
      id: Uuid::new_v4(),
      name: "entries".into(),
      slug: "entries".into(),
      text: "Entries".into(),
      guidance_heading: None,
      guidance_body: None,
      show_questions_on_the_same_page: false,
      add_another: true,
      expressions: Vec::new(),
      components: vec![
        Component::Question(gate),
        Component::Question(dependent),
      ],
      order: 0,
    };
    let container_id = container.id;
    let collection = collection_with(vec![Component::Group(container)]);
    let mut helper = helper_for(collection);

    helper
      .submit_add_another_answer(
        container_id,
        0,
        gate_id,
        Answer::YesNo(true),
      )
      .unwrap();
    helper
      .submit_add_another_answer(
        container_id,
        1,
        gate_id,
        Answer::YesNo(false),
      )
      .unwrap();

    assert_eq!(
      helper.visible_questions_for_entry(container_id, 0).unwrap(),
      [gate_id, dependent_id]
    );
    assert_eq!(
      helper.visible_questions_for_entry(container_id, 1).unwrap(),
      [gate_id]
    );
  }

  #[test]
  fn next_and_previous_walk_the_visible_list() {
    let q1 = question("one", QuestionDataType::TextSingleLine, 0);
    let q2 = question("two", QuestionDataType::TextSingleLine, 1);
    let q3 = question("three", QuestionDataType::TextSingleLine, 2);
    let (id1, id2, id3) = (q1.id, q2.id, q3.id);
    let collection = collection_with(vec![
      Component::Question(q1),
      Component::Question(q2),
      Component::Question(q3),
    ]);
    let form_id = collection.forms().next().unwrap().id;
    let mut helper = helper_for(collection);

    assert_eq!(helper.get_next_question(form_id, id1).unwrap(), Some(id2));
    assert_eq!(helper.get_next_question(form_id, id3).unwrap(), None);
    assert_eq!(
      helper.get_previous_question(form_id, id2).unwrap(),
      Some(id1)
    );
    assert_eq!(helper.get_previous_question(form_id, id1).unwrap(), None);
  }

  #[test]
  fn interpolation_falls_back_to_question_names() {
    let amount = question("grant amount", QuestionDataType::Integer, 0);
    let amount_id = amount.id;
    let qid = safe_qid(amount_id);
    let collection = collection_with(vec![Component::Question(amount)]);
    let mut helper = helper_for(collection);

    let text = format!("You asked for (({qid})) pounds");
    assert_eq!(
      helper.interpolate(&text).unwrap(),
      "You asked for (( grant amount )) pounds"
    );

    helper
      .submit_answer(amount_id, Answer::Integer(3000))
      .unwrap();
    assert_eq!(
      helper.interpolate(&text).unwrap(),
      "You asked for 3000 pounds"
    );
  }
}
