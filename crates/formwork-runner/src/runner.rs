//! Page routing for the form runner.
//!
//! A "page" is either a single question or a whole group rendered on one
//! page (`show_questions_on_the_same_page`). The runner resolves the
//! current page, then computes where "continue" and "back" lead. URLs are
//! produced by an injected [`UrlMap`] so the same routing serves multiple
//! route namespaces (respondent preview, test submissions, live runner).

use formwork_core::{
  Error, Result,
  collection::Collection,
  component::Component,
};
use uuid::Uuid;

use crate::helper::SubmissionHelper;

// ─── Page model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
  /// One page component: a question or a same-page group.
  Question(Uuid),
  CheckYourAnswers,
  Tasklist,
}

/// Where the user navigated from, carried as a query parameter. Arriving
/// from check-your-answers short-circuits the back link straight there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  CheckYourAnswers,
}

/// Maps routing decisions to concrete URLs.
pub trait UrlMap {
  fn question_url(&self, form_id: Uuid, component_id: Uuid) -> String;
  fn check_your_answers_url(&self, form_id: Uuid) -> String;
  fn tasklist_url(&self) -> String;
}

// ─── Runner ──────────────────────────────────────────────────────────────────

pub struct FormRunner<'a> {
  helper:  &'a mut SubmissionHelper,
  form_id: Uuid,
  page:    PageState,
  source:  Option<Source>,
}

impl<'a> FormRunner<'a> {
  /// Resolve a runner positioned on the page holding `component_id`. A
  /// question inside a same-page group resolves to the whole group.
  pub fn for_component(
    helper: &'a mut SubmissionHelper,
    component_id: Uuid,
    source: Option<Source>,
  ) -> Result<Self> {
    let form_id = helper
      .collection()
      .form_containing(component_id)
      .ok_or(Error::ComponentNotFound(component_id))?
      .id;
    let page_id = page_component_of(helper.collection(), component_id);
    Ok(Self {
      helper,
      form_id,
      page: PageState::Question(page_id),
      source,
    })
  }

  /// Resolve a runner positioned on a form's check-your-answers page.
  pub fn for_form(
    helper: &'a mut SubmissionHelper,
    form_id: Uuid,
    source: Option<Source>,
  ) -> Result<Self> {
    helper
      .collection()
      .form_by_id(form_id)
      .ok_or(Error::FormNotFound(form_id))?;
    Ok(Self {
      helper,
      form_id,
      page: PageState::CheckYourAnswers,
      source,
    })
  }

  pub fn page(&self) -> PageState { self.page }

  pub fn form_id(&self) -> Uuid { self.form_id }

  /// Where "continue" leads: the next *unanswered* visible page, falling
  /// through to check-your-answers when everything ahead is answered.
  pub fn next_url(&mut self, urls: &dyn UrlMap) -> Result<String> {
    match self.page {
      PageState::Question(current) => {
        let pages = self.visible_pages()?;
        // A hidden current page (the gate answer just changed) restarts
        // the walk from the top.
        let start = pages
          .iter()
          .position(|&p| p == current)
          .map(|i| i + 1)
          .unwrap_or(0);
        for &page_id in &pages[start..] {
          if !self.page_answered(page_id)? {
            return Ok(urls.question_url(self.form_id, page_id));
          }
        }
        Ok(urls.check_your_answers_url(self.form_id))
      }
      PageState::CheckYourAnswers | PageState::Tasklist => {
        Ok(urls.tasklist_url())
      }
    }
  }

  /// Where "back" leads: the source short-circuit, else the previous
  /// visible page, else the tasklist.
  pub fn back_url(&mut self, urls: &dyn UrlMap) -> Result<String> {
    if self.source == Some(Source::CheckYourAnswers) {
      return Ok(urls.check_your_answers_url(self.form_id));
    }
    match self.page {
      PageState::Question(current) => {
        let pages = self.visible_pages()?;
        match pages.iter().position(|&p| p == current) {
          Some(i) if i > 0 => {
            Ok(urls.question_url(self.form_id, pages[i - 1]))
          }
          _ => Ok(urls.tasklist_url()),
        }
      }
      PageState::CheckYourAnswers => {
        let pages = self.visible_pages()?;
        match pages.last() {
          Some(&page_id) => Ok(urls.question_url(self.form_id, page_id)),
          None => Ok(urls.tasklist_url()),
        }
      }
      PageState::Tasklist => Ok(urls.tasklist_url()),
    }
  }

  /// Visible page components of the form, in display order.
  fn visible_pages(&mut self) -> Result<Vec<Uuid>> {
    let visible = self.helper.ordered_visible_questions(self.form_id)?;
    let form = self
      .helper
      .collection()
      .form_by_id(self.form_id)
      .ok_or(Error::FormNotFound(self.form_id))?;
    let mut pages = Vec::new();
    collect_pages(&form.components, &visible, &mut pages);
    Ok(pages)
  }

  /// Every visible question on the page has a stored answer.
  fn page_answered(&mut self, page_id: Uuid) -> Result<bool> {
    let visible = self.helper.ordered_visible_questions(self.form_id)?;
    let question_ids: Vec<Uuid> =
      match self.helper.collection().component_by_id(page_id) {
        Some(Component::Question(q)) => vec![q.id],
        Some(Component::Group(g)) => g.questions().map(|q| q.id).collect(),
        None => return Err(Error::ComponentNotFound(page_id)),
      };
    for question_id in question_ids {
      if visible.contains(&question_id)
        && self.helper.answer_for_question(question_id)?.is_none()
      {
        return Ok(false);
      }
    }
    Ok(true)
  }
}

/// The page component that renders `component_id`: the enclosing same-page
/// group if there is one, else the component itself.
fn page_component_of(collection: &Collection, component_id: Uuid) -> Uuid {
  if let Some(Component::Group(g)) = collection.component_by_id(component_id)
    && g.show_questions_on_the_same_page
  {
    return component_id;
  }
  collection
    .ancestors_of(component_id)
    .iter()
    .find(|g| g.show_questions_on_the_same_page)
    .map(|g| g.id)
    .unwrap_or(component_id)
}

fn collect_pages(
  components: &[Component],
  visible: &[Uuid],
  out: &mut Vec<Uuid>,
) {
  for component in components {
    match component {
      Component::Question(q) => {
        if visible.contains(&q.id) {
          out.push(q.id);
        }
      }
      Component::Group(g) if g.show_questions_on_the_same_page => {
        if g.questions().any(|q| visible.contains(&q.id)) {
          out.push(g.id);
        }
      }
      Component::Group(g) => collect_pages(&g.components, visible, out),
    }
  }
}

#[cfg(test)]
mod tests {
  use formwork_core::{
    answer::Answer,
    collection::{Form, Section},
    component::{Group, Question, QuestionDataType},
    submission::{Submission, SubmissionMode},
  };

  use super::*;

  struct TestUrls;

  impl UrlMap for TestUrls {
    fn question_url(&self, form_id: Uuid, component_id: Uuid) -> String {
      format!("/forms/{form_id}/questions/{component_id}")
    }

    fn check_your_answers_url(&self, form_id: Uuid) -> String {
      format!("/forms/{form_id}/check-your-answers")
    }

    fn tasklist_url(&self) -> String { "/tasklist".into() }
  }

  fn question(name: &str, order: u32) -> Question {
    Question {
      id: Uuid::new_v4(),
      name: name.into(),
      slug: name.into(),
      text: format!("{name}?"),
      hint: None,
      data_type: QuestionDataType::TextSingleLine,
      presentation: Default::default(),
      data_source: None,
      expressions: Vec::new(),
      add_another: false,
      order,
    }
  }

  fn helper_with(
    components: Vec<Component>,
  ) -> (SubmissionHelper, Uuid) {
    let collection = formwork_core::collection::Collection {
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
    };
    let form_id = collection.sections[0].forms[0].id;
    let submission = Submission::new(
      collection.id,
      collection.version,
      SubmissionMode::Test,
      "tester",
    );
    (
      SubmissionHelper::new(collection, submission).unwrap(),
      form_id,
    )
  }

  /// q1, q2, then a same-page group of (q3, q4).
  fn three_page_form() -> (SubmissionHelper, Uuid, [Uuid; 3]) {
    let q1 = question("one", 0);
    let q2 = question("two", 1);
    let q3 = question("three", 0);
    let q4 = question("four", 1);
    let group = Group {
      id: Uuid::new_v4(),
      name: "pair".into(),
      slug: "pair".into(),
      text: "Pair".into(),
      guidance_heading: None,
      guidance_body: None,
      show_questions_on_the_same_page: true,
      add_another: false,
      expressions: Vec::new(),
      components: vec![Component::Question(q3), Component::Question(q4)],
      order: 2,
    };
    let ids = [q1.id, q2.id, group.id];
    let (helper, form_id) = helper_with(vec![
      Component::Question(q1),
      Component::Question(q2),
      Component::Group(group),
    ]);
    (helper, form_id, ids)
  }

  #[test]
  fn next_skips_answered_pages() {
    let (mut helper, form_id, [q1, q2, group]) = three_page_form();
    helper
      .submit_answer(q2, Answer::Text("answered".into()))
      .unwrap();

    let mut runner =
      FormRunner::for_component(&mut helper, q1, None).unwrap();
    assert_eq!(
      runner.next_url(&TestUrls).unwrap(),
      format!("/forms/{form_id}/questions/{group}")
    );
  }

  #[test]
  fn next_falls_through_to_check_your_answers() {
    let (mut helper, form_id, [q1, _, _]) = three_page_form();
    let collection = helper.collection().clone();
    for q in collection.all_questions() {
      helper
        .submit_answer(q.id, Answer::Text("answered".into()))
        .unwrap();
    }

    let mut runner =
      FormRunner::for_component(&mut helper, q1, None).unwrap();
    assert_eq!(
      runner.next_url(&TestUrls).unwrap(),
      format!("/forms/{form_id}/check-your-answers")
    );
  }

  #[test]
  fn question_in_same_page_group_resolves_to_the_group_page() {
    let (mut helper, form_id, [_, q2, group]) = three_page_form();
    let group_questions: Vec<Uuid> = {
      let Some(Component::Group(g)) =
        helper.collection().component_by_id(group)
      else {
        panic!("expected group");
      };
      g.questions().map(|q| q.id).collect()
    };

    let mut runner =
      FormRunner::for_component(&mut helper, group_questions[1], None)
        .unwrap();
    assert_eq!(runner.page(), PageState::Question(group));
    // Back from the group page is the previous page component.
    assert_eq!(
      runner.back_url(&TestUrls).unwrap(),
      format!("/forms/{form_id}/questions/{q2}")
    );
  }

  #[test]
  fn back_short_circuits_to_check_your_answers_source() {
    let (mut helper, form_id, [_, q2, _]) = three_page_form();
    let mut runner = FormRunner::for_component(
      &mut helper,
      q2,
      Some(Source::CheckYourAnswers),
    )
    .unwrap();
    assert_eq!(
      runner.back_url(&TestUrls).unwrap(),
      format!("/forms/{form_id}/check-your-answers")
    );
  }

  #[test]
  fn first_page_backs_to_the_tasklist() {
    let (mut helper, _, [q1, _, _]) = three_page_form();
    let mut runner =
      FormRunner::for_component(&mut helper, q1, None).unwrap();
    assert_eq!(runner.back_url(&TestUrls).unwrap(), "/tasklist");
  }

  #[test]
  fn check_your_answers_backs_to_the_last_page() {
    let (mut helper, form_id, [_, _, group]) = three_page_form();
    let mut runner =
      FormRunner::for_form(&mut helper, form_id, None).unwrap();
    assert_eq!(runner.page(), PageState::CheckYourAnswers);
    assert_eq!(
      runner.back_url(&TestUrls).unwrap(),
      format!("/forms/{form_id}/questions/{group}")
    );
    assert_eq!(runner.next_url(&TestUrls).unwrap(), "/tasklist");
  }
}
