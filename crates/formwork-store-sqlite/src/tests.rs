//! Integration tests for `SqliteStore` against an in-memory database.

use formwork_core::{
  component::{PresentationOptions, QuestionDataType},
  expression::ExpressionKind,
  managed::ManagedExpression,
  submission::{EventKey, SubmissionMode},
};
use uuid::Uuid;

use crate::{Error, NewGroup, NewQuestion, NewSubmission, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn question(name: &str, data_type: QuestionDataType) -> NewQuestion {
  NewQuestion {
    name: name.to_string(),
    slug: name.to_lowercase().replace(' ', "-"),
    text: format!("{name}?"),
    hint: None,
    data_type,
    presentation: PresentationOptions::default(),
    items: Vec::new(),
    add_another: false,
  }
}

fn group(name: &str) -> NewGroup {
  NewGroup {
    name:             name.to_string(),
    slug:             name.to_lowercase().replace(' ', "-"),
    text:             name.to_string(),
    guidance_heading: None,
    guidance_body:    None,
    same_page:        false,
    add_another:      false,
  }
}

/// A collection with its default section and one form, ready for components.
async fn collection_with_form(s: &SqliteStore) -> (Uuid, Uuid) {
  let collection = s.create_collection("Apply for a grant").await.unwrap();
  let section_id = collection.sections[0].id;
  let form_id = s.create_form(section_id, "About you", "about-you").await.unwrap();
  (collection.id, form_id)
}

// ─── Collections ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_collection_seeds_a_default_section() {
  let s = store().await;
  let collection = s.create_collection("Apply for a grant").await.unwrap();

  assert_eq!(collection.version, 1);
  assert_eq!(collection.name, "Apply for a grant");
  assert_eq!(collection.sections.len(), 1);
  assert_eq!(collection.sections[0].slug, "tasks");
}

#[tokio::test]
async fn get_collection_defaults_to_latest_version() {
  let s = store().await;
  let created = s.create_collection("Apply for a grant").await.unwrap();

  let fetched = s.get_collection(created.id, None).await.unwrap();
  assert_eq!(fetched.version, 1);

  let missing = s.get_collection(Uuid::new_v4(), None).await;
  assert!(matches!(missing, Err(Error::CollectionNotFound(_))));
}

#[tokio::test]
async fn collection_tree_round_trips() {
  let s = store().await;
  let (collection_id, form_id) = collection_with_form(&s).await;

  let q1 = s
    .create_question(form_id, None, question("Full name", QuestionDataType::TextSingleLine))
    .await
    .unwrap();
  let g = s.create_group(form_id, None, group("Address")).await.unwrap();
  let q2 = s
    .create_question(form_id, Some(g), question("Postcode", QuestionDataType::TextSingleLine))
    .await
    .unwrap();

  let collection = s.get_collection(collection_id, None).await.unwrap();
  let form = collection.form_by_id(form_id).unwrap();
  assert_eq!(form.components.len(), 2);
  assert_eq!(form.components[0].id(), q1);
  assert_eq!(form.components[1].id(), g);

  let hydrated_group = form.components[1].as_group().unwrap();
  assert_eq!(hydrated_group.components.len(), 1);
  assert_eq!(hydrated_group.components[0].id(), q2);
  assert_eq!(collection.question_by_id(q2).unwrap().name, "Postcode");
}

#[tokio::test]
async fn choice_items_round_trip_in_order() {
  let s = store().await;
  let (collection_id, form_id) = collection_with_form(&s).await;

  let mut input = question("Region", QuestionDataType::Radios);
  input.items = vec![
    ("north".to_string(), "North".to_string()),
    ("south".to_string(), "South".to_string()),
  ];
  let q = s.create_question(form_id, None, input).await.unwrap();

  let collection = s.get_collection(collection_id, None).await.unwrap();
  let data_source = collection
    .question_by_id(q)
    .unwrap()
    .data_source
    .as_ref()
    .unwrap();
  let keys: Vec<&str> = data_source.keys().collect();
  assert_eq!(keys, vec!["north", "south"]);
}

// ─── Uniqueness and rollback ─────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_question_name_is_rejected_and_rolled_back() {
  let s = store().await;
  let (collection_id, form_id) = collection_with_form(&s).await;

  s.create_question(form_id, None, question("Full name", QuestionDataType::TextSingleLine))
    .await
    .unwrap();
  let result = s
    .create_question(form_id, None, question("Full name", QuestionDataType::Email))
    .await;
  assert!(matches!(
    result,
    Err(Error::Core(formwork_core::Error::DuplicateValue { .. }))
  ));

  let collection = s.get_collection(collection_id, None).await.unwrap();
  assert_eq!(collection.form_by_id(form_id).unwrap().components.len(), 1);
}

#[tokio::test]
async fn duplicate_collection_name_is_rejected() {
  let s = store().await;
  s.create_collection("Apply for a grant").await.unwrap();
  let result = s.create_collection("Apply for a grant").await;
  assert!(matches!(
    result,
    Err(Error::Core(formwork_core::Error::DuplicateValue { .. }))
  ));
}

// ─── Expressions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn condition_on_a_later_question_rolls_back() {
  let s = store().await;
  let (collection_id, form_id) = collection_with_form(&s).await;

  let q1 = s
    .create_question(form_id, None, question("Eligible", QuestionDataType::YesNo))
    .await
    .unwrap();
  let q2 = s
    .create_question(form_id, None, question("Details", QuestionDataType::TextMultiLine))
    .await
    .unwrap();

  // A condition may only look backwards: q1 gating on q2 is a forward
  // reference and must fail.
  let result = s
    .add_expression(
      q1,
      ExpressionKind::Condition,
      ManagedExpression::IsYes { question_id: q2 },
    )
    .await;
  assert!(matches!(
    result,
    Err(Error::Core(formwork_core::Error::DependencyOrder { .. }))
  ));

  let collection = s.get_collection(collection_id, None).await.unwrap();
  assert!(collection.question_by_id(q1).unwrap().expressions.is_empty());
}

#[tokio::test]
async fn condition_on_an_earlier_question_is_stored() {
  let s = store().await;
  let (collection_id, form_id) = collection_with_form(&s).await;

  let q1 = s
    .create_question(form_id, None, question("Eligible", QuestionDataType::YesNo))
    .await
    .unwrap();
  let q2 = s
    .create_question(form_id, None, question("Details", QuestionDataType::TextMultiLine))
    .await
    .unwrap();

  let expression_id = s
    .add_expression(
      q2,
      ExpressionKind::Condition,
      ManagedExpression::IsYes { question_id: q1 },
    )
    .await
    .unwrap();

  let collection = s.get_collection(collection_id, None).await.unwrap();
  let stored = &collection.question_by_id(q2).unwrap().expressions;
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].id, expression_id);
  let managed = stored[0].managed().unwrap();
  assert_eq!(managed.referenced_question_id(), q1);

  s.remove_expression(expression_id).await.unwrap();
  let collection = s.get_collection(collection_id, None).await.unwrap();
  assert!(collection.question_by_id(q2).unwrap().expressions.is_empty());
}

// ─── Reordering ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn move_component_swaps_sibling_order() {
  let s = store().await;
  let (collection_id, form_id) = collection_with_form(&s).await;

  let q1 = s
    .create_question(form_id, None, question("First", QuestionDataType::TextSingleLine))
    .await
    .unwrap();
  let q2 = s
    .create_question(form_id, None, question("Second", QuestionDataType::TextSingleLine))
    .await
    .unwrap();

  s.move_component_up(q2).await.unwrap();
  let collection = s.get_collection(collection_id, None).await.unwrap();
  let order: Vec<Uuid> = collection
    .form_by_id(form_id)
    .unwrap()
    .components
    .iter()
    .map(|c| c.id())
    .collect();
  assert_eq!(order, vec![q2, q1]);
}

#[tokio::test]
async fn move_that_would_break_dependency_order_is_rejected() {
  let s = store().await;
  let (_, form_id) = collection_with_form(&s).await;

  let q1 = s
    .create_question(form_id, None, question("Eligible", QuestionDataType::YesNo))
    .await
    .unwrap();
  let q2 = s
    .create_question(form_id, None, question("Details", QuestionDataType::TextMultiLine))
    .await
    .unwrap();
  s.add_expression(
    q2,
    ExpressionKind::Condition,
    ManagedExpression::IsYes { question_id: q1 },
  )
  .await
  .unwrap();

  let result = s.move_component_up(q2).await;
  assert!(matches!(
    result,
    Err(Error::Core(formwork_core::Error::DependencyOrder { .. }))
  ));
}

#[tokio::test]
async fn move_past_the_edge_cannot_move() {
  let s = store().await;
  let (_, form_id) = collection_with_form(&s).await;
  let q1 = s
    .create_question(form_id, None, question("Only", QuestionDataType::TextSingleLine))
    .await
    .unwrap();

  assert!(matches!(
    s.move_component_up(q1).await,
    Err(Error::CannotMove(_))
  ));
  assert!(matches!(
    s.move_component_down(q1).await,
    Err(Error::CannotMove(_))
  ));
}

// ─── Option removal and deletion guards ──────────────────────────────────────

#[tokio::test]
async fn removing_a_referenced_option_is_blocked() {
  let s = store().await;
  let (_, form_id) = collection_with_form(&s).await;

  let mut region = question("Region", QuestionDataType::Radios);
  region.items = vec![
    ("north".to_string(), "North".to_string()),
    ("south".to_string(), "South".to_string()),
  ];
  let q1 = s.create_question(form_id, None, region.clone()).await.unwrap();
  let q2 = s
    .create_question(form_id, None, question("Northern detail", QuestionDataType::TextSingleLine))
    .await
    .unwrap();
  s.add_expression(
    q2,
    ExpressionKind::Condition,
    ManagedExpression::Specifically {
      question_id: q1,
      key:         "north".to_string(),
    },
  )
  .await
  .unwrap();

  // Dropping "north" would orphan q2's condition.
  region.items.retain(|(key, _)| key != "north");
  let result = s.update_question(q1, region.clone()).await;
  assert!(matches!(
    result,
    Err(Error::Core(formwork_core::Error::DataSourceItemReference { .. }))
  ));

  // Relabelling without removing keys is fine.
  let mut relabelled = region;
  relabelled.items = vec![
    ("north".to_string(), "The North".to_string()),
    ("south".to_string(), "South".to_string()),
  ];
  s.update_question(q1, relabelled).await.unwrap();
}

#[tokio::test]
async fn delete_is_blocked_while_dependents_exist() {
  let s = store().await;
  let (collection_id, form_id) = collection_with_form(&s).await;

  let q1 = s
    .create_question(form_id, None, question("Eligible", QuestionDataType::YesNo))
    .await
    .unwrap();
  let q2 = s
    .create_question(form_id, None, question("Details", QuestionDataType::TextMultiLine))
    .await
    .unwrap();
  let expression_id = s
    .add_expression(
      q2,
      ExpressionKind::Condition,
      ManagedExpression::IsYes { question_id: q1 },
    )
    .await
    .unwrap();

  let result = s.delete_component(q1).await;
  assert!(matches!(
    result,
    Err(Error::Core(formwork_core::Error::ComponentHasDependencies { .. }))
  ));

  s.remove_expression(expression_id).await.unwrap();
  s.delete_component(q1).await.unwrap();

  let collection = s.get_collection(collection_id, None).await.unwrap();
  assert_eq!(collection.form_by_id(form_id).unwrap().components.len(), 1);
}

// ─── Submissions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_data_and_events_round_trip() {
  let s = store().await;
  let (collection_id, form_id) = collection_with_form(&s).await;

  let mut submission = s
    .create_submission(NewSubmission {
      collection_id,
      collection_version: 1,
      mode: SubmissionMode::Test,
      created_by: "alice@example.com".to_string(),
    })
    .await
    .unwrap();

  submission
    .data
    .insert("answer".to_string(), serde_json::json!("hello"));
  submission.append_event(
    EventKey::FormCompleted,
    "alice@example.com",
    Some(form_id),
  );
  s.save_submission(&submission).await.unwrap();

  let fetched = s.get_submission(submission.id).await.unwrap().unwrap();
  assert_eq!(fetched.data["answer"], serde_json::json!("hello"));
  assert_eq!(fetched.events.len(), 1);
  assert_eq!(fetched.events[0].key, EventKey::FormCompleted);
  assert_eq!(fetched.events[0].form_id, Some(form_id));

  // Un-completing removes the event rows.
  submission.remove_events(EventKey::FormCompleted, Some(form_id));
  s.save_submission(&submission).await.unwrap();
  let fetched = s.get_submission(submission.id).await.unwrap().unwrap();
  assert!(fetched.events.is_empty());
}

#[tokio::test]
async fn get_submission_missing_returns_none() {
  let s = store().await;
  let result = s.get_submission(Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn save_unknown_submission_fails() {
  let s = store().await;
  let (collection_id, _) = collection_with_form(&s).await;
  let submission = formwork_core::submission::Submission::new(
    collection_id,
    1,
    SubmissionMode::Test,
    "alice@example.com",
  );
  let result = s.save_submission(&submission).await;
  assert!(matches!(result, Err(Error::SubmissionNotFound(_))));
}
