//! Derived-value caches for [`crate::helper::SubmissionHelper`].
//!
//! Invalidation is explicit and named: every write site on the helper calls
//! the `invalidate_*` methods it needs, and a missed call is greppable.
//! Visibility, decoded answers, and form completeness all depend on the
//! answer data, so answer writes must clear all three.

use std::collections::HashMap;

use formwork_core::answer::Answer;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct DerivedCache {
  /// Form id → visible question ids in display order.
  pub visible:      HashMap<Uuid, Vec<Uuid>>,
  /// Question id → decoded answer (`None` cached too).
  pub answers:      HashMap<Uuid, Option<Answer>>,
  /// Form id → every visible question answered.
  pub all_answered: HashMap<Uuid, bool>,
}

impl DerivedCache {
  pub fn invalidate_visible(&mut self) { self.visible.clear(); }

  pub fn invalidate_answers(&mut self) { self.answers.clear(); }

  pub fn invalidate_all_answered(&mut self) { self.all_answered.clear(); }
}
