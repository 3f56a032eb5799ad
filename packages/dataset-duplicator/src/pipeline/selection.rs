//! Per-item and bulk include/exclude state.
//!
//! Bulk actions overwrite every `include` flag from a predicate, so applying
//! one twice is the same as applying it once.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::candidate::CandidateItem;
use crate::types::status::LifecycleStatus;

/// A bulk selection action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SelectionAction {
    All,
    None,
    /// Not yet at the destination
    New,
    /// Identical at the destination
    Existing,
    /// Stale at the destination
    Older,
    Assets,
    Documents,
}

impl SelectionAction {
    pub const ALL: [SelectionAction; 7] = [
        SelectionAction::All,
        SelectionAction::None,
        SelectionAction::New,
        SelectionAction::Existing,
        SelectionAction::Older,
        SelectionAction::Assets,
        SelectionAction::Documents,
    ];

    /// Whether an item is included after this action.
    pub fn includes(&self, item: &CandidateItem) -> bool {
        match self {
            SelectionAction::All => true,
            SelectionAction::None => false,
            SelectionAction::New => item.status == LifecycleStatus::New,
            SelectionAction::Existing => item.status == LifecycleStatus::Identical,
            SelectionAction::Older => item.status == LifecycleStatus::StaleAtDestination,
            SelectionAction::Assets => item.is_asset(),
            SelectionAction::Documents => !item.is_asset(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SelectionAction::All => "All",
            SelectionAction::None => "None",
            SelectionAction::New => "New",
            SelectionAction::Existing => "Existing",
            SelectionAction::Older => "Older",
            SelectionAction::Assets => "Assets",
            SelectionAction::Documents => "Documents",
        }
    }
}

/// The active candidate set and its selection state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionModel {
    items: Vec<CandidateItem>,
    last_action: Option<SelectionAction>,
}

impl SelectionModel {
    /// Build from candidates. Later duplicates of an id are dropped.
    pub fn new(items: Vec<CandidateItem>) -> Self {
        let mut seen = HashSet::with_capacity(items.len());
        let items = items
            .into_iter()
            .filter(|item| seen.insert(item.id().to_string()))
            .collect();
        Self {
            items,
            last_action: None,
        }
    }

    pub fn items(&self) -> &[CandidateItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [CandidateItem] {
        &mut self.items
    }

    pub fn get(&self, id: &str) -> Option<&CandidateItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flip one item. Returns false when the id is unknown.
    pub fn toggle(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|item| item.id() == id) {
            Some(item) => {
                item.include = !item.include;
                self.last_action = None;
                true
            }
            None => false,
        }
    }

    /// Overwrite every include flag from the action's predicate.
    pub fn apply(&mut self, action: SelectionAction) {
        if self.items.is_empty() {
            return;
        }
        for item in self.items.iter_mut() {
            item.include = action.includes(item);
        }
        self.last_action = Some(action);
    }

    /// The action that would change nothing right now.
    pub fn disabled_action(&self) -> Option<SelectionAction> {
        match self.last_action {
            Some(action) => Some(action),
            None if !self.items.is_empty() && self.items.iter().all(|i| i.include) => {
                Some(SelectionAction::All)
            }
            None => None,
        }
    }

    pub fn included(&self) -> impl Iterator<Item = &CandidateItem> {
        self.items.iter().filter(|item| item.include)
    }

    pub fn selected_documents(&self) -> usize {
        self.included().filter(|item| !item.is_asset()).count()
    }

    pub fn selected_assets(&self) -> usize {
        self.included().filter(|item| item.is_asset()).count()
    }

    pub fn selected_total(&self) -> usize {
        self.included().count()
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{document, image_asset};
    use proptest::prelude::*;

    fn model() -> SelectionModel {
        let mut items = vec![
            CandidateItem::new(document("a", "post")),
            CandidateItem::new(document("b", "post")),
            CandidateItem::new(document("c", "post")),
            CandidateItem::new(image_asset("image-abc-10x10-png", "https://cdn/x.png")),
        ];
        items[0].status = LifecycleStatus::New;
        items[1].status = LifecycleStatus::Identical;
        items[2].status = LifecycleStatus::StaleAtDestination;
        items[3].status = LifecycleStatus::New;
        SelectionModel::new(items)
    }

    fn included_ids(model: &SelectionModel) -> Vec<&str> {
        model.included().map(|i| i.id()).collect()
    }

    #[test]
    fn test_duplicate_ids_dropped() {
        let model = SelectionModel::new(vec![
            CandidateItem::new(document("a", "post")),
            CandidateItem::new(document("a", "post")),
        ]);
        assert_eq!(model.total(), 1);
    }

    #[test]
    fn test_bulk_actions() {
        let mut model = model();

        model.apply(SelectionAction::New);
        assert_eq!(included_ids(&model), vec!["a", "image-abc-10x10-png"]);

        model.apply(SelectionAction::Existing);
        assert_eq!(included_ids(&model), vec!["b"]);

        model.apply(SelectionAction::Older);
        assert_eq!(included_ids(&model), vec!["c"]);

        model.apply(SelectionAction::Assets);
        assert_eq!(included_ids(&model), vec!["image-abc-10x10-png"]);

        model.apply(SelectionAction::Documents);
        assert_eq!(included_ids(&model), vec!["a", "b", "c"]);
        assert_eq!(model.selected_documents(), 3);
        assert_eq!(model.selected_assets(), 0);

        model.apply(SelectionAction::None);
        assert_eq!(model.selected_total(), 0);
    }

    #[test]
    fn test_bulk_action_overwrites_toggles() {
        let mut model = model();
        model.toggle("a");
        model.apply(SelectionAction::All);
        assert_eq!(model.selected_total(), 4);
    }

    #[test]
    fn test_disabled_action_tracking() {
        let mut model = model();
        assert_eq!(model.disabled_action(), Some(SelectionAction::All));

        model.apply(SelectionAction::Assets);
        assert_eq!(model.disabled_action(), Some(SelectionAction::Assets));

        assert!(model.toggle("a"));
        assert_eq!(model.disabled_action(), None);
        assert!(!model.toggle("missing"));
    }

    #[test]
    fn test_empty_model_ignores_bulk_actions() {
        let mut model = SelectionModel::default();
        model.apply(SelectionAction::All);
        assert_eq!(model.disabled_action(), None);
        assert_eq!(model.total(), 0);
    }

    proptest! {
        #[test]
        fn prop_bulk_actions_are_idempotent(
            action in proptest::sample::select(SelectionAction::ALL.to_vec()),
            toggles in proptest::collection::vec(0usize..4, 0..6),
        ) {
            let mut model = model();
            let ids: Vec<String> = model.items().iter().map(|i| i.id().to_string()).collect();
            for index in toggles {
                model.toggle(&ids[index]);
            }

            model.apply(action);
            let once = model.clone();
            model.apply(action);

            prop_assert_eq!(once, model);
        }
    }
}
