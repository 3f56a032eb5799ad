//! Candidate items: documents the operator may duplicate.

use crate::types::document::Document;
use crate::types::status::{LifecycleStatus, StatusBadge};

/// A document or asset in the active candidate set.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    pub document: Document,

    /// Include this in the transaction?
    pub include: bool,

    /// Does it exist at the destination?
    pub status: LifecycleStatus,

    /// Does an unpublished draft shadow it?
    pub has_draft: bool,
}

impl CandidateItem {
    /// New candidates start included with an undetermined status.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            include: true,
            status: LifecycleStatus::Undetermined,
            has_draft: false,
        }
    }

    pub fn with_draft(mut self, has_draft: bool) -> Self {
        self.has_draft = has_draft;
        self
    }

    pub fn id(&self) -> &str {
        self.document.id()
    }

    pub fn is_asset(&self) -> bool {
        self.document.is_asset()
    }

    /// Badges to show, in display order.
    pub fn badges(&self) -> Vec<StatusBadge> {
        let mut badges = Vec::with_capacity(2);
        if self.has_draft {
            badges.push(StatusBadge::Unpublished);
        }
        if self.status != LifecycleStatus::Undetermined {
            badges.push(StatusBadge::Lifecycle(self.status));
        }
        badges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_candidate_defaults() {
        let item = CandidateItem::new(Document::new("post-1", "post"));
        assert!(item.include);
        assert_eq!(item.status, LifecycleStatus::Undetermined);
        assert!(item.badges().is_empty());
    }

    #[test]
    fn test_badges_order() {
        let mut item = CandidateItem::new(Document::new("post-1", "post")).with_draft(true);
        item.status = LifecycleStatus::New;
        assert_eq!(
            item.badges(),
            vec![
                StatusBadge::Unpublished,
                StatusBadge::Lifecycle(LifecycleStatus::New)
            ]
        );
    }
}
