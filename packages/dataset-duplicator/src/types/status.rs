//! Lifecycle classification and how it is presented.
//!
//! Every mapping here is an exhaustive `match`, so adding a status forces
//! every consumer to decide how to show it.

use serde::{Deserialize, Serialize};

/// Severity tone for badges and status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Default,
    Primary,
    Positive,
    Caution,
    Critical,
}

/// Where a candidate stands relative to the destination dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// No document with this id at the destination
    New,
    /// Same id, same `_updatedAt`
    Identical,
    /// Destination copy is older; duplicating brings it current
    StaleAtDestination,
    /// Destination copy is newer; duplicating would clobber it
    NewerAtDestination,
    /// No destination snapshot yet, or a timestamp is missing
    #[default]
    Undetermined,
}

impl LifecycleStatus {
    /// Whether the destination already holds a document with this id.
    pub fn exists_at_destination(&self) -> bool {
        matches!(
            self,
            LifecycleStatus::Identical
                | LifecycleStatus::StaleAtDestination
                | LifecycleStatus::NewerAtDestination
        )
    }
}

/// A badge shown next to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusBadge {
    Lifecycle(LifecycleStatus),
    /// A draft shadows the published document being duplicated
    Unpublished,
}

impl StatusBadge {
    /// Badge tone. `None` means the badge is not shown.
    pub fn tone(&self, is_asset: bool) -> Option<Tone> {
        use LifecycleStatus::*;
        let tone = match (self, is_asset) {
            (StatusBadge::Lifecycle(Undetermined), _) => return None,
            (StatusBadge::Lifecycle(New), _) => Tone::Positive,
            (StatusBadge::Lifecycle(_), true) => Tone::Critical,
            (StatusBadge::Lifecycle(Identical), false) => Tone::Primary,
            (StatusBadge::Lifecycle(NewerAtDestination), false) => Tone::Critical,
            (StatusBadge::Lifecycle(StaleAtDestination), false) => Tone::Caution,
            (StatusBadge::Unpublished, true) => Tone::Default,
            (StatusBadge::Unpublished, false) => Tone::Caution,
        };
        Some(tone)
    }

    /// Short badge text.
    pub fn label(&self, is_asset: bool) -> &'static str {
        use LifecycleStatus::*;
        match (self, is_asset) {
            (StatusBadge::Lifecycle(Undetermined), _) => "",
            (StatusBadge::Lifecycle(New), true) => "UPLOAD",
            (StatusBadge::Lifecycle(_), true) => "RE-UPLOAD",
            (StatusBadge::Lifecycle(New), false) => "CREATE",
            (StatusBadge::Lifecycle(Identical), false) => "EXISTS",
            (StatusBadge::Lifecycle(NewerAtDestination), false) => "OVERWRITE",
            (StatusBadge::Lifecycle(StaleAtDestination), false) => "UPDATE",
            (StatusBadge::Unpublished, true) => "",
            (StatusBadge::Unpublished, false) => "UNPUBLISHED",
        }
    }

    /// Tooltip text explaining the badge.
    pub fn message(&self, is_asset: bool) -> &'static str {
        use LifecycleStatus::*;
        match (self, is_asset) {
            (StatusBadge::Lifecycle(Undetermined), _) => "",
            (StatusBadge::Lifecycle(New), true) => "This Asset does not yet exist at the Destination",
            (StatusBadge::Lifecycle(_), true) => "This Asset already exists at the Destination",
            // Right after a duplication this is what shows, because the store
            // bumps _updatedAt on write. Content is never compared.
            (StatusBadge::Lifecycle(Identical), false) => {
                "This document already exists at the Destination with the same ID with the same Updated time."
            }
            (StatusBadge::Lifecycle(NewerAtDestination), false) => {
                "A newer version of this document exists at the Destination, and it will be overwritten with this version."
            }
            (StatusBadge::Lifecycle(StaleAtDestination), false) => {
                "An older version of this document exists at the Destination, and it will be overwritten with this version."
            }
            (StatusBadge::Lifecycle(New), false) => "This document will be created at the destination.",
            (StatusBadge::Unpublished, true) => "",
            (StatusBadge::Unpublished, false) => {
                "A Draft version of this Document exists in this Dataset, but only the Published version will be duplicated to the destination."
            }
        }
    }
}

/// Human-readable status text with a severity tone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub tone: Tone,
}

impl StatusMessage {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Default)
    }

    pub fn positive(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Positive)
    }

    pub fn critical(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Critical)
    }
}
