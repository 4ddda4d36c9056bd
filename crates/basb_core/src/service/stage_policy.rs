//! CODE stage transition policy.
//!
//! # Responsibility
//! - Map `(current stage, edit)` to the next workflow stage.
//! - Derive edit events from highlight sets and note updates.
//!
//! # Invariants
//! - Stage is a ratchet: no edit ever moves a note to an earlier stage.
//! - Moving a note between containers never changes its stage.
//! - Deleting highlights or clearing a summary never reverts the stage.

use crate::model::highlight::{has_key_insight, HighlightRange};
use crate::model::note::{CodeStage, NoteHighlightsUpdate, NoteUpdate};

/// Mutation kinds that can advance a note's stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Title/body/source fields replaced.
    ContentEdited,
    /// Highlight set replaced wholesale.
    HighlightsChanged {
        has_highlights: bool,
        has_key_insight: bool,
    },
    /// Executive summary replaced.
    SummaryEdited { non_empty: bool },
    /// Note filed into (or out of) a container.
    MovedToContainer,
}

impl EditKind {
    /// Event for a full highlight-set replacement.
    pub fn highlights_changed(ranges: &[HighlightRange]) -> Self {
        Self::HighlightsChanged {
            has_highlights: !ranges.is_empty(),
            has_key_insight: has_key_insight(ranges),
        }
    }

    /// Event for an executive-summary write; blank text counts as empty.
    pub fn summary_edited(summary: &str) -> Self {
        Self::SummaryEdited {
            non_empty: !summary.trim().is_empty(),
        }
    }

    /// Events implied by a partial note update, content first.
    pub fn for_update(update: &NoteUpdate) -> Vec<Self> {
        let mut events = Vec::with_capacity(2);
        if update.touches_content() {
            events.push(Self::ContentEdited);
        }
        if let Some(summary) = update.executive_summary.as_deref() {
            events.push(Self::summary_edited(summary));
        }
        events
    }

    /// Events implied by a highlight replacement, with attached content first.
    pub fn for_highlights_update(update: &NoteHighlightsUpdate) -> Vec<Self> {
        let mut events = Vec::with_capacity(2);
        if update.content.is_some() || update.content_html.is_some() {
            events.push(Self::ContentEdited);
        }
        events.push(Self::highlights_changed(&update.highlights));
        events
    }
}

/// Returns the stage after `event` is applied at `current`.
///
/// | current | event | next |
/// |---|---|---|
/// | capture | highlights (non-empty, L2 only) | organize |
/// | capture, organize | highlights (any L3) | distill |
/// | distill | summary (non-empty) | express |
/// | any | content edit, move, empty highlights/summary | unchanged |
pub fn next_stage(current: CodeStage, event: EditKind) -> CodeStage {
    use CodeStage::{Capture, Distill, Express, Organize};

    match (current, event) {
        (_, EditKind::ContentEdited | EditKind::MovedToContainer) => current,
        (
            Capture | Organize,
            EditKind::HighlightsChanged {
                has_key_insight: true,
                ..
            },
        ) => Distill,
        (
            Capture,
            EditKind::HighlightsChanged {
                has_highlights: true,
                ..
            },
        ) => Organize,
        (Distill, EditKind::SummaryEdited { non_empty: true }) => Express,
        _ => current,
    }
}

/// Folds a sequence of events starting at `current`.
pub fn advance(current: CodeStage, events: &[EditKind]) -> CodeStage {
    events
        .iter()
        .fold(current, |stage, event| next_stage(stage, *event))
}
