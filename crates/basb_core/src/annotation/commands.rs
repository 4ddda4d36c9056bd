//! User-facing annotation commands over the live document.
//!
//! # Responsibility
//! - Apply, toggle and remove one highlight layer over a text selection.
//! - Report which layers are active at a cursor offset.
//!
//! # Invariants
//! - L2 and L3 are independent: a command on one never touches the other.
//! - Apply is a union and is idempotent when the selection is covered.
//! - Toggle removes only when every character of the selection carries the
//!   layer; partial coverage applies.
//! - Zero-width selections leave the document untouched.

use crate::annotation::document::{MarkType, RichDocument};
use crate::annotation::sync::PositionMap;
use crate::model::highlight::Layer;
use std::collections::BTreeSet;

/// Half-open selection `[start, end)` in plain-text UTF-16 offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    /// Creates a selection; reversed anchors are swapped.
    pub fn new(anchor: usize, head: usize) -> Self {
        Self {
            start: anchor.min(head),
            end: anchor.max(head),
        }
    }

    /// Zero-width selection at `offset`.
    pub fn cursor(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Sets `layer` over the selection. Returns whether the document changed.
pub fn apply_layer(doc: &mut RichDocument, selection: Selection, layer: Layer) -> bool {
    let Some((from, to)) = to_doc_span(doc, selection) else {
        return false;
    };
    doc.add_mark(from, to, MarkType::for_layer(layer))
}

/// Removes `layer` when it fully covers the selection, applies it otherwise.
pub fn toggle_layer(doc: &mut RichDocument, selection: Selection, layer: Layer) -> bool {
    let Some((from, to)) = to_doc_span(doc, selection) else {
        return false;
    };
    let mark = MarkType::for_layer(layer);
    if doc.is_fully_marked(from, to, mark) {
        doc.remove_mark(from, to, mark)
    } else {
        doc.add_mark(from, to, mark)
    }
}

/// Clears `layer` from the selection regardless of prior state.
pub fn remove_layer(doc: &mut RichDocument, selection: Selection, layer: Layer) -> bool {
    let Some((from, to)) = to_doc_span(doc, selection) else {
        return false;
    };
    doc.remove_mark(from, to, MarkType::for_layer(layer))
}

/// Layers carried by the character at `offset`.
pub fn active_layers(doc: &RichDocument, offset: usize) -> BTreeSet<Layer> {
    let map = PositionMap::of(doc);
    if offset >= map.plain_len() {
        return BTreeSet::new();
    }
    doc.marks_at(map.to_doc(offset))
        .iter()
        .map(MarkType::layer)
        .collect()
}

/// Whether `layer` covers every character of the selection.
pub fn is_layer_active(doc: &RichDocument, selection: Selection, layer: Layer) -> bool {
    to_doc_span(doc, selection)
        .is_some_and(|(from, to)| doc.is_fully_marked(from, to, MarkType::for_layer(layer)))
}

fn to_doc_span(doc: &RichDocument, selection: Selection) -> Option<(usize, usize)> {
    let map = PositionMap::of(doc);
    let plain_len = map.plain_len();
    let start = selection.start.min(plain_len);
    let end = selection.end.min(plain_len);
    if start >= end {
        return None;
    }
    let (start, end) = doc.snap_to_chars(start, end);
    Some((map.to_doc(start), map.to_doc(end)))
}

#[cfg(test)]
mod tests {
    use super::{
        active_layers, apply_layer, is_layer_active, remove_layer, toggle_layer, Selection,
    };
    use crate::annotation::document::RichDocument;
    use crate::annotation::sync::extract_ranges;
    use crate::model::highlight::{active_layers_at, HighlightRange, Layer};

    fn range(start: usize, end: usize, level: u8) -> HighlightRange {
        HighlightRange::new(start, end, Layer::try_from(level).unwrap()).unwrap()
    }

    #[test]
    fn apply_is_idempotent_and_unions_partial_coverage() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        assert!(apply_layer(&mut doc, Selection::new(0, 5), Layer::Emphasis));
        assert!(!apply_layer(&mut doc, Selection::new(0, 5), Layer::Emphasis));

        assert!(apply_layer(&mut doc, Selection::new(3, 8), Layer::Emphasis));
        assert_eq!(extract_ranges(&doc), vec![range(0, 8, 2)]);
    }

    #[test]
    fn toggle_over_partial_coverage_applies_to_whole_selection() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        apply_layer(&mut doc, Selection::new(0, 5), Layer::Emphasis);

        assert!(toggle_layer(&mut doc, Selection::new(0, 11), Layer::Emphasis));
        assert_eq!(extract_ranges(&doc), vec![range(0, 11, 2)]);
    }

    #[test]
    fn toggle_twice_restores_prior_highlights() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        apply_layer(&mut doc, Selection::new(0, 5), Layer::Emphasis);
        apply_layer(&mut doc, Selection::new(6, 11), Layer::KeyInsight);
        let before = extract_ranges(&doc);

        let selection = Selection::new(1, 4);
        toggle_layer(&mut doc, selection, Layer::KeyInsight);
        assert_ne!(extract_ranges(&doc), before);
        toggle_layer(&mut doc, selection, Layer::KeyInsight);
        assert_eq!(extract_ranges(&doc), before);
    }

    #[test]
    fn toggle_removes_only_inside_selection_when_fully_covered() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        apply_layer(&mut doc, Selection::new(0, 11), Layer::Emphasis);

        assert!(toggle_layer(&mut doc, Selection::new(5, 6), Layer::Emphasis));
        assert_eq!(
            extract_ranges(&doc),
            vec![range(0, 5, 2), range(6, 11, 2)]
        );
    }

    #[test]
    fn layers_are_independent_channels() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        apply_layer(&mut doc, Selection::new(0, 11), Layer::Emphasis);
        apply_layer(&mut doc, Selection::new(0, 5), Layer::KeyInsight);
        remove_layer(&mut doc, Selection::new(0, 11), Layer::KeyInsight);

        assert_eq!(extract_ranges(&doc), vec![range(0, 11, 2)]);
        assert!(is_layer_active(&doc, Selection::new(0, 11), Layer::Emphasis));
    }

    #[test]
    fn remove_is_unconditional_and_reports_no_change_when_absent() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        assert!(!remove_layer(&mut doc, Selection::new(0, 5), Layer::Emphasis));
        apply_layer(&mut doc, Selection::new(2, 4), Layer::Emphasis);
        assert!(remove_layer(&mut doc, Selection::new(0, 5), Layer::Emphasis));
        assert!(extract_ranges(&doc).is_empty());
    }

    #[test]
    fn zero_width_selection_is_a_no_op() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        assert!(!apply_layer(&mut doc, Selection::cursor(3), Layer::Emphasis));
        assert!(!toggle_layer(&mut doc, Selection::cursor(3), Layer::KeyInsight));
        assert!(extract_ranges(&doc).is_empty());
    }

    #[test]
    fn active_layers_match_range_model_query() {
        let mut doc = RichDocument::from_plain_text("Hello\nWorld");
        apply_layer(&mut doc, Selection::new(3, 8), Layer::Emphasis);
        apply_layer(&mut doc, Selection::new(4, 7), Layer::KeyInsight);
        let ranges = extract_ranges(&doc);

        assert_eq!(ranges, vec![range(3, 8, 2), range(4, 7, 3)]);
        for offset in 0..=12 {
            assert_eq!(
                active_layers(&doc, offset),
                active_layers_at(&ranges, offset),
                "offset {offset}"
            );
        }
    }

    #[test]
    fn selection_inside_surrogate_pair_covers_whole_character() {
        let mut doc = RichDocument::from_plain_text("a😀b");
        assert!(apply_layer(&mut doc, Selection::new(1, 2), Layer::Emphasis));
        assert_eq!(extract_ranges(&doc), vec![range(1, 3, 2)]);
    }
}
