//! Editing session binding one note to a live document.
//!
//! # Responsibility
//! - Load a note's content and highlights into a `RichDocument`.
//! - Route annotation commands and text edits to the document.
//! - Persist text, rendered HTML and extracted ranges in one store request.
//!
//! # Invariants
//! - The document is the source of truth while the session is open; the
//!   range list is derived from it only at save time.
//! - A save snapshots the document before contacting the store.

use crate::annotation::commands::{self, Selection};
use crate::annotation::document::RichDocument;
use crate::annotation::sync::{extract_ranges, load_document, LoadReport, PositionMap};
use crate::model::highlight::{normalize, HighlightRange, Layer};
use crate::model::note::{Note, NoteHighlightsUpdate, NoteId};
use crate::repo::note_repo::NoteRepository;
use crate::service::note_store::{NoteStore, SharedNote, StoreResult};
use log::debug;
use std::collections::BTreeSet;

/// Live editor state for one note.
#[derive(Debug, Clone)]
pub struct NoteEditor {
    note_id: NoteId,
    document: RichDocument,
    saved_content: String,
    saved_highlights: Vec<HighlightRange>,
    load_report: LoadReport,
}

impl NoteEditor {
    /// Opens `note`, painting its stored highlights onto a fresh document.
    pub fn open(note: &Note) -> Self {
        let (document, load_report) = load_document(&note.content, &note.highlights);
        if load_report.clamped + load_report.dropped > 0 {
            debug!(
                "event=editor_open module=annotation status=adjusted note_id={} clamped={} dropped={}",
                note.id, load_report.clamped, load_report.dropped
            );
        }
        Self {
            note_id: note.id,
            document,
            saved_content: note.content.clone(),
            saved_highlights: normalize(&note.highlights),
            load_report,
        }
    }

    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    pub fn document(&self) -> &RichDocument {
        &self.document
    }

    /// Counters from loading the stored highlights.
    pub fn load_report(&self) -> LoadReport {
        self.load_report
    }

    pub fn apply_layer(&mut self, selection: Selection, layer: Layer) -> bool {
        commands::apply_layer(&mut self.document, selection, layer)
    }

    pub fn toggle_layer(&mut self, selection: Selection, layer: Layer) -> bool {
        commands::toggle_layer(&mut self.document, selection, layer)
    }

    pub fn remove_layer(&mut self, selection: Selection, layer: Layer) -> bool {
        commands::remove_layer(&mut self.document, selection, layer)
    }

    pub fn active_layers(&self, offset: usize) -> BTreeSet<Layer> {
        commands::active_layers(&self.document, offset)
    }

    pub fn is_layer_active(&self, selection: Selection, layer: Layer) -> bool {
        commands::is_layer_active(&self.document, selection, layer)
    }

    /// Inserts text at a plain-text offset; marks follow the text.
    pub fn insert_text(&mut self, offset: usize, text: &str) {
        let pos = PositionMap::of(&self.document).to_doc(offset);
        self.document.insert_text(pos, text);
    }

    /// Deletes the selected plain-text span; marks on it disappear with it.
    pub fn delete_text(&mut self, selection: Selection) {
        if selection.is_empty() {
            return;
        }
        let map = PositionMap::of(&self.document);
        self.document
            .delete(map.to_doc(selection.start), map.to_doc(selection.end));
    }

    pub fn plain_text(&self) -> String {
        self.document.plain_text()
    }

    /// Normalized ranges currently expressed by the document's marks.
    pub fn highlights(&self) -> Vec<HighlightRange> {
        extract_ranges(&self.document)
    }

    /// Whether text or highlights differ from the last saved state.
    pub fn is_dirty(&self) -> bool {
        self.plain_text() != self.saved_content || self.highlights() != self.saved_highlights
    }

    /// Saves the session through `store` with a single highlight request.
    ///
    /// Content is attached only when the text changed; the rendered HTML is
    /// always attached so marks and text stay consistent remotely.
    pub fn save<R: NoteRepository>(&mut self, store: &mut NoteStore<R>) -> StoreResult<SharedNote> {
        let content = self.plain_text();
        let highlights = self.highlights();
        let update = NoteHighlightsUpdate {
            highlights: highlights.clone(),
            content: (content != self.saved_content).then(|| content.clone()),
            content_html: Some(self.document.to_html()),
        };

        let handle = store.update_highlights(self.note_id, update)?;
        self.saved_content = content;
        self.saved_highlights = highlights;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::NoteEditor;
    use crate::annotation::commands::Selection;
    use crate::model::highlight::{HighlightRange, Layer};
    use crate::model::note::{CodeStage, Note};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn note(content: &str, highlights: Vec<HighlightRange>) -> Note {
        Note {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            content: content.to_string(),
            content_html: None,
            highlights,
            executive_summary: None,
            source_url: None,
            source_type: None,
            container_id: None,
            code_stage: CodeStage::Capture,
            created_at: 0,
            updated_at: 0,
            captured_at: 0,
        }
    }

    fn range(start: usize, end: usize, layer: Layer) -> HighlightRange {
        HighlightRange::new(start, end, layer).unwrap()
    }

    #[test]
    fn fresh_session_is_clean() {
        let editor = NoteEditor::open(&note("Hello World", vec![range(0, 5, Layer::Emphasis)]));
        assert!(!editor.is_dirty());
        assert_eq!(editor.highlights(), vec![range(0, 5, Layer::Emphasis)]);
        assert_eq!(
            editor.active_layers(2),
            BTreeSet::from([Layer::Emphasis])
        );
    }

    #[test]
    fn clamped_load_marks_session_dirty() {
        let editor = NoteEditor::open(&note("0123456789", vec![range(0, 20, Layer::Emphasis)]));
        assert_eq!(editor.load_report().clamped, 1);
        assert!(editor.is_dirty());
        assert_eq!(editor.highlights(), vec![range(0, 10, Layer::Emphasis)]);
    }

    #[test]
    fn inserted_text_shifts_highlights() {
        let mut editor = NoteEditor::open(&note("Hello World", vec![range(6, 11, Layer::KeyInsight)]));
        editor.insert_text(0, ">> ");
        assert_eq!(editor.plain_text(), ">> Hello World");
        assert_eq!(editor.highlights(), vec![range(9, 14, Layer::KeyInsight)]);
        assert!(editor.is_dirty());
    }

    #[test]
    fn deleting_marked_text_shrinks_its_range() {
        let mut editor = NoteEditor::open(&note("Hello World", vec![range(0, 11, Layer::Emphasis)]));
        editor.delete_text(Selection::new(5, 11));
        assert_eq!(editor.plain_text(), "Hello");
        assert_eq!(editor.highlights(), vec![range(0, 5, Layer::Emphasis)]);
    }

    #[test]
    fn deleting_across_paragraphs_joins_them() {
        let mut editor = NoteEditor::open(&note("Hello\nWorld", vec![range(6, 11, Layer::Emphasis)]));
        editor.delete_text(Selection::new(5, 6));
        assert_eq!(editor.plain_text(), "HelloWorld");
        assert_eq!(editor.highlights(), vec![range(5, 10, Layer::Emphasis)]);
    }

    #[test]
    fn commands_route_to_document() {
        let mut editor = NoteEditor::open(&note("Hello World", Vec::new()));
        assert!(editor.apply_layer(Selection::new(0, 5), Layer::Emphasis));
        assert!(editor.toggle_layer(Selection::new(0, 5), Layer::KeyInsight));
        assert!(editor.is_layer_active(Selection::new(0, 5), Layer::KeyInsight));
        assert!(editor.remove_layer(Selection::new(0, 5), Layer::Emphasis));
        assert_eq!(editor.highlights(), vec![range(0, 5, Layer::KeyInsight)]);
    }
}
