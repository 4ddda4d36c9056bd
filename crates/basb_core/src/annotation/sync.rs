//! Bidirectional sync between editor marks and persisted highlight ranges.
//!
//! # Responsibility
//! - Own the translation between plain-text offsets and document positions.
//! - Load: paint a normalized range list onto a document as marks.
//! - Persist: extract the normalized range list from a document's marks.
//!
//! # Invariants
//! - `extract_ranges(load(normalize(R))) == normalize(R)` whenever every
//!   range fits the text and its endpoints fall on character boundaries.
//! - Ranges reaching past the text are clamped; ranges left empty by the
//!   clamp are dropped without surfacing an error.
//! - Endpoints inside a surrogate pair widen to the enclosing character and
//!   are reported as clamped.
//! - A paragraph separator is one plain offset and carries its own marks.

use crate::annotation::document::{MarkType, RichDocument};
use crate::model::highlight::{normalize, HighlightRange};
use log::debug;

/// Plain-offset <-> document-position translation for one document snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMap {
    /// `(plain_start, text_len)` per paragraph.
    blocks: Vec<(usize, usize)>,
}

impl PositionMap {
    pub fn of(doc: &RichDocument) -> Self {
        let mut blocks = Vec::with_capacity(doc.paragraphs().len());
        let mut plain = 0;
        for paragraph in doc.paragraphs() {
            let len = paragraph.len_utf16();
            blocks.push((plain, len));
            plain += len + 1;
        }
        Self { blocks }
    }

    /// Plain-text length in UTF-16 code units.
    pub fn plain_len(&self) -> usize {
        self.blocks
            .last()
            .map_or(0, |(start, len)| start + len)
    }

    /// Maps a plain offset to a document position, clamping past the end.
    ///
    /// A separator offset maps to the end of the paragraph it terminates.
    pub fn to_doc(&self, plain: usize) -> usize {
        let plain = plain.min(self.plain_len());
        for (block, (start, len)) in self.blocks.iter().enumerate() {
            if plain <= start + len {
                return plain + 1 + block;
            }
        }
        plain + self.blocks.len()
    }
}

/// Outcome counters of one load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Ranges painted onto the document.
    pub applied: usize,
    /// Ranges shortened to fit the text or widened to whole characters.
    pub clamped: usize,
    /// Ranges that fell entirely outside the text.
    pub dropped: usize,
}

/// Builds a document from plain content and paints `ranges` onto it.
pub fn load_document(content: &str, ranges: &[HighlightRange]) -> (RichDocument, LoadReport) {
    let mut doc = RichDocument::from_plain_text(content);
    let report = load_ranges(&mut doc, ranges);
    (doc, report)
}

/// Paints `ranges` onto `doc` as marks (load direction).
pub fn load_ranges(doc: &mut RichDocument, ranges: &[HighlightRange]) -> LoadReport {
    let map = PositionMap::of(doc);
    let plain_len = map.plain_len();
    let mut report = LoadReport::default();

    for range in normalize(ranges) {
        let Some(fitted) = range.clamp_to(plain_len) else {
            debug!(
                "event=highlight_load module=annotation status=dropped start={} end={} layer={} text_len={}",
                range.start(),
                range.end(),
                range.layer().level(),
                plain_len
            );
            report.dropped += 1;
            continue;
        };
        let (start, end) = doc.snap_to_chars(fitted.start(), fitted.end());
        if (start, end) != (range.start(), range.end()) {
            debug!(
                "event=highlight_load module=annotation status=clamped start={} end={} clamped_start={} clamped_end={} layer={}",
                range.start(),
                range.end(),
                start,
                end,
                range.layer().level()
            );
            report.clamped += 1;
        }
        doc.add_mark(
            map.to_doc(start),
            map.to_doc(end),
            MarkType::for_layer(range.layer()),
        );
        report.applied += 1;
    }

    report
}

/// Extracts the normalized range list from `doc` (persist direction).
///
/// Walks text runs and separators once, emitting one range per maximal
/// marked span.
pub fn extract_ranges(doc: &RichDocument) -> Vec<HighlightRange> {
    let mut segments = Vec::new();
    for (block, paragraph) in doc.paragraphs().iter().enumerate() {
        if block > 0 {
            segments.push((doc.paragraphs()[block - 1].break_marks(), 1));
        }
        segments.extend(
            paragraph
                .runs()
                .iter()
                .map(|run| (run.marks(), run.len_utf16())),
        );
    }

    let mut ranges = Vec::new();
    let mut open: [Option<usize>; 2] = [None; 2];
    let mut plain = 0;
    for (marks, len) in segments {
        for (slot, mark) in MarkType::ALL.into_iter().enumerate() {
            if marks.contains(mark) {
                open[slot].get_or_insert(plain);
            } else if let Some(start) = open[slot].take() {
                ranges.extend(HighlightRange::new(start, plain, mark.layer()).ok());
            }
        }
        plain += len;
    }
    for (slot, mark) in MarkType::ALL.into_iter().enumerate() {
        if let Some(start) = open[slot] {
            ranges.extend(HighlightRange::new(start, plain, mark.layer()).ok());
        }
    }

    normalize(&ranges)
}
