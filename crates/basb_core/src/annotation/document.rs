//! In-memory rich-text document with inline highlight marks.
//!
//! # Responsibility
//! - Hold note text as paragraphs of text runs, each run carrying a mark set.
//! - Apply/remove marks and edit text in document coordinates.
//! - Render the marked document as HTML for `content_html`.
//!
//! # Invariants
//! - The document always has at least one paragraph.
//! - Runs are canonical: no empty runs, no adjacent runs with equal marks.
//! - Document position 0 precedes the first paragraph; paragraph `i` with
//!   text length `n` occupies `n + 2` positions (open, text, close).
//! - Every paragraph but the last carries the marks of the `\n` separator
//!   that follows it. A mark span covers that separator when it runs from
//!   the paragraph's closing position through the next opening position.
//! - Lengths and offsets are UTF-16 code units.

use crate::model::highlight::Layer;

/// Inline mark types registered with the editor, one per layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkType {
    L2Highlight,
    L3Highlight,
}

impl MarkType {
    pub const ALL: [MarkType; 2] = [MarkType::L2Highlight, MarkType::L3Highlight];

    pub fn for_layer(layer: Layer) -> Self {
        match layer {
            Layer::Emphasis => Self::L2Highlight,
            Layer::KeyInsight => Self::L3Highlight,
        }
    }

    pub fn layer(self) -> Layer {
        match self {
            Self::L2Highlight => Layer::Emphasis,
            Self::L3Highlight => Layer::KeyInsight,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::L2Highlight => 0b01,
            Self::L3Highlight => 0b10,
        }
    }

    fn html_open_tag(self) -> &'static str {
        match self {
            Self::L2Highlight => r#"<mark data-l2-highlight="" class="l2-highlight">"#,
            Self::L3Highlight => r#"<mark data-l3-highlight="" class="l3-highlight">"#,
        }
    }
}

/// Small fixed set of marks attached to one text run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MarkSet(u8);

impl MarkSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, mark: MarkType) -> bool {
        self.0 & mark.bit() != 0
    }

    pub fn with(self, mark: MarkType) -> Self {
        Self(self.0 | mark.bit())
    }

    pub fn without(self, mark: MarkType) -> Self {
        Self(self.0 & !mark.bit())
    }

    pub fn set(self, mark: MarkType, on: bool) -> Self {
        if on {
            self.with(mark)
        } else {
            self.without(mark)
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = MarkType> {
        MarkType::ALL
            .into_iter()
            .filter(move |mark| self.contains(*mark))
    }
}

/// Contiguous text sharing one mark set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    text: String,
    marks: MarkSet,
}

impl TextRun {
    pub fn new(text: impl Into<String>, marks: MarkSet) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn marks(&self) -> MarkSet {
        self.marks
    }

    pub fn len_utf16(&self) -> usize {
        utf16_len(&self.text)
    }
}

/// Block of inline text runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    runs: Vec<TextRun>,
    break_marks: MarkSet,
}

impl Paragraph {
    pub fn from_text(text: &str) -> Self {
        let mut paragraph = Self {
            runs: vec![TextRun::new(text, MarkSet::empty())],
            break_marks: MarkSet::empty(),
        };
        paragraph.normalize_runs();
        paragraph
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Marks on the separator after this paragraph.
    pub fn break_marks(&self) -> MarkSet {
        self.break_marks
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(TextRun::text).collect()
    }

    pub fn len_utf16(&self) -> usize {
        self.runs.iter().map(TextRun::len_utf16).sum()
    }

    /// Marks on the character starting at `offset`; empty past the end.
    pub fn marks_at(&self, offset: usize) -> MarkSet {
        let mut pos = 0;
        for run in &self.runs {
            let len = run.len_utf16();
            if offset < pos + len {
                return run.marks;
            }
            pos += len;
        }
        MarkSet::empty()
    }

    /// Whether every character in `[from, to)` carries `mark`.
    ///
    /// Returns `None` when the interval holds no text.
    fn covered_by(&self, from: usize, to: usize, mark: MarkType) -> Option<bool> {
        let mut pos = 0;
        let mut saw_text = false;
        for run in &self.runs {
            let len = run.len_utf16();
            let run_end = pos + len;
            if pos < to && from < run_end {
                saw_text = true;
                if !run.marks.contains(mark) {
                    return Some(false);
                }
            }
            pos = run_end;
        }
        saw_text.then_some(true)
    }

    fn set_mark(&mut self, from: usize, to: usize, mark: MarkType, on: bool) -> bool {
        if from >= to {
            return false;
        }
        let first = self.split_at(from);
        let last = self.split_at(to);
        let mut changed = false;
        for run in &mut self.runs[first..last] {
            if run.marks.contains(mark) != on {
                run.marks = run.marks.set(mark, on);
                changed = true;
            }
        }
        self.normalize_runs();
        changed
    }

    fn insert(&mut self, offset: usize, text: &str, marks: MarkSet) {
        if text.is_empty() {
            return;
        }
        let index = self.split_at(offset);
        self.runs.insert(index, TextRun::new(text, marks));
        self.normalize_runs();
    }

    fn remove(&mut self, from: usize, to: usize) {
        if from >= to {
            return;
        }
        let first = self.split_at(from);
        let last = self.split_at(to);
        self.runs.drain(first..last);
        self.normalize_runs();
    }

    /// Moves text from `offset` on, and the trailing separator marks, into a
    /// new paragraph.
    fn split_off(&mut self, offset: usize) -> Paragraph {
        let index = self.split_at(offset);
        let mut tail = Paragraph {
            runs: self.runs.split_off(index),
            break_marks: std::mem::take(&mut self.break_marks),
        };
        self.normalize_runs();
        tail.normalize_runs();
        tail
    }

    /// Joins `other` onto the end; its separator marks become ours.
    fn append(&mut self, other: Paragraph) {
        self.runs.extend(other.runs);
        self.break_marks = other.break_marks;
        self.normalize_runs();
    }

    /// Ensures a run boundary at `offset` and returns the index of the run
    /// starting there (`runs.len()` when `offset` is at or past the end).
    ///
    /// Offsets inside a surrogate pair round down to the pair's start.
    fn split_at(&mut self, offset: usize) -> usize {
        let mut pos = 0;
        for index in 0..self.runs.len() {
            if offset == pos {
                return index;
            }
            let len = self.runs[index].len_utf16();
            if offset < pos + len {
                let byte = byte_index_for_utf16(&self.runs[index].text, offset - pos);
                if byte == 0 {
                    return index;
                }
                let tail = self.runs[index].text.split_off(byte);
                let marks = self.runs[index].marks;
                self.runs.insert(index + 1, TextRun::new(tail, marks));
                return index + 1;
            }
            pos += len;
        }
        self.runs.len()
    }

    fn normalize_runs(&mut self) {
        let mut merged: Vec<TextRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(previous) if previous.marks == run.marks => previous.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }

    fn write_html(&self, out: &mut String) {
        out.push_str("<p>");
        for run in &self.runs {
            for mark in run.marks.iter() {
                out.push_str(mark.html_open_tag());
            }
            escape_html_into(&run.text, out);
            for _ in run.marks.iter() {
                out.push_str("</mark>");
            }
        }
        out.push_str("</p>");
    }
}

/// Position inside paragraph text, resolved from a document position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPos {
    pub block: usize,
    pub offset: usize,
}

/// Live editor document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichDocument {
    blocks: Vec<Paragraph>,
}

impl Default for RichDocument {
    fn default() -> Self {
        Self {
            blocks: vec![Paragraph::default()],
        }
    }
}

impl RichDocument {
    /// Builds an unmarked document; `\n` separates paragraphs.
    pub fn from_plain_text(text: &str) -> Self {
        Self {
            blocks: text.split('\n').map(Paragraph::from_text).collect(),
        }
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.blocks
    }

    /// Plain text with paragraphs joined by `\n`.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain-text length in UTF-16 code units.
    pub fn plain_len(&self) -> usize {
        let text: usize = self.blocks.iter().map(Paragraph::len_utf16).sum();
        text + self.blocks.len().saturating_sub(1)
    }

    /// Resolves a document position into paragraph text coordinates.
    ///
    /// Structural positions snap to the nearest text position of the
    /// paragraph they open or close; positions past the end snap to the end.
    pub fn resolve(&self, pos: usize) -> ResolvedPos {
        let mut cursor = 0;
        for (block, paragraph) in self.blocks.iter().enumerate() {
            let text_start = cursor + 1;
            let len = paragraph.len_utf16();
            if pos <= text_start + len {
                return ResolvedPos {
                    block,
                    offset: pos.saturating_sub(text_start),
                };
            }
            cursor = text_start + len + 1;
        }
        let block = self.blocks.len() - 1;
        ResolvedPos {
            block,
            offset: self.blocks[block].len_utf16(),
        }
    }

    /// Adds `mark` over `[from, to)`; returns whether anything changed.
    pub fn add_mark(&mut self, from: usize, to: usize, mark: MarkType) -> bool {
        self.set_mark(from, to, mark, true)
    }

    /// Clears `mark` over `[from, to)`; returns whether anything changed.
    pub fn remove_mark(&mut self, from: usize, to: usize, mark: MarkType) -> bool {
        self.set_mark(from, to, mark, false)
    }

    /// Whether every character and separator in `[from, to)` carries `mark`.
    ///
    /// A span covering neither text nor a separator is never considered
    /// marked.
    pub fn is_fully_marked(&self, from: usize, to: usize, mark: MarkType) -> bool {
        let mut saw_text = false;
        for (block, local_from, local_to) in self.block_spans(from, to) {
            match self.blocks[block].covered_by(local_from, local_to, mark) {
                Some(false) => return false,
                Some(true) => saw_text = true,
                None => {}
            }
        }
        for block in self.separators_within(from, to) {
            if !self.blocks[block].break_marks.contains(mark) {
                return false;
            }
            saw_text = true;
        }
        saw_text
    }

    /// Marks on the character starting at `pos`.
    ///
    /// The closing position of a paragraph reports its separator marks.
    pub fn marks_at(&self, pos: usize) -> MarkSet {
        let ResolvedPos { block, offset } = self.resolve(pos);
        let paragraph = &self.blocks[block];
        if offset == paragraph.len_utf16() && block + 1 < self.blocks.len() {
            return paragraph.break_marks;
        }
        paragraph.marks_at(offset)
    }

    /// Widens plain-text `[start, end)` so neither end splits a surrogate pair.
    pub fn snap_to_chars(&self, start: usize, end: usize) -> (usize, usize) {
        let (mut start, mut end) = (start, end);
        let mut units = 0;
        for ch in self.plain_text().chars() {
            let next = units + ch.len_utf16();
            if units < start && start < next {
                start = units;
            }
            if units < end && end < next {
                end = next;
            }
            units = next;
        }
        (start, end)
    }

    /// Inserts text at `pos`; `\n` splits the paragraph.
    ///
    /// Inserted text, and any separators it introduces, inherit the marks of
    /// the character to its left within the same paragraph.
    pub fn insert_text(&mut self, pos: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let ResolvedPos { block, offset } = self.resolve(pos);
        let marks = if offset == 0 {
            MarkSet::empty()
        } else {
            self.blocks[block].marks_at(offset - 1)
        };

        let mut pieces = text.split('\n');
        let first = pieces.next().unwrap_or_default();
        let rest = pieces.collect::<Vec<_>>();
        if rest.is_empty() {
            self.blocks[block].insert(offset, first, marks);
            return;
        }

        let mut tail = self.blocks[block].split_off(offset);
        self.blocks[block].insert(offset, first, marks);
        self.blocks[block].break_marks = marks;
        let last_index = rest.len() - 1;
        let mut new_blocks = Vec::with_capacity(rest.len());
        for (index, piece) in rest.into_iter().enumerate() {
            let mut paragraph = Paragraph {
                break_marks: marks,
                ..Paragraph::default()
            };
            paragraph.insert(0, piece, marks);
            if index == last_index {
                paragraph.append(std::mem::take(&mut tail));
            }
            new_blocks.push(paragraph);
        }
        let insert_at = block + 1;
        self.blocks.splice(insert_at..insert_at, new_blocks);
    }

    /// Deletes `[from, to)`, joining paragraphs when the span crosses them.
    pub fn delete(&mut self, from: usize, to: usize) {
        if from >= to {
            return;
        }
        let start = self.resolve(from);
        let end = self.resolve(to);
        if start.block == end.block {
            self.blocks[start.block].remove(start.offset, end.offset);
            return;
        }
        let tail = self.blocks[end.block].split_off(end.offset);
        let head = &mut self.blocks[start.block];
        let head_len = head.len_utf16();
        head.remove(start.offset, head_len);
        head.append(tail);
        self.blocks.drain(start.block + 1..=end.block);
    }

    /// Renders `<p>` blocks with nested `<mark>` elements.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            block.write_html(&mut out);
        }
        out
    }

    fn set_mark(&mut self, from: usize, to: usize, mark: MarkType, on: bool) -> bool {
        let spans = self.block_spans(from, to);
        let mut changed = false;
        for (block, local_from, local_to) in spans {
            changed |= self.blocks[block].set_mark(local_from, local_to, mark, on);
        }
        for block in self.separators_within(from, to) {
            let paragraph = &mut self.blocks[block];
            if paragraph.break_marks.contains(mark) != on {
                paragraph.break_marks = paragraph.break_marks.set(mark, on);
                changed = true;
            }
        }
        changed
    }

    /// Indices of paragraphs whose trailing separator lies inside `[from, to)`.
    fn separators_within(&self, from: usize, to: usize) -> Vec<usize> {
        let mut blocks = Vec::new();
        let mut cursor = 0;
        for (block, paragraph) in self.blocks.iter().enumerate().take(self.blocks.len() - 1) {
            let text_end = cursor + 1 + paragraph.len_utf16();
            if from <= text_end && text_end + 2 <= to {
                blocks.push(block);
            }
            cursor = text_end + 1;
            if cursor >= to {
                break;
            }
        }
        blocks
    }

    /// Splits `[from, to)` into per-paragraph local text intervals.
    fn block_spans(&self, from: usize, to: usize) -> Vec<(usize, usize, usize)> {
        let mut spans = Vec::new();
        if from >= to {
            return spans;
        }
        let mut cursor = 0;
        for (block, paragraph) in self.blocks.iter().enumerate() {
            let text_start = cursor + 1;
            let len = paragraph.len_utf16();
            let text_end = text_start + len;
            let lo = from.max(text_start);
            let hi = to.min(text_end);
            if lo < hi {
                spans.push((block, lo - text_start, hi - text_start));
            }
            cursor = text_end + 1;
            if cursor >= to {
                break;
            }
        }
        spans
    }
}

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn byte_index_for_utf16(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (byte, ch) in text.char_indices() {
        let width = ch.len_utf16();
        if units + width > offset {
            return byte;
        }
        units += width;
    }
    text.len()
}

fn escape_html_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MarkType, RichDocument};

    #[test]
    fn plain_text_roundtrips_paragraphs() {
        let doc = RichDocument::from_plain_text("one\n\nthree");
        assert_eq!(doc.paragraphs().len(), 3);
        assert_eq!(doc.plain_text(), "one\n\nthree");
        assert_eq!(doc.plain_len(), 10);
    }

    #[test]
    fn add_mark_splits_and_merges_runs() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        assert!(doc.add_mark(1, 6, MarkType::L2Highlight));
        assert_eq!(doc.paragraphs()[0].runs().len(), 2);
        assert!(!doc.add_mark(1, 6, MarkType::L2Highlight));

        assert!(doc.add_mark(6, 12, MarkType::L2Highlight));
        assert_eq!(doc.paragraphs()[0].runs().len(), 1);
        assert!(doc.is_fully_marked(1, 12, MarkType::L2Highlight));
    }

    #[test]
    fn marks_span_paragraphs_in_document_coordinates() {
        // "ab" occupies positions 1..3, "cd" occupies 5..7.
        let mut doc = RichDocument::from_plain_text("ab\ncd");
        doc.add_mark(2, 6, MarkType::L3Highlight);
        assert!(doc.marks_at(2).contains(MarkType::L3Highlight));
        assert!(doc.marks_at(3).contains(MarkType::L3Highlight));
        assert!(doc.marks_at(5).contains(MarkType::L3Highlight));
        assert!(!doc.marks_at(6).contains(MarkType::L3Highlight));
        assert!(doc.is_fully_marked(2, 6, MarkType::L3Highlight));
    }

    #[test]
    fn separator_marks_only_when_span_crosses_it() {
        let mut doc = RichDocument::from_plain_text("ab\ncd");
        doc.add_mark(1, 3, MarkType::L2Highlight);
        doc.add_mark(5, 7, MarkType::L2Highlight);
        assert!(doc.paragraphs()[0].break_marks().is_empty());
        assert!(!doc.is_fully_marked(1, 7, MarkType::L2Highlight));

        // Close of "ab" (3) through open of "cd" (5) is the separator alone.
        assert!(doc.add_mark(3, 5, MarkType::L2Highlight));
        assert!(doc.paragraphs()[0].break_marks().contains(MarkType::L2Highlight));
        assert!(doc.is_fully_marked(1, 7, MarkType::L2Highlight));
        assert!(doc.paragraphs()[1].break_marks().is_empty());
    }

    #[test]
    fn split_and_join_carry_separator_marks() {
        let mut doc = RichDocument::from_plain_text("abcd\nef");
        doc.add_mark(1, 9, MarkType::L2Highlight);
        doc.insert_text(3, "\n");
        assert_eq!(doc.plain_text(), "ab\ncd\nef");
        assert!(doc.paragraphs()[0].break_marks().contains(MarkType::L2Highlight));
        assert!(doc.paragraphs()[1].break_marks().contains(MarkType::L2Highlight));

        doc.remove_mark(7, 9, MarkType::L2Highlight);
        assert!(doc.paragraphs()[1].break_marks().is_empty());
        // Joining "ab" with "cd" keeps the unmarked separator before "ef".
        doc.delete(3, 5);
        assert_eq!(doc.plain_text(), "abcd\nef");
        assert!(doc.paragraphs()[0].break_marks().is_empty());
    }

    #[test]
    fn snap_widens_offsets_inside_surrogate_pairs() {
        let doc = RichDocument::from_plain_text("a😀b");
        assert_eq!(doc.snap_to_chars(2, 3), (1, 3));
        assert_eq!(doc.snap_to_chars(0, 2), (0, 3));
        assert_eq!(doc.snap_to_chars(1, 4), (1, 4));
    }

    #[test]
    fn inserted_text_inherits_left_marks_and_shifts_following_marks() {
        let mut doc = RichDocument::from_plain_text("Hello World");
        doc.add_mark(1, 6, MarkType::L2Highlight);
        doc.insert_text(6, "!!");
        assert_eq!(doc.plain_text(), "Hello!! World");
        assert!(doc.is_fully_marked(1, 8, MarkType::L2Highlight));

        doc.insert_text(1, ">> ");
        assert!(!doc.marks_at(1).contains(MarkType::L2Highlight));
        assert!(doc.is_fully_marked(4, 11, MarkType::L2Highlight));
    }

    #[test]
    fn newline_insert_splits_and_delete_joins() {
        let mut doc = RichDocument::from_plain_text("HelloWorld");
        doc.insert_text(6, "\n");
        assert_eq!(doc.plain_text(), "Hello\nWorld");
        assert_eq!(doc.paragraphs().len(), 2);

        // Delete from end of "Hello" (6) through start of "World" (8).
        doc.delete(6, 8);
        assert_eq!(doc.plain_text(), "HelloWorld");
        assert_eq!(doc.paragraphs().len(), 1);
    }

    #[test]
    fn html_nests_l3_inside_l2_and_escapes_text() {
        let mut doc = RichDocument::from_plain_text("a<b");
        doc.add_mark(1, 4, MarkType::L2Highlight);
        doc.add_mark(1, 2, MarkType::L3Highlight);
        assert_eq!(
            doc.to_html(),
            concat!(
                r#"<p><mark data-l2-highlight="" class="l2-highlight">"#,
                r#"<mark data-l3-highlight="" class="l3-highlight">a</mark></mark>"#,
                r#"<mark data-l2-highlight="" class="l2-highlight">&lt;b</mark></p>"#,
            )
        );
    }

    #[test]
    fn utf16_offsets_count_surrogate_pairs_as_two_units() {
        let mut doc = RichDocument::from_plain_text("a😀b");
        assert_eq!(doc.plain_len(), 4);
        doc.add_mark(2, 4, MarkType::L2Highlight);
        assert_eq!(doc.paragraphs()[0].runs()[1].text(), "😀");
    }
}
