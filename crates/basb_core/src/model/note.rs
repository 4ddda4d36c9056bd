//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note resource exchanged with the note store.
//! - Define CODE workflow stages and the request shapes for note mutations.
//!
//! # Invariants
//! - A new note starts at `CodeStage::Capture` with an empty highlight set.
//! - `highlights` are offsets into `content`, never into `content_html`.
//! - On the wire the highlight set is wrapped as `{"highlights": [...]}`.
//!
//! # See also
//! - `model::highlight` for range semantics.

use crate::model::highlight::{has_key_insight, HighlightRange};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable note identifier.
pub type NoteId = Uuid;

/// Identifier of a PARA container (project/area/resource/archive).
///
/// Containers are owned by another subsystem; notes only reference them.
pub type ContainerId = Uuid;

/// CODE workflow stage, ordered from least to most processed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CodeStage {
    #[default]
    Capture,
    Organize,
    Distill,
    Express,
}

impl CodeStage {
    /// Stable storage/wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Organize => "organize",
            Self::Distill => "distill",
            Self::Express => "express",
        }
    }

    /// Parses a storage/wire label.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "capture" => Some(Self::Capture),
            "organize" => Some(Self::Organize),
            "distill" => Some(Self::Distill),
            "express" => Some(Self::Express),
            _ => None,
        }
    }
}

impl Display for CodeStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical note record as returned by the note store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Plain-text body; highlight offsets index into this field.
    pub content: String,
    /// Rendered rich-text body carrying editor marks.
    pub content_html: Option<String>,
    #[serde(with = "highlight_envelope", default)]
    pub highlights: Vec<HighlightRange>,
    pub executive_summary: Option<String>,
    pub source_url: Option<String>,
    pub source_type: Option<String>,
    pub container_id: Option<ContainerId>,
    pub code_stage: CodeStage,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
    /// Epoch milliseconds.
    pub captured_at: i64,
}

impl Note {
    /// Whether the note sits in the inbox (captured, not yet filed).
    pub fn is_inbox(&self) -> bool {
        self.code_stage == CodeStage::Capture && self.container_id.is_none()
    }

    /// Whether any L3 highlight exists.
    pub fn has_key_insight(&self) -> bool {
        has_key_insight(&self.highlights)
    }
}

/// Create request for quick capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source_url: None,
            source_type: None,
        }
    }
}

/// Partial update request; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executive_summary: Option<String>,
}

impl NoteUpdate {
    /// Update that only replaces the executive summary.
    pub fn summary(summary: impl Into<String>) -> Self {
        Self {
            executive_summary: Some(summary.into()),
            ..Self::default()
        }
    }

    /// Whether any field other than the executive summary is set.
    pub fn touches_content(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.content_html.is_some()
            || self.source_url.is_some()
            || self.source_type.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_content() && self.executive_summary.is_none()
    }
}

/// Highlight replacement request.
///
/// Editor saves attach the current `content`/`content_html` so text and
/// offsets are written together; plain highlight updates omit them and the
/// wire form reduces to `{"highlights": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteHighlightsUpdate {
    pub highlights: Vec<HighlightRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
}

impl NoteHighlightsUpdate {
    pub fn new(highlights: Vec<HighlightRange>) -> Self {
        Self {
            highlights,
            content: None,
            content_html: None,
        }
    }
}

/// Serde adapter for the `{"highlights": [...]}` storage envelope.
pub mod highlight_envelope {
    use crate::model::highlight::HighlightRange;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct EnvelopeRef<'a> {
        highlights: &'a [HighlightRange],
    }

    #[derive(Deserialize)]
    struct EnvelopeOwned {
        #[serde(default)]
        highlights: Vec<HighlightRange>,
    }

    pub fn serialize<S: Serializer>(
        highlights: &[HighlightRange],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        EnvelopeRef { highlights }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<HighlightRange>, D::Error> {
        EnvelopeOwned::deserialize(deserializer).map(|envelope| envelope.highlights)
    }

    /// Encodes a highlight set as the envelope JSON text used in storage.
    pub fn to_json(highlights: &[HighlightRange]) -> serde_json::Result<String> {
        serde_json::to_string(&EnvelopeRef { highlights })
    }

    /// Decodes the envelope JSON text used in storage.
    ///
    /// An empty object decodes to an empty set.
    pub fn from_json(text: &str) -> serde_json::Result<Vec<HighlightRange>> {
        serde_json::from_str::<EnvelopeOwned>(text).map(|envelope| envelope.highlights)
    }
}
