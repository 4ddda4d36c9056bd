//! Highlight range model for progressive summarization.
//!
//! # Responsibility
//! - Define the addressable `(start, end, layer)` span stored beside note text.
//! - Canonicalize range lists and answer overlap/containment queries.
//!
//! # Invariants
//! - Offsets are zero-based UTF-16 code units into the plain note content.
//! - Every `HighlightRange` satisfies `start < end`.
//! - After [`normalize`], ranges of the same layer never touch or overlap.
//! - Ranges of different layers may cover the same text.
//!
//! # See also
//! - `annotation::sync` for the mapping onto editor marks.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Progressive-summarization layer carried by a highlight.
///
/// Serialized as the bare integer `2` or `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Layer {
    /// L2: broadly important passage (bolded).
    Emphasis,
    /// L3: key insight within an emphasized passage.
    KeyInsight,
}

impl Layer {
    /// Both layers, lowest first.
    pub const ALL: [Layer; 2] = [Layer::Emphasis, Layer::KeyInsight];

    /// Returns the wire value (`2` or `3`).
    pub fn level(self) -> u8 {
        match self {
            Self::Emphasis => 2,
            Self::KeyInsight => 3,
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.level())
    }
}

impl TryFrom<u8> for Layer {
    type Error = HighlightValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::Emphasis),
            3 => Ok(Self::KeyInsight),
            other => Err(HighlightValidationError::UnsupportedLayer(i64::from(other))),
        }
    }
}

impl From<Layer> for u8 {
    fn from(value: Layer) -> Self {
        value.level()
    }
}

/// Rejection reasons for malformed highlight input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightValidationError {
    /// `start >= end`.
    EmptyOrReversed { start: i64, end: i64 },
    /// Offset below zero.
    NegativeOffset(i64),
    /// Layer value outside `{2, 3}`.
    UnsupportedLayer(i64),
}

impl Display for HighlightValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyOrReversed { start, end } => {
                write!(f, "highlight end ({end}) must be > start ({start})")
            }
            Self::NegativeOffset(value) => {
                write!(f, "highlight offset must be non-negative, got {value}")
            }
            Self::UnsupportedLayer(value) => {
                write!(f, "unsupported highlight layer {value}; expected 2 or 3")
            }
        }
    }
}

impl Error for HighlightValidationError {}

/// Untrusted wire shape of one highlight, validated into [`HighlightRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHighlightRange {
    pub start: i64,
    pub end: i64,
    pub layer: i64,
}

/// Half-open `[start, end)` span of plain note text tagged with a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawHighlightRange")]
pub struct HighlightRange {
    start: usize,
    end: usize,
    layer: Layer,
}

impl HighlightRange {
    /// Creates a validated range.
    ///
    /// # Errors
    /// - `EmptyOrReversed` when `start >= end`.
    pub fn new(start: usize, end: usize, layer: Layer) -> Result<Self, HighlightValidationError> {
        if start >= end {
            return Err(HighlightValidationError::EmptyOrReversed {
                start: start as i64,
                end: end as i64,
            });
        }
        Ok(Self { start, end, layer })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Whether `offset` falls inside `[start, end)`.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Whether this range shares at least one offset with `[start, end)`.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        start < end && self.start < end && start < self.end
    }

    /// Clamps the range into `[0, len)`.
    ///
    /// Returns `None` when nothing of the range survives.
    pub fn clamp_to(&self, len: usize) -> Option<Self> {
        let start = self.start.min(len);
        let end = self.end.min(len);
        Self::new(start, end, self.layer).ok()
    }
}

impl TryFrom<RawHighlightRange> for HighlightRange {
    type Error = HighlightValidationError;

    fn try_from(value: RawHighlightRange) -> Result<Self, Self::Error> {
        for offset in [value.start, value.end] {
            if offset < 0 {
                return Err(HighlightValidationError::NegativeOffset(offset));
            }
        }
        let layer = u8::try_from(value.layer)
            .map_err(|_| HighlightValidationError::UnsupportedLayer(value.layer))
            .and_then(Layer::try_from)?;
        if value.start >= value.end {
            return Err(HighlightValidationError::EmptyOrReversed {
                start: value.start,
                end: value.end,
            });
        }
        Ok(Self {
            start: value.start as usize,
            end: value.end as usize,
            layer,
        })
    }
}

impl From<HighlightRange> for RawHighlightRange {
    fn from(value: HighlightRange) -> Self {
        Self {
            start: value.start as i64,
            end: value.end as i64,
            layer: i64::from(value.layer.level()),
        }
    }
}

/// Validates an untrusted range list, failing on the first malformed entry.
pub fn validate_ranges(
    raw: &[RawHighlightRange],
) -> Result<Vec<HighlightRange>, HighlightValidationError> {
    raw.iter().copied().map(HighlightRange::try_from).collect()
}

/// Canonicalizes a range list.
///
/// Rules:
/// - same-layer ranges that touch or overlap merge into one span;
/// - zero-length ranges are dropped;
/// - output is ordered by `start` ascending, then `layer` ascending, then `end`.
pub fn normalize(ranges: &[HighlightRange]) -> Vec<HighlightRange> {
    let mut normalized = Vec::with_capacity(ranges.len());

    for layer in Layer::ALL {
        let mut spans = ranges
            .iter()
            .filter(|range| range.layer == layer && range.start < range.end)
            .map(|range| (range.start, range.end))
            .collect::<Vec<_>>();
        spans.sort_unstable();

        let mut current: Option<(usize, usize)> = None;
        for (start, end) in spans {
            if let Some((_, current_end)) = current.as_mut() {
                if start <= *current_end {
                    *current_end = (*current_end).max(end);
                    continue;
                }
            }
            if let Some((merged_start, merged_end)) = current.replace((start, end)) {
                normalized.push(HighlightRange {
                    start: merged_start,
                    end: merged_end,
                    layer,
                });
            }
        }
        if let Some((start, end)) = current {
            normalized.push(HighlightRange { start, end, layer });
        }
    }

    normalized.sort_by(canonical_order);
    normalized
}

fn canonical_order(left: &HighlightRange, right: &HighlightRange) -> Ordering {
    left.start
        .cmp(&right.start)
        .then_with(|| left.layer.cmp(&right.layer))
        .then_with(|| left.end.cmp(&right.end))
}

/// Returns the layers whose range contains `offset`.
pub fn active_layers_at(ranges: &[HighlightRange], offset: usize) -> BTreeSet<Layer> {
    ranges
        .iter()
        .filter(|range| range.contains(offset))
        .map(HighlightRange::layer)
        .collect()
}

/// Returns every range overlapping the half-open query interval.
///
/// An empty query interval intersects nothing.
pub fn ranges_intersecting(
    ranges: &[HighlightRange],
    start: usize,
    end: usize,
) -> Vec<HighlightRange> {
    ranges
        .iter()
        .filter(|range| range.intersects(start, end))
        .copied()
        .collect()
}

/// Whether the union of `layer` ranges covers all of `[start, end)`.
///
/// An empty interval is never considered covered.
pub fn covers(ranges: &[HighlightRange], start: usize, end: usize, layer: Layer) -> bool {
    if start >= end {
        return false;
    }
    normalize(ranges)
        .iter()
        .any(|range| range.layer == layer && range.start <= start && end <= range.end)
}

/// Whether any range carries the key-insight layer.
pub fn has_key_insight(ranges: &[HighlightRange]) -> bool {
    ranges.iter().any(|range| range.layer == Layer::KeyInsight)
}
