//! Progressive-summarization annotation layer.
//!
//! # Responsibility
//! - Keep highlights as inline editor marks while a note is being edited.
//! - Convert between marks and the persisted `HighlightRange` list.
//!
//! # Invariants
//! - Marks and ranges describe the same highlights; `sync` is the only
//!   place that translates between the two representations.
//!
//! # See also
//! - `model::highlight` for the persisted representation.

pub mod commands;
pub mod document;
pub mod editor;
pub mod sync;
