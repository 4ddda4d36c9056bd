//! Domain model for notes and their highlights.
//!
//! # Responsibility
//! - Define the note resource and the highlight range value type.
//! - Keep wire shapes (serde) next to the types they describe.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Highlight ranges are validated on construction and on deserialization.

pub mod highlight;
pub mod note;
