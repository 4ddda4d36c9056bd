//! Core domain logic for the BASB note workspace.
//! This crate is the single source of truth for highlight and stage invariants.

pub mod annotation;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use annotation::commands::{
    active_layers, apply_layer, is_layer_active, remove_layer, toggle_layer, Selection,
};
pub use annotation::document::{MarkType, RichDocument};
pub use annotation::editor::NoteEditor;
pub use annotation::sync::{extract_ranges, load_document, load_ranges, LoadReport, PositionMap};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::highlight::{
    active_layers_at, covers, normalize, ranges_intersecting, validate_ranges, HighlightRange,
    HighlightValidationError, Layer, RawHighlightRange,
};
pub use model::note::{
    CodeStage, ContainerId, Note, NoteDraft, NoteHighlightsUpdate, NoteId, NoteUpdate,
};
pub use repo::note_repo::{
    NoteListQuery, NoteRepository, RepoError, RepoResult, SqliteNoteRepository,
};
pub use service::note_store::{NoteStore, SharedNote, StoreError, StoreResult};
pub use service::stage_policy::{advance, next_stage, EditKind};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
