//! Cached note aggregate in front of the remote note store.
//!
//! # Responsibility
//! - Own the client-side cache of notes keyed by id and the current note.
//! - Validate mutations, predict their stage, and forward each one as a
//!   single repository request.
//! - Expose inbox / by-stage / by-container projections of the cache.
//!
//! # Invariants
//! - The remote response is authoritative; a cached entry is replaced in
//!   place so every outstanding `SharedNote` handle observes the new value.
//! - A failed request leaves the cache exactly as it was.
//! - Highlight sets are normalized before they leave the store.
//!
//! # See also
//! - `service::stage_policy` for the prediction rules.
//! - `repo::note_repo` for the remote contract.

use crate::model::highlight::{
    normalize, validate_ranges, HighlightValidationError, RawHighlightRange,
};
use crate::model::note::{
    CodeStage, ContainerId, Note, NoteDraft, NoteHighlightsUpdate, NoteId, NoteUpdate,
};
use crate::repo::note_repo::{NoteListQuery, NoteRepository, RepoError};
use crate::service::stage_policy::{advance, EditKind};
use log::{debug, error, info, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Shared handle to a cached note.
pub type SharedNote = Arc<RwLock<Note>>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error taxonomy.
#[derive(Debug)]
pub enum StoreError {
    /// Request rejected before reaching the remote store.
    Validation(String),
    NotFound(NoteId),
    /// Remote store failure; the cache was not modified.
    Remote(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "invalid note request: {message}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Remote(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote(err) => Some(err),
            Self::Validation(_) | Self::NotFound(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Remote(other),
        }
    }
}

impl From<HighlightValidationError> for StoreError {
    fn from(value: HighlightValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

/// Session-scoped note aggregate.
pub struct NoteStore<R: NoteRepository> {
    repo: R,
    notes: HashMap<NoteId, SharedNote>,
    current: Option<NoteId>,
}

impl<R: NoteRepository> NoteStore<R> {
    /// Starts an empty session over `repo`.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            notes: HashMap::new(),
            current: None,
        }
    }

    /// Ends the session, dropping the cache and returning the repository.
    pub fn close(self) -> R {
        debug!(
            "event=store_close module=store status=ok cached={}",
            self.notes.len()
        );
        self.repo
    }

    /// Quick capture: creates a note and makes it current.
    pub fn create(&mut self, draft: &NoteDraft) -> StoreResult<SharedNote> {
        if draft.title.trim().is_empty() {
            return Err(StoreError::Validation("title must not be blank".to_string()));
        }

        let started_at = Instant::now();
        let note = logged("note_create", None, started_at, self.repo.create_note(draft))?;
        let id = note.id;
        let handle = self.apply_remote(note, Some(CodeStage::Capture));
        self.current = Some(id);
        Ok(handle)
    }

    /// Loads one note from the remote store into the cache.
    pub fn fetch(&mut self, id: NoteId) -> StoreResult<SharedNote> {
        let started_at = Instant::now();
        let note = logged("note_fetch", Some(id), started_at, self.repo.get_note(id))?
            .ok_or(StoreError::NotFound(id))?;
        Ok(self.apply_remote(note, None))
    }

    /// Loads a filtered page of notes into the cache.
    pub fn fetch_list(&mut self, query: &NoteListQuery) -> StoreResult<Vec<SharedNote>> {
        let started_at = Instant::now();
        let notes = logged("note_list", None, started_at, self.repo.list_notes(query))?;
        Ok(notes
            .into_iter()
            .map(|note| self.apply_remote(note, None))
            .collect())
    }

    /// Loads the inbox (captured, unfiled notes).
    pub fn fetch_inbox(&mut self) -> StoreResult<Vec<SharedNote>> {
        self.fetch_list(&NoteListQuery::inbox())
    }

    /// Loads the most recently updated notes.
    pub fn fetch_recent(&mut self, limit: u32) -> StoreResult<Vec<SharedNote>> {
        self.fetch_list(&NoteListQuery::recent(limit))
    }

    /// Applies a partial field update.
    pub fn update_note(&mut self, id: NoteId, update: &NoteUpdate) -> StoreResult<SharedNote> {
        if update.is_empty() {
            return Err(StoreError::Validation("update sets no fields".to_string()));
        }
        if update
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty())
        {
            return Err(StoreError::Validation("title must not be blank".to_string()));
        }

        let predicted = self
            .cached_stage(id)
            .map(|stage| advance(stage, &EditKind::for_update(update)));
        let started_at = Instant::now();
        let note = logged(
            "note_update",
            Some(id),
            started_at,
            self.repo.update_note_content(id, update),
        )?;
        Ok(self.apply_remote(note, predicted))
    }

    /// Files the note into a container, or detaches it with `None`.
    pub fn move_to_container(
        &mut self,
        id: NoteId,
        container_id: Option<ContainerId>,
    ) -> StoreResult<SharedNote> {
        let predicted = self
            .cached_stage(id)
            .map(|stage| advance(stage, &[EditKind::MovedToContainer]));
        let started_at = Instant::now();
        let note = logged(
            "note_move",
            Some(id),
            started_at,
            self.repo.move_note(id, container_id),
        )?;
        Ok(self.apply_remote(note, predicted))
    }

    /// Replaces the highlight set (and content, when attached) in one request.
    pub fn update_highlights(
        &mut self,
        id: NoteId,
        update: NoteHighlightsUpdate,
    ) -> StoreResult<SharedNote> {
        let update = NoteHighlightsUpdate {
            highlights: normalize(&update.highlights),
            ..update
        };

        let events = EditKind::for_highlights_update(&update);
        let predicted = self.cached_stage(id).map(|stage| advance(stage, &events));

        let started_at = Instant::now();
        let note = logged(
            "note_highlights",
            Some(id),
            started_at,
            self.repo.update_note_highlights(id, &update),
        )?;
        Ok(self.apply_remote(note, predicted))
    }

    /// Validates untrusted integer ranges, then replaces the highlight set.
    pub fn update_highlights_raw(
        &mut self,
        id: NoteId,
        raw: &[RawHighlightRange],
    ) -> StoreResult<SharedNote> {
        let highlights = validate_ranges(raw)?;
        self.update_highlights(id, NoteHighlightsUpdate::new(highlights))
    }

    /// Deletes the note remotely, then evicts it from the cache.
    pub fn delete(&mut self, id: NoteId) -> StoreResult<()> {
        let started_at = Instant::now();
        logged("note_delete", Some(id), started_at, self.repo.delete_note(id))?;
        self.notes.remove(&id);
        if self.current == Some(id) {
            self.current = None;
        }
        Ok(())
    }

    /// Cached handle for `id`, without contacting the remote store.
    pub fn cached(&self, id: NoteId) -> Option<SharedNote> {
        self.notes.get(&id).cloned()
    }

    pub fn current(&self) -> Option<SharedNote> {
        self.current.and_then(|id| self.cached(id))
    }

    /// Makes `id` the current note, fetching it when not cached.
    pub fn select(&mut self, id: NoteId) -> StoreResult<SharedNote> {
        let handle = match self.cached(id) {
            Some(handle) => handle,
            None => self.fetch(id)?,
        };
        self.current = Some(id);
        Ok(handle)
    }

    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Cached captured notes without a container.
    pub fn inbox(&self) -> Vec<Note> {
        self.snapshot(Note::is_inbox)
    }

    pub fn by_stage(&self, stage: CodeStage) -> Vec<Note> {
        self.snapshot(|note| note.code_stage == stage)
    }

    pub fn by_container(&self, container_id: ContainerId) -> Vec<Note> {
        self.snapshot(|note| note.container_id == Some(container_id))
    }

    fn snapshot(&self, keep: impl Fn(&Note) -> bool) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .notes
            .values()
            .map(|handle| read_note(handle))
            .filter(|note| keep(note))
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        notes
    }

    fn cached_stage(&self, id: NoteId) -> Option<CodeStage> {
        self.notes.get(&id).map(|handle| read_note(handle).code_stage)
    }

    fn apply_remote(&mut self, note: Note, predicted: Option<CodeStage>) -> SharedNote {
        if let Some(predicted) = predicted {
            if predicted != note.code_stage {
                warn!(
                    "event=stage_mismatch module=store note_id={} predicted={} remote={}",
                    note.id, predicted, note.code_stage
                );
            }
        }

        match self.notes.entry(note.id) {
            Entry::Occupied(entry) => {
                *entry.get().write().unwrap_or_else(PoisonError::into_inner) = note;
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(Arc::new(RwLock::new(note)))),
        }
    }
}

fn read_note(handle: &SharedNote) -> Note {
    handle
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn logged<T>(
    event: &'static str,
    id: Option<NoteId>,
    started_at: Instant,
    result: Result<T, RepoError>,
) -> StoreResult<T> {
    let note_id = id.map_or_else(|| "-".to_string(), |id| id.to_string());
    match result {
        Ok(value) => {
            info!(
                "event={event} module=store status=ok note_id={note_id} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(value)
        }
        Err(err) => {
            error!(
                "event={event} module=store status=error note_id={note_id} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err.into())
        }
    }
}
