//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose note capture, annotation and stage-changing use-cases to Dart.
//! - Flatten core results into plain response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Every DB-backed call opens its own connection and store session.
//! - Highlight offsets cross the boundary as integers and are validated
//!   before they reach the core.

use basb_core::{
    core_version as core_version_inner, extract_ranges, init_logging as init_logging_inner,
    load_document, open_db, ping as ping_inner, validate_ranges, CodeStage, CoreConfig,
    HighlightRange, Layer, Note, NoteDraft, NoteHighlightsUpdate, NoteId, NoteListQuery,
    NoteStore, NoteUpdate, RawHighlightRange, RichDocument, Selection, SharedNote,
    SqliteNoteRepository, StoreError,
};
use log::warn;
use std::sync::OnceLock;
use uuid::Uuid;

static FFI_CONFIG: OnceLock<CoreConfig> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One highlight range as seen by Dart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FfiHighlight {
    /// Inclusive start, UTF-16 code units into plain content.
    pub start: i64,
    /// Exclusive end.
    pub end: i64,
    /// `2` (emphasis) or `3` (key insight).
    pub layer: i64,
}

/// Note projection returned to Dart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteView {
    pub id: String,
    pub title: String,
    pub content: String,
    pub content_html: Option<String>,
    pub highlights: Vec<FfiHighlight>,
    pub executive_summary: Option<String>,
    pub source_url: Option<String>,
    pub source_type: Option<String>,
    pub container_id: Option<String>,
    /// `capture|organize|distill|express`.
    pub code_stage: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Single-note response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteResponse {
    pub ok: bool,
    pub note: Option<NoteView>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl NoteResponse {
    fn success(message: impl Into<String>, note: Option<NoteView>) -> Self {
        Self {
            ok: true,
            note,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            note: None,
            message: message.into(),
        }
    }
}

/// Note list response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteListResponse {
    pub ok: bool,
    pub items: Vec<NoteView>,
    pub message: String,
}

/// Result of running one annotation command on editor content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationResponse {
    pub ok: bool,
    /// Whether the command changed any mark.
    pub changed: bool,
    /// Normalized ranges after the command.
    pub highlights: Vec<FfiHighlight>,
    /// Rendered rich text after the command.
    pub content_html: String,
    pub message: String,
}

impl AnnotationResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            changed: false,
            highlights: Vec::new(),
            content_html: String::new(),
            message: message.into(),
        }
    }
}

/// Captures a note into the inbox.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; blank titles are rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn note_capture(title: String, content: String, source_url: Option<String>) -> NoteResponse {
    let draft = NoteDraft {
        title: title.trim().to_string(),
        content,
        source_url: source_url.filter(|url| !url.trim().is_empty()),
        source_type: None,
    };
    note_call("note_capture", "Note captured.", |store| {
        store.create(&draft).map(|handle| read_view(&handle))
    })
}

/// Loads one note by id.
#[flutter_rust_bridge::frb(sync)]
pub fn note_get(note_id: String) -> NoteResponse {
    let id = match parse_note_id(&note_id) {
        Ok(id) => id,
        Err(message) => return NoteResponse::failure(message),
    };
    note_call("note_get", "Note loaded.", |store| {
        store.fetch(id).map(|handle| read_view(&handle))
    })
}

/// Lists notes filtered by container, stage and text.
///
/// # FFI contract
/// - `stage` must be one of `capture|organize|distill|express` when set.
/// - `limit=None` uses the configured page size.
#[flutter_rust_bridge::frb(sync)]
pub fn note_list(
    container_id: Option<String>,
    stage: Option<String>,
    q: Option<String>,
    limit: Option<u32>,
) -> NoteListResponse {
    let query = match build_list_query(container_id, stage, q, limit) {
        Ok(query) => query,
        Err(message) => return list_failure(message),
    };
    list_call("note_list", |store| store.fetch_list(&query))
}

/// Lists captured notes that are not filed in any container.
#[flutter_rust_bridge::frb(sync)]
pub fn note_inbox() -> NoteListResponse {
    list_call("note_inbox", |store| store.fetch_inbox())
}

/// Lists the most recently updated notes.
#[flutter_rust_bridge::frb(sync)]
pub fn note_recent(limit: Option<u32>) -> NoteListResponse {
    let limit = limit.unwrap_or_else(|| ffi_config().list_limit);
    list_call("note_recent", |store| store.fetch_recent(limit))
}

/// Runs one highlight command over unsaved editor content.
///
/// Input semantics:
/// - `action`: `apply|toggle|remove`.
/// - `start..end`: plain-text selection; reversed anchors are accepted.
///
/// # FFI contract
/// - Pure computation, no DB access.
/// - Malformed highlights, layers or actions yield `ok=false`.
#[flutter_rust_bridge::frb(sync)]
pub fn annotation_command(
    content: String,
    highlights: Vec<FfiHighlight>,
    start: u32,
    end: u32,
    layer: i64,
    action: String,
) -> AnnotationResponse {
    let ranges = match to_ranges(&highlights) {
        Ok(ranges) => ranges,
        Err(message) => return AnnotationResponse::failure(message),
    };
    let layer = match parse_layer(layer) {
        Ok(layer) => layer,
        Err(message) => return AnnotationResponse::failure(message),
    };
    let action = action.trim().to_ascii_lowercase();
    let command: fn(&mut RichDocument, Selection, Layer) -> bool = match action.as_str() {
        "apply" => basb_core::apply_layer,
        "toggle" => basb_core::toggle_layer,
        "remove" => basb_core::remove_layer,
        other => {
            return AnnotationResponse::failure(format!(
                "unsupported action `{other}`; expected apply|toggle|remove"
            ))
        }
    };

    let (mut document, _) = load_document(&content, &ranges);
    let changed = command(
        &mut document,
        Selection::new(start as usize, end as usize),
        layer,
    );
    AnnotationResponse {
        ok: true,
        changed,
        highlights: to_ffi_highlights(&extract_ranges(&document)),
        content_html: document.to_html(),
        message: (if changed { "Highlights updated." } else { "No change." }).to_string(),
    }
}

/// Layers (`2`, `3`) active on the character at `offset`.
///
/// Malformed highlights yield an empty list.
#[flutter_rust_bridge::frb(sync)]
pub fn annotation_active_layers(
    content: String,
    highlights: Vec<FfiHighlight>,
    offset: u32,
) -> Vec<i64> {
    let Ok(ranges) = to_ranges(&highlights) else {
        return Vec::new();
    };
    let (document, _) = load_document(&content, &ranges);
    basb_core::active_layers(&document, offset as usize)
        .into_iter()
        .map(|layer| i64::from(layer.level()))
        .collect()
}

/// Saves editor content and its highlights in one request.
///
/// # FFI contract
/// - Ranges are clamped to `content` and normalized before persisting.
/// - The returned note carries the authoritative stage.
#[flutter_rust_bridge::frb(sync)]
pub fn note_save_highlights(
    note_id: String,
    content: String,
    highlights: Vec<FfiHighlight>,
) -> NoteResponse {
    let id = match parse_note_id(&note_id) {
        Ok(id) => id,
        Err(message) => return NoteResponse::failure(message),
    };
    let ranges = match to_ranges(&highlights) {
        Ok(ranges) => ranges,
        Err(message) => return NoteResponse::failure(message),
    };

    let (document, _) = load_document(&content, &ranges);
    let update = NoteHighlightsUpdate {
        highlights: extract_ranges(&document),
        content: Some(content),
        content_html: Some(document.to_html()),
    };
    note_call("note_save_highlights", "Highlights saved.", |store| {
        store
            .update_highlights(id, update)
            .map(|handle| read_view(&handle))
    })
}

/// Updates title/content/summary fields; `None` leaves a field unchanged.
#[flutter_rust_bridge::frb(sync)]
pub fn note_update(
    note_id: String,
    title: Option<String>,
    content: Option<String>,
    executive_summary: Option<String>,
) -> NoteResponse {
    let id = match parse_note_id(&note_id) {
        Ok(id) => id,
        Err(message) => return NoteResponse::failure(message),
    };
    let update = NoteUpdate {
        title,
        content,
        executive_summary,
        ..NoteUpdate::default()
    };
    note_call("note_update", "Note updated.", |store| {
        store.update_note(id, &update).map(|handle| read_view(&handle))
    })
}

/// Files a note into a container, or back to unfiled with `None`.
#[flutter_rust_bridge::frb(sync)]
pub fn note_move(note_id: String, container_id: Option<String>) -> NoteResponse {
    let id = match parse_note_id(&note_id) {
        Ok(id) => id,
        Err(message) => return NoteResponse::failure(message),
    };
    let container_id = match container_id.as_deref().map(parse_container_id).transpose() {
        Ok(container_id) => container_id,
        Err(message) => return NoteResponse::failure(message),
    };
    note_call("note_move", "Note moved.", |store| {
        store
            .move_to_container(id, container_id)
            .map(|handle| read_view(&handle))
    })
}

/// Deletes a note.
#[flutter_rust_bridge::frb(sync)]
pub fn note_delete(note_id: String) -> NoteResponse {
    let id = match parse_note_id(&note_id) {
        Ok(id) => id,
        Err(message) => return NoteResponse::failure(message),
    };
    note_call("note_delete", "Note deleted.", |store| {
        store.delete(id).map(|()| None::<NoteView>)
    })
}

type FfiStore<'conn> = NoteStore<SqliteNoteRepository<'conn>>;

fn ffi_config() -> &'static CoreConfig {
    FFI_CONFIG.get_or_init(|| {
        CoreConfig::from_env().unwrap_or_else(|err| {
            warn!("event=config_load module=ffi status=error error={err}");
            CoreConfig::default()
        })
    })
}

fn with_store<T>(f: impl FnOnce(&mut FfiStore<'_>) -> Result<T, StoreError>) -> Result<T, String> {
    let mut conn =
        open_db(ffi_config().db_path()).map_err(|err| format!("note DB open failed: {err}"))?;
    let repo = SqliteNoteRepository::try_new(&mut conn)
        .map_err(|err| format!("note repo init failed: {err}"))?;
    let mut store = NoteStore::new(repo);
    let result = f(&mut store).map_err(|err| err.to_string());
    store.close();
    result
}

fn note_call<V: Into<Option<NoteView>>>(
    operation: &str,
    success: &str,
    f: impl FnOnce(&mut FfiStore<'_>) -> Result<V, StoreError>,
) -> NoteResponse {
    match with_store(f) {
        Ok(view) => NoteResponse::success(success, view.into()),
        Err(err) => NoteResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn list_call(
    operation: &str,
    f: impl FnOnce(&mut FfiStore<'_>) -> Result<Vec<SharedNote>, StoreError>,
) -> NoteListResponse {
    let views = with_store(|store| {
        f(store).map(|handles| handles.iter().map(read_view).collect::<Vec<_>>())
    });
    match views {
        Ok(items) => NoteListResponse {
            ok: true,
            message: format!("Found {} note(s).", items.len()),
            items,
        },
        Err(err) => list_failure(format!("{operation} failed: {err}")),
    }
}

fn list_failure(message: String) -> NoteListResponse {
    NoteListResponse {
        ok: false,
        items: Vec::new(),
        message,
    }
}

fn build_list_query(
    container_id: Option<String>,
    stage: Option<String>,
    q: Option<String>,
    limit: Option<u32>,
) -> Result<NoteListQuery, String> {
    let container_id = container_id
        .as_deref()
        .map(parse_container_id)
        .transpose()?;
    let stage = stage
        .as_deref()
        .map(|value| {
            CodeStage::parse(value.trim())
                .ok_or_else(|| format!("unsupported stage `{value}`"))
        })
        .transpose()?;
    Ok(NoteListQuery {
        container_id,
        stage,
        q,
        limit: Some(limit.unwrap_or(ffi_config().list_limit)),
        ..NoteListQuery::default()
    })
}

fn parse_note_id(value: &str) -> Result<NoteId, String> {
    Uuid::parse_str(value.trim()).map_err(|_| format!("invalid note id `{value}`"))
}

fn parse_container_id(value: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value.trim()).map_err(|_| format!("invalid container id `{value}`"))
}

fn parse_layer(value: i64) -> Result<Layer, String> {
    u8::try_from(value)
        .ok()
        .and_then(|level| Layer::try_from(level).ok())
        .ok_or_else(|| format!("unsupported layer {value}; expected 2|3"))
}

fn to_ranges(highlights: &[FfiHighlight]) -> Result<Vec<HighlightRange>, String> {
    let raw: Vec<RawHighlightRange> = highlights
        .iter()
        .map(|highlight| RawHighlightRange {
            start: highlight.start,
            end: highlight.end,
            layer: highlight.layer,
        })
        .collect();
    validate_ranges(&raw).map_err(|err| err.to_string())
}

fn to_ffi_highlights(ranges: &[HighlightRange]) -> Vec<FfiHighlight> {
    ranges
        .iter()
        .map(|range| {
            let raw = RawHighlightRange::from(*range);
            FfiHighlight {
                start: raw.start,
                end: raw.end,
                layer: raw.layer,
            }
        })
        .collect()
}

fn read_view(handle: &SharedNote) -> NoteView {
    let note = match handle.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    to_view(note)
}

fn to_view(note: Note) -> NoteView {
    NoteView {
        id: note.id.to_string(),
        highlights: to_ffi_highlights(&note.highlights),
        container_id: note.container_id.map(|id| id.to_string()),
        code_stage: note.code_stage.as_str().to_string(),
        title: note.title,
        content: note.content,
        content_html: note.content_html,
        executive_summary: note.executive_summary,
        source_url: note.source_url,
        source_type: note.source_type,
        created_at: note.created_at,
        updated_at: note.updated_at,
    }
}
