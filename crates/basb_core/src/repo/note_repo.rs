//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the request/response boundary to the remote note store.
//! - Persist notes, their highlight envelope and CODE stage in SQLite.
//!
//! # Invariants
//! - Every operation is one request with one response; a missing note is
//!   reported as `RepoError::NotFound`, never as an empty success.
//! - Writes that touch content, highlights or summary recompute the stage
//!   with `stage_policy` inside the same transaction as the write.
//! - Lists are ordered by `updated_at DESC, id ASC`.
//!
//! # See also
//! - `service::note_store` for the cached aggregate built on top.

use crate::db::DbError;
use crate::model::highlight::HighlightRange;
use crate::model::note::{
    highlight_envelope, CodeStage, ContainerId, Note, NoteDraft, NoteHighlightsUpdate, NoteId,
    NoteUpdate,
};
use crate::service::stage_policy::{advance, EditKind};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NOTES_DEFAULT_LIMIT: u32 = 20;
const NOTES_LIMIT_MAX: u32 = 100;

const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    content_html,
    highlights,
    executive_summary,
    source_url,
    source_type,
    container_id,
    code_stage,
    created_at,
    updated_at,
    captured_at
FROM notes";

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure reported by a note store.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(NoteId),
    /// A stored row cannot be decoded into a valid note.
    InvalidData(String),
    /// The store could not be reached or refused the request.
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::Unavailable(message) => write!(f, "note store unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Filters and paging for note lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// Only notes filed in this container.
    pub container_id: Option<ContainerId>,
    /// Only notes without a container. Ignored when `container_id` is set.
    pub unfiled: bool,
    pub stage: Option<CodeStage>,
    /// Case-insensitive substring match over title and content.
    pub q: Option<String>,
    /// Maximum rows to return. Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl NoteListQuery {
    /// Captured notes that have not been filed yet.
    pub fn inbox() -> Self {
        Self {
            unfiled: true,
            stage: Some(CodeStage::Capture),
            ..Self::default()
        }
    }

    /// Most recently updated notes across all containers.
    pub fn recent(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Request/response interface of the remote note store.
pub trait NoteRepository {
    /// Creates a note at stage `capture` with no highlights.
    fn create_note(&mut self, draft: &NoteDraft) -> RepoResult<Note>;
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
    /// Applies a partial field update and returns the stored note.
    fn update_note_content(&mut self, id: NoteId, update: &NoteUpdate) -> RepoResult<Note>;
    /// Replaces the highlight set, plus content when the update carries it.
    fn update_note_highlights(
        &mut self,
        id: NoteId,
        update: &NoteHighlightsUpdate,
    ) -> RepoResult<Note>;
    /// Files the note into `container_id`, or detaches it with `None`.
    fn move_note(&mut self, id: NoteId, container_id: Option<ContainerId>) -> RepoResult<Note>;
    fn delete_note(&mut self, id: NoteId) -> RepoResult<()>;
}

/// SQLite-backed note store.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        if !table_exists(conn, "notes")? {
            return Err(RepoError::InvalidData(
                "missing required table `notes`".to_string(),
            ));
        }
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&mut self, draft: &NoteDraft) -> RepoResult<Note> {
        let id = Uuid::new_v4();
        let empty = highlight_envelope::to_json(&[])
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;
        self.conn.execute(
            &format!(
                "INSERT INTO notes (
                    id, title, content, highlights, source_url, source_type,
                    code_stage, created_at, updated_at, captured_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, {NOW_MS_SQL}, {NOW_MS_SQL}, {NOW_MS_SQL});"
            ),
            params![
                id.to_string(),
                draft.title.as_str(),
                draft.content.as_str(),
                empty,
                draft.source_url.as_deref(),
                draft.source_type.as_deref(),
                CodeStage::Capture.as_str(),
            ],
        )?;

        load_note(self.conn, id)?.ok_or(RepoError::NotFound(id))
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        load_note(self.conn, id)
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(container_id) = query.container_id {
            sql.push_str(" AND container_id = ?");
            bind_values.push(Value::Text(container_id.to_string()));
        } else if query.unfiled {
            sql.push_str(" AND container_id IS NULL");
        }

        if let Some(stage) = query.stage {
            sql.push_str(" AND code_stage = ?");
            bind_values.push(Value::Text(stage.as_str().to_string()));
        }

        if let Some(pattern) = query.q.as_deref().and_then(like_pattern) {
            // LIKE is case-insensitive for ASCII in SQLite.
            sql.push_str(" AND (title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')");
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_note_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn update_note_content(&mut self, id: NoteId, update: &NoteUpdate) -> RepoResult<Note> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = load_note(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        let stage = advance(current.code_stage, &EditKind::for_update(update));

        tx.execute(
            &format!(
                "UPDATE notes
                 SET
                    title = COALESCE(?2, title),
                    content = COALESCE(?3, content),
                    content_html = COALESCE(?4, content_html),
                    source_url = COALESCE(?5, source_url),
                    source_type = COALESCE(?6, source_type),
                    executive_summary = COALESCE(?7, executive_summary),
                    code_stage = ?8,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                id.to_string(),
                update.title.as_deref(),
                update.content.as_deref(),
                update.content_html.as_deref(),
                update.source_url.as_deref(),
                update.source_type.as_deref(),
                update.executive_summary.as_deref(),
                stage.as_str(),
            ],
        )?;

        let note = load_note(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;
        Ok(note)
    }

    fn update_note_highlights(
        &mut self,
        id: NoteId,
        update: &NoteHighlightsUpdate,
    ) -> RepoResult<Note> {
        let envelope = highlight_envelope::to_json(&update.highlights)
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = load_note(&tx, id)?.ok_or(RepoError::NotFound(id))?;

        let events = EditKind::for_highlights_update(update);
        let stage = advance(current.code_stage, &events);

        tx.execute(
            &format!(
                "UPDATE notes
                 SET
                    highlights = ?2,
                    content = COALESCE(?3, content),
                    content_html = COALESCE(?4, content_html),
                    code_stage = ?5,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                id.to_string(),
                envelope,
                update.content.as_deref(),
                update.content_html.as_deref(),
                stage.as_str(),
            ],
        )?;

        let note = load_note(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;
        Ok(note)
    }

    fn move_note(&mut self, id: NoteId, container_id: Option<ContainerId>) -> RepoResult<Note> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE notes
                 SET container_id = ?2, updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![id.to_string(), container_id.map(|value| value.to_string())],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        load_note(self.conn, id)?.ok_or(RepoError::NotFound(id))
    }

    fn delete_note(&mut self, id: NoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

/// Normalizes list limit according to the notes contract.
pub fn normalize_note_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => NOTES_DEFAULT_LIMIT,
        Some(value) if value > NOTES_LIMIT_MAX => NOTES_LIMIT_MAX,
        Some(value) => value,
    }
}

/// Trims and collapses whitespace in a search term; blank terms yield `None`.
pub fn normalize_search_term(q: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(q.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

fn like_pattern(q: &str) -> Option<String> {
    let term = normalize_search_term(q)?;
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}

fn load_note(conn: &Connection, id: NoteId) -> RepoResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => parse_note_row(row).map(Some),
        None => Ok(None),
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id_text: String = row.get("id")?;
    let container_text: Option<String> = row.get("container_id")?;
    let stage_text: String = row.get("code_stage")?;
    let highlights_text: String = row.get("highlights")?;

    let code_stage = CodeStage::parse(&stage_text).ok_or_else(|| {
        RepoError::InvalidData(format!("unknown code_stage `{stage_text}` for note {id_text}"))
    })?;
    let highlights: Vec<HighlightRange> = highlight_envelope::from_json(&highlights_text)
        .map_err(|err| {
            RepoError::InvalidData(format!("invalid highlights for note {id_text}: {err}"))
        })?;

    Ok(Note {
        id: parse_uuid(&id_text, "id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        content_html: row.get("content_html")?,
        highlights,
        executive_summary: row.get("executive_summary")?,
        source_url: row.get("source_url")?,
        source_type: row.get("source_type")?,
        container_id: container_text
            .as_deref()
            .map(|value| parse_uuid(value, "container_id"))
            .transpose()?,
        code_stage,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        captured_at: row.get("captured_at")?,
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in notes.{column}")))
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
