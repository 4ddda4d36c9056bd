use basb_core::db::open_db_in_memory;
use basb_core::{
    CodeStage, HighlightRange, Layer, NoteDraft, NoteHighlightsUpdate, NoteListQuery,
    NoteRepository, NoteUpdate, RepoError, SqliteNoteRepository,
};
use rusqlite::params;
use uuid::Uuid;

fn range(start: usize, end: usize, layer: Layer) -> HighlightRange {
    HighlightRange::new(start, end, layer).unwrap()
}

#[test]
fn created_note_starts_in_capture_without_highlights() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();

    let mut draft = NoteDraft::new("Article", "Hello World");
    draft.source_url = Some("https://example.com/a".to_string());
    let note = repo.create_note(&draft).unwrap();

    assert_eq!(note.code_stage, CodeStage::Capture);
    assert!(note.highlights.is_empty());
    assert!(note.container_id.is_none());
    assert_eq!(note.source_url.as_deref(), Some("https://example.com/a"));
    assert!(note.created_at > 0);
    assert_eq!(note.created_at, note.captured_at);
    assert_eq!(repo.get_note(note.id).unwrap(), Some(note));
}

#[test]
fn highlight_envelope_is_stored_verbatim() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
        let id = repo.create_note(&NoteDraft::new("t", "Hello World")).unwrap().id;
        repo.update_note_highlights(
            id,
            &NoteHighlightsUpdate::new(vec![range(0, 5, Layer::Emphasis)]),
        )
        .unwrap();
        id
    };

    let stored: String = conn
        .query_row(
            "SELECT highlights FROM notes WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(
        value,
        serde_json::json!({"highlights": [{"start": 0, "end": 5, "layer": 2}]})
    );
}

#[test]
fn remote_recomputes_stage_with_the_ratchet() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    let id = repo.create_note(&NoteDraft::new("t", "Hello World")).unwrap().id;

    let note = repo
        .update_note_highlights(
            id,
            &NoteHighlightsUpdate::new(vec![range(0, 5, Layer::Emphasis)]),
        )
        .unwrap();
    assert_eq!(note.code_stage, CodeStage::Organize);

    let note = repo
        .update_note_highlights(
            id,
            &NoteHighlightsUpdate::new(vec![
                range(0, 5, Layer::KeyInsight),
                range(0, 5, Layer::Emphasis),
            ]),
        )
        .unwrap();
    assert_eq!(note.code_stage, CodeStage::Distill);

    let note = repo
        .update_note_highlights(id, &NoteHighlightsUpdate::new(Vec::new()))
        .unwrap();
    assert!(note.highlights.is_empty());
    assert_eq!(note.code_stage, CodeStage::Distill);

    let note = repo
        .update_note_content(id, &NoteUpdate::summary("Greeting the world."))
        .unwrap();
    assert_eq!(note.code_stage, CodeStage::Express);
    assert_eq!(note.executive_summary.as_deref(), Some("Greeting the world."));

    let note = repo.move_note(id, Some(Uuid::new_v4())).unwrap();
    assert_eq!(note.code_stage, CodeStage::Express);
}

#[test]
fn partial_update_leaves_unset_fields_alone() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    let id = repo.create_note(&NoteDraft::new("Title", "Body")).unwrap().id;

    let note = repo
        .update_note_content(
            id,
            &NoteUpdate {
                content: Some("New body".to_string()),
                ..NoteUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(note.title, "Title");
    assert_eq!(note.content, "New body");
    assert_eq!(note.code_stage, CodeStage::Capture);
}

#[test]
fn highlight_save_with_content_writes_both_together() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    let id = repo.create_note(&NoteDraft::new("t", "Hello")).unwrap().id;

    let note = repo
        .update_note_highlights(
            id,
            &NoteHighlightsUpdate {
                highlights: vec![range(0, 11, Layer::Emphasis)],
                content: Some("Hello World".to_string()),
                content_html: Some("<p>Hello World</p>".to_string()),
            },
        )
        .unwrap();
    assert_eq!(note.content, "Hello World");
    assert_eq!(note.content_html.as_deref(), Some("<p>Hello World</p>"));
    assert_eq!(note.highlights, vec![range(0, 11, Layer::Emphasis)]);
}

#[test]
fn missing_notes_are_reported_as_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    let missing = Uuid::new_v4();

    assert_eq!(repo.get_note(missing).unwrap(), None);
    assert!(matches!(
        repo.update_note_content(missing, &NoteUpdate::summary("x")),
        Err(RepoError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        repo.update_note_highlights(missing, &NoteHighlightsUpdate::default()),
        Err(RepoError::NotFound(_))
    ));
    assert!(matches!(repo.move_note(missing, None), Err(RepoError::NotFound(_))));
    assert!(matches!(repo.delete_note(missing), Err(RepoError::NotFound(_))));
}

#[test]
fn delete_removes_the_note() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    let id = repo.create_note(&NoteDraft::new("t", "Hello")).unwrap().id;

    repo.delete_note(id).unwrap();
    assert_eq!(repo.get_note(id).unwrap(), None);
}

#[test]
fn list_filters_by_container_stage_and_text() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    let project = Uuid::new_v4();

    let inbox = repo.create_note(&NoteDraft::new("Inbox item", "raw")).unwrap();
    let filed = repo
        .create_note(&NoteDraft::new("Filed", "Progressive Summarization"))
        .unwrap();
    repo.move_note(filed.id, Some(project)).unwrap();
    let organized = repo.create_note(&NoteDraft::new("Organized", "x")).unwrap();
    repo.update_note_highlights(
        organized.id,
        &NoteHighlightsUpdate::new(vec![range(0, 1, Layer::Emphasis)]),
    )
    .unwrap();

    let ids = |query: &NoteListQuery| -> Vec<Uuid> {
        repo.list_notes(query)
            .unwrap()
            .into_iter()
            .map(|note| note.id)
            .collect()
    };

    assert_eq!(ids(&NoteListQuery::inbox()), vec![inbox.id]);
    assert_eq!(
        ids(&NoteListQuery {
            container_id: Some(project),
            ..NoteListQuery::default()
        }),
        vec![filed.id]
    );
    assert_eq!(
        ids(&NoteListQuery {
            stage: Some(CodeStage::Organize),
            ..NoteListQuery::default()
        }),
        vec![organized.id]
    );
    assert_eq!(
        ids(&NoteListQuery {
            q: Some("  progressive   SUMMARIZATION ".to_string()),
            ..NoteListQuery::default()
        }),
        vec![filed.id]
    );
    assert!(ids(&NoteListQuery {
        q: Some("100%".to_string()),
        ..NoteListQuery::default()
    })
    .is_empty());
}

#[test]
fn list_orders_by_recency_and_pages() {
    let mut conn = open_db_in_memory().unwrap();
    let ids: Vec<Uuid> = {
        let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
        (0..3)
            .map(|i| repo.create_note(&NoteDraft::new(format!("n{i}"), "")).unwrap().id)
            .collect()
    };
    for (index, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE notes SET updated_at = ?2 WHERE id = ?1;",
            params![id.to_string(), 1000 * (index as i64 + 1)],
        )
        .unwrap();
    }

    let repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    let recent: Vec<Uuid> = repo
        .list_notes(&NoteListQuery::recent(2))
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(recent, vec![ids[2], ids[1]]);

    let second_page = repo
        .list_notes(&NoteListQuery {
            limit: Some(2),
            offset: 2,
            ..NoteListQuery::default()
        })
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, ids[0]);
}

#[test]
fn corrupt_highlight_rows_surface_as_invalid_data() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
        repo.create_note(&NoteDraft::new("t", "Hello")).unwrap().id
    };
    conn.execute(
        "UPDATE notes SET highlights = '{\"highlights\":[{\"start\":4,\"end\":1,\"layer\":2}]}' WHERE id = ?1;",
        [id.to_string()],
    )
    .unwrap();

    let repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    assert!(matches!(repo.get_note(id), Err(RepoError::InvalidData(_))));
}
