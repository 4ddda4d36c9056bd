//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `basb_core` linkage and print deterministic smoke output.
//! - Offer `capture` and `inbox` commands against the configured database.

use basb_core::{open_db, CoreConfig, Note, NoteDraft, NoteStore, SqliteNoteRepository};
use std::process::ExitCode;

const USAGE: &str = "usage: basb_cli [capture <title> <content> | inbox]";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcome = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] => {
            println!("basb_core ping={}", basb_core::ping());
            println!("basb_core version={}", basb_core::core_version());
            Ok(())
        }
        ["capture", title, content] => capture(title, content),
        ["inbox"] => inbox(),
        _ => Err(USAGE.to_string()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn capture(title: &str, content: &str) -> Result<(), String> {
    let note = with_store(|store| {
        store
            .create(&NoteDraft::new(title, content))
            .map(|handle| read(&handle))
            .map_err(|err| err.to_string())
    })?;
    print_json(&note)
}

fn inbox() -> Result<(), String> {
    let notes = with_store(|store| {
        store
            .fetch_inbox()
            .map(|handles| handles.iter().map(read).collect::<Vec<_>>())
            .map_err(|err| err.to_string())
    })?;
    print_json(&notes)
}

fn with_store<T>(
    f: impl FnOnce(&mut NoteStore<SqliteNoteRepository<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    let mut conn = open_db(config.db_path()).map_err(|err| err.to_string())?;
    let repo = SqliteNoteRepository::try_new(&mut conn).map_err(|err| err.to_string())?;
    let mut store = NoteStore::new(repo);
    f(&mut store)
}

fn read(handle: &basb_core::SharedNote) -> Note {
    match handle.read() {
        Ok(note) => note.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}
