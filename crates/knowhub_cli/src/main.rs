//! CLI entry point.
//!
//! # Responsibility
//! - Verify `knowhub_core` linkage with deterministic output.
//! - Given a database path, print the folder tree and every note with its
//!   placeholders resolved.

use knowhub_core::{open_db, ContentService, Note, SqliteContentRepository};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("knowhub_core ping={}", knowhub_core::ping());
    println!("knowhub_core version={}", knowhub_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match print_content(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("knowhub: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_content(db_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    let service = ContentService::new(SqliteContentRepository::try_new(&conn)?);

    let tree = service.list_root_folders()?;
    for (depth, node) in tree.walk() {
        let indent = "  ".repeat(depth);
        println!("{indent}[{}] {}", node.folder.id, node.folder.name);
        for note in &node.notes {
            print_note(&service, note, &format!("{indent}  "))?;
        }
    }
    for note in service.list_root_notes()? {
        print_note(&service, &note, "")?;
    }
    Ok(())
}

fn print_note(
    service: &ContentService<SqliteContentRepository<'_>>,
    note: &Note,
    indent: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{indent}- ({}) {}", note.id, note.title);
    let resolved = service.resolve_content(&note.content)?;
    for line in resolved.lines() {
        println!("{indent}    {line}");
    }
    Ok(())
}
