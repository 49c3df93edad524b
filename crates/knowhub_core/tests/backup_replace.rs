use knowhub_core::db::open_db_in_memory;
use knowhub_core::{
    CellValue, ColumnType, ContentExport, ContentService, ContentServiceError, Folder, Note,
    NoteTable, Row, SqliteContentRepository, TableColumn,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> ContentService<SqliteContentRepository<'_>> {
    ContentService::new(SqliteContentRepository::try_new(conn).unwrap())
}

fn folder(id: i64, name: &str, parent: Option<i64>) -> Folder {
    Folder {
        id,
        name: name.to_string(),
        parent_folder_id: parent,
        created_at: 0,
        updated_at: 0,
    }
}

fn note(id: i64, title: &str, folder_id: Option<i64>) -> Note {
    Note {
        id,
        title: title.to_string(),
        content: String::new(),
        folder_id,
        tables: Vec::new(),
        created_at: 0,
        updated_at: 0,
    }
}

fn seeded(service: &ContentService<SqliteContentRepository<'_>>) {
    let work = service.create_folder("Work", None).unwrap();
    let archive = service.create_folder("Archive", Some(work.id)).unwrap();
    let report = service
        .add_note("Report", "Sum {{Hours.Spent.sum}}", Some(archive.id))
        .unwrap();
    service.create_note("Scratch", None).unwrap();
    let table = service
        .create_table_for_note(
            report.id,
            &NoteTable::with_columns("Hours", vec![TableColumn::new("Spent", ColumnType::Number)]),
        )
        .unwrap();
    service
        .add_table_row(
            table.id.unwrap(),
            Row::from([("Spent".to_string(), CellValue::from(4.5))]),
        )
        .unwrap();
}

#[test]
fn export_then_replace_into_fresh_store_restores_everything() {
    let source_conn = setup();
    let source = service(&source_conn);
    seeded(&source);
    let exported = source.get_all_data().unwrap();
    assert_eq!(exported.folders.len(), 2);
    assert_eq!(exported.notes.len(), 2);
    assert_eq!(exported.notes[0].tables.len(), 1);

    let target_conn = setup();
    let target = service(&target_conn);
    target.create_folder("Will be dropped", None).unwrap();
    target.replace_all(&exported).unwrap();

    let restored = target.get_all_data().unwrap();
    assert_eq!(restored.folders.len(), 2);
    for (before, after) in exported.folders.iter().zip(&restored.folders) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.name, after.name);
        assert_eq!(before.parent_folder_id, after.parent_folder_id);
        assert_eq!(before.created_at, after.created_at);
    }
    for (before, after) in exported.notes.iter().zip(&restored.notes) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.title, after.title);
        assert_eq!(before.content, after.content);
        assert_eq!(before.folder_id, after.folder_id);
        assert_eq!(before.tables.len(), after.tables.len());
    }
    assert_eq!(
        restored.notes[0].tables[0].rows().unwrap(),
        exported.notes[0].tables[0].rows().unwrap()
    );
    assert_eq!(
        target.resolve_content("{{Hours.Spent.sum}}").unwrap(),
        "4.5"
    );
}

#[test]
fn backup_document_round_trips_through_service() {
    let source_conn = setup();
    let source = service(&source_conn);
    seeded(&source);
    let bytes = source.export_backup().unwrap();

    let target_conn = setup();
    let target = service(&target_conn);
    target.import_backup(&bytes).unwrap();

    let tree = target.list_root_folders().unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(target.list_root_notes().unwrap()[0].title, "Scratch");
}

#[test]
fn malformed_backup_leaves_store_untouched() {
    let conn = setup();
    let service = service(&conn);
    seeded(&service);

    let err = service.import_backup(br#"{"notes": []}"#).unwrap_err();
    assert!(matches!(err, ContentServiceError::Backup(_)));
    assert_eq!(service.get_all_data().unwrap().folders.len(), 2);
}

#[test]
fn dangling_references_and_cycles_are_rejected_before_writing() {
    let conn = setup();
    let service = service(&conn);
    seeded(&service);

    let payloads = [
        ContentExport {
            notes: vec![note(1, "N", Some(9))],
            folders: vec![folder(1, "A", None)],
        },
        ContentExport {
            notes: Vec::new(),
            folders: vec![folder(1, "A", Some(7))],
        },
        ContentExport {
            notes: Vec::new(),
            folders: vec![folder(1, "A", Some(2)), folder(2, "B", Some(1))],
        },
        ContentExport {
            notes: Vec::new(),
            folders: vec![folder(1, "A", None), folder(1, "B", None)],
        },
        ContentExport {
            notes: vec![note(3, "N", None), note(3, "M", None)],
            folders: Vec::new(),
        },
    ];
    for payload in &payloads {
        let err = service.replace_all(payload).unwrap_err();
        assert!(
            matches!(err, ContentServiceError::InvalidPayload(_)),
            "unexpected error: {err}"
        );
    }

    let untouched = service.get_all_data().unwrap();
    assert_eq!(untouched.folders.len(), 2);
    assert_eq!(untouched.notes.len(), 2);
}

#[test]
fn invalid_names_in_payload_report_indexed_fields() {
    let conn = setup();
    let service = service(&conn);

    let payload = ContentExport {
        notes: vec![note(1, "", None)],
        folders: vec![folder(1, "Ok", None), folder(2, "", None)],
    };
    match service.replace_all(&payload).unwrap_err() {
        ContentServiceError::Validation(errors) => {
            assert!(errors.has_field("folders[1].folder.name"));
            assert!(errors.has_field("notes[0].note.title"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn replacing_with_empty_payload_clears_the_store() {
    let conn = setup();
    let service = service(&conn);
    seeded(&service);

    service.replace_all(&ContentExport::default()).unwrap();

    let data = service.get_all_data().unwrap();
    assert!(data.notes.is_empty());
    assert!(data.folders.is_empty());
    assert!(service.get_all_tables().unwrap().is_empty());
}
