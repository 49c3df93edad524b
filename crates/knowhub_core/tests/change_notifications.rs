use knowhub_core::db::open_db_in_memory;
use knowhub_core::{
    ColumnType, ContentChange, ContentExport, ContentService, NoteTable, Row,
    SqliteContentRepository, TableColumn,
};
use std::sync::{Arc, Mutex};

#[test]
fn committed_mutations_are_announced_in_order() {
    let conn = open_db_in_memory().unwrap();
    let service = ContentService::new(SqliteContentRepository::try_new(&conn).unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    service.subscribe(move |change| sink.lock().unwrap().push(*change));

    let folder = service.create_folder("Inbox", None).unwrap();
    let note = service.create_note("Todo", Some(folder.id)).unwrap();
    let table = service
        .create_table_for_note(
            note.id,
            &NoteTable::with_columns("Tasks", vec![TableColumn::new("Done", ColumnType::Boolean)]),
        )
        .unwrap();
    let table_id = table.id.unwrap();
    service.add_table_row(table_id, Row::new()).unwrap();
    service.rename_note(note.id, "Today").unwrap();
    service.move_note(note.id, None).unwrap();
    service.delete_folder(folder.id).unwrap();
    service.replace_all(&ContentExport::default()).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ContentChange::FolderCreated(folder.id),
            ContentChange::NoteCreated(note.id),
            ContentChange::TableCreated(table_id),
            ContentChange::TableRowsChanged(table_id),
            ContentChange::NoteRenamed(note.id),
            ContentChange::NoteMoved(note.id),
            ContentChange::FolderDeleted(folder.id),
            ContentChange::AllReplaced,
        ]
    );
}

#[test]
fn failed_and_no_op_mutations_stay_silent() {
    let conn = open_db_in_memory().unwrap();
    let service = ContentService::new(SqliteContentRepository::try_new(&conn).unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = service.subscribe(move |change| sink.lock().unwrap().push(*change));

    assert!(service.create_folder("", None).is_err());
    service.rename_folder(12, "Nothing").unwrap();
    service.delete_note(12).unwrap();
    assert!(seen.lock().unwrap().is_empty());

    assert!(service.unsubscribe(subscription));
    service.create_folder("Quiet", None).unwrap();
    assert!(seen.lock().unwrap().is_empty());
}
