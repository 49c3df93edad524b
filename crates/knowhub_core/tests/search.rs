use knowhub_core::db::open_db_in_memory;
use knowhub_core::{ContentItem, ContentService, SqliteContentRepository, TreeItem};

#[test]
fn search_matches_names_titles_and_content_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let service = ContentService::new(SqliteContentRepository::try_new(&conn).unwrap());

    let recipes = service.create_folder("Recipes", None).unwrap();
    service.create_folder("Travel", None).unwrap();
    let soup = service
        .add_note("Tomato soup", "Simmer 20 minutes", Some(recipes.id))
        .unwrap();
    let packing = service
        .add_note("Packing list", "Bring the SOUP thermos", None)
        .unwrap();

    let hits = service.search("soup").unwrap();
    let ids = hits.iter().map(TreeItem::item_id).collect::<Vec<_>>();
    assert_eq!(ids, vec![soup.id, packing.id]);
    assert!(hits.iter().all(|item| !item.is_folder()));

    let hits = service.search("RECIPE").unwrap();
    assert_eq!(hits.len(), 1);
    match &hits[0] {
        ContentItem::Folder(folder) => assert_eq!(folder.id, recipes.id),
        other => panic!("unexpected hit: {other:?}"),
    }
}

#[test]
fn folders_are_listed_before_notes() {
    let conn = open_db_in_memory().unwrap();
    let service = ContentService::new(SqliteContentRepository::try_new(&conn).unwrap());

    service.add_note("Alpha plan", "", None).unwrap();
    service.create_folder("Alpha", None).unwrap();

    let hits = service.search("alpha").unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].is_folder());
    assert_eq!(hits[1].display_name(), "Alpha plan");
}

#[test]
fn unmatched_term_returns_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = ContentService::new(SqliteContentRepository::try_new(&conn).unwrap());
    service.create_folder("Inbox", None).unwrap();

    assert!(service.search("zzz").unwrap().is_empty());
}
