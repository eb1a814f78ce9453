use catalog_core::db::open_db_in_memory;
use catalog_core::{
    CatalogConfig, CatalogRecord, CatalogTypeConfig, PageRepository, RecordId, SchemaRegistry,
    SqlitePageRepository, SqliteRecordRepository, SqliteRecordStore, Stage, StoreError,
    VersionedRecordStore,
};
use rusqlite::Connection;
use std::sync::Arc;

fn setup() -> (Connection, Arc<SchemaRegistry>) {
    let conn = open_db_in_memory().unwrap();
    let mut manual = CatalogTypeConfig::new("Testimonial", "CatalogPage");
    manual.automatic_live_sort = false;
    manual.can_duplicate = false;
    let registry = SchemaRegistry::from_config(&CatalogConfig {
        page_classes: vec!["CatalogPage".to_string()],
        types: vec![CatalogTypeConfig::new("Product", "CatalogPage"), manual],
    })
    .unwrap();
    registry.ensure_tables(&conn).unwrap();
    (conn, Arc::new(registry))
}

fn store<'conn>(conn: &'conn Connection, registry: &Arc<SchemaRegistry>) -> SqliteRecordStore<'conn> {
    VersionedRecordStore::new(
        SqliteRecordRepository::try_new(conn).unwrap(),
        SqlitePageRepository::try_new(conn).unwrap(),
        Arc::clone(registry),
    )
}

fn page(conn: &Connection) -> RecordId {
    SqlitePageRepository::try_new(conn)
        .unwrap()
        .create_page("CatalogPage", None, "Shop")
        .unwrap()
        .id
}

fn append_all(
    store: &SqliteRecordStore<'_>,
    class_name: &str,
    parent_id: RecordId,
    titles: &[&str],
) -> Vec<CatalogRecord> {
    titles
        .iter()
        .map(|title| {
            let mut record = CatalogRecord::new(class_name, *title).with_parent(parent_id);
            store.append(&mut record).unwrap();
            record
        })
        .collect()
}

fn titles(records: &[CatalogRecord]) -> Vec<&str> {
    records.iter().map(|record| record.title.as_str()).collect()
}

#[test]
fn append_places_records_after_siblings() {
    let (conn, registry) = setup();
    let store = store(&conn, &registry);
    let parent = page(&conn);

    let records = append_all(&store, "Product", parent, &["A", "B", "C"]);
    assert_eq!(
        records.iter().map(|record| record.sort).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    let children = store
        .list_children("Product", Some(parent), Stage::Draft)
        .unwrap();
    assert_eq!(titles(&children), vec!["A", "B", "C"]);
}

#[test]
fn move_renumbers_siblings_and_propagates_to_live() {
    let (conn, registry) = setup();
    let store = store(&conn, &registry);
    let parent = page(&conn);

    let mut records = append_all(&store, "Product", parent, &["A", "B", "C"]);
    for record in records.iter_mut() {
        store.publish(record).unwrap();
    }

    let c_id = records[2].id.unwrap();
    let order = store.move_record("Product", c_id, 0).unwrap();
    assert_eq!(order[0], c_id);

    let draft = store
        .list_children("Product", Some(parent), Stage::Draft)
        .unwrap();
    assert_eq!(titles(&draft), vec!["C", "A", "B"]);
    assert_eq!(
        draft.iter().map(|record| record.sort).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    let live = store
        .list_children("Product", Some(parent), Stage::Live)
        .unwrap();
    assert_eq!(titles(&live), vec!["C", "A", "B"]);
    assert!(!store.is_modified(&draft[0]).unwrap());
}

#[test]
fn move_without_automatic_live_sort_leaves_live_order() {
    let (conn, registry) = setup();
    let store = store(&conn, &registry);
    let parent = page(&conn);

    let mut records = append_all(&store, "Testimonial", parent, &["A", "B"]);
    for record in records.iter_mut() {
        store.publish(record).unwrap();
    }

    store
        .move_record("Testimonial", records[1].id.unwrap(), 0)
        .unwrap();

    let live = store
        .list_children("Testimonial", Some(parent), Stage::Live)
        .unwrap();
    assert_eq!(titles(&live), vec!["A", "B"]);

    let moved = store
        .get("Testimonial", records[1].id.unwrap(), Stage::Draft)
        .unwrap()
        .unwrap();
    assert!(store.is_modified(&moved).unwrap());
}

#[test]
fn move_clamps_index_past_the_end() {
    let (conn, registry) = setup();
    let store = store(&conn, &registry);
    let parent = page(&conn);

    let records = append_all(&store, "Product", parent, &["A", "B", "C"]);
    let order = store
        .move_record("Product", records[0].id.unwrap(), 99)
        .unwrap();
    assert_eq!(order.last().copied(), records[0].id);
}

#[test]
fn move_unknown_record_is_not_found() {
    let (conn, registry) = setup();
    let store = store(&conn, &registry);

    let err = store.move_record("Product", 404, 0).unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound { id: 404, .. }));
}

#[test]
fn duplicate_appends_draft_copy() {
    let (conn, registry) = setup();
    let store = store(&conn, &registry);
    let parent = page(&conn);

    let records = append_all(&store, "Product", parent, &["A", "B"]);
    let copy = store.duplicate(&records[0]).unwrap();

    assert_ne!(copy.id, records[0].id);
    assert_eq!(copy.title, "A");
    assert_eq!(copy.parent_id, Some(parent));
    assert_eq!(copy.sort, 2);
    assert!(!store.is_published(&copy).unwrap());
}

#[test]
fn duplicate_respects_can_duplicate() {
    let (conn, registry) = setup();
    let store = store(&conn, &registry);
    let parent = page(&conn);

    let records = append_all(&store, "Testimonial", parent, &["A"]);
    let err = store.duplicate(&records[0]).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateNotAllowed(ref class) if class == "Testimonial"));
}
