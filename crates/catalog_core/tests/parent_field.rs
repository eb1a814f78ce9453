use catalog_core::db::open_db_in_memory;
use catalog_core::{
    CatalogConfig, CatalogRecord, CatalogTypeConfig, PageRepository, ParentField,
    ParentFieldError, ParentFieldResolver, SchemaRegistry, SqlitePageRepository,
    SUPPRESSED_FIELDS,
};
use rusqlite::Connection;
use std::sync::Arc;

fn setup() -> (Connection, Arc<SchemaRegistry>) {
    let conn = open_db_in_memory().unwrap();
    let registry = SchemaRegistry::from_config(&CatalogConfig {
        page_classes: vec!["CatalogPage".to_string(), "ShopPage".to_string()],
        types: vec![CatalogTypeConfig::new("Product", "CatalogPage")
            .with_parent_classes(["CatalogPage", "ShopPage"])],
    })
    .unwrap();
    registry.ensure_tables(&conn).unwrap();
    (conn, Arc::new(registry))
}

fn resolver<'conn>(
    conn: &'conn Connection,
    registry: &Arc<SchemaRegistry>,
) -> ParentFieldResolver<SqlitePageRepository<'conn>> {
    ParentFieldResolver::new(
        SqlitePageRepository::try_new(conn).unwrap(),
        Arc::clone(registry),
    )
}

#[test]
fn single_parent_page_yields_hidden_field() {
    let (conn, registry) = setup();
    let pages = SqlitePageRepository::try_new(&conn).unwrap();
    let shop = pages.create_page("CatalogPage", None, "Shop").unwrap();
    pages.create_page("BlogPage", None, "Blog").unwrap();

    let field = resolver(&conn, &registry)
        .resolve(&CatalogRecord::new("Product", "Kettle"))
        .unwrap();
    assert_eq!(field, ParentField::Hidden { parent_id: shop.id });
    assert_eq!(field.value(), shop.id);
}

#[test]
fn several_parent_pages_yield_dropdown() {
    let (conn, registry) = setup();
    let pages = SqlitePageRepository::try_new(&conn).unwrap();
    let shop = pages.create_page("CatalogPage", None, "Shop").unwrap();
    let outlet = pages.create_page("ShopPage", None, "Outlet").unwrap();

    let resolver = resolver(&conn, &registry);
    let field = resolver
        .resolve(&CatalogRecord::new("Product", "Kettle"))
        .unwrap();
    assert_eq!(
        field,
        ParentField::Dropdown {
            options: vec![
                (shop.id, "Shop".to_string()),
                (outlet.id, "Outlet".to_string())
            ],
            selected: shop.id,
        }
    );

    let placed = CatalogRecord::new("Product", "Kettle").with_parent(outlet.id);
    assert_eq!(resolver.resolve(&placed).unwrap().value(), outlet.id);
}

#[test]
fn no_parent_page_is_fatal_and_names_classes() {
    let (conn, registry) = setup();

    let err = resolver(&conn, &registry)
        .resolve(&CatalogRecord::new("Product", "Kettle"))
        .unwrap_err();
    assert!(matches!(err, ParentFieldError::NoParentPages { .. }));
    assert_eq!(
        err.to_string(),
        "You must create a parent page of class CatalogPage,ShopPage"
    );
}

#[test]
fn unknown_record_class_is_fatal() {
    let (conn, registry) = setup();

    let err = resolver(&conn, &registry)
        .resolve(&CatalogRecord::new("Recipe", "Soup"))
        .unwrap_err();
    assert!(matches!(err, ParentFieldError::UnknownClass(ref class) if class == "Recipe"));
    assert_eq!(err.to_string(), "class `Recipe` is not a catalog type");
}

#[test]
fn dropdown_ignores_parent_outside_the_options() {
    let (conn, registry) = setup();
    let pages = SqlitePageRepository::try_new(&conn).unwrap();
    let shop = pages.create_page("CatalogPage", None, "Shop").unwrap();
    pages.create_page("ShopPage", None, "Outlet").unwrap();
    let blog = pages.create_page("BlogPage", None, "Blog").unwrap();

    let misplaced = CatalogRecord::new("Product", "Kettle").with_parent(blog.id);
    let field = resolver(&conn, &registry).resolve(&misplaced).unwrap();
    assert!(matches!(field, ParentField::Dropdown { ref options, .. } if options.len() == 2));
    assert_eq!(field.value(), shop.id);

    let stale = CatalogRecord::new("Product", "Kettle").with_parent(blog.id + 100);
    assert_eq!(
        resolver(&conn, &registry).resolve(&stale).unwrap().value(),
        shop.id
    );
}

#[test]
fn version_fields_are_suppressed() {
    assert_eq!(SUPPRESSED_FIELDS, &["Version", "Versions"]);
}
