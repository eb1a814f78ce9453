//! Batch entry point for catalog publishing jobs.
//!
//! # Responsibility
//! - Run one publish/unpublish/reorder/status command against a database.
//! - Keep output line-oriented so scripts can parse it.
//!
//! Set `CATALOG_LOG_DIR` to an absolute directory to enable file logging.

use catalog_core::db::open_db;
use catalog_core::{
    core_version, default_log_level, init_logging, CatalogConfig, CatalogRecord, RecordId,
    SchemaRegistry, SqlitePageRepository, SqliteRecordRepository, SqliteRecordStore, Stage,
    VersionedRecordStore,
};
use log::error;
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "usage: catalog_cli <db-path> <config.json> <command> [args]
commands:
  status <class> <id>
  publish <class> <id>
  unpublish <class> <id>
  move <class> <id> <index>
  list <class> <parent-id|root> [draft|live]
  version";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status { class_name: String, id: RecordId },
    Publish { class_name: String, id: RecordId },
    Unpublish { class_name: String, id: RecordId },
    Move {
        class_name: String,
        id: RecordId,
        index: usize,
    },
    List {
        class_name: String,
        parent_id: Option<RecordId>,
        stage: Stage,
    },
}

fn main() -> ExitCode {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.first().map(String::as_str) == Some("version") {
        println!("catalog_core version={}", core_version());
        return ExitCode::SUCCESS;
    }

    let (db_path, config_path, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            return ExitCode::from(1);
        }
    };

    if let Ok(log_dir) = std::env::var("CATALOG_LOG_DIR") {
        if let Err(message) = init_logging(default_log_level(), &log_dir) {
            eprintln!("warning: {message}");
        }
    }

    match run(db_path, config_path, command) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::from(2)
        }
    }
}

fn parse_args(args: &[String]) -> Result<(&str, &str, Command), String> {
    let [db_path, config_path, name, rest @ ..] = args else {
        return Err("missing arguments".to_string());
    };

    let command = match (name.as_str(), rest) {
        ("status", [class_name, id]) => Command::Status {
            class_name: class_name.clone(),
            id: parse_id(id)?,
        },
        ("publish", [class_name, id]) => Command::Publish {
            class_name: class_name.clone(),
            id: parse_id(id)?,
        },
        ("unpublish", [class_name, id]) => Command::Unpublish {
            class_name: class_name.clone(),
            id: parse_id(id)?,
        },
        ("move", [class_name, id, index]) => Command::Move {
            class_name: class_name.clone(),
            id: parse_id(id)?,
            index: index
                .parse()
                .map_err(|_| format!("invalid index `{index}`"))?,
        },
        ("list", [class_name, parent, stage @ ..]) if stage.len() <= 1 => Command::List {
            class_name: class_name.clone(),
            parent_id: match parent.as_str() {
                "root" => None,
                value => Some(parse_id(value)?),
            },
            stage: match stage.first() {
                Some(value) => {
                    Stage::parse(value).ok_or_else(|| format!("invalid stage `{value}`"))?
                }
                None => Stage::Draft,
            },
        },
        (other, _) => return Err(format!("unknown command or arguments: `{other}`")),
    };

    Ok((db_path.as_str(), config_path.as_str(), command))
}

fn parse_id(value: &str) -> Result<RecordId, String> {
    value
        .parse::<RecordId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| format!("invalid record id `{value}`"))
}

fn run(db_path: &str, config_path: &str, command: Command) -> Result<Vec<String>, String> {
    let config = CatalogConfig::from_path(config_path).map_err(|err| err.to_string())?;
    let registry = Arc::new(SchemaRegistry::from_config(&config).map_err(|err| err.to_string())?);
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    registry.ensure_tables(&conn).map_err(|err| err.to_string())?;

    let store: SqliteRecordStore<'_> = VersionedRecordStore::new(
        SqliteRecordRepository::try_new(&conn).map_err(|err| err.to_string())?,
        SqlitePageRepository::try_new(&conn).map_err(|err| err.to_string())?,
        registry,
    );

    execute(&store, command).map_err(|err| err.to_string())
}

fn execute(
    store: &SqliteRecordStore<'_>,
    command: Command,
) -> Result<Vec<String>, catalog_core::StoreError> {
    match command {
        Command::Status { class_name, id } => {
            let record = load_draft(store, &class_name, id)?;
            Ok(vec![format!(
                "id={} published={} modified={}",
                id,
                store.is_published_nice(&record)?,
                store.is_modified_nice(&record)?
            )])
        }
        Command::Publish { class_name, id } => {
            let mut record = load_draft(store, &class_name, id)?;
            let ok = store.publish(&mut record)?;
            Ok(vec![format!("id={id} published={ok}")])
        }
        Command::Unpublish { class_name, id } => {
            let record = load_draft(store, &class_name, id)?;
            let ok = store.unpublish(&record, Stage::Draft)?;
            Ok(vec![format!("id={id} unpublished={ok}")])
        }
        Command::Move {
            class_name,
            id,
            index,
        } => {
            let order = store.move_record(&class_name, id, index)?;
            Ok(vec![format!(
                "order={}",
                order
                    .iter()
                    .map(RecordId::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            )])
        }
        Command::List {
            class_name,
            parent_id,
            stage,
        } => Ok(store
            .list_children(&class_name, parent_id, stage)?
            .into_iter()
            .map(|record| {
                format!(
                    "id={} sort={} title={}",
                    record.id.unwrap_or_default(),
                    record.sort,
                    record.title
                )
            })
            .collect()),
    }
}

fn load_draft(
    store: &SqliteRecordStore<'_>,
    class_name: &str,
    id: RecordId,
) -> Result<CatalogRecord, catalog_core::StoreError> {
    store
        .get(class_name, id, Stage::Draft)?
        .ok_or_else(|| catalog_core::StoreError::RecordNotFound {
            class_name: class_name.to_string(),
            id,
        })
}

#[cfg(test)]
mod tests {
    use super::{parse_args, run, Command};
    use catalog_core::db::open_db;
    use catalog_core::{
        CatalogConfig, CatalogRecord, PageRepository, SchemaRegistry, SqlitePageRepository,
        SqliteRecordRepository, Stage, VersionedRecordStore,
    };
    use std::sync::Arc;

    const CONFIG_JSON: &str = r#"{
        "page_classes": ["CatalogPage"],
        "types": [{ "class_name": "Product", "parent_class": "CatalogPage" }]
    }"#;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_publish_command() {
        let args = args(&["catalog.db", "catalog.json", "publish", "Product", "3"]);
        let (db, config, command) = parse_args(&args).expect("publish should parse");
        assert_eq!(db, "catalog.db");
        assert_eq!(config, "catalog.json");
        assert_eq!(
            command,
            Command::Publish {
                class_name: "Product".to_string(),
                id: 3
            }
        );
    }

    #[test]
    fn list_defaults_to_draft_and_accepts_root() {
        let args = args(&["catalog.db", "catalog.json", "list", "Product", "root"]);
        let (_, _, command) = parse_args(&args).expect("list should parse");
        assert_eq!(
            command,
            Command::List {
                class_name: "Product".to_string(),
                parent_id: None,
                stage: Stage::Draft
            }
        );
    }

    #[test]
    fn rejects_bad_ids_and_unknown_commands() {
        assert!(parse_args(&args(&["db", "cfg", "publish", "Product", "0"])).is_err());
        assert!(parse_args(&args(&["db", "cfg", "publish", "Product", "x"])).is_err());
        assert!(parse_args(&args(&["db", "cfg", "archive", "Product", "1"])).is_err());
        assert!(parse_args(&args(&["db"])).is_err());
    }

    #[test]
    fn publish_then_status_runs_against_database_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("catalog.db");
        let config_path = dir.path().join("catalog.json");
        std::fs::write(&config_path, CONFIG_JSON).expect("write config");
        let db = db_path.to_str().expect("utf-8 db path");
        let config = config_path.to_str().expect("utf-8 config path");

        let (shop_id, id) = {
            let conn = open_db(db).expect("open db");
            let registry = SchemaRegistry::from_config(
                &CatalogConfig::from_json_str(CONFIG_JSON).expect("config should load"),
            )
            .expect("registry");
            registry.ensure_tables(&conn).expect("tables");
            let pages = SqlitePageRepository::try_new(&conn).expect("page repo");
            let shop = pages.create_page("CatalogPage", None, "Shop").expect("page");
            let store = VersionedRecordStore::new(
                SqliteRecordRepository::try_new(&conn).expect("record repo"),
                pages,
                Arc::new(registry),
            );
            let mut record = CatalogRecord::new("Product", "Kettle").with_parent(shop.id);
            (shop.id, store.save(&mut record).expect("save draft"))
        };

        let status = |id| Command::Status {
            class_name: "Product".to_string(),
            id,
        };
        assert_eq!(
            run(db, config, status(id)).expect("status before publish"),
            vec![format!("id={id} published=No modified=Yes")]
        );

        let published = run(
            db,
            config,
            Command::Publish {
                class_name: "Product".to_string(),
                id,
            },
        )
        .expect("publish");
        assert_eq!(published, vec![format!("id={id} published=true")]);

        assert_eq!(
            run(db, config, status(id)).expect("status after publish"),
            vec![format!("id={id} published=Yes modified=No")]
        );

        let live = run(
            db,
            config,
            Command::List {
                class_name: "Product".to_string(),
                parent_id: Some(shop_id),
                stage: Stage::Live,
            },
        )
        .expect("list live");
        assert_eq!(live, vec![format!("id={id} sort=0 title=Kettle")]);
    }

    #[test]
    fn status_of_missing_record_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("catalog.db");
        let config_path = dir.path().join("catalog.json");
        std::fs::write(&config_path, CONFIG_JSON).expect("write config");

        let err = run(
            db_path.to_str().expect("utf-8 db path"),
            config_path.to_str().expect("utf-8 config path"),
            Command::Status {
                class_name: "Product".to_string(),
                id: 42,
            },
        )
        .expect_err("missing record");
        assert_eq!(err, "Product record 42 not found");
    }
}
