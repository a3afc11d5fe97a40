use rusqlite::Connection;
use serde_json::json;
use visitnote_core::db::migrations::latest_version;
use visitnote_core::db::{open_draft_db, open_draft_db_in_memory, DbError};
use visitnote_core::{DraftStore, EngineConfig, NoteData, RepoError, SqliteDraftStore};

#[test]
fn in_memory_database_applies_all_migrations() {
    let conn = open_draft_db_in_memory().unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "local_drafts");
}

#[test]
fn drafts_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drafts.sqlite3");
    let data = NoteData::from_value(json!({
        "visit_id": "v1",
        "Vitals": {"heartRate": "72", "bloodPressure": "120/80"}
    }));

    let written = {
        let store = SqliteDraftStore::open(&path).unwrap();
        store.put_draft("visit:v1:PT:Evaluation", &data).unwrap()
    };

    let store = SqliteDraftStore::open(&path).unwrap();
    let read = store.get_draft("visit:v1:PT:Evaluation").unwrap().unwrap();
    assert_eq!(read.draft_uuid, written.draft_uuid);
    assert_eq!(read.data, data);
    assert_eq!(read.saved_at, written.saved_at);
}

#[test]
fn configured_draft_path_is_a_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.sqlite3");
    let config = EngineConfig {
        draft_db_path: Some(path.clone()),
        ..EngineConfig::default()
    };
    let data = NoteData::from_value(json!({"Pain": {"level": 3}}));

    {
        let store = SqliteDraftStore::from_config(&config).unwrap();
        store.put_draft("visit:v2:PT:Daily", &data).unwrap();
    }

    assert!(path.exists());
    let reopened = SqliteDraftStore::open(&path).unwrap();
    let read = reopened.get_draft("visit:v2:PT:Daily").unwrap().unwrap();
    assert_eq!(read.data, data);
}

#[test]
fn unset_draft_path_keeps_drafts_in_memory() {
    let config = EngineConfig::default();
    let store = SqliteDraftStore::from_config(&config).unwrap();
    let data = NoteData::from_value(json!({"Vitals": {"heartRate": "80"}}));
    store.put_draft("templateData", &data).unwrap();
    assert_eq!(store.get_draft("templateData").unwrap().unwrap().data, data);

    let other = SqliteDraftStore::from_config(&config).unwrap();
    assert!(other.get_draft("templateData").unwrap().is_none());
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 99;").unwrap();
    drop(conn);

    match open_draft_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 99);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        SqliteDraftStore::open(&path),
        Err(RepoError::Db(DbError::UnsupportedSchemaVersion { .. }))
    ));
}

#[test]
fn corrupt_payload_surfaces_invalid_data() {
    let conn = open_draft_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO local_drafts (draft_key, draft_uuid, payload, saved_at)
         VALUES ('k', 'not-a-uuid', '{}', 0);",
        [],
    )
    .unwrap();
    let store = SqliteDraftStore::new(conn);
    assert!(matches!(
        store.get_draft("k"),
        Err(RepoError::InvalidData(_))
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table `{table_name}` should exist");
}
