//! Integration tests for the `DatabaseBackend` trait against a real SQLite
//! database: execute/query round-trips, transaction commit/rollback, and
//! savepoint nesting.

use yoyo_backends::sqlite::SqliteBackend;
use yoyo_backends::value::Value;
use yoyo_backends::DatabaseBackend;

async fn setup() -> SqliteBackend {
    let db = SqliteBackend::memory().unwrap();
    db.execute("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", &[])
        .await
        .unwrap();
    db
}

#[tokio::test]
async fn test_execute_then_query_round_trip() {
    let db = setup().await;
    db.execute("INSERT INTO widgets (id, name) VALUES (?, ?)", &[Value::Int(1), Value::from("gear")])
        .await
        .unwrap();

    let rows = db.query("SELECT id, name FROM widgets", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_string("name").unwrap(), "gear");
}

#[tokio::test]
async fn test_query_one_found_and_not_found() {
    let db = setup().await;
    db.execute("INSERT INTO widgets (id, name) VALUES (1, 'gear')", &[])
        .await
        .unwrap();

    let row = db
        .query_one("SELECT name FROM widgets WHERE id = ?", &[Value::Int(1)])
        .await
        .unwrap();
    assert_eq!(row.get_string("name").unwrap(), "gear");

    let missing = db
        .query_one("SELECT name FROM widgets WHERE id = ?", &[Value::Int(999)])
        .await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn test_transaction_commit_persists_rows() {
    let db = setup().await;
    db.begin().await.unwrap();
    db.execute("INSERT INTO widgets (id, name) VALUES (1, 'gear')", &[])
        .await
        .unwrap();
    db.commit().await.unwrap();

    let rows = db.query("SELECT id FROM widgets", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_transaction_rollback_discards_rows() {
    let db = setup().await;
    db.begin().await.unwrap();
    db.execute("INSERT INTO widgets (id, name) VALUES (1, 'gear')", &[])
        .await
        .unwrap();
    db.rollback().await.unwrap();

    let rows = db.query("SELECT id FROM widgets", &[]).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_savepoint_rollback_keeps_earlier_inserts() {
    let db = setup().await;
    db.begin().await.unwrap();
    db.execute("INSERT INTO widgets (id, name) VALUES (1, 'gear')", &[])
        .await
        .unwrap();

    let sp = yoyo_backends::Savepoint::numbered(1);
    db.savepoint(&sp).await.unwrap();
    db.execute("INSERT INTO widgets (id, name) VALUES (2, 'cog')", &[])
        .await
        .unwrap();
    db.rollback_to_savepoint(&sp).await.unwrap();

    db.commit().await.unwrap();

    let rows = db.query("SELECT id FROM widgets ORDER BY id", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_int("id").unwrap(), 1);
}

#[tokio::test]
async fn test_multiple_statements_and_quote_identifier() {
    let db = setup().await;
    let quoted = db.quote_identifier("widgets");
    db.execute(&format!("DELETE FROM {quoted}"), &[]).await.unwrap();

    db.execute("INSERT INTO widgets (id, name) VALUES (1, 'a')", &[])
        .await
        .unwrap();
    db.execute("INSERT INTO widgets (id, name) VALUES (2, 'b')", &[])
        .await
        .unwrap();

    let rows = db.query("SELECT id FROM widgets ORDER BY id", &[]).await.unwrap();
    assert_eq!(rows.len(), 2);
}
