//! Unit tests for the SQLite sink

use super::connection::SqliteConnection;
use crate::SqliteDriver;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use snowcopy_core::{Connection, SinkDriver, SinkFlavor, Value};

fn memory() -> SqliteConnection {
    SqliteConnection::open(":memory:").unwrap()
}

fn create_typed_table(conn: &SqliteConnection) {
    conn.execute(
        r#"CREATE TABLE "t" ("I" INTEGER, "R" REAL, "S" TEXT, "D" DATE, "TS" DATETIME, "B" BOOLEAN)"#,
        &[],
    )
    .unwrap();
}

fn count(conn: &SqliteConnection, table: &str) -> i64 {
    let result = conn
        .query(&format!(r#"SELECT COUNT(*) FROM "{}""#, table), &[])
        .unwrap();
    result.rows[0].get(0).and_then(Value::as_i64).unwrap()
}

#[test]
fn test_sqlite_driver_connect_memory() {
    let driver = SqliteDriver::new();
    assert_eq!(driver.id(), "sqlite");
    assert_eq!(driver.flavor(), SinkFlavor::Sqlite);

    let conn = driver.connect(":memory:").unwrap();
    assert_eq!(conn.driver_name(), "sqlite");
    assert_eq!(conn.flavor(), SinkFlavor::Sqlite);
}

#[test]
fn test_typed_values_round_trip_through_declared_types() {
    let conn = memory();
    create_typed_table(&conn);

    let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let ts = date.and_hms_micro_opt(13, 5, 9, 250_000).unwrap();

    let tx = conn.begin_transaction().unwrap();
    let affected = tx
        .execute_many(
            r#"INSERT INTO "t" ("I", "R", "S", "D", "TS", "B") VALUES (?, ?, ?, ?, ?, ?)"#,
            &[
                vec![
                    Value::Int64(42),
                    Value::Float64(1.25),
                    Value::String("Ada".into()),
                    Value::Date(date),
                    Value::DateTime(ts),
                    Value::Bool(true),
                ],
                vec![
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Bool(false),
                ],
            ],
        )
        .unwrap();
    tx.commit().unwrap();
    assert_eq!(affected, 2);

    let result = conn
        .query(r#"SELECT "I", "R", "S", "D", "TS", "B" FROM "t" ORDER BY rowid"#, &[])
        .unwrap();
    assert_eq!(result.columns[3].data_type, "DATE");
    assert_eq!(result.columns[4].data_type, "DATETIME");
    assert_eq!(
        result.rows[0].values,
        vec![
            Value::Int64(42),
            Value::Float64(1.25),
            Value::String("Ada".into()),
            Value::Date(date),
            Value::DateTime(ts),
            Value::Bool(true),
        ]
    );
    assert_eq!(result.rows[1].get(0), Some(&Value::Null));
    assert_eq!(result.rows[1].get(5), Some(&Value::Bool(false)));
}

#[test]
fn test_temporal_values_are_stored_as_iso_text() {
    let conn = memory();
    create_typed_table(&conn);
    let ts = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    conn.execute(r#"INSERT INTO "t" ("TS") VALUES (?)"#, &[Value::DateTime(ts)])
        .unwrap();

    let result = conn
        .query(r#"SELECT typeof("TS"), CAST("TS" AS TEXT) FROM "t""#, &[])
        .unwrap();
    assert_eq!(result.rows[0].get(0), Some(&Value::String("text".into())));
    assert_eq!(
        result.rows[0].get(1),
        Some(&Value::String("2024-01-15T00:00:00".into()))
    );
}

#[test]
fn test_unparsable_temporal_text_reads_back_as_string() {
    let conn = memory();
    create_typed_table(&conn);
    conn.execute(
        r#"INSERT INTO "t" ("D") VALUES (?)"#,
        &[Value::String("someday".into())],
    )
    .unwrap();

    let result = conn.query(r#"SELECT "D" FROM "t""#, &[]).unwrap();
    assert_eq!(result.rows[0].get(0), Some(&Value::String("someday".into())));
}

#[test]
fn test_integer_outside_boolean_range_stays_integer() {
    let conn = memory();
    create_typed_table(&conn);
    conn.execute(r#"INSERT INTO "t" ("B") VALUES (7)"#, &[]).unwrap();

    let result = conn.query(r#"SELECT "B" FROM "t""#, &[]).unwrap();
    assert_eq!(result.rows[0].get(0), Some(&Value::Int64(7)));
}

#[test]
fn test_explicit_rollback_discards_rows() {
    let conn = memory();
    create_typed_table(&conn);

    let tx = conn.begin_transaction().unwrap();
    tx.execute(r#"INSERT INTO "t" ("I") VALUES (?)"#, &[Value::Int64(1)])
        .unwrap();
    tx.rollback().unwrap();

    assert_eq!(count(&conn, "t"), 0);
}

#[test]
fn test_dropped_transaction_rolls_back() {
    let conn = memory();
    create_typed_table(&conn);

    {
        let tx = conn.begin_transaction().unwrap();
        tx.execute(r#"INSERT INTO "t" ("I") VALUES (?)"#, &[Value::Int64(1)])
            .unwrap();
    }

    assert_eq!(count(&conn, "t"), 0);
    // the connection is usable again after the implicit rollback
    let tx = conn.begin_transaction().unwrap();
    tx.commit().unwrap();
}

#[test]
fn test_execute_many_reports_failing_row() {
    let conn = memory();
    conn.execute(r#"CREATE TABLE "u" ("ID" INTEGER NOT NULL)"#, &[])
        .unwrap();

    let tx = conn.begin_transaction().unwrap();
    let err = tx
        .execute_many(
            r#"INSERT INTO "u" ("ID") VALUES (?)"#,
            &[vec![Value::Int64(1)], vec![Value::Null]],
        )
        .unwrap_err();
    assert!(err.to_string().contains("row 1"), "{}", err);
    drop(tx);

    assert_eq!(count(&conn, "u"), 0);
}

#[test]
fn test_file_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.db");
    let path = path.to_str().unwrap();

    {
        let conn = SqliteConnection::open(path).unwrap();
        conn.execute(r#"CREATE TABLE "p" ("ID" INTEGER)"#, &[]).unwrap();
        conn.execute(r#"INSERT INTO "p" VALUES (1)"#, &[]).unwrap();
        conn.close().unwrap();
    }

    let conn = SqliteConnection::open(path).unwrap();
    assert_eq!(conn.path(), path);
    assert_eq!(count(&conn, "p"), 1);
}

#[test]
fn test_open_fails_for_missing_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("local.db");
    assert!(SqliteConnection::open(path.to_str().unwrap()).is_err());
}

#[test]
fn test_closed_connection_rejects_statements() {
    let conn = memory();
    conn.close().unwrap();
    assert!(conn.is_closed());
    assert!(conn.execute("SELECT 1", &[]).is_err());
    assert!(conn.begin_transaction().is_err());
}
