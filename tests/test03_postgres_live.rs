#![cfg(feature = "postgres")]

use store_middleware::prelude::*;
use std::env;

/// Connection against a real server, or `None` when `STORE_MIDDLEWARE_PG_HOST` is unset.
fn live_connection() -> Option<PgConnection> {
    let host = env::var("STORE_MIDDLEWARE_PG_HOST").ok()?;
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let port: i64 = env::var("STORE_MIDDLEWARE_PG_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(5432);
    let config = ConnectionConfig {
        host: Some(host),
        port: Some(port),
        connect_tries: Some(2),
        connect_timeout: Some(5.0),
        user: Some(env::var("STORE_MIDDLEWARE_PG_USER").unwrap_or_else(|_| "postgres".into())),
        password: Some(env::var("STORE_MIDDLEWARE_PG_PASSWORD").unwrap_or_default()),
        database: env::var("STORE_MIDDLEWARE_PG_DATABASE").ok(),
        ..ConnectionConfig::default()
    };
    Some(PgConnection::from_config(&config).expect("valid config"))
}

#[tokio::test]
async fn template_query_against_catalog() -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut db) = live_connection() else {
        eprintln!("STORE_MIDDLEWARE_PG_HOST not set; skipping");
        return Ok(());
    };

    let result = db
        .query(
            "select relname from {{ tbl(table) }} where relname in {{ instr(names) }} order by relname",
            Some(&params! { "table" => "pg_class", "names" => vec!["pg_class", "pg_type"] }),
        )
        .await?;

    assert_eq!(result.len(), 2);
    assert_eq!(result.rows()[0].get("relname"), Some(&Value::from("pg_class")));
    assert_eq!(result.rows()[1].get("relname"), Some(&Value::from("pg_type")));
    db.disconnect().await?;
    assert!(!db.is_connected());
    Ok(())
}

#[tokio::test]
async fn rows_affected_and_nulls() -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut db) = live_connection() else {
        return Ok(());
    };

    db.query("create temp table people (id int, name text)", None).await?;
    let inserted = db
        .query(
            "insert into people values ({{ int(a) }}, {{ str(b) }}), (2, null)",
            Some(&params! { "a" => 1, "b" => "O'Hara" }),
        )
        .await?;
    assert_eq!(inserted.affected_rows(), 2);

    let result = db.query("select id, name from people order by id", None).await?;
    assert_eq!(result.affected_rows(), 2);
    let names: Vec<_> = result.rows().iter().map(|row| row.get("name").cloned()).collect();
    assert_eq!(names, vec![Some(Value::from("O'Hara")), Some(Value::Null)]);
    Ok(())
}

#[tokio::test]
async fn deferred_transaction_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut db) = live_connection() else {
        return Ok(());
    };

    db.query("create temp table ledger (amount int)", None).await?;

    db.start();
    db.start();
    db.safe_query("insert into ledger values (10)", None).await?;
    assert_eq!(db.transaction_state().phase(), TxPhase::Started);
    db.complete().await?;
    assert_eq!(db.transaction_state().phase(), TxPhase::Started);
    db.abort().await?;
    assert_eq!(db.transaction_state().phase(), TxPhase::None);

    let result = db.query("select count(*) as n from ledger", None).await?;
    assert_eq!(result.first().and_then(|row| row.get("n")), Some(&Value::from("0")));

    db.start();
    db.safe_query("insert into ledger values (5)", None).await?;
    db.complete().await?;
    let result = db.query("select count(*) as n from ledger", None).await?;
    assert_eq!(result.first().and_then(|row| row.get("n")), Some(&Value::from("1")));
    Ok(())
}

#[tokio::test]
async fn server_errors_are_classified() -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut db) = live_connection() else {
        return Ok(());
    };

    let err = db
        .query("select * from store_middleware_missing_table", None)
        .await
        .unwrap_err();
    assert_eq!(err.query_kind(), Some(QueryErrorKind::UndefinedTable));

    db.query("create temp table uniq (id int primary key)", None).await?;
    db.query("insert into uniq values (1)", None).await?;
    let err = db.query("insert into uniq values (1)", None).await.unwrap_err();
    assert_eq!(err.query_kind(), Some(QueryErrorKind::DuplicateEntry));

    let err = db
        .query("do $$ begin raise exception 'boom'; end $$", None)
        .await
        .unwrap_err();
    assert_eq!(err.query_kind(), Some(QueryErrorKind::RaisedException));
    Ok(())
}
