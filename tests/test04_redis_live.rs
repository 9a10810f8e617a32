#![cfg(feature = "redis")]

use std::env;
use std::time::Duration;

use store_middleware::prelude::*;
use store_middleware::redis::REPLY_COLUMN;

/// Connection to `database` on a real server, or `None` when `STORE_MIDDLEWARE_REDIS_HOST`
/// is unset. The database is flushed first; each test uses its own.
async fn live_connection(database: &str) -> Option<RedisConnection> {
    let host = env::var("STORE_MIDDLEWARE_REDIS_HOST").ok()?;
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let port: i64 = env::var("STORE_MIDDLEWARE_REDIS_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(6379);
    let config = ConnectionConfig {
        host: Some(host),
        port: Some(port),
        connect_timeout: Some(5.0),
        database: Some(database.into()),
        ..ConnectionConfig::default()
    };
    let mut redis = RedisConnection::from_config(&config).expect("valid config");
    redis.flush_database().await.expect("flush test database");
    Some(redis)
}

#[tokio::test]
async fn strings_and_counters() -> Result<(), StoreError> {
    let Some(mut redis) = live_connection("11").await else {
        eprintln!("STORE_MIDDLEWARE_REDIS_HOST not set; skipping");
        return Ok(());
    };

    assert!(redis.set("greeting", "hello", None).await?);
    assert_eq!(redis.get("greeting").await?, "hello");
    assert_eq!(redis.append("greeting", " world").await?, 11);
    assert!(matches!(redis.get("missing").await, Err(StoreError::KeyNotFound(_))));

    assert_eq!(redis.incr("hits", 1).await?, 1);
    assert_eq!(redis.incr("hits", 10).await?, 11);
    assert_eq!(redis.decr("hits", 2).await?, 9);

    assert!(redis.set("short", 1, Some(Duration::from_secs(30))).await?);
    let ttl = redis.ttl("short").await?.expect("ttl set");
    assert!(ttl <= Duration::from_secs(30));
    assert!(redis.persist("short").await?);
    assert_eq!(redis.ttl("short").await?, None);
    Ok(())
}

#[tokio::test]
async fn template_commands_reach_the_server() -> Result<(), StoreError> {
    let Some(mut redis) = live_connection("12").await else {
        return Ok(());
    };

    let result = redis
        .query(
            "SET {{ tbl(key) }} {{ str(value) }}",
            Some(&params! { "key" => "user 1", "value" => "say \"hi\"" }),
        )
        .await?;
    assert_eq!(result.len(), 1);
    assert_eq!(redis.get("user 1").await?, "say \"hi\"");

    let result = redis.query("RPUSH list a b c", None).await?;
    assert_eq!(result.affected_rows(), 3);
    let result = redis.query("LRANGE list 0 -1", None).await?;
    let values: Vec<_> = result.rows().iter().map(|row| row.get(REPLY_COLUMN).cloned()).collect();
    assert_eq!(
        values,
        vec![Some(Value::from("a")), Some(Value::from("b")), Some(Value::from("c"))]
    );
    Ok(())
}

#[tokio::test]
async fn watched_transaction_commits_or_aborts() -> Result<(), StoreError> {
    let Some(mut redis) = live_connection("13").await else {
        return Ok(());
    };
    let Some(mut other) = live_connection("13").await else {
        return Ok(());
    };

    redis.watch(&["balance"]).await?;
    let outcome = redis
        .transaction(TransactionMode::Multi, |tx| {
            tx.add(redis::cmd("SET").arg("balance").arg(100).clone());
            tx.add(redis::cmd("INCRBY").arg("balance").arg(5).clone());
            true
        })
        .await?;
    assert_eq!(outcome.replies().map(<[Value]>::len), Some(2));
    assert!(!redis.is_watching());

    redis.watch(&["balance"]).await?;
    other.set("balance", 0, None).await?;
    let outcome = redis
        .transaction(TransactionMode::Multi, |tx| {
            tx.add(redis::cmd("SET").arg("balance").arg(1).clone());
            true
        })
        .await?;
    assert_eq!(outcome, TransactionOutcome::Aborted);
    assert_eq!(redis.get("balance").await?, "0");

    redis.watch(&["balance"]).await?;
    let outcome = redis
        .transaction(TransactionMode::Pipeline, |_| false)
        .await?;
    assert_eq!(outcome, TransactionOutcome::Discarded);
    assert!(!redis.is_watching());
    Ok(())
}

#[tokio::test]
async fn scripts_and_sets() -> Result<(), StoreError> {
    let Some(mut redis) = live_connection("14").await else {
        return Ok(());
    };

    assert_eq!(redis.sadd("colors", vec!["red", "green", "blue"]).await?, 3);
    assert!(redis.sismember("colors", "red").await?);
    assert_eq!(redis.scard("colors").await?, 3);

    let reply = redis.evaluate("return KEYS[1]", &["colors"]).await?;
    assert_eq!(reply, Value::from("colors"));
    let err = redis.evaluate("return redis.call('nope')", &[] as &[&str]).await.unwrap_err();
    assert!(matches!(err, StoreError::ScriptExecution(_)));
    Ok(())
}
