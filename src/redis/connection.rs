use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use redis::{Cmd, FromRedisValue, Pipeline, RedisResult, Value as RedisValue};
use tracing::{debug, info, trace, warn};

use super::args::split_args;
use super::transport::{MultiplexedConnector, RedisConnector, RedisSession};
use crate::config::ConnectionConfig;
use crate::connection::{Connection, Endpoint, connect_with_retries};
use crate::error::{StoreError, is_transport_error};
use crate::results::QueryResult;
use crate::template::{RedisDialect, TemplateCache};
use crate::types::{Params, Value};

/// Column holding each reply element in results of [`Connection::query`].
pub const REPLY_COLUMN: &str = "value";

/// Redis driver over a single multiplexed connection.
///
/// Typed commands live in their own `impl` blocks; [`Connection::query`] accepts a templated
/// inline command line instead.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use store_middleware::prelude::*;
///
/// # async fn demo() -> Result<(), StoreError> {
/// let mut endpoint = Endpoint::new();
/// endpoint.set_host("localhost")?.set_port(6379)?;
/// let mut cache = RedisConnection::new(endpoint);
///
/// cache.set("greeting", "hello", Some(Duration::from_millis(1500))).await?;
/// assert_eq!(cache.get("greeting").await?, "hello");
/// let result = cache
///     .query("GET {{ tbl(key) }}", Some(&params! { "key" => "greeting" }))
///     .await?;
/// assert_eq!(result.first().and_then(|row| row.get("value")), Some(&Value::from("hello")));
/// # Ok(())
/// # }
/// ```
pub struct RedisConnection {
    endpoint: Endpoint,
    pub(super) database: i64,
    connector: Arc<dyn RedisConnector>,
    session: Option<Box<dyn RedisSession>>,
    pub(super) watching: bool,
    templates: TemplateCache,
}

impl fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnection")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("connected", &self.session.is_some())
            .field("watching", &self.watching)
            .finish_non_exhaustive()
    }
}

impl RedisConnection {
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_connector(endpoint, Arc::new(MultiplexedConnector))
    }

    #[must_use]
    pub fn with_connector(endpoint: Endpoint, connector: Arc<dyn RedisConnector>) -> Self {
        Self {
            endpoint,
            database: 0,
            connector,
            session: None,
            watching: false,
            templates: TemplateCache::default(),
        }
    }

    /// Build a not-yet-connected driver from a config mapping; `database` selects the index.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` for a missing or invalid endpoint or a
    /// non-numeric database.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, StoreError> {
        let mut conn = Self::new(config.to_endpoint()?);
        if let Some(database) = config.database_index()? {
            conn.database = database;
        }
        Ok(conn)
    }

    /// Database index used for new connections.
    #[must_use]
    pub fn database(&self) -> i64 {
        self.database
    }

    /// Whether WATCH is in effect on the current connection.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watching
    }

    fn url(&self) -> Result<String, StoreError> {
        let port = match self.endpoint.port() {
            Some(port) if self.endpoint.is_configured() => port,
            _ => {
                return Err(StoreError::NotConfigured(
                    "redis host and port must both be set".to_string(),
                ));
            }
        };
        let host = self.endpoint.host();
        if host.contains(':') && !host.starts_with('[') {
            Ok(format!("redis://[{host}]:{port}/{}", self.database))
        } else {
            Ok(format!("redis://{host}:{port}/{}", self.database))
        }
    }

    async fn ensure_connected(&mut self) -> Result<(), StoreError> {
        if self.session.is_none() {
            self.connect().await?;
        }
        Ok(())
    }

    fn session(&mut self) -> Result<&mut Box<dyn RedisSession>, StoreError> {
        self.session
            .as_mut()
            .ok_or_else(|| StoreError::Connect("redis session is not open".to_string()))
    }

    fn forget_session_on<T>(&mut self, reply: &RedisResult<T>) {
        if let Err(err) = reply
            && is_transport_error(err)
        {
            warn!(error = %err, "redis session lost");
            self.session = None;
            self.watching = false;
        }
    }

    /// Send `cmd` and hand back the raw reply, server errors included. The outer error covers
    /// configuration and connect failures only.
    pub(super) async fn exchange(
        &mut self,
        cmd: &Cmd,
    ) -> Result<RedisResult<RedisValue>, StoreError> {
        self.ensure_connected().await?;
        let reply = self.session()?.request(cmd).await;
        self.forget_session_on(&reply);
        Ok(reply)
    }

    pub(super) async fn exchange_pipeline(
        &mut self,
        pipeline: &Pipeline,
    ) -> Result<RedisResult<RedisValue>, StoreError> {
        self.ensure_connected().await?;
        let reply = self.session()?.request_pipeline(pipeline).await;
        self.forget_session_on(&reply);
        Ok(reply)
    }

    pub(super) async fn request(&mut self, cmd: &Cmd) -> Result<RedisValue, StoreError> {
        Ok(self.exchange(cmd).await??)
    }

    pub(super) async fn fetch<T: FromRedisValue>(&mut self, cmd: &Cmd) -> Result<T, StoreError> {
        let reply = self.request(cmd).await?;
        Ok(redis::from_redis_value(&reply)?)
    }

    /// Integer-or-status replies read as a yes/no answer.
    pub(super) async fn flag(&mut self, cmd: &Cmd) -> Result<bool, StoreError> {
        let reply = self.request(cmd).await?;
        flag_reply(&reply)
    }

    fn render(&mut self, query: &str, params: Option<&Params>) -> Result<String, StoreError> {
        match params {
            Some(params) => self
                .templates
                .get_or_parse(query)?
                .render(params, &RedisDialect),
            None => Ok(query.to_string()),
        }
    }
}

#[async_trait]
impl Connection for RedisConnection {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn endpoint_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn connect(&mut self) -> Result<(), StoreError> {
        let url = self.url()?;
        let connector = Arc::clone(&self.connector);
        let session = connect_with_retries(&self.endpoint, |_| {
            let connector = Arc::clone(&connector);
            let url = url.clone();
            async move { connector.connect(&url).await }
        })
        .await?;

        self.session = Some(session);
        self.watching = false;
        info!(host = self.endpoint.host(), port = ?self.endpoint.port(), database = self.database, "redis connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), StoreError> {
        if self.endpoint.is_persistent() {
            debug!(host = self.endpoint.host(), "keeping persistent redis connection open");
            return Ok(());
        }
        if self.session.take().is_some() {
            info!(host = self.endpoint.host(), "redis disconnected");
        }
        self.watching = false;
        Ok(())
    }

    async fn query(
        &mut self,
        query: &str,
        params: Option<&Params>,
    ) -> Result<QueryResult, StoreError> {
        let line = self.render(query, params)?;
        let args = split_args(&line)?;
        if args.is_empty() {
            return Err(StoreError::template_parse(0, "empty redis command"));
        }

        let mut cmd = Cmd::new();
        for arg in args {
            cmd.arg(arg);
        }
        trace!(command = %line, "redis query");
        let reply = self.request(&cmd).await?;
        Ok(reply_result(reply))
    }
}

/// Convert a raw reply into a crate [`Value`]; bulk strings become (lossy UTF-8) text.
#[must_use]
pub fn reply_value(reply: RedisValue) -> Value {
    match reply {
        RedisValue::Nil => Value::Null,
        RedisValue::Int(n) => Value::Int(n),
        RedisValue::Data(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
        RedisValue::Bulk(items) => Value::List(items.into_iter().map(reply_value).collect()),
        RedisValue::Status(status) => Value::Text(status),
        RedisValue::Okay => Value::Text("OK".to_string()),
    }
}

/// Integer replies count as affected rows; everything else becomes rows of [`REPLY_COLUMN`].
fn reply_result(reply: RedisValue) -> QueryResult {
    let columns = || vec![REPLY_COLUMN.to_string()];
    match reply {
        RedisValue::Nil => QueryResult::empty(0),
        RedisValue::Int(n) => QueryResult::new(
            u64::try_from(n).unwrap_or(0),
            columns(),
            vec![vec![Value::Int(n)]],
        ),
        RedisValue::Bulk(items) => {
            let rows: Vec<Vec<Value>> = items
                .into_iter()
                .map(|item| vec![reply_value(item)])
                .collect();
            let affected = u64::try_from(rows.len()).unwrap_or(u64::MAX);
            QueryResult::new(affected, columns(), rows)
        }
        other => QueryResult::new(1, columns(), vec![vec![reply_value(other)]]),
    }
}

pub(super) fn flag_reply(reply: &RedisValue) -> Result<bool, StoreError> {
    match reply {
        RedisValue::Nil => Ok(false),
        RedisValue::Okay => Ok(true),
        RedisValue::Int(n) => Ok(*n != 0),
        RedisValue::Status(status) => Ok(status == "OK"),
        RedisValue::Data(bytes) => match bytes.as_slice() {
            b"1" | b"OK" => Ok(true),
            b"0" => Ok(false),
            _ => Err(StoreError::ImpossibleValue(format!(
                "expected a yes/no reply, got {:?}",
                String::from_utf8_lossy(bytes)
            ))),
        },
        RedisValue::Bulk(_) => Err(StoreError::ImpossibleValue(
            "expected a yes/no reply, got an array".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use crate::redis::testing::{FakeRedis, data};

    #[tokio::test]
    async fn query_renders_splits_and_wraps_reply() {
        let fake = FakeRedis::new(|args| match args[0].as_str() {
            "GET" => Ok(data("hello world")),
            _ => Ok(RedisValue::Okay),
        });
        let mut conn = fake.connection();

        let result = conn
            .query(
                "SET {{ tbl(key) }} {{ str(value) }}",
                Some(&params! { "key" => "k 1", "value" => "hello \"world\"" }),
            )
            .await
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
        assert_eq!(result.first().unwrap().get(REPLY_COLUMN), Some(&Value::from("OK")));

        let got = conn.query("GET plain", None).await.unwrap();
        assert_eq!(got.first().unwrap().get("value"), Some(&Value::from("hello world")));

        assert_eq!(
            fake.sent(),
            vec![
                vec!["SET".to_string(), "k 1".into(), "hello \"world\"".into()],
                vec!["GET".to_string(), "plain".into()],
            ]
        );
    }

    #[tokio::test]
    async fn integer_and_array_replies() {
        let fake = FakeRedis::new(|args| match args[0].as_str() {
            "DEL" => Ok(RedisValue::Int(2)),
            "KEYS" => Ok(RedisValue::Bulk(vec![data("a"), data("b"), RedisValue::Nil])),
            _ => Ok(RedisValue::Nil),
        });
        let mut conn = fake.connection();

        let deleted = conn.query("DEL a b", None).await.unwrap();
        assert_eq!(deleted.affected_rows(), 2);

        let keys = conn.query("KEYS *", None).await.unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys.rows()[2].get("value"), Some(&Value::Null));

        let missing = conn.query("GET nope", None).await.unwrap();
        assert!(missing.is_empty());
        assert_eq!(missing.affected_rows(), 0);
    }

    #[tokio::test]
    async fn malformed_command_lines_fail_before_sending() {
        let fake = FakeRedis::ok();
        let mut conn = fake.connection();
        assert!(matches!(
            conn.query("GET \"open", None).await,
            Err(StoreError::TemplateParse { .. })
        ));
        assert!(matches!(
            conn.query("   ", None).await,
            Err(StoreError::TemplateParse { .. })
        ));
        assert!(fake.sent().is_empty());
    }

    #[tokio::test]
    async fn requires_host_and_port() {
        let fake = FakeRedis::ok();
        let mut endpoint = Endpoint::new();
        endpoint.set_host("localhost").unwrap();
        let mut conn = RedisConnection::with_connector(endpoint, Arc::new(fake.clone()));
        assert!(matches!(
            conn.query("PING", None).await,
            Err(StoreError::NotConfigured(_))
        ));
        assert!(fake.urls().is_empty());
    }

    #[tokio::test]
    async fn url_carries_database_and_brackets_ipv6() {
        let fake = FakeRedis::ok();
        let mut endpoint = Endpoint::new();
        endpoint.set_host("::1").unwrap().set_port(6380).unwrap();
        let mut conn = RedisConnection::with_connector(endpoint, Arc::new(fake.clone()));
        conn.select(3).await.unwrap();
        conn.reconnect().await.unwrap();
        assert_eq!(
            fake.urls(),
            vec!["redis://[::1]:6380/0".to_string(), "redis://[::1]:6380/3".to_string()]
        );
        assert_eq!(fake.sent(), vec![vec!["SELECT".to_string(), "3".into()]]);
    }

    #[tokio::test]
    async fn connect_retries_then_gives_up() {
        let fake = FakeRedis::ok().failing_connects(5);
        let mut conn = fake.connection();
        conn.endpoint_mut().set_connect_tries(3).unwrap();
        assert!(matches!(
            conn.connect().await,
            Err(StoreError::ConnectionRetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(fake.urls().len(), 3);

        conn.connect().await.unwrap();
        assert_eq!(fake.urls().len(), 6);
    }

    #[tokio::test]
    async fn persistent_disconnect_keeps_session() {
        let fake = FakeRedis::ok();
        let mut conn = fake.connection();
        conn.endpoint_mut().set_persistent(true);
        conn.connect().await.unwrap();
        conn.disconnect().await.unwrap();
        assert!(conn.is_connected());

        conn.endpoint_mut().set_persistent(false);
        conn.disconnect().await.unwrap();
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn transport_failure_drops_session() {
        let fake = FakeRedis::new(|_| {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into())
        });
        let mut conn = fake.connection();
        let err = conn.query("PING", None).await.unwrap_err();
        assert!(err.is_connect_error());
        assert!(!conn.is_connected());
    }

    #[test]
    fn from_config_reads_database_index() {
        let config =
            ConnectionConfig::from_json(r#"{"host": "cache", "port": 6379, "database": "2"}"#)
                .unwrap();
        let conn = RedisConnection::from_config(&config).unwrap();
        assert_eq!(conn.database(), 2);
        assert_eq!(conn.url().unwrap(), "redis://cache:6379/2");
    }

    #[test]
    fn flag_replies() {
        assert!(flag_reply(&RedisValue::Okay).unwrap());
        assert!(flag_reply(&RedisValue::Int(1)).unwrap());
        assert!(!flag_reply(&RedisValue::Int(0)).unwrap());
        assert!(!flag_reply(&RedisValue::Nil).unwrap());
        assert!(flag_reply(&data("1")).unwrap());
        assert!(flag_reply(&data("maybe")).is_err());
    }
}
