use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Cmd, Pipeline, RedisResult, Value as RedisValue};

use crate::error::StoreError;

/// Opens sessions against a Redis server.
#[async_trait]
pub trait RedisConnector: Send + Sync {
    /// # Errors
    /// Returns `StoreError::Connect` when the server cannot be reached, or
    /// `StoreError::InvalidConfiguration` when `url` is malformed.
    async fn connect(&self, url: &str) -> Result<Box<dyn RedisSession>, StoreError>;
}

/// One open Redis session. Replies are returned raw; the driver decides how to read them.
#[async_trait]
pub trait RedisSession: Send {
    async fn request(&mut self, cmd: &Cmd) -> RedisResult<RedisValue>;

    /// Send every queued command in one round trip. Atomic pipelines come back as the EXEC
    /// reply, which is `Nil` when a watched key changed.
    async fn request_pipeline(&mut self, pipeline: &Pipeline) -> RedisResult<RedisValue>;
}

/// Connector backed by the `redis` crate's multiplexed tokio connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiplexedConnector;

#[async_trait]
impl RedisConnector for MultiplexedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RedisSession>, StoreError> {
        let client = Client::open(url)
            .map_err(|e| StoreError::InvalidConfiguration(format!("bad redis url: {e}")))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Box::new(MultiplexedSession { connection }))
    }
}

struct MultiplexedSession {
    connection: MultiplexedConnection,
}

#[async_trait]
impl RedisSession for MultiplexedSession {
    async fn request(&mut self, cmd: &Cmd) -> RedisResult<RedisValue> {
        cmd.query_async(&mut self.connection).await
    }

    async fn request_pipeline(&mut self, pipeline: &Pipeline) -> RedisResult<RedisValue> {
        pipeline.query_async(&mut self.connection).await
    }
}
