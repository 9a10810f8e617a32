use async_trait::async_trait;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, warn};

use super::query::{build_query_result, classify_error};
use crate::error::StoreError;
use crate::results::QueryResult;

/// Opens sessions against a PostgreSQL server.
///
/// [`PgConnection`](super::PgConnection) only talks to the server through this seam, so tests
/// can substitute an in-memory backend.
#[async_trait]
pub trait PgConnector: Send + Sync {
    /// # Errors
    /// Returns `StoreError::Connect` when the server cannot be reached or refuses the login.
    async fn connect(&self, config: &Config) -> Result<Box<dyn PgSession>, StoreError>;
}

/// One open PostgreSQL session.
#[async_trait]
pub trait PgSession: Send {
    /// Run `query` with the simple-query protocol.
    ///
    /// # Errors
    /// Returns classified query errors, or `StoreError::Connect` when the session broke.
    async fn simple_query(&mut self, query: &str) -> Result<QueryResult, StoreError>;

    fn is_closed(&self) -> bool;
}

/// Plain TCP connector built on `tokio-postgres`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPgConnector;

#[async_trait]
impl PgConnector for TokioPgConnector {
    async fn connect(&self, config: &Config) -> Result<Box<dyn PgSession>, StoreError> {
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        // The connection future drives the socket; it resolves once the client is dropped.
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection ended with error");
            } else {
                debug!("postgres connection closed");
            }
        });

        Ok(Box::new(TokioPgSession { client }))
    }
}

struct TokioPgSession {
    client: Client,
}

#[async_trait]
impl PgSession for TokioPgSession {
    async fn simple_query(&mut self, query: &str) -> Result<QueryResult, StoreError> {
        let messages = self
            .client
            .simple_query(query)
            .await
            .map_err(|e| classify_error(&e, query))?;
        Ok(build_query_result(messages))
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}
