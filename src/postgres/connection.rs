use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::Config;
use tracing::{debug, info, trace, warn};

use super::transport::{PgConnector, PgSession, TokioPgConnector};
use crate::config::ConnectionConfig;
use crate::connection::{Connection, Credentials, Endpoint, connect_with_retries};
use crate::error::StoreError;
use crate::results::QueryResult;
use crate::template::{PostgresDialect, TemplateCache};
use crate::transaction::{Transactional, TransactionState, TxPhase};
use crate::types::Params;

/// PostgreSQL driver: one session, lazily opened, queried with rendered templates.
///
/// ```rust,no_run
/// use store_middleware::prelude::*;
///
/// # async fn demo() -> Result<(), StoreError> {
/// let mut endpoint = Endpoint::new();
/// endpoint.set_host("localhost")?.set_port(5432)?;
/// let mut credentials = Credentials::new();
/// credentials.set_user_name("postgres").set_database("postgres");
///
/// let mut conn = PgConnection::new(endpoint, credentials);
/// conn.start();
/// conn.safe_query(
///     "insert into audit (who) values ({{ str(who) }})",
///     Some(&params! { "who" => "me" }),
/// )
/// .await?;
/// conn.complete().await?;
/// # Ok(())
/// # }
/// ```
pub struct PgConnection {
    endpoint: Endpoint,
    credentials: Credentials,
    busy_checkup: bool,
    connector: Arc<dyn PgConnector>,
    session: Option<Box<dyn PgSession>>,
    in_flight: bool,
    transaction: TransactionState,
    templates: TemplateCache,
}

impl fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnection")
            .field("endpoint", &self.endpoint)
            .field("user_name", &self.credentials.user_name())
            .field("database", &self.credentials.database())
            .field("busy_checkup", &self.busy_checkup)
            .field("connected", &self.session.is_some())
            .field("in_flight", &self.in_flight)
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

impl PgConnection {
    #[must_use]
    pub fn new(endpoint: Endpoint, credentials: Credentials) -> Self {
        Self::with_connector(endpoint, credentials, Arc::new(TokioPgConnector))
    }

    /// Build a driver that opens its sessions through `connector`.
    #[must_use]
    pub fn with_connector(
        endpoint: Endpoint,
        credentials: Credentials,
        connector: Arc<dyn PgConnector>,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            busy_checkup: false,
            connector,
            session: None,
            in_flight: false,
            transaction: TransactionState::new(),
            templates: TemplateCache::default(),
        }
    }

    /// Build a not-yet-connected driver from a config mapping.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` when the endpoint part is missing or invalid.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, StoreError> {
        let mut conn = Self::new(config.to_endpoint()?, config.credentials());
        conn.set_busy_checkup(config.busy_checkup);
        Ok(conn)
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn credentials_mut(&mut self) -> &mut Credentials {
        &mut self.credentials
    }

    /// Refuse new queries while a previous one never finished.
    pub fn set_busy_checkup(&mut self, enabled: bool) -> &mut Self {
        self.busy_checkup = enabled;
        self
    }

    #[must_use]
    pub fn busy_checkup(&self) -> bool {
        self.busy_checkup
    }

    /// True while a query was sent and its response not yet consumed, including when the
    /// caller dropped the query future part-way.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    fn pg_config(&self) -> Result<Config, StoreError> {
        if self.endpoint.host().is_empty() {
            return Err(StoreError::NotConfigured(
                "postgres host is not set".to_string(),
            ));
        }
        let mut config = Config::new();
        config.host(self.endpoint.host());
        if let Some(port) = self.endpoint.port() {
            config.port(port);
        }
        if self.credentials.has_user_name() {
            config.user(self.credentials.user_name());
        }
        if self.credentials.has_password() {
            config.password(self.credentials.password());
        }
        if self.credentials.has_database() {
            config.dbname(self.credentials.database());
        }
        Ok(config)
    }

    async fn ensure_connected(&mut self) -> Result<(), StoreError> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect().await
    }

    fn render(&mut self, query: &str, params: Option<&Params>) -> Result<String, StoreError> {
        match params {
            Some(params) => self
                .templates
                .get_or_parse(query)?
                .render(params, &PostgresDialect),
            None => Ok(query.to_string()),
        }
    }
}

#[async_trait]
impl Connection for PgConnection {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn endpoint_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.is_closed())
    }

    async fn connect(&mut self) -> Result<(), StoreError> {
        let config = self.pg_config()?;
        if self.transaction.phase() == TxPhase::Started {
            warn!("opening a new session inside a started transaction; the transaction is dropped");
            self.transaction.reset();
        }
        let connector = Arc::clone(&self.connector);
        let session = connect_with_retries(&self.endpoint, |_| {
            let connector = Arc::clone(&connector);
            let config = config.clone();
            async move { connector.connect(&config).await }
        })
        .await?;

        self.session = Some(session);
        self.in_flight = false;
        info!(host = self.endpoint.host(), port = ?self.endpoint.port(), "postgres connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), StoreError> {
        if self.session.take().is_some() {
            info!(host = self.endpoint.host(), "postgres disconnected");
        }
        self.in_flight = false;
        if self.transaction.phase() == TxPhase::Started {
            warn!("disconnecting inside a started transaction; the server rolls it back");
            self.transaction.reset();
        }
        Ok(())
    }

    async fn query(
        &mut self,
        query: &str,
        params: Option<&Params>,
    ) -> Result<QueryResult, StoreError> {
        let sql = self.render(query, params)?;
        if self.transaction.phase() == TxPhase::Started && !self.is_connected() {
            // a fresh session would run outside the BEGIN that was sent
            return Err(StoreError::Connect(
                "postgres session lost inside a started transaction; abort it first".to_string(),
            ));
        }
        self.ensure_connected().await?;

        if self.in_flight {
            if self.busy_checkup {
                return Err(StoreError::ConnectionBusy);
            }
            debug!("previous postgres query never completed; sending anyway");
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| StoreError::Connect("postgres session is not open".to_string()))?;

        trace!(query = %sql, "postgres query");
        self.in_flight = true;
        let outcome = session.simple_query(&sql).await;
        self.in_flight = false;

        if let Err(err) = &outcome
            && err.is_connect_error()
        {
            warn!(
                error = %err,
                in_transaction = self.transaction.phase() == TxPhase::Started,
                "postgres session lost"
            );
            self.session = None;
        }
        outcome
    }
}

#[async_trait]
impl Transactional for PgConnection {
    fn transaction_state(&self) -> &TransactionState {
        &self.transaction
    }

    fn transaction_state_mut(&mut self) -> &mut TransactionState {
        &mut self.transaction
    }

    async fn begin(&mut self) -> Result<(), StoreError> {
        self.query("BEGIN", None).await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.query("COMMIT", None).await.map(|_| ())
    }

    /// A lost session needs no ROLLBACK: the server discarded the transaction with it.
    async fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.is_connected() {
            debug!("no session to roll back; the server already dropped the transaction");
            return Ok(());
        }
        self.query("ROLLBACK", None).await.map(|_| ())
    }
}
