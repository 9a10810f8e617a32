// Connection base shared by every backend driver:
// - endpoint: host/port/timeout/tries/persistence plus relational credentials
// - retry: the connect loop both drivers run through

mod endpoint;
mod retry;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::results::QueryResult;
use crate::types::Params;

pub use endpoint::{Credentials, DEFAULT_CONNECT_TRIES, Endpoint};
pub use retry::connect_with_retries;

/// Lifecycle and query capability every backend driver exposes.
///
/// ```rust,no_run
/// use store_middleware::prelude::*;
///
/// # async fn demo(conn: &mut PgConnection) -> Result<(), StoreError> {
/// conn.connect().await?;
/// let result = conn
///     .query(
///         "select count(*) from {{ tbl(table) }}",
///         Some(&params! { "table" => "pg_class" }),
///     )
///     .await?;
/// println!("{:?}", result.first());
/// conn.reconnect().await?;
/// conn.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Connection: Send {
    fn endpoint(&self) -> &Endpoint;

    fn endpoint_mut(&mut self) -> &mut Endpoint;

    /// Whether a backend handle is currently held.
    fn is_connected(&self) -> bool;

    /// Open the backend handle, retrying per the endpoint configuration.
    ///
    /// # Errors
    /// Returns `StoreError::NotConfigured` when required endpoint fields are missing, or
    /// `StoreError::ConnectionRetriesExhausted` when every attempt failed.
    async fn connect(&mut self) -> Result<(), StoreError>;

    /// Release the backend handle.
    ///
    /// # Errors
    /// Returns an error if the backend refuses to close cleanly.
    async fn disconnect(&mut self) -> Result<(), StoreError>;

    /// Disconnect, then connect again.
    ///
    /// # Errors
    /// Returns errors from either step.
    async fn reconnect(&mut self) -> Result<(), StoreError> {
        self.disconnect().await?;
        self.connect().await
    }

    /// Send `query` to the backend. With `Some(params)` the query is treated as a template and
    /// rendered with the driver's dialect first; with `None` it is sent verbatim.
    ///
    /// # Errors
    /// Returns template errors, connection errors or backend query errors.
    async fn query(
        &mut self,
        query: &str,
        params: Option<&Params>,
    ) -> Result<QueryResult, StoreError>;
}
