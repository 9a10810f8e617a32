// PostgreSQL driver:
// - connection: the `PgConnection` driver, lazy connect, busy checkup, transactions
// - transport: connector/session seam and the tokio-postgres implementation
// - query: simple-query messages into `QueryResult`, SQLSTATE classification

mod connection;
pub mod query;
mod transport;

pub use connection::PgConnection;
pub use query::{build_query_result, classify_error};
pub use transport::{PgConnector, PgSession, TokioPgConnector};
