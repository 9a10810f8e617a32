//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types, traits and the `params!` macro.

pub use crate::config::ConnectionConfig;
pub use crate::connection::{Connection, Credentials, Endpoint};
pub use crate::error::{QueryErrorKind, StoreError};
pub use crate::params;
pub use crate::results::{QueryResult, ResultRow};
pub use crate::template::{
    Argument, Dialect, Function, Placeholder, PostgresDialect, RedisDialect, Template,
    TemplateCache,
};
pub use crate::transaction::{TransactionState, Transactional, TxPhase};
pub use crate::tx_outcome::{TransactionMode, TransactionOutcome};
pub use crate::types::{Params, RowLiteral, Value};

#[cfg(feature = "postgres")]
pub use crate::postgres::PgConnection;

#[cfg(feature = "redis")]
pub use crate::redis::{RedisConnection, TransactionHandle};
