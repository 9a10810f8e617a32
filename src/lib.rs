//! Uniform connection lifecycle, nested transactions and escaped query templates over
//! PostgreSQL (`tokio-postgres`) and Redis (`redis`).
//!
//! ```rust,no_run
//! use store_middleware::prelude::*;
//!
//! # async fn demo() -> Result<(), StoreError> {
//! let config = ConnectionConfig::from_json(r#"{"host": "localhost", "port": 5432, "user": "postgres"}"#)?;
//! let mut db = PgConnection::from_config(&config)?;
//!
//! db.start();
//! let result = db
//!     .safe_query(
//!         "select relname from pg_class where relname in {{ instr(names) }}",
//!         Some(&params! { "names" => vec!["pg_class", "pg_type"] }),
//!     )
//!     .await?;
//! db.complete().await?;
//!
//! for row in &result {
//!     println!("{:?}", row.get("relname"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Backends are behind the `postgres` and `redis` features, both on by default.

#[macro_use]
mod macros;

pub mod config;
pub mod connection;
pub mod error;
pub mod prelude;
pub mod results;
pub mod template;
pub mod transaction;
pub mod tx_outcome;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis;

pub use config::ConnectionConfig;
pub use error::{QueryErrorKind, StoreError};
pub use types::{Params, RowLiteral, Value};
