// Redis driver:
// - connection: the `RedisConnection` driver, lazy connect, templated inline commands
// - commands: typed wrappers for strings, counters, bits, scripts, sets, lists and keys
// - transaction: WATCH plus the callback-driven MULTI/pipeline helper
// - transport: connector/session seam and the multiplexed tokio implementation
// - args: the server's inline-command argument splitter

mod args;
mod commands;
mod connection;
#[cfg(test)]
mod testing;
mod transaction;
mod transport;

pub use args::split_args;
pub use connection::{REPLY_COLUMN, RedisConnection, reply_value};
pub use transaction::TransactionHandle;
pub use transport::{MultiplexedConnector, RedisConnector, RedisSession};
