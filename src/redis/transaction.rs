use std::ops::{Deref, DerefMut};

use redis::{Pipeline, Value as RedisValue};
use tracing::debug;

use super::connection::{RedisConnection, reply_value};
use crate::error::StoreError;
use crate::tx_outcome::{TransactionMode, TransactionOutcome};

/// Client-side command queue handed to a transaction callback.
///
/// Dereferences to [`redis::Pipeline`], so every command builder the `redis` crate offers is
/// available. Nothing is sent until the callback returns `true`.
///
/// ```rust,no_run
/// use store_middleware::prelude::*;
///
/// # async fn demo(conn: &mut RedisConnection) -> Result<(), StoreError> {
/// conn.watch(&["balance"]).await?;
/// let outcome = conn
///     .transaction(TransactionMode::Multi, |tx| {
///         tx.cmd("DECRBY").arg("balance").arg(10);
///         tx.cmd("INCRBY").arg("spent").arg(10);
///         true
///     })
///     .await?;
/// assert!(matches!(outcome, TransactionOutcome::Committed(_) | TransactionOutcome::Aborted));
/// # Ok(())
/// # }
/// ```
pub struct TransactionHandle {
    pipeline: Pipeline,
    mode: TransactionMode,
}

impl TransactionHandle {
    pub(crate) fn new(mode: TransactionMode) -> Self {
        let mut pipeline = redis::pipe();
        if mode == TransactionMode::Multi {
            pipeline.atomic();
        }
        Self {
            pipeline,
            mode,
        }
    }

    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Queue a command built elsewhere.
    pub fn add(&mut self, cmd: redis::Cmd) -> &mut Self {
        self.pipeline.add_command(cmd);
        self
    }

    /// True when nothing has been queued yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipeline.cmd_iter().next().is_none()
    }

    pub(crate) fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Deref for TransactionHandle {
    type Target = Pipeline;

    fn deref(&self) -> &Self::Target {
        &self.pipeline
    }
}

impl DerefMut for TransactionHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pipeline
    }
}

/// Optimistic transactions.
impl RedisConnection {
    /// `WATCH` keys for the next [`RedisConnection::transaction`].
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn watch(&mut self, keys: &[&str]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.request(redis::cmd("WATCH").arg(keys)).await?;
        self.watching = true;
        Ok(())
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn unwatch(&mut self) -> Result<(), StoreError> {
        self.request(&redis::cmd("UNWATCH")).await?;
        self.watching = false;
        Ok(())
    }

    /// Queue commands through `f` and send them only if it returns `true`.
    ///
    /// With [`TransactionMode::Multi`] the queue goes out wrapped in MULTI/EXEC, so a change to
    /// a watched key aborts it as a whole. With [`TransactionMode::Pipeline`] it goes out as a
    /// plain pipeline. Either way it is a single round trip. A `false` return discards the
    /// queue without contacting the server, beyond releasing any WATCH.
    ///
    /// # Errors
    /// Returns connection errors, or `StoreError::ImpossibleValue` when a queued command is
    /// rejected by the server.
    pub async fn transaction<F>(
        &mut self,
        mode: TransactionMode,
        f: F,
    ) -> Result<TransactionOutcome, StoreError>
    where
        F: FnOnce(&mut TransactionHandle) -> bool,
    {
        let mut handle = TransactionHandle::new(mode);
        if !f(&mut handle) {
            debug!(?mode, "transaction discarded");
            if self.watching {
                self.unwatch().await?;
            }
            return Ok(TransactionOutcome::Discarded);
        }
        if handle.is_empty() {
            // nothing goes out, so a WATCH stays in effect on the server
            debug!(?mode, "transaction committed with an empty queue");
            return Ok(TransactionOutcome::Committed(Vec::new()));
        }

        let reply = self.exchange_pipeline(handle.pipeline()).await?;
        if mode == TransactionMode::Multi {
            // EXEC releases every WATCH, whether it ran or not
            self.watching = false;
        }
        match reply? {
            RedisValue::Nil if mode == TransactionMode::Multi => {
                debug!("transaction aborted by a watched key");
                Ok(TransactionOutcome::Aborted)
            }
            RedisValue::Bulk(replies) => Ok(TransactionOutcome::Committed(
                replies.into_iter().map(reply_value).collect(),
            )),
            other => Ok(TransactionOutcome::Committed(vec![reply_value(other)])),
        }
    }
}
