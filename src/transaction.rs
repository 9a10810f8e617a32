use async_trait::async_trait;
use tracing::debug;

use crate::connection::Connection;
use crate::error::StoreError;
use crate::results::QueryResult;
use crate::types::Params;

/// Where a connection's logical transaction currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxPhase {
    /// No transaction requested
    #[default]
    None,
    /// `start()` was called but nothing has been sent to the backend yet
    Scheduled,
    /// BEGIN went out with the first query after `start()`
    Started,
}

/// Nested start/accept/cancel bookkeeping.
///
/// BEGIN is deferred until a query actually runs, so a scope that never touches the backend
/// costs nothing. `accept` and `cancel` only act while the transaction is still
/// [`TxPhase::Scheduled`]; once it has [`TxPhase::Started`] closing it is up to the driver
/// (see [`Transactional::complete`] and [`Transactional::abort`]).
///
/// ```rust
/// use store_middleware::prelude::*;
///
/// let mut state = TransactionState::new();
/// state.start();
/// state.start();
/// state.accept();
/// assert_eq!(state.phase(), TxPhase::Scheduled);
/// assert_eq!(state.depth(), 1);
/// state.accept();
/// assert_eq!(state.phase(), TxPhase::None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionState {
    phase: TxPhase,
    depth: u32,
}

impl TransactionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> TxPhase {
        self.phase
    }

    /// Number of outstanding `start()` calls.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn start(&mut self) {
        match self.phase {
            TxPhase::None => {
                self.phase = TxPhase::Scheduled;
                self.depth = 1;
            }
            TxPhase::Scheduled | TxPhase::Started => self.depth += 1,
        }
    }

    pub fn accept(&mut self) {
        if self.phase == TxPhase::Scheduled {
            self.depth = self.depth.saturating_sub(1);
            if self.depth == 0 {
                self.reset();
            }
        }
    }

    /// Drop the scheduled transaction entirely, whatever the nesting depth.
    pub fn cancel(&mut self) {
        if self.phase == TxPhase::Scheduled {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.phase = TxPhase::None;
        self.depth = 0;
    }

    pub(crate) fn mark_started(&mut self) {
        self.phase = TxPhase::Started;
    }

    /// Close one level of a started transaction; true when the outermost level closed.
    pub(crate) fn release(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }
}

/// Backends able to run BEGIN/COMMIT/ROLLBACK on top of their [`Connection`].
#[async_trait]
pub trait Transactional: Connection {
    fn transaction_state(&self) -> &TransactionState;

    fn transaction_state_mut(&mut self) -> &mut TransactionState;

    /// # Errors
    /// Returns backend errors from the BEGIN statement.
    async fn begin(&mut self) -> Result<(), StoreError>;

    /// # Errors
    /// Returns backend errors from the COMMIT statement.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// # Errors
    /// Returns backend errors from the ROLLBACK statement.
    async fn rollback(&mut self) -> Result<(), StoreError>;

    fn start(&mut self) {
        self.transaction_state_mut().start();
    }

    fn accept(&mut self) {
        self.transaction_state_mut().accept();
    }

    fn cancel(&mut self) {
        self.transaction_state_mut().cancel();
    }

    /// Like [`Connection::query`], but issues the deferred BEGIN first when a transaction is
    /// scheduled.
    ///
    /// # Errors
    /// Returns errors from BEGIN or from the query itself.
    async fn safe_query(
        &mut self,
        query: &str,
        params: Option<&Params>,
    ) -> Result<QueryResult, StoreError> {
        if self.transaction_state().phase() == TxPhase::Scheduled {
            debug!("issuing deferred BEGIN");
            self.begin().await?;
            self.transaction_state_mut().mark_started();
        }
        self.query(query, params).await
    }

    /// Close one transaction scope successfully. A started transaction is committed when its
    /// outermost scope closes; a scheduled one is simply accepted.
    ///
    /// # Errors
    /// Returns backend errors from COMMIT; the state is left untouched in that case.
    async fn complete(&mut self) -> Result<(), StoreError> {
        if self.transaction_state().phase() != TxPhase::Started {
            self.accept();
            return Ok(());
        }
        if self.transaction_state().depth() > 1 {
            self.transaction_state_mut().release();
            return Ok(());
        }
        self.commit().await?;
        self.transaction_state_mut().reset();
        Ok(())
    }

    /// Abandon the transaction at any depth. A started transaction is rolled back; a scheduled
    /// one is cancelled.
    ///
    /// # Errors
    /// Returns backend errors from ROLLBACK; the state is reset regardless.
    async fn abort(&mut self) -> Result<(), StoreError> {
        if self.transaction_state().phase() != TxPhase::Started {
            self.cancel();
            return Ok(());
        }
        let outcome = self.rollback().await;
        self.transaction_state_mut().reset();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Endpoint;

    #[derive(Default)]
    struct RecordingBackend {
        endpoint: Endpoint,
        state: TransactionState,
        sent: Vec<String>,
        fail_begin: bool,
    }

    #[async_trait]
    impl Connection for RecordingBackend {
        fn endpoint(&self) -> &Endpoint {
            &self.endpoint
        }

        fn endpoint_mut(&mut self) -> &mut Endpoint {
            &mut self.endpoint
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn connect(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn query(
            &mut self,
            query: &str,
            _params: Option<&Params>,
        ) -> Result<QueryResult, StoreError> {
            if query == "BEGIN" && self.fail_begin {
                return Err(StoreError::Connect("gone".into()));
            }
            self.sent.push(query.to_string());
            Ok(QueryResult::empty(0))
        }
    }

    #[async_trait]
    impl Transactional for RecordingBackend {
        fn transaction_state(&self) -> &TransactionState {
            &self.state
        }

        fn transaction_state_mut(&mut self) -> &mut TransactionState {
            &mut self.state
        }

        async fn begin(&mut self) -> Result<(), StoreError> {
            self.query("BEGIN", None).await.map(|_| ())
        }

        async fn commit(&mut self) -> Result<(), StoreError> {
            self.query("COMMIT", None).await.map(|_| ())
        }

        async fn rollback(&mut self) -> Result<(), StoreError> {
            self.query("ROLLBACK", None).await.map(|_| ())
        }
    }

    #[test]
    fn nested_accept_closes_outer_scope_last() {
        let mut state = TransactionState::new();
        state.start();
        state.start();
        state.accept();
        assert_eq!(state.phase(), TxPhase::Scheduled);
        assert_eq!(state.depth(), 1);
        state.accept();
        assert_eq!(state.phase(), TxPhase::None);
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn cancel_resets_regardless_of_depth() {
        let mut state = TransactionState::new();
        for _ in 0..5 {
            state.start();
        }
        state.cancel();
        assert_eq!(state, TransactionState::new());
    }

    #[test]
    fn accept_and_cancel_are_noops_without_transaction() {
        let mut state = TransactionState::new();
        state.accept();
        state.cancel();
        assert_eq!(state.phase(), TxPhase::None);
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn accept_and_cancel_are_noops_once_started() {
        let mut state = TransactionState::new();
        state.start();
        state.mark_started();
        state.accept();
        state.cancel();
        assert_eq!(state.phase(), TxPhase::Started);
        assert_eq!(state.depth(), 1);
        state.start();
        assert_eq!(state.depth(), 2);
    }

    #[tokio::test]
    async fn safe_query_without_transaction_sends_query_only() {
        let mut backend = RecordingBackend::default();
        backend.safe_query("select 1", None).await.unwrap();
        assert_eq!(backend.sent, vec!["select 1"]);
    }

    #[tokio::test]
    async fn deferred_begin_goes_out_once() {
        let mut backend = RecordingBackend::default();
        backend.start();
        assert!(backend.sent.is_empty());
        backend.safe_query("insert 1", None).await.unwrap();
        backend.safe_query("insert 2", None).await.unwrap();
        assert_eq!(backend.sent, vec!["BEGIN", "insert 1", "insert 2"]);
        assert_eq!(backend.transaction_state().phase(), TxPhase::Started);
    }

    #[tokio::test]
    async fn failed_begin_keeps_transaction_scheduled() {
        let mut backend = RecordingBackend {
            fail_begin: true,
            ..RecordingBackend::default()
        };
        backend.start();
        assert!(backend.safe_query("insert 1", None).await.is_err());
        assert_eq!(backend.transaction_state().phase(), TxPhase::Scheduled);
        assert!(backend.sent.is_empty());
    }

    #[tokio::test]
    async fn complete_commits_when_outermost_scope_closes() {
        let mut backend = RecordingBackend::default();
        backend.start();
        backend.start();
        backend.safe_query("update t", None).await.unwrap();
        backend.complete().await.unwrap();
        assert_eq!(backend.sent, vec!["BEGIN", "update t"]);
        backend.complete().await.unwrap();
        assert_eq!(backend.sent, vec!["BEGIN", "update t", "COMMIT"]);
        assert_eq!(backend.transaction_state().phase(), TxPhase::None);
    }

    #[tokio::test]
    async fn complete_on_unstarted_transaction_sends_nothing() {
        let mut backend = RecordingBackend::default();
        backend.start();
        backend.complete().await.unwrap();
        assert!(backend.sent.is_empty());
        assert_eq!(backend.transaction_state().phase(), TxPhase::None);
    }

    #[tokio::test]
    async fn abort_rolls_back_started_transaction() {
        let mut backend = RecordingBackend::default();
        backend.start();
        backend.start();
        backend.safe_query("delete from t", None).await.unwrap();
        backend.abort().await.unwrap();
        assert_eq!(backend.sent, vec!["BEGIN", "delete from t", "ROLLBACK"]);
        assert_eq!(backend.transaction_state(), &TransactionState::new());
    }
}
