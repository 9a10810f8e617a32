use crate::types::Value;

/// How queued cache-store commands are sent when a transaction callback commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Wrapped in MULTI/EXEC; all or nothing, honouring WATCH
    #[default]
    Multi,
    /// Plain pipeline; one round trip, no atomicity
    Pipeline,
}

/// Outcome of a callback-driven cache-store transaction.
///
/// A discarded transaction never reached the server. An aborted one did, but EXEC refused to
/// run because a watched key changed in the meantime.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOutcome {
    /// The callback returned `false`; nothing was sent
    Discarded,
    /// EXEC returned nil
    Aborted,
    /// One reply per queued command, in queue order
    Committed(Vec<Value>),
}

impl TransactionOutcome {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionOutcome::Committed(_))
    }

    /// Borrow the replies of a committed transaction.
    #[must_use]
    pub fn replies(&self) -> Option<&[Value]> {
        match self {
            TransactionOutcome::Committed(replies) => Some(replies),
            TransactionOutcome::Discarded | TransactionOutcome::Aborted => None,
        }
    }

    /// Consume the outcome and take the replies, if committed.
    pub fn into_replies(self) -> Option<Vec<Value>> {
        match self {
            TransactionOutcome::Committed(replies) => Some(replies),
            TransactionOutcome::Discarded | TransactionOutcome::Aborted => None,
        }
    }
}
