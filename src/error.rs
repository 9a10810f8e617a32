use std::fmt;

use thiserror::Error;

/// Classification of a failed backend query.
///
/// PostgreSQL SQLSTATE codes map onto this enum through [`QueryErrorKind::from_sqlstate`];
/// every code outside the fixed set lands in [`QueryErrorKind::Generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    /// Unique constraint violation (`23505`)
    DuplicateEntry,
    /// Relation does not exist (`42P01`)
    UndefinedTable,
    /// Relation already exists (`42P07`)
    DuplicateTable,
    /// Object (type) already exists (`42710`)
    DuplicateType,
    /// Error raised by application code, e.g. `RAISE EXCEPTION` (`P0001`)
    RaisedException,
    /// Any other backend failure
    Generic,
}

impl QueryErrorKind {
    pub const CODE_DUPLICATE_ENTRY: &'static str = "23505";
    pub const CODE_UNDEFINED_TABLE: &'static str = "42P01";
    pub const CODE_DUPLICATE_TABLE: &'static str = "42P07";
    pub const CODE_DUPLICATE_TYPE: &'static str = "42710";
    pub const CODE_RAISED_EXCEPTION: &'static str = "P0001";

    #[must_use]
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            Self::CODE_DUPLICATE_ENTRY => Self::DuplicateEntry,
            Self::CODE_UNDEFINED_TABLE => Self::UndefinedTable,
            Self::CODE_DUPLICATE_TABLE => Self::DuplicateTable,
            Self::CODE_DUPLICATE_TYPE => Self::DuplicateType,
            Self::CODE_RAISED_EXCEPTION => Self::RaisedException,
            _ => Self::Generic,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DuplicateEntry => "duplicate entry",
            Self::UndefinedTable => "undefined table",
            Self::DuplicateTable => "duplicate table",
            Self::DuplicateType => "duplicate type",
            Self::RaisedException => "raised exception",
            Self::Generic => "query error",
        }
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Connection not configured: {0}")]
    NotConfigured(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Connection failed after {attempts} attempt(s): {last_error}")]
    ConnectionRetriesExhausted { attempts: u32, last_error: String },

    #[error("Connection is busy with a previous request")]
    ConnectionBusy,

    #[error("{kind}: {message}: {query}")]
    Query {
        kind: QueryErrorKind,
        message: String,
        query: String,
        code: String,
    },

    #[error("Impossible value: {0}")]
    ImpossibleValue(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Template parse error at byte {position}: {message}")]
    TemplateParse { position: usize, message: String },

    #[error("Template parameter missing: {0}")]
    TemplateParameterMissing(String),

    #[error("Script execution error: {0}")]
    ScriptExecution(String),
}

impl StoreError {
    /// Build a query error from a backend code, classifying it on the way.
    #[must_use]
    pub fn query(code: &str, message: impl Into<String>, query: impl Into<String>) -> Self {
        StoreError::Query {
            kind: QueryErrorKind::from_sqlstate(code),
            message: message.into(),
            query: query.into(),
            code: code.to_string(),
        }
    }

    pub(crate) fn template_parse(position: usize, message: impl Into<String>) -> Self {
        StoreError::TemplateParse {
            position,
            message: message.into(),
        }
    }

    /// True for transport failures, including exhausted connect retries.
    #[must_use]
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            StoreError::Connect(_) | StoreError::ConnectionRetriesExhausted { .. }
        )
    }

    /// The query classification, if this is a backend query failure.
    #[must_use]
    pub fn query_kind(&self) -> Option<QueryErrorKind> {
        match self {
            StoreError::Query { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Whether a Redis failure came from the socket rather than from a server reply.
#[cfg(feature = "redis")]
pub(crate) fn is_transport_error(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout()
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if is_transport_error(&err) {
            StoreError::Connect(err.to_string())
        } else {
            StoreError::ImpossibleValue(err.to_string())
        }
    }
}
