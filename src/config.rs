use serde::{Deserialize, Serialize};

use crate::connection::{Credentials, Endpoint};
use crate::error::StoreError;

/// Connection settings as they arrive from a configuration file or mapping.
///
/// Everything is optional at the deserialization level; `host` and `port` are enforced when
/// the config is turned into an [`Endpoint`], and the typed setters apply the usual range
/// checks.
///
/// ```rust
/// use store_middleware::prelude::*;
///
/// # fn main() -> Result<(), StoreError> {
/// let config = ConnectionConfig::from_json(
///     r#"{"host": "localhost", "port": 5432, "connect_tries": 3, "user": "postgres"}"#,
/// )?;
/// let endpoint = config.to_endpoint()?;
/// assert_eq!(endpoint.connect_tries(), 3);
/// assert_eq!(config.credentials().user_name(), "postgres");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<i64>,
    /// Seconds
    pub connect_timeout: Option<f64>,
    pub connect_tries: Option<i64>,
    pub persistent: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database name for PostgreSQL, numeric database index for Redis
    pub database: Option<String>,
    pub busy_checkup: bool,
}

impl ConnectionConfig {
    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` when `json` is not a valid config object.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidConfiguration(format!("bad connection config: {e}")))
    }

    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` when `value` is not a valid config object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, StoreError> {
        serde_json::from_value(value)
            .map_err(|e| StoreError::InvalidConfiguration(format!("bad connection config: {e}")))
    }

    /// Validate and convert into an [`Endpoint`].
    ///
    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` when `host` or `port` is missing, or when any
    /// value fails the endpoint's setter validation.
    pub fn to_endpoint(&self) -> Result<Endpoint, StoreError> {
        let host = self
            .host
            .as_deref()
            .ok_or_else(|| StoreError::InvalidConfiguration("host is required".to_string()))?;
        let port = self
            .port
            .ok_or_else(|| StoreError::InvalidConfiguration("port is required".to_string()))?;

        let mut endpoint = Endpoint::new();
        endpoint.set_host(host)?.set_port(port)?;
        if let Some(timeout) = self.connect_timeout {
            endpoint.set_connect_timeout(timeout)?;
        }
        if let Some(tries) = self.connect_tries {
            endpoint.set_connect_tries(tries)?;
        }
        endpoint.set_persistent(self.persistent);
        Ok(endpoint)
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new();
        if let Some(user) = &self.user {
            credentials.set_user_name(user);
        }
        if let Some(password) = &self.password {
            credentials.set_password(password);
        }
        if let Some(database) = &self.database {
            credentials.set_database(database);
        }
        credentials
    }

    /// `database` read as a numeric index, as Redis expects.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` when `database` is set but not a
    /// non-negative integer.
    pub fn database_index(&self) -> Result<Option<i64>, StoreError> {
        match self.database.as_deref() {
            None | Some("") => Ok(None),
            Some(text) => match text.parse::<i64>() {
                Ok(index) if index >= 0 => Ok(Some(index)),
                _ => Err(StoreError::InvalidConfiguration(format!(
                    "database index `{text}` is not a non-negative integer"
                ))),
            },
        }
    }
}
