use std::time::Duration;

use crate::error::StoreError;

/// Number of connect attempts used when none is configured.
pub const DEFAULT_CONNECT_TRIES: u32 = 1;

/// Where and how to reach a backend instance.
///
/// Setters validate before mutating, so a rejected value leaves the previous one in place.
/// They chain:
/// ```rust
/// use store_middleware::prelude::*;
///
/// # fn main() -> Result<(), StoreError> {
/// let mut endpoint = Endpoint::new();
/// endpoint.set_host("localhost")?.set_port(6379)?.set_connect_tries(3)?;
/// assert!(endpoint.is_configured());
/// assert!(endpoint.set_port(70_000).is_err());
/// assert_eq!(endpoint.port(), Some(6379));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: Option<u16>,
    connect_timeout: Duration,
    connect_tries: u32,
    persistent: bool,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            connect_timeout: Duration::ZERO,
            connect_tries: DEFAULT_CONNECT_TRIES,
            persistent: false,
        }
    }
}

impl Endpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` when `host` is empty.
    pub fn set_host(&mut self, host: impl Into<String>) -> Result<&mut Self, StoreError> {
        let host = host.into();
        if host.is_empty() {
            return Err(StoreError::InvalidConfiguration("empty host".to_string()));
        }
        self.host = host;
        Ok(self)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` when `port` is outside `0..=65535`.
    pub fn set_port(&mut self, port: i64) -> Result<&mut Self, StoreError> {
        let port = u16::try_from(port).map_err(|_| {
            StoreError::InvalidConfiguration(format!("connection port {port} is out of range"))
        })?;
        self.port = Some(port);
        Ok(self)
    }

    /// Return the port to the "unset" state.
    pub fn clear_port(&mut self) -> &mut Self {
        self.port = None;
        self
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[must_use]
    pub fn has_port(&self) -> bool {
        self.port.is_some()
    }

    /// Timeout applied to each connect attempt, in seconds. Zero disables it.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` for negative, non-finite or out-of-range
    /// values.
    pub fn set_connect_timeout(&mut self, seconds: f64) -> Result<&mut Self, StoreError> {
        let timeout = Duration::try_from_secs_f64(seconds).map_err(|e| {
            StoreError::InvalidConfiguration(format!(
                "connect timeout {seconds} must be a non-negative number of seconds: {e}"
            ))
        })?;
        self.connect_timeout = timeout;
        Ok(self)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` when `tries < 1`.
    pub fn set_connect_tries(&mut self, tries: i64) -> Result<&mut Self, StoreError> {
        match u32::try_from(tries) {
            Ok(tries) if tries >= 1 => {
                self.connect_tries = tries;
                Ok(self)
            }
            _ => Err(StoreError::InvalidConfiguration(format!(
                "connect tries {tries} < 1"
            ))),
        }
    }

    #[must_use]
    pub fn connect_tries(&self) -> u32 {
        self.connect_tries
    }

    pub fn set_persistent(&mut self, persistent: bool) -> &mut Self {
        self.persistent = persistent;
        self
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Host is set and port is set (and therefore in range).
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && self.port.is_some()
    }
}

/// Login details for the relational backend. Empty strings count as "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    user_name: String,
    password: String,
    database: String,
}

impl Credentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user_name(&mut self, user_name: impl Into<String>) -> &mut Self {
        self.user_name = user_name.into();
        self
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    #[must_use]
    pub fn has_user_name(&self) -> bool {
        !self.user_name.is_empty()
    }

    pub fn set_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.password = password.into();
        self
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    pub fn set_database(&mut self, database: impl Into<String>) -> &mut Self {
        self.database = database.into();
        self
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn has_database(&self) -> bool {
        !self.database.is_empty()
    }
}
