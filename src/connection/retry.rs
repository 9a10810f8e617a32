use std::future::Future;

use tracing::{debug, warn};

use super::Endpoint;
use crate::error::StoreError;

/// Run `attempt` up to `endpoint.connect_tries()` times until it yields a handle.
///
/// Each attempt is bounded by the endpoint's connect timeout when it is non-zero. Retries
/// follow each other immediately. Only transport failures (`StoreError::Connect` or an
/// elapsed timeout) are retried; any other error is returned from the failing attempt.
///
/// # Errors
/// Returns `StoreError::ConnectionRetriesExhausted` once every attempt failed.
pub async fn connect_with_retries<T, F, Fut>(
    endpoint: &Endpoint,
    mut attempt: F,
) -> Result<T, StoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let tries = endpoint.connect_tries();
    let timeout = endpoint.connect_timeout();
    let mut last_error = String::from("no connect attempt was made");

    for n in 1..=tries {
        debug!(host = endpoint.host(), port = ?endpoint.port(), attempt = n, tries, "connecting");
        let outcome = if timeout.is_zero() {
            attempt(n).await
        } else {
            match tokio::time::timeout(timeout, attempt(n)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(StoreError::Connect(format!(
                    "connect timed out after {timeout:?}"
                ))),
            }
        };

        match outcome {
            Ok(handle) => return Ok(handle),
            Err(StoreError::Connect(message)) => {
                warn!(host = endpoint.host(), attempt = n, error = %message, "connect attempt failed");
                last_error = message;
            }
            Err(other) => return Err(other),
        }
    }

    warn!(host = endpoint.host(), attempts = tries, "connect tries exhausted");
    Err(StoreError::ConnectionRetriesExhausted {
        attempts: tries,
        last_error,
    })
}
