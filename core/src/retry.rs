//! Bounded retry around a single transport call.
//!
//! A 5xx response and a network failure are both retried with the identical
//! request until `max_attempts` is reached; anything below 500 ends the
//! loop immediately.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Send `request` until it yields a response below 500 or attempts run out.
    ///
    /// # Errors
    ///
    /// The failure of the last attempt: `TransportError::Server` carrying its
    /// status and body, or `TransportError::Network`.
    pub fn send(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let method = request.method.as_str();
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            debug!(attempt, method, url = %request.url, "sending request");

            let error = match transport.execute(request) {
                Ok(response) if !response.is_server_error() => {
                    debug!(attempt, status = response.status, "received response");
                    return Ok(response);
                }
                Ok(response) => TransportError::Server {
                    status: response.status,
                    body: response.body,
                },
                Err(err) => err,
            };

            if attempt < self.max_attempts {
                warn!(attempt, max_attempts = self.max_attempts, error = %error, "request failed, retrying");
                if !self.backoff.is_zero() {
                    std::thread::sleep(self.backoff);
                }
            }
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| TransportError::Network("no attempt was made".to_string())))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_ATTEMPTS, Duration::ZERO)
    }
}
