//! Resilient request execution
//!
//! Wraps a `reqwest::Client` with retry on transient failure: transport
//! errors, HTTP 429 and HTTP 5xx are retried with backoff per
//! [`RetryPolicy`]; every other status is returned to the caller after a
//! single attempt. The connection pool is shared, so a `Transport` clone is
//! cheap and safe to use from many concurrent pin calls.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::error::{PinError, Result};

/// HTTP executor with automatic retry
#[derive(Clone)]
pub struct Transport {
    http: Client,
    config: TransportConfig,
}

impl Transport {
    /// Create a transport from a configuration
    pub fn new(config: TransportConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(PinError::Http)?;

        Ok(Self { http, config })
    }

    /// Create a transport with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(TransportConfig::default())
    }

    /// Create a transport around an existing client, keeping its pool
    pub fn with_client(http: Client, config: TransportConfig) -> Self {
        Self { http, config }
    }

    /// The transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Start building a POST request on the shared client
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(url)
    }

    /// Execute a request with retry.
    ///
    /// `make` is called once per attempt so every retry carries a freshly
    /// built request; bodies fed from a one-shot source must use
    /// [`Transport::execute_once`] instead. Exhausting all attempts returns
    /// the last response or error unchanged.
    pub async fn execute<F>(&self, make: F) -> Result<Response>
    where
        F: Fn() -> Result<RequestBuilder>,
    {
        let attempts = self.config.retry.attempts();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry.delay(attempt - 1);
                debug!(?delay, attempt, "waiting before retry");
                tokio::time::sleep(delay).await;
            }

            let last = attempt + 1 == attempts;
            match make()?.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !retryable_status(status) || last {
                        return Ok(response);
                    }
                    warn!(%status, attempt, "retryable status, will retry");
                }
                Err(err) => {
                    if last {
                        return Err(PinError::Http(err));
                    }
                    warn!(error = %err, attempt, "transport error, will retry");
                }
            }
        }

        unreachable!("retry loop always returns on the last attempt")
    }

    /// Execute a request exactly once, for bodies that cannot be replayed
    pub async fn execute_once(&self, request: RequestBuilder) -> Result<Response> {
        debug!("sending single-attempt request");
        request.send().await.map_err(PinError::Http)
    }
}

/// Retry on rate limiting and server errors; anything else is terminal.
/// A request that produced no response at all surfaces as a transport
/// error and is retried as well.
pub(crate) fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for code in [429u16, 500, 502, 503, 599] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(retryable_status(status), "{code} should be retried");
        }
    }

    #[test]
    fn test_terminal_statuses() {
        for code in [200u16, 201, 301, 400, 401, 404] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(!retryable_status(status), "{code} should be terminal");
        }
    }
}
