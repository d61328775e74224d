//! Network interface for CRL retrieval.
//!
//! The core consumes the narrow [`NetProvider`] trait; hosts embed their own
//! transport (mobile platforms route through platform HTTP stacks) or use
//! the bundled blocking [`HttpNetProvider`].
//!
//! ## Security
//!
//! - Timeouts bound every request; a dead distribution point cannot hang
//!   the verification pipeline.
//! - Response bodies are capped at [`MAX_RESPONSE_SIZE`] at the read level,
//!   regardless of the Content-Length header a server claims.

use std::io::Read;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Maximum accepted response body (4 MiB); CRLs beyond this are rejected.
pub const MAX_RESPONSE_SIZE: u64 = 4 * 1024 * 1024;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Network errors.
#[derive(Debug, Error)]
pub enum NetError {
    /// Transport-level failure (DNS, connect, TLS, timeout).
    #[error("network error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {0}: {1}")]
    Http(u16, String),

    /// Response exceeds the size limit.
    #[error("response exceeds size limit")]
    ResponseTooLarge,

    /// The request was cancelled by the caller.
    #[error("request cancelled")]
    Cancelled,
}

/// Source of bytes fetched over the network.
pub trait NetProvider: Send + Sync {
    /// Fetch the resource at `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, NetError>;

    /// Ask in-flight and future requests to abort. Best-effort; the default
    /// implementation does nothing.
    fn cancel(&self) {}
}

/// Blocking HTTP(S) implementation of [`NetProvider`].
pub struct HttpNetProvider {
    agent: ureq::Agent,
    max_response_size: u64,
}

impl HttpNetProvider {
    /// Create a provider with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            max_response_size: MAX_RESPONSE_SIZE,
        }
    }

    fn map_ureq_error(e: ureq::Error) -> NetError {
        match e {
            ureq::Error::Status(code, response) => {
                let body = response
                    .into_string()
                    .unwrap_or_else(|_| "unknown error".to_string());
                NetError::Http(code, body)
            }
            ureq::Error::Transport(t) => NetError::Transport(t.to_string()),
        }
    }
}

impl Default for HttpNetProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl NetProvider for HttpNetProvider {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, NetError> {
        debug!(url, "fetching");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(Self::map_ureq_error)?;

        if let Some(len) = response.header("Content-Length") {
            if let Ok(len) = len.parse::<u64>() {
                if len > self.max_response_size {
                    return Err(NetError::ResponseTooLarge);
                }
            }
        }

        // The limit is enforced at the read level too; a server may omit
        // the Content-Length header entirely.
        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.max_response_size + 1)
            .read_to_end(&mut body)
            .map_err(|e| NetError::Transport(e.to_string()))?;

        if body.len() as u64 > self.max_response_size {
            return Err(NetError::ResponseTooLarge);
        }

        Ok(body)
    }
}
