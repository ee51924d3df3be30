//! Error types for Swarm discovery.

use std::time::Duration;

use thiserror::Error;

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Provider`](crate::Provider) and its pipelines.
///
/// None of these are retried internally; the caller decides.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The `provider` argument does not name this backend.
    #[error("discover-dockerswarm: invalid provider {0:?}")]
    InvalidProvider(String),

    /// The `type` argument is missing or not one of `node` / `service`.
    #[error("discover-dockerswarm: invalid type {0:?}")]
    InvalidDiscoveryType(String),

    /// The `service` argument is empty.
    #[error("discover-dockerswarm: service name is required")]
    MissingServiceName,

    /// An argument could not be parsed.
    #[error("discover-dockerswarm: invalid argument {key:?}: {value:?}")]
    InvalidArgument {
        /// Argument key (or the raw token when the key itself is malformed).
        key: String,
        /// Offending value.
        value: String,
    },

    /// The Docker client could not be built for the configured host.
    #[error("discover-dockerswarm: invalid host {host:?}: {source}")]
    ClientConstructionFailed {
        /// Host the client was built for.
        host: String,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },

    /// Listing nodes or tasks failed.
    #[error("discover-dockerswarm: {operation} failed: {source}")]
    UpstreamQueryFailed {
        /// The API call that failed, e.g. `"list nodes"`.
        operation: &'static str,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
}

/// Errors raised while talking to the Docker Engine API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The host is not a valid URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The host URL uses a scheme this client cannot dial.
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// A `unix://` host without a socket path, e.g. `unix://docker.sock`.
    #[error("missing socket path in {0:?}")]
    MissingSocketPath(String),

    /// HTTP(S) transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The daemon answered with a non-success status.
    #[error("status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Daemon error message, or the raw body.
        message: String,
    },

    /// The response body is not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The raw HTTP response could not be parsed.
    #[error("malformed response: {0}")]
    Response(String),
}
