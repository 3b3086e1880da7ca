use reqwest::StatusCode;
use thiserror::Error;

/// Failures of a single request to the device or the firmware server
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The liveness check never got an answer
    #[error("cannot reach the device at {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: reqwest::Error,
    },

    /// A command was not delivered
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A response came back, but not a successful one
    #[error("{url} answered with HTTP {status}")]
    Http { url: String, status: StatusCode },

    /// A response came back with a body we can't use
    #[error("unexpected response from {url}: {reason}")]
    Validation { url: String, reason: String },
}

impl DeviceError {
    /// Whether the failure happened below HTTP (DNS, connect, timeout), which
    /// is taken as the link to the device being gone.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Request { .. })
    }
}
