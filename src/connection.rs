use std::fmt::Display;

use log::{info, warn};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("already connecting to {0}")]
    AlreadyConnecting(String),
}

/// What the remote believes about its link to the device.
///
/// This is a heuristic, not a session: `Connected` only means the last connection check
/// got an answer. The device is never told about it, and the first failed
/// request drops the state back to `Disconnected`. Getting back to
/// `Connected` always takes a fresh successful connection check.
#[derive(Debug, Default)]
pub struct Connection {
    state: ConnectionState,
    /// The last address a connection check succeeded against
    address: Option<String>,
    /// The address currently being checked
    candidate: Option<String>,
}

impl Connection {
    /// Start from a previously accepted address, but disconnected.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// The accepted device address, if any connection check ever succeeded
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// The address to talk to, only while connected
    pub fn active_address(&self) -> Option<&str> {
        match self.state {
            ConnectionState::Connected => self.address.as_deref(),
            _ => None,
        }
    }

    /// The address being checked, while connecting
    pub fn candidate(&self) -> Option<&str> {
        match self.state {
            ConnectionState::Connecting => self.candidate.as_deref(),
            _ => None,
        }
    }

    /// The user submitted an address. Moves to `Connecting`.
    pub fn begin(&mut self, candidate: &str) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Connecting {
            let pending = self.candidate.clone().unwrap_or_default();
            return Err(ConnectionError::AlreadyConnecting(pending));
        }

        info!("Connecting to {}", candidate);
        self.state = ConnectionState::Connecting;
        self.candidate = Some(candidate.to_string());
        Ok(())
    }

    /// The check of the candidate succeeded. Returns the now active address.
    pub fn accept(&mut self) -> Option<&str> {
        if self.state != ConnectionState::Connecting {
            warn!("Connection check answered while {}, ignoring it", self.state);
            return None;
        }

        self.address = self.candidate.take();
        self.state = ConnectionState::Connected;
        info!("Connected to {}", self.address.as_deref().unwrap_or_default());

        self.address.as_deref()
    }

    /// The check of the candidate failed.
    pub fn reject(&mut self) {
        if self.state != ConnectionState::Connecting {
            return;
        }

        if let Some(candidate) = self.candidate.take() {
            info!("Could not connect to {}", candidate);
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Explicit user disconnect
    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            info!("Disconnected");
        }
        self.candidate = None;
        self.state = ConnectionState::Disconnected;
    }

    /// A request failed at the network level while connected. There is no
    /// retry or grace period.
    pub fn link_lost(&mut self) {
        if self.state == ConnectionState::Connected {
            warn!(
                "Lost the link to {}",
                self.address.as_deref().unwrap_or_default()
            );
            self.state = ConnectionState::Disconnected;
        }
    }
}
