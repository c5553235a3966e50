//! Transport configuration.
//!
//! The defaults match the reference table deployment: every interface,
//! port 1111, four seats, and an accept backlog of five.

use std::net::{SocketAddr, ToSocketAddrs};

/// Default listen address.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port, shared by the client as its default dial port.
pub const DEFAULT_PORT: u16 = 1111;

/// Default number of slots (one per seat at the table).
pub const DEFAULT_CAPACITY: usize = 4;

/// Default accept backlog.
pub const DEFAULT_BACKLOG: u32 = 5;

/// Server configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on
    pub address: String,
    /// Port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Number of slots to fill before the table is complete
    pub capacity: usize,
    /// Requested accept backlog
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            capacity: DEFAULT_CAPACITY,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

impl ServerConfig {
    /// Resolve the address and port into a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the address does not resolve.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            var: "address".to_string(),
            reason,
        };
        (self.address.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid(format!("{} resolved to no addresses", self.address)))
    }

    /// Validate configuration after loading
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero capacity or backlog.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "capacity".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.backlog == 0 {
            return Err(ConfigError::Invalid {
                var: "backlog".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}
