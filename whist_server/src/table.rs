//! One table: fill every seat, then stay up until every player has left.

use std::{collections::BTreeSet, net::SocketAddr, sync::mpsc};

use anyhow::{Context, Error};
use tracing::info;
use whist::{NetError, Server, ServerConfig, ServerEvent};

use crate::logging;

/// A bound table server that has not started accepting yet.
pub struct Table {
    server: Server,
    capacity: usize,
    departures: mpsc::Receiver<usize>,
}

impl Table {
    /// Bind the listener and subscribe the table's event logging.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Bind`] if the address or port is unavailable.
    pub fn open(config: &ServerConfig) -> Result<Self, NetError> {
        let server = Server::bind(config)?;
        let (tx, departures) = mpsc::channel();
        server.subscribe(move |_, event| {
            logging::log_event(event);
            if let ServerEvent::ClientDisconnected { slot } = event {
                let _ = tx.send(*slot);
            }
        });

        Ok(Self {
            server,
            capacity: config.capacity,
            departures,
        })
    }

    /// The bound listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket can't report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.server.local_addr()
    }

    /// Wait for every seat to fill, then block until every seated player
    /// has disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting connections fails.
    pub fn run(mut self) -> Result<(), Error> {
        self.server
            .wait_for_connections(self.capacity)
            .context("Failed while waiting for players")?;
        info!("All {} seats taken", self.capacity);

        let mut seated: BTreeSet<usize> = (0..self.capacity).collect();
        while !seated.is_empty() {
            let slot = self
                .departures
                .recv()
                .context("Table stopped reporting departures")?;
            seated.remove(&slot);
            info!(remaining = seated.len(), "Seat {slot} is empty");
        }

        info!("Every player has left the table");
        Ok(())
    }
}
