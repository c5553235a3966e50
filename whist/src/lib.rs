//! # Whist
//!
//! The network transport for a four-seat whist table.
//!
//! A [`Server`] accepts a fixed number of peers into numbered slots, runs one
//! receive thread per slot, and publishes connection and message lifecycle
//! events through an [`EventChannel`]. A [`Client`] speaks the same framing
//! over a single blocking connection.
//!
//! Every message on the wire is one frame: a 13 byte ASCII header
//! (`HEAD `, seven zero-padded decimal digits, `:`) followed by exactly that
//! many bytes of UTF-8 text. The transport never looks inside the text.
//!
//! ## Core Modules
//!
//! - [`event`]: Synchronous publish/subscribe channel
//! - [`net`]: Framing, server, client, and configuration
//!
//! ## Example
//!
//! ```no_run
//! use whist::{Client, Server, ServerEvent};
//!
//! let mut server = Server::bind_and_listen("127.0.0.1", 1111, 5)?;
//! server.subscribe(|table, event| {
//!     if let ServerEvent::MessageReceived { text, slot } = event {
//!         let _ = table.send_msg(&format!("echo: {text}"), *slot);
//!     }
//! });
//! server.wait_for_connections(4)?;
//! # Ok::<(), whist::NetError>(())
//! ```

/// Synchronous publish/subscribe channel.
pub mod event;
pub use event::EventChannel;

/// Networking components for client-server communication.
pub mod net;
pub use net::{
    client::Client,
    config::{self, ConfigError, ServerConfig},
    errors::{NetError, Result},
    frame,
    server::{self, Server, ServerEvent, ServerHandle},
};
