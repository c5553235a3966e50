//! Networking layer for client-server communication.
//!
//! This module provides TCP-based networking with a fixed-width, ASCII
//! length header in front of every UTF-8 payload. The server uses one
//! blocking thread per connected slot.

/// Blocking TCP client for connecting to a table server.
pub mod client;

/// Transport configuration and its defaults.
pub mod config;

/// Network error types.
pub mod errors;

/// Frame encoding and decoding.
pub mod frame;

/// Fixed-capacity TCP server with one receive thread per slot.
pub mod server;
