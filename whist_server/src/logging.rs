//! Structured logging configuration.
//!
//! The transport logs through the `log` facade; those records are bridged
//! into the same subscriber as this crate's `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use whist::ServerEvent;

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var and default to
/// `info`.
///
/// # Example
///
/// ```no_run
/// use whist_server::logging;
///
/// logging::init();
/// tracing::info!("Server starting");
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a table event with structured fields
pub fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::ClientConnected {
            address,
            port,
            slot,
        } => tracing::info!(
            slot = slot,
            peer_address = %address,
            peer_port = port,
            "Player seated"
        ),
        ServerEvent::AllSlotsFilled => tracing::info!("Table is full"),
        ServerEvent::MessageReceived { text, slot } => tracing::info!(
            slot = slot,
            bytes = text.len(),
            message = %text,
            "Message received"
        ),
        ServerEvent::ClientDisconnected { slot } => {
            tracing::info!(slot = slot, "Player left");
        }
    }
}
