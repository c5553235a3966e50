//! Hosting for a single whist table.
//!
//! Loads the transport configuration from the environment, sets up
//! structured logging, and runs one [`whist::Server`] until every seat has
//! left.

pub mod config;
pub mod logging;
pub mod table;
