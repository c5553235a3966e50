//! Whist table server.
//!
//! Hosts one table: accepts a fixed number of players, logs everything
//! they send, and exits when they have all left.

use anyhow::Error;
use ctrlc::set_handler;
use pico_args::Arguments;
use tracing::info;
use whist_server::{config, logging, table::Table};

const HELP: &str = "\
Run a whist table server

USAGE:
  whist_server [OPTIONS]

OPTIONS:
  --address    IP          Listen address          [default: env WHIST_ADDRESS or 0.0.0.0]
  --port       PORT        Listen port             [default: env WHIST_PORT or 1111]
  --capacity   N           Number of seats         [default: env WHIST_CAPACITY or 4]
  --backlog    N           Accept backlog          [default: env WHIST_BACKLOG or 5]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  RUST_LOG                 Log filter (e.g., debug, whist=debug)
  (A .env file in the working directory is loaded first)
";

fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = config::Overrides {
        address: pargs.opt_value_from_str("--address")?,
        port: pargs.opt_value_from_str("--port")?,
        capacity: pargs.opt_value_from_str("--capacity")?,
        backlog: pargs.opt_value_from_str("--backlog")?,
    };
    let config = config::from_env(overrides)?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    logging::init();
    let addr = config.socket_addr()?;
    info!(
        capacity = config.capacity,
        backlog = config.backlog,
        "Starting whist table server at {addr}"
    );

    let table = Table::open(&config)?;
    info!(
        "Server is running at {}. Press Ctrl+C to stop.",
        table.local_addr()?
    );
    table.run()
}
