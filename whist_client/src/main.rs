//! A line-based client for a whist table server.
//!
//! Every line read from stdin is sent as one frame; every frame from the
//! server is printed on its own line. Closing stdin leaves the table.

use std::{
    io::{self, BufRead},
    thread,
};

use anyhow::{Context, Result};
use log::{error, info};
use pico_args::Arguments;
use whist::{Client, NetError, config};

const HELP: &str = "\
Connect to a whist table server

USAGE:
  whist_client [OPTIONS]

OPTIONS:
  --address IP          Server address  [default: 127.0.0.1]
  --port PORT           Server port     [default: 1111]

FLAGS:
  -h, --help            Print help information
";

struct Args {
    address: String,
    port: u16,
}

fn main() -> Result<()> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = parse_args(pargs)?;
    env_logger::builder().format_target(false).init();
    run(args)
}

/// A flag given without a usable value is an error, not the default.
fn parse_args(mut pargs: Arguments) -> Result<Args> {
    Ok(Args {
        address: pargs
            .opt_value_from_str("--address")?
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        port: pargs
            .opt_value_from_str("--port")?
            .unwrap_or(config::DEFAULT_PORT),
    })
}

fn run(args: Args) -> Result<()> {
    let client = Client::connect(&args.address, args.port)?;
    info!("Connected to {}", client.peer_addr()?);

    let mut receiver = client.try_clone()?;
    let printer = thread::spawn(move || {
        loop {
            match receiver.recv_msg() {
                Ok(text) => println!("{text}"),
                Err(NetError::PeerClosed) => {
                    info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Connection lost: {e}");
                    break;
                }
            }
        }
    });

    let mut sender = client;
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        sender.send_msg(&line)?;
    }

    // Leave at a frame boundary and let the printer drain what's left.
    sender.shutdown()?;
    if printer.join().is_err() {
        error!("Receiver thread panicked");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use pico_args::Arguments;

    use super::parse_args;

    fn pargs(args: &[&str]) -> Arguments {
        Arguments::from_vec(args.iter().map(OsString::from).collect())
    }

    #[test]
    fn test_defaults() {
        let args = parse_args(pargs(&[])).unwrap();
        assert_eq!(args.address, "127.0.0.1");
        assert_eq!(args.port, 1111);
    }

    #[test]
    fn test_explicit_address() {
        let args = parse_args(pargs(&["--address", "10.0.0.7", "--port", "4000"])).unwrap();
        assert_eq!(args.address, "10.0.0.7");
        assert_eq!(args.port, 4000);
    }

    #[test]
    fn test_address_without_value_is_an_error() {
        assert!(parse_args(pargs(&["--address"])).is_err());
    }
}
