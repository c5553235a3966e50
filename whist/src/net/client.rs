//! A blocking TCP table client.
//!
//! Every operation runs on the caller's thread; there is no background
//! reader and no retry.

use std::{
    io::{ErrorKind, Read},
    net::{Shutdown, SocketAddr, TcpStream},
    time::Duration,
};

use log::debug;

use super::{
    errors::{NetError, Result},
    frame,
};

/// Bytes requested from the socket per read.
const READ_CHUNK: usize = 8 * 1024;

/// A single connection to a table server.
#[derive(Debug)]
pub struct Client {
    stream: TcpStream,
    /// Bytes of a frame that hasn't fully arrived yet.
    buffer: Vec<u8>,
}

impl Client {
    /// Connect to the server at `address:port`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the server can't be reached.
    pub fn connect(address: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((address, port)).map_err(|source| NetError::Connect {
            addr: format!("{address}:{port}"),
            source,
        })?;
        debug!("connected to {address}:{port}");
        Ok(Self {
            stream,
            buffer: Vec::new(),
        })
    }

    /// Send `text` as one frame.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::FrameTooLarge`] if `text` doesn't fit in one frame
    /// (nothing is written) and [`NetError::Send`] if the write fails.
    pub fn send_msg(&mut self, text: &str) -> Result<()> {
        frame::write_frame(&mut self.stream, text)
    }

    /// Block until one full frame arrives and return its text.
    ///
    /// Bytes of a partly received frame are kept across calls, so a read
    /// timeout that fires mid-frame can simply be retried.
    ///
    /// # Errors
    ///
    /// - [`NetError::PeerClosed`] if the server closed between frames.
    /// - [`NetError::TruncatedFrame`] if it closed part way through one.
    /// - [`NetError::InvalidHeader`] or [`NetError::InvalidUtf8`] for
    ///   malformed frames.
    /// - [`NetError::Receive`] for other transport failures, including an
    ///   elapsed read timeout.
    pub fn recv_msg(&mut self) -> Result<String> {
        let mut chunk = [0; READ_CHUNK];
        loop {
            if let Some(text) = frame::split_frame(&mut self.buffer)? {
                return Ok(text);
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(self.closed_mid_stream()),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(NetError::Receive(error)),
            }
        }
    }

    /// The error for end of stream given what is still buffered.
    fn closed_mid_stream(&self) -> NetError {
        let received = self.buffer.len();
        match self.buffer.first_chunk::<{ frame::HEADER_LEN }>() {
            None if received == 0 => NetError::PeerClosed,
            None => NetError::TruncatedFrame {
                expected: frame::HEADER_LEN,
                received,
            },
            Some(header) => match frame::decode_header(header) {
                Ok(len) => NetError::TruncatedFrame {
                    expected: len,
                    received: received - frame::HEADER_LEN,
                },
                Err(error) => error,
            },
        }
    }

    /// Bound how long [`Client::recv_msg`] may block. `None` blocks forever.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Receive`] if the socket rejects the timeout.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream
            .set_read_timeout(timeout)
            .map_err(NetError::Receive)
    }

    /// The server's address.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Receive`] if the socket can't report it.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(NetError::Receive)
    }

    /// A second handle to the same connection, so one thread can receive
    /// while another sends. The clone starts with nothing buffered.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Receive`] if the socket can't be duplicated.
    pub fn try_clone(&self) -> Result<Self> {
        let stream = self.stream.try_clone().map_err(NetError::Receive)?;
        Ok(Self {
            stream,
            buffer: Vec::new(),
        })
    }

    /// Close the sending side at a frame boundary. The server sees this as
    /// an orderly disconnection; frames it already sent can still be read.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Send`] if the socket can't be shut down.
    pub fn shutdown(&self) -> Result<()> {
        self.stream.shutdown(Shutdown::Write).map_err(NetError::Send)
    }
}
