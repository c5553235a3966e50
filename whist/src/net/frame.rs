//! Frame encoding and decoding.
//!
//! ```text
//! "HEAD " <7 zero-padded decimal digits> ":" <payload bytes>
//! ```
//!
//! The header is always [`HEADER_LEN`] bytes and the digits always hold the
//! exact byte length of the UTF-8 payload that follows. The layout is fixed
//! for wire compatibility with existing peers.

use std::io::{self, Read, Write};

use super::errors::{NetError, Result};

/// Literal that opens every header.
pub const HEADER_PREFIX: &[u8; 5] = b"HEAD ";

/// Number of decimal digits in the length field.
pub const LENGTH_DIGITS: usize = 7;

/// Literal that closes every header.
pub const HEADER_SUFFIX: u8 = b':';

/// Total header length in bytes.
pub const HEADER_LEN: usize = HEADER_PREFIX.len() + LENGTH_DIGITS + 1;

/// Largest payload the length field can express.
pub const MAX_PAYLOAD_LEN: usize = 9_999_999;

/// Build the header for a payload of `len` bytes.
///
/// # Errors
///
/// Returns [`NetError::FrameTooLarge`] if `len` exceeds [`MAX_PAYLOAD_LEN`].
pub fn encode_header(len: usize) -> Result<[u8; HEADER_LEN]> {
    if len > MAX_PAYLOAD_LEN {
        return Err(NetError::FrameTooLarge {
            actual: len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut header = [0; HEADER_LEN];
    header[..HEADER_PREFIX.len()].copy_from_slice(HEADER_PREFIX);
    let digits = format!("{len:0width$}", width = LENGTH_DIGITS);
    header[HEADER_PREFIX.len()..HEADER_LEN - 1].copy_from_slice(digits.as_bytes());
    header[HEADER_LEN - 1] = HEADER_SUFFIX;
    Ok(header)
}

/// Parse a header and return the payload length it announces.
///
/// # Errors
///
/// Returns [`NetError::InvalidHeader`] if the prefix, digits, or suffix
/// don't match the frame layout.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<usize> {
    let invalid = || NetError::InvalidHeader(String::from_utf8_lossy(header).into_owned());

    let (prefix, rest) = header.split_at(HEADER_PREFIX.len());
    let (digits, suffix) = rest.split_at(LENGTH_DIGITS);
    if prefix != HEADER_PREFIX || suffix != [HEADER_SUFFIX] {
        return Err(invalid());
    }
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }

    Ok(digits
        .iter()
        .fold(0, |len, digit| len * 10 + usize::from(digit - b'0')))
}

/// Encode `text` as one complete frame.
///
/// # Errors
///
/// Returns [`NetError::FrameTooLarge`] if the UTF-8 length of `text`
/// exceeds [`MAX_PAYLOAD_LEN`].
pub fn encode(text: &str) -> Result<Vec<u8>> {
    let payload = text.as_bytes();
    let header = encode_header(payload.len())?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&header);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Write `text` as one frame.
///
/// The frame is encoded before anything touches the writer, so an
/// oversized payload leaves the stream untouched. Header and payload go out
/// in a single `write_all` to keep them together on the wire.
///
/// # Errors
///
/// Returns [`NetError::FrameTooLarge`] for an oversized payload and
/// [`NetError::Send`] if the writer fails.
pub fn write_frame<W: Write>(writer: &mut W, text: &str) -> Result<()> {
    let buf = encode(text)?;
    writer.write_all(&buf).map_err(NetError::Send)?;
    writer.flush().map_err(NetError::Send)
}

/// Read one frame and return its text.
///
/// Both the header and the payload are read in a loop until the exact byte
/// count has arrived, so short reads from the stream are harmless.
///
/// # Errors
///
/// - [`NetError::PeerClosed`] if the stream ends before any header byte.
/// - [`NetError::TruncatedFrame`] if it ends anywhere else inside a frame.
/// - [`NetError::InvalidHeader`] or [`NetError::InvalidUtf8`] for malformed
///   frames.
/// - [`NetError::Receive`] for any other transport failure.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<String> {
    let mut header = [0; HEADER_LEN];
    let received = read_full(reader, &mut header).map_err(NetError::Receive)?;
    match received {
        0 => return Err(NetError::PeerClosed),
        HEADER_LEN => {}
        received => {
            return Err(NetError::TruncatedFrame {
                expected: HEADER_LEN,
                received,
            });
        }
    }

    let len = decode_header(&header)?;

    // Grow the buffer as bytes arrive rather than trusting the header
    // with an up-front allocation.
    let mut payload = Vec::new();
    reader
        .take(len as u64)
        .read_to_end(&mut payload)
        .map_err(NetError::Receive)?;
    if payload.len() < len {
        return Err(NetError::TruncatedFrame {
            expected: len,
            received: payload.len(),
        });
    }

    Ok(String::from_utf8(payload)?)
}

/// Take one complete frame off the front of `buf`, if one is buffered.
///
/// Returns `Ok(None)` while the header or payload is still incomplete, and
/// leaves `buf` untouched in that case.
///
/// # Errors
///
/// Returns [`NetError::InvalidHeader`] or [`NetError::InvalidUtf8`] for a
/// malformed frame. A bad header stays in `buf`.
pub fn split_frame(buf: &mut Vec<u8>) -> Result<Option<String>> {
    let Some(header) = buf.first_chunk::<HEADER_LEN>() else {
        return Ok(None);
    };
    let end = HEADER_LEN + decode_header(header)?;
    if buf.len() < end {
        return Ok(None);
    }

    let payload = buf[HEADER_LEN..end].to_vec();
    buf.drain(..end);
    Ok(Some(String::from_utf8(payload)?))
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
/// Returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Read, Write},
        net::{Shutdown, TcpListener, TcpStream},
    };

    use super::{
        HEADER_LEN, MAX_PAYLOAD_LEN, decode_header, encode, encode_header, read_frame,
        split_frame, write_frame,
    };
    use crate::net::errors::NetError;

    fn setup() -> (TcpStream, TcpStream) {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (stream, _) = server.accept().unwrap();
        (client, stream)
    }

    /// Hands out at most one chunk per `read` call, following a fixed
    /// schedule of chunk sizes.
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        sizes: Vec<usize>,
        call: usize,
    }

    impl Chunked {
        fn new(data: Vec<u8>, sizes: Vec<usize>) -> Self {
            Self {
                data,
                pos: 0,
                sizes,
                call: 0,
            }
        }
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let size = self.sizes.get(self.call).copied().unwrap_or(usize::MAX);
            self.call += 1;
            let n = size.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn header_layout() {
        assert_eq!(&encode_header(0).unwrap(), b"HEAD 0000000:");
        assert_eq!(&encode_header(2).unwrap(), b"HEAD 0000002:");
        assert_eq!(&encode_header(MAX_PAYLOAD_LEN).unwrap(), b"HEAD 9999999:");
    }

    #[test]
    fn encode_prefixes_payload() {
        assert_eq!(encode("hi").unwrap(), b"HEAD 0000002:hi");
        assert_eq!(encode("").unwrap(), b"HEAD 0000000:");
        // Length counts UTF-8 bytes, not characters.
        assert_eq!(encode("ø").unwrap(), "HEAD 0000002:ø".as_bytes());
    }

    #[test]
    fn oversized_payload_writes_nothing() {
        let text = "x".repeat(MAX_PAYLOAD_LEN + 1);
        let mut sink = Vec::new();

        let result = write_frame(&mut sink, &text);

        assert!(matches!(
            result,
            Err(NetError::FrameTooLarge {
                actual: 10_000_000,
                max: MAX_PAYLOAD_LEN
            })
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn decode_header_rejects_garbage() {
        for header in [b"HEAD 00000a2:", b"BODY 0000002:", b"HEAD 0000002;"] {
            assert!(matches!(
                decode_header(header),
                Err(NetError::InvalidHeader(_))
            ));
        }
        assert_eq!(decode_header(b"HEAD 1234567:").unwrap(), 1_234_567);
    }

    #[test]
    fn write_and_read() {
        let (mut client, mut stream) = setup();
        write_frame(&mut stream, "Hello, World!").unwrap();
        assert_eq!(read_frame(&mut client).unwrap(), "Hello, World!");
    }

    #[test]
    fn write_and_read_multiple_frames() {
        let (mut client, mut stream) = setup();

        let msgs = ["first", "", "third", "fjerde runde: spar ♠"];
        for msg in msgs {
            write_frame(&mut stream, msg).unwrap();
        }

        for msg in msgs {
            assert_eq!(read_frame(&mut client).unwrap(), msg);
        }
    }

    #[test]
    fn header_split_across_reads() {
        let frame = encode("hi").unwrap();
        let mut reader = Chunked::new(frame, vec![5, 8, 1, 1]);
        assert_eq!(read_frame(&mut reader).unwrap(), "hi");
    }

    #[test]
    fn single_byte_reads() {
        let frame = encode("one byte at a time").unwrap();
        let mut reader = Chunked::new(frame, vec![1; 64]);
        assert_eq!(read_frame(&mut reader).unwrap(), "one byte at a time");
    }

    #[test]
    fn clean_close_is_peer_closed() {
        let (mut client, stream) = setup();
        drop(stream);
        assert!(matches!(read_frame(&mut client), Err(NetError::PeerClosed)));
    }

    #[test]
    fn partial_header_is_truncated() {
        let (mut client, mut stream) = setup();
        stream.write_all(b"HEAD 00").unwrap();
        stream.shutdown(Shutdown::Write).unwrap();

        assert!(matches!(
            read_frame(&mut client),
            Err(NetError::TruncatedFrame {
                expected: HEADER_LEN,
                received: 7
            })
        ));
    }

    #[test]
    fn partial_payload_is_truncated() {
        let (mut client, mut stream) = setup();
        stream.write_all(b"HEAD 0000010:hello").unwrap();
        drop(stream);

        assert!(matches!(
            read_frame(&mut client),
            Err(NetError::TruncatedFrame {
                expected: 10,
                received: 5
            })
        ));
    }

    #[test]
    fn split_waits_for_whole_frame() {
        let mut buf = b"HEAD 0000005:he".to_vec();
        assert_eq!(split_frame(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 15);

        buf.extend_from_slice(b"lloHEAD 00");
        assert_eq!(split_frame(&mut buf).unwrap().as_deref(), Some("hello"));
        assert_eq!(buf, b"HEAD 00");
        assert_eq!(split_frame(&mut buf).unwrap(), None);
    }

    #[test]
    fn invalid_utf8_payload() {
        let mut reader: &[u8] = b"HEAD 0000002:\xff\xfe";
        assert!(matches!(
            read_frame(&mut reader),
            Err(NetError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn large_frame_over_loopback() {
        let (mut client, mut stream) = setup();
        let text = "x".repeat(1024 * 1024);
        let expected = text.clone();

        // The payload is larger than the socket buffers, so write from a
        // separate thread while this one reads.
        let writer = std::thread::spawn(move || write_frame(&mut stream, &text));
        let received = read_frame(&mut client).unwrap();
        writer.join().unwrap().unwrap();

        assert_eq!(received, expected);
    }
}
