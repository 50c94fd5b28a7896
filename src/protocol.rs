//! multipart/x-mixed-replace framing
//!
//! A stream is the response header, a boundary, and then one part per
//! frame, each followed by another boundary:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Access-Control-Allow-Origin: *\r\n
//! Content-Type: multipart/x-mixed-replace; boundary=+++===123454321===+++\r\n
//! \r\n--+++===123454321===+++\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: 5123\r\n
//! \r\n
//! <jpeg bytes>
//! \r\n--+++===123454321===+++\r\n
//! ...
//! ```
//!
//! The boundary's leading CRLF also terminates the response header block.

use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};

/// Default request path for the stream
pub const STREAM_PATH: &str = "/mjpeg/1";

/// Multipart boundary token
pub const BOUNDARY_TOKEN: &str = "+++===123454321===+++";

/// Response header, sent once per client
pub const HEADER: &[u8] = b"HTTP/1.1 200 OK\r\n\
Access-Control-Allow-Origin: *\r\n\
Content-Type: multipart/x-mixed-replace; boundary=+++===123454321===+++\r\n";

/// Boundary, sent after the header and after every part
pub const BOUNDARY: &[u8] = b"\r\n--+++===123454321===+++\r\n";

/// Start of every part header; the length and a blank line follow
pub const CONTENT_TYPE: &[u8] = b"Content-Type: image/jpeg\r\nContent-Length: ";

/// Header and first boundary as one buffer
pub fn stream_preamble() -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER.len() + BOUNDARY.len());
    buf.put_slice(HEADER);
    buf.put_slice(BOUNDARY);
    buf.freeze()
}

/// Write the part header for a frame of `len` bytes into `buf`
pub fn encode_part_header(len: usize, buf: &mut BytesMut) {
    buf.reserve(CONTENT_TYPE.len() + 24);
    buf.put_slice(CONTENT_TYPE);
    // Formatting into a BytesMut cannot fail.
    let _ = write!(buf, "{}\r\n\r\n", len);
}

/// Part header for a frame of `len` bytes
pub fn part_header(len: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(CONTENT_TYPE.len() + 24);
    encode_part_header(len, &mut buf);
    buf.freeze()
}
