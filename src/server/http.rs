//! Minimal HTTP request handling
//!
//! Only enough of HTTP/1.1 to route a request: the request line is parsed,
//! headers are read and ignored. Anything that is not the stream path gets a
//! plain-text diagnostics page.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

const HEAD_END: &[u8] = b"\r\n\r\n";

/// Request line of an incoming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method, e.g. `GET`
    pub method: String,
    /// Request target as sent, including any query string
    pub uri: String,
}

impl RequestHead {
    /// Parse the request line out of a complete request head
    pub fn parse(head: &[u8]) -> Result<Self> {
        let line_end = head
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(head.len());
        let line = std::str::from_utf8(&head[..line_end])
            .map_err(|_| Error::transport("request line is not UTF-8"))?;

        let mut parts = line.split_ascii_whitespace();
        let (Some(method), Some(uri), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::transport(format!("malformed request line: {line:?}")));
        };
        if !version.starts_with("HTTP/") {
            return Err(Error::transport(format!("unsupported protocol: {version}")));
        }

        Ok(Self {
            method: method.to_string(),
            uri: uri.to_string(),
        })
    }

    /// Path component of the URI
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(&self.uri, |(path, _)| path)
    }

    /// Number of query arguments
    pub fn arg_count(&self) -> usize {
        self.uri
            .split_once('?')
            .map_or(0, |(_, query)| query.split('&').filter(|a| !a.is_empty()).count())
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// Read a request head, bounded in size and time
pub async fn read_request_head<R>(
    reader: &mut R,
    max_bytes: usize,
    timeout: Duration,
) -> Result<RequestHead>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, read_head(reader, max_bytes)).await {
        Ok(result) => result,
        Err(_) => Err(Error::transport("request head timed out")),
    }
}

async fn read_head<R>(reader: &mut R, max_bytes: usize) -> Result<RequestHead>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(max_bytes.min(1024));

    loop {
        // Only the newly read bytes and the three before them can complete
        // the terminator.
        let scan_from = buf.len().saturating_sub(HEAD_END.len() - 1);
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(Error::transport("connection closed before request head"));
        }

        if let Some(pos) = buf[scan_from..]
            .windows(HEAD_END.len())
            .position(|w| w == HEAD_END)
        {
            return RequestHead::parse(&buf[..scan_from + pos]);
        }

        if buf.len() >= max_bytes {
            return Err(Error::transport(format!(
                "request head exceeds {max_bytes} bytes"
            )));
        }
    }
}

/// Diagnostics page for any request that is not the stream
pub fn not_found_response(head: &RequestHead) -> Bytes {
    let method = if head.is_get() { "GET" } else { "POST" };
    let body = format!(
        "Server is running!\n\nURI: {}\nMethod: {}\nArguments: {}\n",
        head.path(),
        method,
        head.arg_count()
    );

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    Bytes::from(response)
}
