//! Client transports
//!
//! A session only needs three things from its connection: write bytes,
//! tell whether the peer is still there, and close. [`TcpTransport`] is the
//! real thing; [`IoTransport`] wraps any async writer, which is what the
//! tests use.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// A client connection as seen by a session
pub trait Transport: Send + 'static {
    /// Write the whole buffer
    fn write_all(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Whether the peer is still connected; must not block
    fn is_connected(&mut self) -> bool;

    /// Flush and close the connection
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Remote address, if known
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// TCP client connection
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: Option<SocketAddr>,
    connected: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            stream,
            peer,
            connected: true,
        }
    }
}

impl Transport for TcpTransport {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let result = self.stream.write_all(buf).await;
        if result.is_err() {
            self.connected = false;
        }
        result
    }

    fn is_connected(&mut self) -> bool {
        if !self.connected {
            return false;
        }

        // Clients send nothing after their request, so a readable socket
        // means EOF or a reset. Stray bytes are discarded.
        let mut peer = [0u8; 64];
        self.connected = match self.stream.try_read(&mut peer) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        };
        self.connected
    }

    async fn close(&mut self) {
        self.connected = false;
        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(error = %e, "Shutdown after disconnect");
        }
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Transport over any async writer
///
/// Disconnection is only noticed when a write fails.
#[derive(Debug)]
pub struct IoTransport<S> {
    io: S,
    connected: bool,
}

impl<S> IoTransport<S> {
    pub fn new(io: S) -> Self {
        Self {
            io,
            connected: true,
        }
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> S {
        self.io
    }
}

impl<S> Transport for IoTransport<S>
where
    S: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if !self.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let result = self.io.write_all(buf).await;
        if result.is_err() {
            self.connected = false;
        }
        result
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    async fn close(&mut self) {
        self.connected = false;
        let _ = self.io.shutdown().await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Shared view of what a session did to its transport
    #[derive(Debug, Clone, Default)]
    pub struct Peer {
        written: Arc<Mutex<Vec<u8>>>,
        gone: Arc<AtomicBool>,
        stalled: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    impl Peer {
        pub fn transport(&self) -> PeerTransport {
            PeerTransport(self.clone())
        }

        pub fn written(&self) -> Vec<u8> {
            self.written.lock().clone()
        }

        /// The client goes away
        pub fn hang_up(&self) {
            self.gone.store(true, Ordering::SeqCst);
        }

        /// Writes stop completing
        pub fn stall(&self) {
            self.stalled.store(true, Ordering::SeqCst);
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    /// Transport that records writes into a [`Peer`]
    #[derive(Debug)]
    pub struct PeerTransport(Peer);

    impl Transport for PeerTransport {
        async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            if self.0.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.0.gone.load(Ordering::SeqCst) {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            self.0.written.lock().extend_from_slice(buf);
            Ok(())
        }

        fn is_connected(&mut self) -> bool {
            !self.0.gone.load(Ordering::SeqCst)
        }

        async fn close(&mut self) {
            self.0.closed.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_io_transport_writes() {
        let mock = tokio_test::io::Builder::new().write(b"hello").build();
        let mut transport = IoTransport::new(mock);

        transport.write_all(b"hello").await.unwrap();
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_io_transport_write_error_disconnects() {
        let mock = tokio_test::io::Builder::new()
            .write_error(io::ErrorKind::BrokenPipe.into())
            .build();
        let mut transport = IoTransport::new(mock);

        assert!(transport.write_all(b"frame").await.is_err());
        assert!(!transport.is_connected());
        assert!(transport.write_all(b"again").await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_transport_detects_peer_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let mut transport = TcpTransport::new(server);
        assert!(transport.is_connected());
        assert!(transport.peer_addr().is_some());

        drop(client);
        // Give the FIN time to arrive.
        let mut connected = true;
        for _ in 0..50 {
            connected = transport.is_connected();
            if !connected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!connected);
    }

    #[tokio::test]
    async fn test_tcp_transport_write_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let mut transport = TcpTransport::new(server);

        transport.write_all(b"bytes").await.unwrap();
        transport.close().await;
        assert!(!transport.is_connected());

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"bytes");
    }
}
