//! MJPEG server listener
//!
//! Handles the TCP accept loop and routes requests: the stream path goes to
//! admission, everything else gets the diagnostics page.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::context::Context;
use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::dispatch::Dispatcher;
use crate::server::http;
use crate::transport::TcpTransport;

/// HTTP front end for the MJPEG stream
pub struct MjpegServer {
    ctx: Arc<Context>,
    dispatcher: Arc<Dispatcher>,
}

impl MjpegServer {
    /// Create a server over a built context
    pub fn new(ctx: Arc<Context>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));
        Self { ctx, dispatcher }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn config(&self) -> &ServerConfig {
        &self.ctx.config().server
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config().bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(
            addr = %listener.local_addr()?,
            path = %self.config().stream_path,
            "MJPEG server listening"
        );

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        self.dispatcher.shutdown().await;
        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::debug!(peer = %peer_addr, "New connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let config = self.config().clone();
        let dispatcher = Arc::clone(&self.dispatcher);

        tokio::spawn(async move {
            if let Err(e) = route(socket, &config, &dispatcher).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Request failed");
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config().tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config().bind_addr
    }
}

impl std::fmt::Debug for MjpegServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MjpegServer")
            .field("bind_addr", &self.bind_addr())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

async fn route(mut socket: TcpStream, config: &ServerConfig, dispatcher: &Dispatcher) -> Result<()> {
    let head =
        http::read_request_head(&mut socket, config.max_request_bytes, config.request_timeout)
            .await?;
    tracing::debug!(method = %head.method, uri = %head.uri, "Request");

    if head.is_get() && head.path() == config.stream_path {
        dispatcher.admit(TcpTransport::new(socket)).await;
        return Ok(());
    }

    socket.write_all(&http::not_found_response(&head)).await?;
    socket.shutdown().await?;
    Ok(())
}
