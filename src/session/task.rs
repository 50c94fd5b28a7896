//! Per-client streaming task
//!
//! Each admitted client gets one of these. It writes the stream header,
//! waits for the first frame, then loops: check the client, take the next
//! unseen frame from the pool, write it, pace. Every write happens without
//! the pool lock held and is bounded by the write timeout.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;

use super::state::{DisconnectReason, SessionPhase, SessionState};
use crate::alloc::PoolBuffer;
use crate::context::Context;
use crate::pacing::Pacer;
use crate::pool::{Delivery, Membership};
use crate::protocol;
use crate::restart;
use crate::transport::Transport;

/// One client session
pub struct Session<T> {
    ctx: Arc<Context>,
    transport: T,
    membership: Option<Membership>,
    record: Option<PoolBuffer>,
    state: SessionState,
    part: BytesMut,
}

impl<T: Transport> Session<T> {
    /// Create a session for an admitted client.
    ///
    /// `record` is the session's memory reservation; it is held until
    /// teardown.
    pub fn new(
        id: u64,
        ctx: Arc<Context>,
        transport: T,
        membership: Membership,
        record: Option<PoolBuffer>,
    ) -> Self {
        let peer = transport.peer_addr();
        Self {
            ctx,
            transport,
            membership: Some(membership),
            record,
            state: SessionState::new(id, peer),
            part: BytesMut::with_capacity(64),
        }
    }

    /// Session state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Stream until the client goes away; returns the final state
    pub async fn run(mut self) -> SessionState {
        tracing::info!(
            session_id = self.state.id,
            peer = ?self.state.peer_addr,
            "Session started"
        );

        match self.connect().await {
            Ok(()) => self.stream().await,
            Err(reason) => self.state.disconnect(reason),
        }

        self.teardown().await
    }

    async fn connect(&mut self) -> Result<(), DisconnectReason> {
        let timeout = self.ctx.config().server.write_timeout;
        write_bounded(&mut self.transport, timeout, &protocol::stream_preamble()).await?;
        self.state.add_bytes_sent(protocol::HEADER.len() + protocol::BOUNDARY.len());

        let pool = Arc::clone(self.ctx.pool());
        let poll = self.ctx.config().server.first_frame_poll;
        while !pool.has_published() {
            if !self.transport.is_connected() {
                return Err(DisconnectReason::PeerClosed);
            }
            // Bounded so a client that leaves early is noticed.
            let _ = tokio::time::timeout(poll, pool.wait_first_frame()).await;
        }

        self.state.start_streaming();
        Ok(())
    }

    async fn stream(&mut self) {
        let mut pacer = Pacer::new(self.ctx.config().capture.frame_interval());

        loop {
            if !self.transport.is_connected() {
                self.state.disconnect(DisconnectReason::PeerClosed);
                return;
            }

            if let Err(reason) = self.serve_next().await {
                self.state.disconnect(reason);
                return;
            }

            pacer.tick().await;
        }
    }

    async fn serve_next(&mut self) -> Result<(), DisconnectReason> {
        let Some(membership) = self.membership.as_mut() else {
            return Err(DisconnectReason::PeerClosed);
        };

        let delivery = match membership.next() {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return Ok(()),
            Err(e) if e.is_device_fatal() => {
                let delay = self.ctx.config().memory.restart_delay;
                restart::device_fatal(self.ctx.restart_hook(), delay, &e).await;
                return Err(DisconnectReason::DeviceFatal);
            }
            Err(e) => {
                tracing::warn!(session_id = self.state.id, error = %e, "Session buffer unavailable");
                return Err(DisconnectReason::BufferUnavailable);
            }
        };

        let timeout = self.ctx.config().server.write_timeout;
        let written = match &delivery {
            Delivery::Shared(frame) => {
                write_part(&mut self.transport, &mut self.part, timeout, frame.data()).await?
            }
            Delivery::Private { .. } => {
                let data = membership.private_bytes().unwrap_or_default();
                write_part(&mut self.transport, &mut self.part, timeout, data).await?
            }
        };

        self.state.add_bytes_sent(written);
        self.state.record_frame();
        tracing::trace!(
            session_id = self.state.id,
            seq = delivery.seq(),
            bytes = written,
            "Frame sent"
        );
        Ok(())
    }

    async fn teardown(mut self) -> SessionState {
        if let Some(membership) = self.membership.as_mut() {
            membership.release_private();
            self.state.stats.frames_skipped = membership.cursor().skipped();
        }
        self.transport.close().await;

        // Leaving the pool settles whatever this session still owed.
        drop(self.membership.take());
        drop(self.record.take());

        self.state.terminate();
        debug_assert_eq!(self.state.phase, SessionPhase::Terminated);
        self.ctx.counters().record_completed(&self.state.stats);

        tracing::info!(
            session_id = self.state.id,
            reason = %self.state.disconnect_reason.unwrap_or(DisconnectReason::PeerClosed),
            frames = self.state.stats.frames_sent,
            bytes = self.state.stats.bytes_sent,
            skipped = self.state.stats.frames_skipped,
            duration_ms = self.state.stats.duration.as_millis() as u64,
            "Session ended"
        );

        self.state
    }
}

/// Write one multipart part; returns the bytes written
async fn write_part<T: Transport>(
    transport: &mut T,
    part: &mut BytesMut,
    timeout: Duration,
    data: &[u8],
) -> Result<usize, DisconnectReason> {
    part.clear();
    protocol::encode_part_header(data.len(), part);

    write_bounded(transport, timeout, &part[..]).await?;
    write_bounded(transport, timeout, data).await?;
    write_bounded(transport, timeout, protocol::BOUNDARY).await?;

    Ok(part.len() + data.len() + protocol::BOUNDARY.len())
}

async fn write_bounded<T: Transport>(
    transport: &mut T,
    timeout: Duration,
    buf: &[u8],
) -> Result<(), DisconnectReason> {
    match tokio::time::timeout(timeout, transport.write_all(buf)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Write failed");
            Err(DisconnectReason::WriteFailed)
        }
        Err(_) => Err(DisconnectReason::WriteTimeout),
    }
}
