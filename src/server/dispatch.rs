//! Client admission
//!
//! Turns an incoming transport into a running session, or turns it away.
//! The dispatcher never writes to the client; the session sends the stream
//! header itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;

use crate::alloc::{FailurePolicy, Placement};
use crate::context::Context;
use crate::session::{Session, SessionState};
use crate::transport::Transport;

/// Outcome of [`Dispatcher::admit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A session with this id is running
    Accepted(u64),
    /// The concurrency cap was reached
    Rejected,
    /// No memory for the session record
    Failed,
}

/// Admits clients and owns their session tasks
pub struct Dispatcher {
    ctx: Arc<Context>,
    next_session_id: AtomicU64,
    sessions: Mutex<JoinSet<SessionState>>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            ctx,
            next_session_id: AtomicU64::new(1),
            sessions: Mutex::new(JoinSet::new()),
        }
    }

    /// Admit a client, starting a session for it if there is room
    pub async fn admit<T: Transport>(&self, mut transport: T) -> Admission {
        let server = &self.ctx.config().server;
        let pool = self.ctx.pool();
        let peer = transport.peer_addr();

        if pool.active_sessions() >= server.max_clients {
            return self.reject(transport, "limit reached").await;
        }

        let record = if server.session_stack_bytes > 0 {
            match self.ctx.allocator().acquire(
                None,
                server.session_stack_bytes,
                FailurePolicy::BestEffort,
                Placement::FastOnly,
            ) {
                Ok(Some(record)) => Some(record),
                _ => {
                    tracing::error!(
                        peer = ?peer,
                        size = server.session_stack_bytes,
                        "No memory for session, dropping client"
                    );
                    self.ctx.counters().record_failed();
                    transport.close().await;
                    return Admission::Failed;
                }
            }
        } else {
            None
        };

        // Another admission may have taken the last slot since the check.
        let Some(membership) = pool.try_join(server.max_clients) else {
            drop(record);
            return self.reject(transport, "limit reached").await;
        };

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.ctx.counters().record_accepted();
        tracing::debug!(
            session_id = id,
            peer = ?peer,
            active = pool.active_sessions(),
            "Client admitted"
        );

        let session = Session::new(id, Arc::clone(&self.ctx), transport, membership, record);
        {
            let mut sessions = self.sessions.lock();
            while sessions.try_join_next().is_some() {}
            sessions.spawn(session.run());
        }

        Admission::Accepted(id)
    }

    async fn reject<T: Transport>(&self, mut transport: T, reason: &str) -> Admission {
        tracing::warn!(
            peer = ?transport.peer_addr(),
            max_clients = self.ctx.config().server.max_clients,
            reason = reason,
            "Client rejected"
        );
        self.ctx.counters().record_rejected();
        transport.close().await;
        Admission::Rejected
    }

    /// Sessions spawned and not yet reaped
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Abort every running session and wait for them to go
    pub async fn shutdown(&self) {
        let mut sessions = std::mem::take(&mut *self.sessions.lock());
        if sessions.is_empty() {
            return;
        }

        tracing::info!(sessions = sessions.len(), "Stopping sessions");
        sessions.abort_all();
        while sessions.join_next().await.is_some() {}
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("next_session_id", &self.next_session_id)
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}
