//! # Event Bridge
//!
//! Entry point for everything the engine posts from its own threads. Posting
//! is a token compare plus an unbounded channel send, so it never waits on
//! the owner loop. Ordering is the channel's FIFO order.

use crate::event::{Decoded, EventEnvelope, EventKind};
use crate::player::Mailbox;
use crate::session::SessionRegistry;
use bridge_traits::engine::{EngineCallbacks, EventPayload, SessionToken};
use bridge_traits::time::Clock;
use core_runtime::logging::EngineLogRouter;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};
use tracing::{debug, warn};

/// Holds only a weak sender: the engine keeps the bridge alive, and the
/// mailbox must close once every [`Player`](crate::player::Player) handle is
/// dropped.
#[derive(Clone)]
pub struct EventBridge {
    tx: WeakUnboundedSender<Mailbox>,
    sessions: Arc<SessionRegistry>,
    log_router: Arc<EngineLogRouter>,
    clock: Arc<dyn Clock>,
}

impl EventBridge {
    pub(crate) fn new(
        tx: &UnboundedSender<Mailbox>,
        sessions: Arc<SessionRegistry>,
        log_router: Arc<EngineLogRouter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tx: tx.downgrade(),
            sessions,
            log_router,
            clock,
        }
    }

    /// Enqueue an envelope for the owner loop.
    ///
    /// Returns `false` when the envelope was dropped, either because its
    /// session is no longer live or because the owner loop has shut down.
    pub fn post(&self, envelope: EventEnvelope) -> bool {
        if !self.sessions.is_live(envelope.session) {
            debug!(session = %envelope.session, kind = ?envelope.kind, "Dropping envelope for stale session");
            return false;
        }
        let sent = self
            .tx
            .upgrade()
            .map(|tx| tx.send(Mailbox::Event(envelope)).is_ok())
            .unwrap_or(false);
        if !sent {
            debug!("Player loop gone, dropping envelope");
        }
        sent
    }
}

impl EngineCallbacks for EventBridge {
    fn post_event(
        &self,
        session: SessionToken,
        time_ms: i64,
        what: i32,
        arg1: i64,
        arg2: i64,
        payload: Option<EventPayload>,
    ) {
        if !self.sessions.is_live(session) {
            debug!(session = %session, what, "Dropping engine event for stale session");
            return;
        }

        let kind = match EventKind::decode(what, arg1, arg2) {
            Decoded::Event(kind) => kind,
            Decoded::Nop => return,
            Decoded::Unknown => {
                warn!(session = %session, what, arg1, arg2, "Unknown engine event");
                return;
            }
        };

        let time_ms = if time_ms > 0 {
            time_ms
        } else {
            self.clock.unix_timestamp_millis()
        };

        let mut envelope = EventEnvelope::new(session, kind, arg1, arg2).with_engine_time(time_ms);
        envelope.payload = payload;
        self.post(envelope);
    }

    fn post_log(&self, level: i32, tag: &str, bytes: &[u8]) {
        self.log_router.route(level, tag, bytes);
    }
}

impl fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("session", &self.sessions.current())
            .field("closed", &self.tx.upgrade().is_none())
            .finish()
    }
}
