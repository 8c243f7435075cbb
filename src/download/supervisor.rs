//! Cancellation & liveness supervisor.
//!
//! Wraps a session's event delivery and monitors the caller's liveness. The
//! caller is represented two ways: an optional explicit cancellation token
//! (checked before each delivery) and the download future itself (dropping
//! it drops the supervisor, whose session teardown cancels the pump). When
//! the caller is gone the supervisor cancels the transport session and
//! suppresses delivery instead of handing events to nobody.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::event::{RequestHandle, TransportEvent};
use super::session::TransportSession;

/// Event source guarded by a caller-liveness check.
#[derive(Debug)]
pub struct Supervisor {
    session: TransportSession,
    caller: Option<CancellationToken>,
}

impl Supervisor {
    /// Wraps a session, optionally watching a caller-supplied token.
    #[must_use]
    pub fn new(session: TransportSession, caller: Option<CancellationToken>) -> Self {
        Self { session, caller }
    }

    /// The wrapped session's correlation handle.
    #[must_use]
    pub fn handle(&self) -> RequestHandle {
        self.session.handle()
    }

    /// Delivers the next event, unless the caller is gone.
    ///
    /// If the caller's token fires first, the session is cancelled, the
    /// event is suppressed, and `None` is returned. `None` therefore always
    /// means "cancelled, permanently silent channel" — the clean-shutdown
    /// signal, never a hang.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        match &self.caller {
            Some(caller) => {
                let caller = caller.clone();
                tokio::select! {
                    biased;
                    () = caller.cancelled() => {
                        debug!(handle = %self.session.handle(), "caller gone; cancelling session");
                        self.session.cancel();
                        None
                    }
                    event = self.session.next_event() => event,
                }
            }
            None => self.session.next_event().await,
        }
    }

    /// Cancels the underlying session. Idempotent.
    pub fn cancel(&self) {
        self.session.cancel();
    }

    /// Whether the caller's token has fired.
    #[must_use]
    pub fn caller_cancelled(&self) -> bool {
        self.caller
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
