//! Listener registration and event dispatch
//!
//! Applications observe a session through three listener categories:
//! connection lifecycle events, outbound requests, and inbound responses.
//! Dispatch is panic-isolated: a listener that panics is logged and
//! skipped, and can never take the scheduler down with it.
//!
//! Callbacks run on scheduler tasks with the session lock released; they
//! must not block for long.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::body::Body;
use crate::error::Error;

/// A session lifecycle event.
///
/// Exactly one event is delivered per state edge: established once,
/// then either [`ConnectionEvent::Closed`] or
/// [`ConnectionEvent::ClosedOnError`] once.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The session-creation response was integrated; the session is up.
    Established,
    /// The session ended normally (clean terminate without a condition).
    Closed,
    /// The session ended because of the carried error.
    ClosedOnError(Error),
}

impl ConnectionEvent {
    /// The error that ended the session, for error closes.
    pub fn cause(&self) -> Option<&Error> {
        match self {
            ConnectionEvent::ClosedOnError(cause) => Some(cause),
            _ => None,
        }
    }
}

type ConnectionCallback = Arc<dyn Fn(&ConnectionEvent) + Send + Sync + 'static>;
type BodyCallback = Arc<dyn Fn(&Body) + Send + Sync + 'static>;

/// The registered listener sets of one client.
///
/// Registration copies never block dispatch: firing snapshots the current
/// set and iterates the snapshot, so listeners added mid-dispatch see only
/// later events.
#[derive(Default)]
pub(crate) struct Listeners {
    connection: RwLock<Vec<ConnectionCallback>>,
    request: RwLock<Vec<BodyCallback>>,
    response: RwLock<Vec<BodyCallback>>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_connection_listener(
        &self,
        listener: impl Fn(&ConnectionEvent) + Send + Sync + 'static,
    ) {
        self.connection
            .write()
            .expect("listener set poisoned")
            .push(Arc::new(listener));
    }

    pub(crate) fn add_request_listener(&self, listener: impl Fn(&Body) + Send + Sync + 'static) {
        self.request
            .write()
            .expect("listener set poisoned")
            .push(Arc::new(listener));
    }

    pub(crate) fn add_response_listener(&self, listener: impl Fn(&Body) + Send + Sync + 'static) {
        self.response
            .write()
            .expect("listener set poisoned")
            .push(Arc::new(listener));
    }

    pub(crate) fn fire_connection(&self, event: &ConnectionEvent) {
        let snapshot = self
            .connection
            .read()
            .expect("listener set poisoned")
            .clone();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!("connection listener panicked; event suppressed for it");
            }
        }
    }

    pub(crate) fn fire_request(&self, body: &Body) {
        Self::fire_body(&self.request, body, "request");
    }

    pub(crate) fn fire_response(&self, body: &Body) {
        Self::fire_body(&self.response, body, "response");
    }

    fn fire_body(set: &RwLock<Vec<BodyCallback>>, body: &Body, category: &str) {
        let snapshot = set.read().expect("listener set poisoned").clone();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(body))).is_err() {
                warn!(category, "listener panicked; event suppressed for it");
            }
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field(
                "connection",
                &self.connection.read().map(|v| v.len()).unwrap_or(0),
            )
            .field("request", &self.request.read().map(|v| v.len()).unwrap_or(0))
            .field(
                "response",
                &self.response.read().map(|v| v.len()).unwrap_or(0),
            )
            .finish()
    }
}
