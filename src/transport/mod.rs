//! HTTP sender abstraction
//!
//! The session scheduler is transport-agnostic: it hands each outbound
//! wrapper to an [`HttpSender`] and receives a [`ResponseFuture`] it can
//! await later, outside the session lock. Concrete implementations live in
//! submodules:
//!
//! - [`http::ReqwestSender`] -- reqwest-backed sender speaking the wire
//!   rules (POST, `text/xml; charset=utf-8`, no chunked transfer coding,
//!   negotiated compression).
//! - `fake::FakeSender` -- in-process scripted sender (cfg(test) only).
//!
//! # Design
//!
//! [`HttpSender::send`] must not block and must not perform I/O inline: it
//! dispatches the request (typically onto a spawned task) and returns
//! immediately. Senders hold no session-level state; everything they need
//! arrives through the [`SessionParams`] snapshot and the body itself, so
//! one sender instance serves any number of concurrent requests.

use std::fmt;

use tokio::sync::oneshot;

use crate::body::Body;
use crate::error::{Error, Result};
use crate::session::SessionParams;

/// A connection manager response: the HTTP status and the undecoded body
/// text.
///
/// The wrapper element is parsed lazily through [`CmResponse::body`] so
/// that the scheduler can still observe the HTTP status of a response
/// whose body is not valid XML (legacy CMs report terminal conditions as
/// bare 4xx pages).
#[derive(Debug)]
pub struct CmResponse {
    status: u16,
    text: String,
}

impl CmResponse {
    /// Build a response from its HTTP status and body text.
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The raw response text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse the response text into a wrapper element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyParse`](crate::Error::BodyParse) when the text
    /// is not a valid BOSH wrapper.
    pub fn body(&self) -> Result<Body> {
        Body::from_xml(&self.text)
    }
}

/// The pending side of one dispatched request.
///
/// Await it with [`ResponseFuture::receive`]; dropping the paired
/// [`ResponseSlot`] without resolving (sender teardown, task abort)
/// unblocks the await with a transport error.
#[derive(Debug)]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<CmResponse>>,
}

impl ResponseFuture {
    /// Create a connected `(slot, future)` pair.
    pub fn channel() -> (ResponseSlot, ResponseFuture) {
        let (tx, rx) = oneshot::channel();
        (ResponseSlot { tx }, ResponseFuture { rx })
    }

    /// Wait for the response.
    ///
    /// # Errors
    ///
    /// Returns whatever error the sender resolved the slot with, or
    /// [`Error::Transport`] when the slot was dropped unresolved.
    pub async fn receive(self) -> Result<CmResponse> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Transport(
                "pending response was cancelled".to_string(),
            )),
        }
    }
}

/// The resolving side of one dispatched request.
#[derive(Debug)]
pub struct ResponseSlot {
    tx: oneshot::Sender<Result<CmResponse>>,
}

impl ResponseSlot {
    /// Resolve the paired [`ResponseFuture`].
    ///
    /// A future whose awaiter has already gone away is silently ignored.
    pub fn resolve(self, result: Result<CmResponse>) {
        let _ = self.tx.send(result);
    }
}

/// Abstraction over the HTTP transport used for every request of a session.
///
/// Implementations must be safe to share across the scheduler's worker
/// tasks and must not retain per-session state between calls.
pub trait HttpSender: Send + Sync + fmt::Debug {
    /// Dispatch one wrapper element to the connection manager.
    ///
    /// Returns immediately with the pending response; the actual I/O runs
    /// in the background. `params` is `None` for the session-creation
    /// request (no parameters have been negotiated yet).
    fn send(&self, params: Option<&SessionParams>, body: &Body) -> ResponseFuture;

    /// Tear the sender down.
    ///
    /// Every in-flight [`ResponseFuture`] must unblock with a transport
    /// error promptly after this returns.
    fn destroy(&self);
}

pub mod http;

#[cfg(test)]
pub mod fake;
