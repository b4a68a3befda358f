//! One in-flight request/response pair
//!
//! An [`Exchange`] binds a dispatched request wrapper to the deferred
//! response that will eventually answer it. The scheduler owns each
//! exchange from enqueue until it is removed after integration.
//!
//! The response slot is filled *after* the exchange is already visible in
//! the queue (dispatch happens outside the session lock), so the worker
//! that claims an exchange may have to wait briefly for the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::body::Body;
use crate::transport::ResponseFuture;

/// A request wrapper together with its pending response.
#[derive(Debug)]
pub struct Exchange {
    rid: u64,
    request: Body,
    claimed: AtomicBool,
    slot: Mutex<Option<ResponseFuture>>,
    slot_ready: Notify,
}

impl Exchange {
    /// Create an exchange for a request that is about to be dispatched.
    pub fn new(rid: u64, request: Body) -> Self {
        Self {
            rid,
            request,
            claimed: AtomicBool::new(false),
            slot: Mutex::new(None),
            slot_ready: Notify::new(),
        }
    }

    /// The request identifier carried by the request wrapper.
    pub fn rid(&self) -> u64 {
        self.rid
    }

    /// The request wrapper as dispatched.
    pub fn request(&self) -> &Body {
        &self.request
    }

    /// Claim this exchange for processing. Returns `false` when another
    /// worker already holds it.
    pub fn try_claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    /// Whether a worker has claimed this exchange.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Attach the deferred response after dispatching the request.
    pub fn supply_response(&self, response: ResponseFuture) {
        *self.slot.lock().expect("exchange slot poisoned") = Some(response);
        self.slot_ready.notify_one();
    }

    /// Take the deferred response, waiting for dispatch to attach it if
    /// the claiming worker got here first.
    pub async fn response(&self) -> ResponseFuture {
        loop {
            if let Some(response) = self.slot.lock().expect("exchange slot poisoned").take() {
                return response;
            }
            // notify_one stores a permit, so a supply_response racing past
            // the check above still wakes this wait immediately.
            self.slot_ready.notified().await;
        }
    }
}
