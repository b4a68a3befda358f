//! In-process fake sender for scheduler unit tests
//!
//! [`FakeSender`] replaces real HTTP I/O in tests. Each dispatched request
//! appears on the paired [`FakeSenderHandle`] as a [`SentRequest`] carrying
//! the wrapper that was sent and the unresolved [`ResponseSlot`], so the
//! test decides when and how each request completes. That makes response
//! ordering fully deterministic, which the scheduler scenarios rely on.
//!
//! ```text
//! client send() ----> outbound_tx ----> outbound_rx (test reads)
//! test resolves SentRequest.slot ----> scheduler's pending response
//! ```

use tokio::sync::mpsc;

use crate::body::Body;
use crate::session::SessionParams;
use crate::transport::{HttpSender, ResponseFuture, ResponseSlot};

/// One request observed by the fake sender.
#[derive(Debug)]
pub struct SentRequest {
    /// The wrapper the scheduler dispatched.
    pub body: Body,
    /// Resolve this to complete the request from the test side.
    pub slot: ResponseSlot,
}

/// In-process sender whose responses are controlled by the test.
#[derive(Debug)]
pub struct FakeSender {
    outbound_tx: mpsc::UnboundedSender<SentRequest>,
}

impl FakeSender {
    /// Create a `(FakeSender, FakeSenderHandle)` pair.
    pub fn new() -> (Self, FakeSenderHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (Self { outbound_tx }, FakeSenderHandle { outbound_rx })
    }
}

/// Test-side handle observing everything a [`FakeSender`] dispatched.
#[derive(Debug)]
pub struct FakeSenderHandle {
    /// Requests in dispatch order, each with its unresolved response slot.
    pub outbound_rx: mpsc::UnboundedReceiver<SentRequest>,
}

impl FakeSenderHandle {
    /// Wait for the next dispatched request.
    ///
    /// # Panics
    ///
    /// Panics if the sender is dropped or nothing arrives within two
    /// seconds, so a stuck scheduler fails the test instead of hanging it.
    pub async fn expect_request(&mut self) -> SentRequest {
        tokio::time::timeout(std::time::Duration::from_secs(2), self.outbound_rx.recv())
            .await
            .expect("timed out waiting for a dispatched request")
            .expect("sender dropped")
    }
}

impl HttpSender for FakeSender {
    /// Record the request and hand the unresolved slot to the test.
    ///
    /// If the handle is gone the slot is dropped, which resolves the
    /// returned future with a transport error, the same observable
    /// behavior as a torn-down real sender.
    fn send(&self, _params: Option<&SessionParams>, body: &Body) -> ResponseFuture {
        let (slot, fut) = ResponseFuture::channel();
        let _ = self.outbound_tx.send(SentRequest {
            body: body.clone(),
            slot,
        });
        fut
    }

    fn destroy(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CmResponse;

    #[tokio::test]
    async fn test_request_and_scripted_response_round_trip() {
        let (sender, mut handle) = FakeSender::new();
        let fut = sender.send(None, &Body::empty());

        let sent = handle.expect_request().await;
        assert_eq!(sent.body, Body::empty());
        sent.slot.resolve(Ok(CmResponse::new(200, "<body/>")));

        let resp = fut.receive().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_dropped_handle_fails_pending_requests() {
        let (sender, handle) = FakeSender::new();
        drop(handle);
        let fut = sender.send(None, &Body::empty());
        assert!(fut.receive().await.is_err());
    }

    #[tokio::test]
    async fn test_requests_observed_in_dispatch_order() {
        let (sender, mut handle) = FakeSender::new();
        for i in 0..3u64 {
            let body = Body::builder()
                .set_attribute(crate::body::QName::bosh("rid"), Some(i.to_string()))
                .build();
            let _ = sender.send(None, &body);
        }
        for i in 0..3u64 {
            let sent = handle.expect_request().await;
            assert_eq!(sent.body.bosh_attribute("rid"), Some(i.to_string().as_str()));
        }
    }
}
