//! reqwest-backed HTTP sender
//!
//! This module implements [`ReqwestSender`], the production [`HttpSender`].
//! Every wrapper element is sent as an HTTP POST with
//! `Content-Type: text/xml; charset=utf-8` and an explicit content length
//! (the binding forbids chunked transfer coding).
//!
//! # Compression
//!
//! With compression enabled in the configuration, the underlying client
//! offers `Accept-Encoding: gzip, deflate` on every request and decodes
//! response bodies according to their `Content-Encoding` header. Request
//! bodies are gzip-encoded only once the negotiated `accept` set shows the
//! connection manager can decode them.
//!
//! # Teardown
//!
//! [`HttpSender::destroy`] cancels the sender's token; every in-flight
//! request task observes it and resolves its pending response with a
//! transport error, which the scheduler routes into disposal.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::body::Body;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::SessionParams;
use crate::transport::{CmResponse, HttpSender, ResponseFuture};

/// Production HTTP sender on top of a shared [`reqwest::Client`].
///
/// The sender carries no session state: it can be shared by any number of
/// concurrent requests and sessions.
#[derive(Debug)]
pub struct ReqwestSender {
    client: reqwest::Client,
    uri: Url,
    compression: bool,
    cancel: CancellationToken,
}

impl ReqwestSender {
    /// Build a sender for the configured connection manager endpoint.
    pub fn new(config: &ClientConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if !config.compression {
            builder = builder.no_gzip().no_deflate();
        }
        let client = builder
            .build()
            // Default reqwest client construction only fails when TLS
            // initialisation fails, which is a fatal startup condition on
            // any supported platform.
            .expect("failed to build reqwest client");
        Self {
            client,
            uri: config.uri.clone(),
            compression: config.compression,
            cancel: CancellationToken::new(),
        }
    }
}

impl HttpSender for ReqwestSender {
    /// Spawn the POST onto the runtime and return the pending response.
    fn send(&self, params: Option<&SessionParams>, body: &Body) -> ResponseFuture {
        let (slot, fut) = ResponseFuture::channel();
        let xml = body.to_xml();
        let gzip_request = self.compression
            && params
                .and_then(SessionParams::accept)
                .is_some_and(|accept| accept.contains("gzip"));
        let client = self.client.clone();
        let uri = self.uri.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(Error::Transport(
                    "sender destroyed with request in flight".to_string(),
                )),
                result = post_wrapper(&client, uri, xml, gzip_request) => result,
            };
            slot.resolve(result);
        });
        fut
    }

    fn destroy(&self) {
        self.cancel.cancel();
    }
}

/// Perform one POST and collect the status plus decoded body text.
async fn post_wrapper(
    client: &reqwest::Client,
    uri: Url,
    xml: String,
    gzip_request: bool,
) -> Result<CmResponse> {
    let request = client
        .post(uri)
        .header(CONTENT_TYPE, "text/xml; charset=utf-8");
    let request = if gzip_request {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(xml.as_bytes())
            .map_err(|e| Error::Transport(format!("gzip encoding failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::Transport(format!("gzip encoding failed: {e}")))?;
        request.header(CONTENT_ENCODING, "gzip").body(compressed)
    } else {
        request.body(xml)
    };
    let response = request.send().await?;
    let status = response.status().as_u16();
    let text = response.text().await?;
    Ok(CmResponse::new(status, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig::builder(
            Url::parse("http://localhost:9999/http-bind").unwrap(),
            "example.com",
        )
        .build()
    }

    #[test]
    fn test_new_does_not_panic() {
        let sender = ReqwestSender::new(&config());
        assert!(!sender.compression);
    }

    /// A request dispatched after `destroy()` resolves with a transport
    /// error instead of hanging.
    #[tokio::test]
    async fn test_destroy_unblocks_pending_response() {
        let sender = ReqwestSender::new(&config());
        // Nothing listens on port 9999, so without cancellation this would
        // wait out the connect failure; cancelling first guarantees the
        // transport-error path.
        sender.destroy();
        let fut = sender.send(None, &Body::empty());
        let err = tokio::time::timeout(Duration::from_secs(5), fut.receive())
            .await
            .expect("await must unblock")
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_) | Error::Http(_)));
    }
}
