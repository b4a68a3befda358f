//! Session parameters negotiated with the connection manager
//!
//! The first response of a session carries the attributes that bound all
//! subsequent client behavior. [`SessionParams`] parses them exactly once
//! from the session-creation request/response pair and is then immutable
//! for the life of the session.

use std::collections::BTreeSet;

use crate::attrs::{parse_rid, parse_token_set, parse_u64, parse_version, Version};
use crate::body::Body;
use crate::error::{Error, Result};

/// Immutable attributes of an established session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    sid: String,
    wait: u64,
    ver: Option<Version>,
    polling: Option<u64>,
    inactivity: Option<u64>,
    requests: Option<u64>,
    hold: Option<u64>,
    maxpause: Option<u64>,
    accept: Option<BTreeSet<String>>,
    charsets: Option<BTreeSet<String>>,
    acking: bool,
}

impl SessionParams {
    /// Parse the session parameters from the session-creation exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when the response lacks a `sid` or
    /// `wait` attribute, and [`Error::AttributeParse`] when any numeric
    /// attribute is malformed.
    pub fn from_session_init(request: &Body, response: &Body) -> Result<Self> {
        let sid = response
            .bosh_attribute("sid")
            .ok_or_else(|| {
                Error::Protocol("session creation response has no 'sid' attribute".to_string())
            })?
            .to_string();
        let wait = parse_u64("wait", response.bosh_attribute("wait"))?.ok_or_else(|| {
            Error::Protocol("session creation response has no 'wait' attribute".to_string())
        })?;

        // The CM only acks requests when its first response echoes the
        // session-creation RID in an 'ack' attribute. Any other value means
        // no acking; only a malformed value is an error.
        let creation_rid = parse_rid("rid", request.bosh_attribute("rid"))?.ok_or_else(|| {
            Error::Protocol("session creation request has no 'rid' attribute".to_string())
        })?;
        let acking = parse_rid("ack", response.bosh_attribute("ack"))? == Some(creation_rid);

        Ok(Self {
            sid,
            wait,
            ver: parse_version(response.bosh_attribute("ver"))?,
            polling: parse_u64("polling", response.bosh_attribute("polling"))?,
            inactivity: parse_u64("inactivity", response.bosh_attribute("inactivity"))?,
            requests: parse_u64("requests", response.bosh_attribute("requests"))?,
            hold: parse_u64("hold", response.bosh_attribute("hold"))?,
            maxpause: parse_u64("maxpause", response.bosh_attribute("maxpause"))?,
            accept: parse_token_set(response.bosh_attribute("accept")),
            charsets: parse_token_set(response.bosh_attribute("charsets")),
            acking,
        })
    }

    /// The opaque session identifier.
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Maximum seconds the CM may hold a request before responding.
    pub fn wait(&self) -> u64 {
        self.wait
    }

    /// Protocol version advertised by the CM, absent for legacy CMs.
    pub fn ver(&self) -> Option<Version> {
        self.ver
    }

    /// Minimum seconds between two empty requests.
    pub fn polling(&self) -> Option<u64> {
        self.polling
    }

    /// Maximum seconds the client may stay silent.
    pub fn inactivity(&self) -> Option<u64> {
        self.inactivity
    }

    /// Raw `requests` attribute, when the CM sent one.
    pub fn requests(&self) -> Option<u64> {
        self.requests
    }

    /// Effective bound on concurrently held requests.
    ///
    /// Defaults to 2 when the CM omitted `requests`, or to 1 when it also
    /// omitted `ver` (a legacy CM is assumed to support only serial
    /// polling).
    pub fn request_limit(&self) -> u64 {
        self.requests
            .unwrap_or(if self.ver.is_some() { 2 } else { 1 })
    }

    /// How many requests the CM keeps on hold to push data.
    pub fn hold(&self) -> Option<u64> {
        self.hold
    }

    /// Upper bound on a requested pause, when pausing is supported.
    pub fn maxpause(&self) -> Option<u64> {
        self.maxpause
    }

    /// Content encodings the CM will decode on requests.
    pub fn accept(&self) -> Option<&BTreeSet<String>> {
        self.accept.as_ref()
    }

    /// Character sets the CM can process.
    pub fn charsets(&self) -> Option<&BTreeSet<String>> {
        self.charsets.as_ref()
    }

    /// Whether the CM acknowledges requests (its first response echoed the
    /// session-creation RID).
    pub fn acking_requests(&self) -> bool {
        self.acking
    }
}
