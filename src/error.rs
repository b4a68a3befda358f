//! Error types for the BOSH client
//!
//! This module defines all error types used throughout the crate, using
//! `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::condition::TerminalBindingCondition;

/// Main error type for BOSH client operations
///
/// This enum encompasses all possible errors that can occur during session
/// negotiation, request scheduling, body parsing, and transport interactions.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed body XML (not a single well-formed BOSH `<body/>` wrapper)
    #[error("malformed body: {0}")]
    BodyParse(String),

    /// A well-known attribute carried a value that does not parse
    #[error("invalid '{attribute}' attribute: {message}")]
    AttributeParse {
        /// Local name of the offending attribute
        attribute: &'static str,
        /// What was wrong with the value
        message: String,
    },

    /// The connection manager violated the binding protocol (e.g. a session
    /// creation response without a `sid`)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection manager terminated the session with a fatal condition
    #[error("terminal binding condition: {message}")]
    TerminalBinding {
        /// The reported condition, when it maps to the defined catalogue
        condition: Option<TerminalBindingCondition>,
        /// Full description, including the raw condition name
        message: String,
    },

    /// The HTTP layer failed or a pending response was cancelled
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection manager reported a missing response for a request the
    /// client no longer holds
    #[error("could not resolve report of missing response for rid {rid}")]
    AckReportUnresolved {
        /// The RID named by the `report` attribute
        rid: u64,
    },

    /// `send` was called on a session that is no longer working
    #[error("session is closed")]
    SessionClosed,

    /// HTTP request errors from the reqwest transport
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Build a [`Error::TerminalBinding`] from an optional condition and the
    /// raw attribute value observed on the wire.
    ///
    /// The message always embeds the raw condition name so that applications
    /// (and tests) can match on it even when the value falls outside the
    /// defined catalogue.
    pub(crate) fn terminal(condition: Option<TerminalBindingCondition>, raw: Option<&str>) -> Self {
        let message = match (condition, raw) {
            (Some(cond), _) => format!("{}: {}", cond.as_str(), cond.message()),
            (None, Some(raw)) => format!("{}: unrecognized condition", raw),
            (None, None) => "session terminated by connection manager".to_string(),
        };
        Error::TerminalBinding { condition, message }
    }
}

/// Result type alias for BOSH client operations
pub type Result<T> = std::result::Result<T, Error>;
