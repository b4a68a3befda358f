//! Terminal binding conditions
//!
//! When a connection manager ends a session it reports why through the
//! `condition` attribute of a `type='terminate'` body. This module carries
//! the XEP-0124 §17 condition catalogue together with the legacy HTTP status
//! code mapping used by connection managers that predate the `condition`
//! attribute.

use std::fmt;

/// A fatal session-level error reported by the connection manager.
///
/// Each variant corresponds to one value of the `condition` attribute on a
/// terminating `<body/>` element. [`TerminalBindingCondition::message`]
/// yields the explanatory text defined for the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalBindingCondition {
    /// The format of an HTTP header or binding element was unacceptable.
    BadRequest,
    /// The target domain or route is no longer serviced by this connection
    /// manager.
    HostGone,
    /// The target domain or route is unknown to the connection manager.
    HostUnknown,
    /// The initialization element lacked a required `to` or `route`
    /// attribute.
    ImproperAddressing,
    /// The connection manager experienced an internal error.
    InternalServerError,
    /// The `sid` or `rid` was not valid, or the connection manager could not
    /// resend a response.
    ItemNotFound,
    /// Another concurrent request caused the session to terminate.
    OtherRequest,
    /// The client broke the session rules (overactive polling, too many
    /// simultaneous requests).
    PolicyViolation,
    /// The connection manager could not reach (or lost) the server.
    RemoteConnectionFailed,
    /// An error occurred in the protocol being transported.
    RemoteStreamError,
    /// The connection manager does not operate at this URI.
    SeeOtherUri,
    /// The connection manager is shutting down and terminating all sessions.
    SystemShutdown,
    /// An error not covered by the other conditions.
    UndefinedCondition,
}

impl TerminalBindingCondition {
    /// All defined conditions, in attribute-value order.
    const ALL: [TerminalBindingCondition; 13] = [
        TerminalBindingCondition::BadRequest,
        TerminalBindingCondition::HostGone,
        TerminalBindingCondition::HostUnknown,
        TerminalBindingCondition::ImproperAddressing,
        TerminalBindingCondition::InternalServerError,
        TerminalBindingCondition::ItemNotFound,
        TerminalBindingCondition::OtherRequest,
        TerminalBindingCondition::PolicyViolation,
        TerminalBindingCondition::RemoteConnectionFailed,
        TerminalBindingCondition::RemoteStreamError,
        TerminalBindingCondition::SeeOtherUri,
        TerminalBindingCondition::SystemShutdown,
        TerminalBindingCondition::UndefinedCondition,
    ];

    /// The wire value of the `condition` attribute for this condition.
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalBindingCondition::BadRequest => "bad-request",
            TerminalBindingCondition::HostGone => "host-gone",
            TerminalBindingCondition::HostUnknown => "host-unknown",
            TerminalBindingCondition::ImproperAddressing => "improper-addressing",
            TerminalBindingCondition::InternalServerError => "internal-server-error",
            TerminalBindingCondition::ItemNotFound => "item-not-found",
            TerminalBindingCondition::OtherRequest => "other-request",
            TerminalBindingCondition::PolicyViolation => "policy-violation",
            TerminalBindingCondition::RemoteConnectionFailed => "remote-connection-failed",
            TerminalBindingCondition::RemoteStreamError => "remote-stream-error",
            TerminalBindingCondition::SeeOtherUri => "see-other-uri",
            TerminalBindingCondition::SystemShutdown => "system-shutdown",
            TerminalBindingCondition::UndefinedCondition => "undefined-condition",
        }
    }

    /// Human-readable explanation of the condition.
    pub fn message(self) -> &'static str {
        match self {
            TerminalBindingCondition::BadRequest => {
                "the format of an HTTP header or binding element was unacceptable"
            }
            TerminalBindingCondition::HostGone => {
                "the target domain or route is no longer serviced by the connection manager"
            }
            TerminalBindingCondition::HostUnknown => {
                "the target domain or route is unknown to the connection manager"
            }
            TerminalBindingCondition::ImproperAddressing => {
                "the initialization element lacked a 'to' or 'route' attribute the \
                 connection manager requires"
            }
            TerminalBindingCondition::InternalServerError => {
                "the connection manager experienced an internal error"
            }
            TerminalBindingCondition::ItemNotFound => {
                "an element value was invalid (unknown 'sid', out-of-window 'rid', or an \
                 unresendable response)"
            }
            TerminalBindingCondition::OtherRequest => {
                "another request processed at the same time caused the session to terminate"
            }
            TerminalBindingCondition::PolicyViolation => {
                "the client broke the session rules (overactive polling or too many \
                 simultaneous requests)"
            }
            TerminalBindingCondition::RemoteConnectionFailed => {
                "the connection manager was unable to connect to, or lost its connection \
                 to, the server"
            }
            TerminalBindingCondition::RemoteStreamError => {
                "an error occurred in the protocol being transported"
            }
            TerminalBindingCondition::SeeOtherUri => {
                "the connection manager does not operate at this URI"
            }
            TerminalBindingCondition::SystemShutdown => {
                "the connection manager is being shut down"
            }
            TerminalBindingCondition::UndefinedCondition => "an undefined condition occurred",
        }
    }

    /// Look up a condition from the wire value of the `condition` attribute.
    ///
    /// Returns `None` for values outside the defined catalogue; callers
    /// treat those as [`TerminalBindingCondition::UndefinedCondition`] or
    /// surface the raw string, as the context requires.
    pub fn from_condition_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    /// Map a legacy HTTP status code to its deprecated terminal condition.
    ///
    /// Connection managers that do not advertise a `ver` attribute signal
    /// terminal errors through HTTP status codes instead of the `condition`
    /// attribute. Only 400, 403, and 404 have defined mappings.
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(TerminalBindingCondition::BadRequest),
            403 => Some(TerminalBindingCondition::PolicyViolation),
            404 => Some(TerminalBindingCondition::ItemNotFound),
            _ => None,
        }
    }
}

impl fmt::Display for TerminalBindingCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
