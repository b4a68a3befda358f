//! Client configuration
//!
//! This module defines [`ClientConfig`], the immutable settings a session
//! is created from, along with a builder for assembling one in code. The
//! structure is serde-enabled so applications can load it from their own
//! configuration files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

fn default_lang() -> String {
    "en".to_string()
}

fn default_ack_requests() -> bool {
    true
}

fn default_empty_request_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_pause_margin() -> Duration {
    Duration::from_millis(500)
}

/// Immutable configuration of one BOSH session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection manager endpoint the session talks to.
    pub uri: Url,

    /// Target domain, sent as the `to` attribute of the session-creation
    /// request.
    pub to: String,

    /// Originating identity, sent as the optional `from` attribute.
    #[serde(default)]
    pub from: Option<String>,

    /// Default language of the stream, sent as `xml:lang`.
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Proxy target, sent as the optional `route` attribute
    /// (`proto:host:port`).
    #[serde(default)]
    pub route: Option<String>,

    /// Offer and apply content compression when the connection manager
    /// accepts it. Defaults to off.
    #[serde(default)]
    pub compression: bool,

    /// Ask the connection manager to acknowledge requests (`ack="1"` on
    /// the session-creation request). Defaults to on.
    #[serde(default = "default_ack_requests")]
    pub ack_requests: bool,

    /// Delay before an empty keep-alive request is sent once the request
    /// queue drains.
    ///
    /// Chosen conservatively below any realistic `inactivity` bound.
    #[serde(default = "default_empty_request_delay")]
    pub empty_request_delay: Duration,

    /// Allowance subtracted from a granted pause before the follow-up
    /// empty request, covering request build and transit time.
    #[serde(default = "default_pause_margin")]
    pub pause_margin: Duration,
}

impl ClientConfig {
    /// Start building a configuration for the given connection manager
    /// endpoint and target domain.
    pub fn builder(uri: Url, to: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                uri,
                to: to.into(),
                from: None,
                lang: default_lang(),
                route: None,
                compression: false,
                ack_requests: default_ack_requests(),
                empty_request_delay: default_empty_request_delay(),
                pause_margin: default_pause_margin(),
            },
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the optional `from` identity.
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.config.from = Some(from.into());
        self
    }

    /// Set the stream language (`xml:lang`).
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.config.lang = lang.into();
        self
    }

    /// Set the optional `route` proxy target.
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.config.route = Some(route.into());
        self
    }

    /// Enable or disable content compression.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Enable or disable client-side request acking.
    pub fn ack_requests(mut self, enabled: bool) -> Self {
        self.config.ack_requests = enabled;
        self
    }

    /// Override the empty-request delay.
    pub fn empty_request_delay(mut self, delay: Duration) -> Self {
        self.config.empty_request_delay = delay;
        self
    }

    /// Override the pause safety margin.
    pub fn pause_margin(mut self, margin: Duration) -> Self {
        self.config.pause_margin = margin;
        self
    }

    /// Finish building.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("http://cm.example.com:5280/http-bind").unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder(endpoint(), "example.com").build();
        assert_eq!(config.to, "example.com");
        assert_eq!(config.lang, "en");
        assert_eq!(config.from, None);
        assert_eq!(config.route, None);
        assert!(!config.compression);
        assert!(config.ack_requests);
        assert_eq!(config.empty_request_delay, Duration::from_millis(100));
        assert_eq!(config.pause_margin, Duration::from_millis(500));
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::builder(endpoint(), "example.com")
            .from("juliet@example.com")
            .lang("de")
            .route("xmpp:example.com:9999")
            .compression(true)
            .ack_requests(false)
            .empty_request_delay(Duration::from_millis(250))
            .build();
        assert_eq!(config.from.as_deref(), Some("juliet@example.com"));
        assert_eq!(config.lang, "de");
        assert_eq!(config.route.as_deref(), Some("xmpp:example.com:9999"));
        assert!(config.compression);
        assert!(!config.ack_requests);
        assert_eq!(config.empty_request_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"uri": "http://cm.example.com/http-bind", "to": "example.com"}"#,
        )
        .unwrap();
        assert_eq!(config.lang, "en");
        assert!(config.ack_requests);
    }
}
