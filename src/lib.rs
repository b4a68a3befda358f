//! BOSH client - Bidirectional-streams Over Synchronous HTTP (XEP-0124)
//!
//! This library implements the client half of BOSH: a long-lived, ordered,
//! bidirectional XML stream tunneled over a sequence of HTTP POST
//! request/response pairs, for use across intermediaries that only permit
//! HTTP. The canonical application is an XMPP client talking to a
//! connection manager, but payloads are opaque to this crate.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: Session state machine, request scheduler, and the
//!   [`BoshClient`] facade
//! - `body`: The `<body/>` wrapper element, its builder, and XML parsing
//! - `session`: Session parameters negotiated with the connection manager
//! - `transport`: The HTTP sender abstraction and the reqwest sender
//! - `attrs`: Typed parsers for well-known wrapper attributes
//! - `condition`: Terminal binding condition catalogue
//! - `config`: Client configuration and builder
//! - `error`: Error types and result alias
//!
//! # Example
//!
//! ```no_run
//! use bosh_client::{Body, BoshClient, ClientConfig};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> bosh_client::Result<()> {
//!     let config = ClientConfig::builder(
//!         Url::parse("http://cm.example.com:5280/http-bind").unwrap(),
//!         "example.com",
//!     )
//!     .build();
//!
//!     let client = BoshClient::new(config);
//!     client.add_connection_listener(|event| println!("connection: {event:?}"));
//!
//!     // The first send creates the session.
//!     client.send(Body::empty()).await?;
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod attrs;
pub mod body;
pub mod client;
pub mod condition;
pub mod config;
pub mod error;
pub mod listener;
pub mod session;
pub mod transport;

mod exchange;
mod rid;

// Re-export commonly used types
pub use body::{Body, BodyBuilder, QName, BOSH_NS, XML_NS};
pub use client::BoshClient;
pub use condition::TerminalBindingCondition;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, Result};
pub use listener::ConnectionEvent;
pub use session::SessionParams;
