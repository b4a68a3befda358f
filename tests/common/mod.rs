//! Shared helpers for the integration suites
//!
//! The centerpiece is [`ScriptedCm`], a stateful `wiremock` responder that
//! behaves like a minimal connection manager: it answers the session
//! creation request with configured session attributes, echoes terminates,
//! and answers everything else with an empty wrapper. Tests drive the real
//! [`bosh_client::BoshClient`] with the real reqwest sender against it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use bosh_client::{Body, BoshClient, ClientConfig, ConnectionEvent, QName};

/// Session attributes the scripted CM hands out on session creation.
#[derive(Debug, Clone)]
pub struct CmScript {
    pub sid: String,
    pub attrs: Vec<(String, String)>,
    /// Echo the session-creation RID as `ack` (advertise request acking).
    pub ack_creation: bool,
    /// Answer every non-terminate request with this terminal condition
    /// instead of normal responses.
    pub terminal_condition: Option<String>,
}

impl Default for CmScript {
    fn default() -> Self {
        Self {
            sid: "it-session".to_string(),
            attrs: vec![
                ("wait".to_string(), "1".to_string()),
                ("ver".to_string(), "1.11".to_string()),
                ("requests".to_string(), "2".to_string()),
            ],
            ack_creation: false,
            terminal_condition: None,
        }
    }
}

/// A minimal scripted connection manager behind wiremock.
pub struct ScriptedCm {
    script: CmScript,
    established: AtomicBool,
}

impl ScriptedCm {
    pub fn new(script: CmScript) -> Self {
        Self {
            script,
            established: AtomicBool::new(false),
        }
    }
}

fn wrapper_of(request: &Request) -> Body {
    let text = std::str::from_utf8(&request.body).expect("request body must be UTF-8");
    Body::from_xml(text).expect("request body must be a valid wrapper")
}

fn xml_response(body: Body) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_xml().into_bytes(), "text/xml")
}

impl Respond for ScriptedCm {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let wrapper = wrapper_of(request);

        if let Some(condition) = &self.script.terminal_condition {
            return xml_response(
                Body::builder()
                    .set_attribute(QName::bosh("type"), Some("terminate"))
                    .set_attribute(QName::bosh("condition"), Some(condition.as_str()))
                    .build(),
            );
        }

        if wrapper.is_terminate() {
            return xml_response(
                Body::builder()
                    .set_attribute(QName::bosh("type"), Some("terminate"))
                    .build(),
            );
        }

        if !self.established.swap(true, Ordering::SeqCst) {
            // Session creation.
            let mut builder =
                Body::builder().set_attribute(QName::bosh("sid"), Some(self.script.sid.as_str()));
            for (name, value) in &self.script.attrs {
                builder = builder.set_attribute(QName::bosh(name.as_str()), Some(value.as_str()));
            }
            if self.script.ack_creation {
                let rid = wrapper.bosh_attribute("rid").expect("creation rid");
                builder = builder.set_attribute(QName::bosh("ack"), Some(rid));
            }
            return xml_response(builder.build());
        }

        xml_response(Body::builder().build())
    }
}

/// Start a mock CM and a client pointed at it.
pub async fn scripted_session(script: CmScript) -> (MockServer, BoshClient) {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::method("POST"))
        .respond_with(ScriptedCm::new(script))
        .mount(&server)
        .await;

    let config = ClientConfig::builder(
        Url::parse(&server.uri()).expect("mock server uri"),
        "example.com",
    )
    .empty_request_delay(Duration::from_millis(100))
    .build();
    (server, BoshClient::new(config))
}

/// Record connection events as comparable strings.
pub fn record_events(client: &BoshClient) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    client.add_connection_listener(move |event| {
        let rendered = match event {
            ConnectionEvent::Established => "established".to_string(),
            ConnectionEvent::Closed => "closed".to_string(),
            ConnectionEvent::ClosedOnError(cause) => format!("error: {cause}"),
        };
        sink.lock().unwrap().push(rendered);
    });
    events
}

/// Route client tracing into the test output when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll until `check` passes or two seconds elapse.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
