//! Session state machine, request scheduler, and client facade
//!
//! This module is the core of the crate. [`BoshClient`] owns one session
//! with a connection manager and multiplexes application payloads onto the
//! HTTP request/response pairs the binding allows:
//!
//! - [`BoshClient::send`] blocks while the session cannot admit another
//!   request (the CM bounds concurrent requests), tags the wrapper with the
//!   protocol attributes for its slot in the stream, and dispatches it.
//! - Processor workers await each pending response and feed it back into
//!   the session state: establishment, acknowledgements, recoverable
//!   retransmission, terminal conditions.
//! - An empty keep-alive request is scheduled whenever the request queue
//!   drains, so the CM always holds a request it can answer with pushed
//!   payloads.
//!
//! # Locking
//!
//! One mutex guards all session state. It is never held across I/O:
//! transport dispatch, response awaits, and listener callbacks all run with
//! the lock released. Waiting (admission, worker claim, drain) uses
//! [`Notify`] with the enable-then-recheck pattern so wakeups cannot be
//! lost between the state check and the await.

use std::collections::BTreeSet;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::attrs::{parse_rid, parse_u64, Version};
use crate::body::{Body, QName, XML_NS};
use crate::condition::TerminalBindingCondition;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::listener::{ConnectionEvent, Listeners};
use crate::rid::RequestIdSequence;
use crate::session::SessionParams;
use crate::transport::http::ReqwestSender;
use crate::transport::HttpSender;

/// Highest protocol version this client implements, offered as `ver` on
/// session creation.
const SUPPORTED_VERSION: Version = Version::new(1, 11);

/// `wait` offered on session creation (seconds).
const CREATION_WAIT: u64 = 60;

/// `hold` offered on session creation.
const CREATION_HOLD: u64 = 1;

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No request sent yet; no workers running.
    Idle,
    /// Session-creation request dispatched, first response not integrated.
    Connecting,
    /// Normal operation.
    Established,
    /// A `type='terminate'` request has been dispatched.
    Terminating,
    /// Disposed; every non-terminate send fails.
    Closed,
}

/// Outcome of one admission attempt.
enum Admission {
    /// Enqueued; dispatch the exchange with this params snapshot.
    Admitted(Arc<Exchange>, Option<SessionParams>),
    /// Not admissible right now; wait for the queue to shrink.
    Blocked,
    /// Admissible, but overactive-polling safety defers it to the instant.
    Deferred(Instant),
    /// The session is closed and the body was a termination; nothing to do.
    Closed,
}

/// Everything the session lock guards.
struct SessionState {
    phase: Phase,
    queue: Vec<Arc<Exchange>>,
    params: Option<SessionParams>,
    /// Highest RID whose response arrived with no gaps below it.
    response_ack: Option<u64>,
    /// Received RIDs above `response_ack`.
    pending_response_acks: BTreeSet<u64>,
    /// Requests the CM has not acknowledged yet, in RID order.
    pending_request_acks: Vec<(u64, Body)>,
    /// Scheduled keep-alive task, keyed by generation so a stale firing
    /// can recognize itself.
    empty_request: Option<(u64, AbortHandle)>,
    empty_generation: u64,
    /// Dispatch instant of the last plain empty request, for polling-mode
    /// pacing.
    last_empty_dispatch: Option<Instant>,
    worker_count: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            queue: Vec::new(),
            params: None,
            response_ack: None,
            pending_response_acks: BTreeSet::new(),
            pending_request_acks: Vec::new(),
            empty_request: None,
            empty_generation: 0,
            last_empty_dispatch: None,
            worker_count: 0,
        }
    }

    fn working(&self) -> bool {
        self.phase != Phase::Closed
    }

    fn remove(&mut self, exchange: &Arc<Exchange>) {
        self.queue.retain(|queued| !Arc::ptr_eq(queued, exchange));
    }

    /// Abort any scheduled keep-alive and invalidate its generation.
    fn cancel_empty_request(&mut self) {
        if let Some((_, handle)) = self.empty_request.take() {
            handle.abort();
        }
        self.empty_generation = self.empty_generation.wrapping_add(1);
    }

    /// Fold one response into the acknowledgement state.
    ///
    /// Returns the exchange to retransmit when the response carried a
    /// `report` of a missing response.
    fn integrate_ack(&mut self, exchange: &Exchange, response: &Body) -> Result<Option<Arc<Exchange>>> {
        let Some(params) = &self.params else {
            return Ok(None);
        };

        // CM -> client request acks; a response carrying a report does not
        // acknowledge anything.
        if params.acking_requests() && response.bosh_attribute("report").is_none() {
            let ack_up_to = parse_rid("ack", response.bosh_attribute("ack"))?
                .unwrap_or_else(|| exchange.rid());
            self.pending_request_acks.retain(|(rid, _)| *rid > ack_up_to);
        }

        // Client -> CM response acks: advance the contiguous high-water
        // mark from response_ack + 1 while the pending set allows.
        match self.response_ack {
            None => self.response_ack = Some(exchange.rid()),
            Some(mut ack) => {
                if exchange.rid() > ack {
                    self.pending_response_acks.insert(exchange.rid());
                }
                while self.pending_response_acks.remove(&(ack + 1)) {
                    ack += 1;
                }
                self.response_ack = Some(ack);
            }
        }

        // A report names a request whose response went missing; replay the
        // original request byte for byte, same RID.
        if let Some(report) = parse_rid("report", response.bosh_attribute("report"))? {
            let _time = parse_u64("time", response.bosh_attribute("time"))?;
            let Some((rid, request)) = self
                .pending_request_acks
                .iter()
                .find(|(rid, _)| *rid == report)
                .cloned()
            else {
                return Err(Error::AckReportUnresolved { rid: report });
            };
            debug!(rid, "connection manager reported a missing response; replaying");
            return Ok(Some(Arc::new(Exchange::new(rid, request))));
        }
        Ok(None)
    }
}

struct ClientInner {
    config: ClientConfig,
    sender: Arc<dyn HttpSender>,
    rids: RequestIdSequence,
    state: Mutex<SessionState>,
    /// Senders wait here for queue space.
    not_full: Notify,
    /// Workers wait here for unclaimed exchanges.
    not_empty: Notify,
    /// Drain waiters wait here for the queue to empty.
    drained: Notify,
    listeners: Listeners,
    cancel: CancellationToken,
}

impl ClientInner {
    /// Wait until `check` yields a value, re-checking after every
    /// notification on `notify`.
    ///
    /// The `Notified` future is enabled before the second check, so a
    /// notification arriving between check and await is never lost.
    async fn wait_for<T>(
        &self,
        notify: &Notify,
        mut check: impl FnMut(&mut SessionState) -> Option<T>,
    ) -> T {
        let mut notified = pin!(notify.notified());
        loop {
            if let Some(value) = check(&mut *self.state.lock().await) {
                return value;
            }
            notified.as_mut().enable();
            if let Some(value) = check(&mut *self.state.lock().await) {
                return value;
            }
            notified.as_mut().await;
            notified.set(notify.notified());
        }
    }

    /// The full `send` path: admission, attribute application, dispatch.
    async fn send_body(self: &Arc<Self>, body: Body) -> Result<()> {
        let (exchange, params) = loop {
            let mut notified = pin!(self.not_full.notified());
            match self.try_admit(&body).await? {
                Admission::Admitted(exchange, params) => break (exchange, params),
                Admission::Closed => return Ok(()),
                Admission::Deferred(at) => {
                    tokio::time::sleep_until(at).await;
                    continue;
                }
                Admission::Blocked => {}
            }
            notified.as_mut().enable();
            match self.try_admit(&body).await? {
                Admission::Admitted(exchange, params) => break (exchange, params),
                Admission::Closed => return Ok(()),
                Admission::Deferred(at) => {
                    tokio::time::sleep_until(at).await;
                    continue;
                }
                Admission::Blocked => notified.as_mut().await,
            }
        };

        trace!(rid = exchange.rid(), "dispatching request");
        let response = self.sender.send(params.as_ref(), exchange.request());
        exchange.supply_response(response);
        self.listeners.fire_request(exchange.request());
        Ok(())
    }

    /// One admission attempt under the lock.
    async fn try_admit(self: &Arc<Self>, body: &Body) -> Result<Admission> {
        let is_terminate = body.is_terminate();
        let has_pause = body.bosh_attribute("pause").is_some();
        let mut st = self.state.lock().await;

        if !st.working() || self.cancel.is_cancelled() {
            return if is_terminate {
                Ok(Admission::Closed)
            } else {
                Err(Error::SessionClosed)
            };
        }

        let admissible = match &st.params {
            // Session creation is serialized: nothing else may be in
            // flight until the first response has been integrated.
            None => st.queue.is_empty(),
            Some(params) => {
                let limit = params.request_limit();
                let in_flight = st.queue.len() as u64;
                // Termination and pause requests get one slot of slack so
                // shutdown can never deadlock behind a full queue.
                in_flight < limit || (in_flight == limit && (is_terminate || has_pause))
            }
        };
        if !admissible {
            return Ok(Admission::Blocked);
        }

        // Overactive-polling safety: in polling mode two plain empty
        // requests keep at least `polling` seconds between dispatches.
        let plain_empty = body.payload().is_empty() && !is_terminate && !has_pause;
        if plain_empty {
            if let (Some(params), Some(last)) = (&st.params, st.last_empty_dispatch) {
                if params.request_limit() <= 1 {
                    if let Some(polling) = params.polling() {
                        let allowed = last + Duration::from_secs(polling);
                        if Instant::now() < allowed {
                            return Ok(Admission::Deferred(allowed));
                        }
                    }
                }
            }
        }

        let rid = self.rids.next();
        let request = match &st.params {
            None => self.session_creation_request(body, rid),
            Some(params) => self.session_request(params, st.response_ack, body, rid),
        };

        if st.phase == Phase::Idle {
            st.phase = Phase::Connecting;
            self.spawn_worker(&mut st);
        }
        if is_terminate {
            st.phase = Phase::Terminating;
        }

        if self.config.ack_requests
            && st.params.as_ref().is_some_and(SessionParams::acking_requests)
        {
            st.pending_request_acks.push((rid, request.clone()));
        }
        if plain_empty {
            st.last_empty_dispatch = Some(Instant::now());
        }

        // This send replaces any scheduled keep-alive.
        st.cancel_empty_request();

        let exchange = Arc::new(Exchange::new(rid, request));
        st.queue.push(Arc::clone(&exchange));
        self.not_empty.notify_waiters();
        Ok(Admission::Admitted(exchange, st.params.clone()))
    }

    /// Attributes of the session-creation request.
    fn session_creation_request(&self, body: &Body, rid: u64) -> Body {
        let mut builder = body
            .rebuild()
            .set_attribute(QName::bosh("to"), Some(self.config.to.clone()))
            .set_attribute(QName::new(XML_NS, "lang"), Some(self.config.lang.clone()))
            .set_attribute(QName::bosh("ver"), Some(SUPPORTED_VERSION.to_string()))
            .set_attribute(QName::bosh("wait"), Some(CREATION_WAIT.to_string()))
            .set_attribute(QName::bosh("hold"), Some(CREATION_HOLD.to_string()))
            .set_attribute(QName::bosh("rid"), Some(rid.to_string()))
            .set_attribute(QName::bosh("sid"), None::<String>);
        if let Some(route) = &self.config.route {
            builder = builder.set_attribute(QName::bosh("route"), Some(route.clone()));
        }
        if let Some(from) = &self.config.from {
            builder = builder.set_attribute(QName::bosh("from"), Some(from.clone()));
        }
        if self.config.ack_requests {
            builder = builder.set_attribute(QName::bosh("ack"), Some("1"));
        }
        builder.build()
    }

    /// Attributes of every request after establishment.
    fn session_request(
        &self,
        params: &SessionParams,
        response_ack: Option<u64>,
        body: &Body,
        rid: u64,
    ) -> Body {
        let mut builder = body
            .rebuild()
            .set_attribute(QName::bosh("sid"), Some(params.sid().to_string()))
            .set_attribute(QName::bosh("rid"), Some(rid.to_string()));
        if self.config.ack_requests && params.acking_requests() {
            if let Some(ack) = response_ack {
                // rid - 1 would be an implicit ack; only gaps are reported.
                if ack != rid - 1 {
                    builder = builder.set_attribute(QName::bosh("ack"), Some(ack.to_string()));
                }
            }
        }
        builder.build()
    }

    fn spawn_worker(self: &Arc<Self>, st: &mut SessionState) {
        st.worker_count += 1;
        let worker = Arc::clone(self);
        trace!(workers = st.worker_count, "starting processor");
        tokio::spawn(worker.process_exchanges());
    }

    /// Processor worker: claim exchanges, await their responses, integrate.
    async fn process_exchanges(self: Arc<Self>) {
        loop {
            let claimed = self
                .wait_for(&self.not_empty, |st| {
                    if st.phase == Phase::Closed || self.cancel.is_cancelled() {
                        return Some(None);
                    }
                    st.queue
                        .iter()
                        .find(|exchange| !exchange.is_claimed())
                        .map(|exchange| {
                            exchange.try_claim();
                            Some(Arc::clone(exchange))
                        })
                })
                .await;
            let Some(exchange) = claimed else { break };

            // The response slot is attached by the dispatching task after
            // the exchange became visible; both awaits run unlocked.
            let deferred = tokio::select! {
                _ = self.cancel.cancelled() => break,
                deferred = exchange.response() => deferred,
            };
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => break,
                outcome = deferred.receive() => outcome,
            };

            match outcome {
                Err(cause) => {
                    warn!(rid = exchange.rid(), error = %cause, "request failed");
                    self.dispose(Some(cause)).await;
                }
                Ok(response) => {
                    let status = response.status();
                    match response.body() {
                        Ok(body) => {
                            self.listeners.fire_response(&body);
                            self.integrate(&exchange, status, &body).await;
                        }
                        Err(cause) => {
                            // A legacy CM may answer with a bare HTTP error
                            // page; the status still signals the condition.
                            let cause = self
                                .legacy_terminal(status)
                                .await
                                .unwrap_or(cause);
                            self.dispose(Some(cause)).await;
                        }
                    }
                }
            }
        }
        trace!("processor exiting");
    }

    /// Legacy-CM terminal error for a non-200 status, when applicable.
    async fn legacy_terminal(&self, status: u16) -> Option<Error> {
        let st = self.state.lock().await;
        let params = st.params.as_ref()?;
        if params.ver().is_some() || status == 200 {
            return None;
        }
        Some(match TerminalBindingCondition::from_http_status(status) {
            Some(condition) => Error::terminal(Some(condition), None),
            None => Error::TerminalBinding {
                condition: None,
                message: format!("legacy connection manager returned HTTP {status}"),
            },
        })
    }

    /// Fold one response into session state under the lock, then fire
    /// events and dispatch retransmissions outside it.
    async fn integrate(self: &Arc<Self>, exchange: &Arc<Exchange>, status: u16, body: &Body) {
        let mut established = false;
        let mut resends: Vec<Arc<Exchange>> = Vec::new();
        let mut terminal: Option<Option<Error>> = None;
        let params_snapshot;
        {
            let mut st = self.state.lock().await;
            if st.phase == Phase::Closed {
                return;
            }

            // Session establishment. A terminate response may legally lack
            // the session attributes, so it goes straight to the terminal
            // check instead.
            if st.params.is_none() && !body.is_terminate() {
                match SessionParams::from_session_init(exchange.request(), body) {
                    Ok(params) => {
                        debug!(sid = params.sid(), "session established");
                        let limit = params.request_limit();
                        while st.worker_count < limit {
                            self.spawn_worker(&mut st);
                        }
                        st.params = Some(params);
                        if st.phase == Phase::Connecting {
                            st.phase = Phase::Established;
                        }
                        established = true;
                    }
                    Err(cause) => terminal = Some(Some(cause)),
                }
            }

            if terminal.is_none() {
                terminal = self.check_terminal(&st, status, body);
            }

            if terminal.is_none() {
                if body.is_error() {
                    // Recoverable binding error: every queued request is
                    // retransmitted as a fresh exchange, original bytes.
                    debug!(
                        count = st.queue.len(),
                        "recoverable binding error; retransmitting queued requests"
                    );
                    for queued in &st.queue {
                        resends.push(Arc::new(Exchange::new(queued.rid(), queued.request().clone())));
                    }
                    st.queue.extend(resends.iter().cloned());
                    self.not_empty.notify_waiters();
                } else {
                    match st.integrate_ack(exchange, body) {
                        Ok(Some(resend)) => {
                            st.queue.push(Arc::clone(&resend));
                            resends.push(resend);
                            self.not_empty.notify_waiters();
                        }
                        Ok(None) => {}
                        Err(cause) => terminal = Some(Some(cause)),
                    }
                }
            }

            if terminal.is_none() {
                st.remove(exchange);
                if st.queue.is_empty() {
                    self.schedule_empty_request(&mut st, exchange.request());
                    self.drained.notify_waiters();
                }
                self.not_full.notify_waiters();
            }
            params_snapshot = st.params.clone();
        }

        if established {
            self.listeners.fire_connection(&ConnectionEvent::Established);
        }
        if let Some(cause) = terminal {
            self.dispose(cause).await;
            return;
        }
        for resend in resends {
            let response = self.sender.send(params_snapshot.as_ref(), resend.request());
            resend.supply_response(response);
            self.listeners.fire_request(resend.request());
        }
    }

    /// Terminal binding condition of a response, if any.
    ///
    /// `Some(None)` is a clean terminate (no condition); `Some(Some(e))`
    /// carries the fatal error.
    fn check_terminal(
        &self,
        st: &SessionState,
        status: u16,
        body: &Body,
    ) -> Option<Option<Error>> {
        if body.is_terminate() {
            return Some(body.bosh_attribute("condition").map(|raw| {
                Error::terminal(TerminalBindingCondition::from_condition_name(raw), Some(raw))
            }));
        }
        if let Some(params) = &st.params {
            if params.ver().is_none() && status != 200 {
                let error = match TerminalBindingCondition::from_http_status(status) {
                    Some(condition) => Error::terminal(Some(condition), None),
                    None => Error::TerminalBinding {
                        condition: None,
                        message: format!("legacy connection manager returned HTTP {status}"),
                    },
                };
                return Some(Some(error));
            }
        }
        None
    }

    /// Schedule the keep-alive that follows a drained queue.
    fn schedule_empty_request(self: &Arc<Self>, st: &mut SessionState, completed_request: &Body) {
        if !st.working() || self.cancel.is_cancelled() {
            return;
        }
        let Some(params) = &st.params else { return };

        let pause = parse_u64("pause", completed_request.bosh_attribute("pause"))
            .ok()
            .flatten();
        let delay = if let Some(pause) = pause {
            // The CM granted a pause; come back just before it expires.
            Duration::from_millis(
                (pause * 1000).saturating_sub(self.config.pause_margin.as_millis() as u64),
            )
            .max(self.config.empty_request_delay)
        } else if params.request_limit() <= 1 {
            match params.polling() {
                Some(polling) => Duration::from_secs(polling),
                None => self.config.empty_request_delay,
            }
        } else {
            self.config.empty_request_delay
        };

        st.cancel_empty_request();
        let generation = st.empty_generation;
        trace!(?delay, "scheduling empty request");
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else { return };
            {
                let mut st = inner.state.lock().await;
                if st.empty_request.as_ref().map(|(scheduled, _)| *scheduled) != Some(generation) {
                    return;
                }
                st.empty_request = None;
            }
            if let Err(error) = inner.send_body(Body::empty()).await {
                debug!(%error, "empty request skipped");
            }
        })
        .abort_handle();
        st.empty_request = Some((generation, handle));
    }

    /// Tear the session down, exactly once.
    async fn dispose(&self, cause: Option<Error>) {
        let event = {
            let mut st = self.state.lock().await;
            if st.phase == Phase::Closed {
                return;
            }
            st.phase = Phase::Closed;
            st.cancel_empty_request();
            st.queue.clear();
            self.cancel.cancel();
            self.not_empty.notify_waiters();
            self.not_full.notify_waiters();
            self.drained.notify_waiters();
            match cause {
                Some(cause) => {
                    warn!(error = %cause, "session disposed on error");
                    ConnectionEvent::ClosedOnError(cause)
                }
                None => {
                    debug!("session closed");
                    ConnectionEvent::Closed
                }
            }
        };
        self.listeners.fire_connection(&event);
        self.sender.destroy();
    }
}

/// A BOSH session with one connection manager.
///
/// Create one with [`BoshClient::new`] (reqwest transport) or
/// [`BoshClient::with_sender`] (custom transport), register listeners, and
/// start sending. The first [`BoshClient::send`] performs session creation
/// transparently.
///
/// # Examples
///
/// ```no_run
/// use bosh_client::{Body, BoshClient, ClientConfig};
/// use url::Url;
///
/// #[tokio::main]
/// async fn main() -> bosh_client::Result<()> {
///     let config = ClientConfig::builder(
///         Url::parse("http://cm.example.com:5280/http-bind").unwrap(),
///         "example.com",
///     )
///     .build();
///     let client = BoshClient::new(config);
///     client.send(Body::empty()).await?;
///     client.disconnect().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct BoshClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for ClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientInner")
            .field("config", &self.config)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl BoshClient {
    /// Create a client using the reqwest transport.
    pub fn new(config: ClientConfig) -> Self {
        let sender: Arc<dyn HttpSender> = Arc::new(ReqwestSender::new(&config));
        Self::with_sender(config, sender)
    }

    /// Create a client over a custom [`HttpSender`].
    pub fn with_sender(config: ClientConfig, sender: Arc<dyn HttpSender>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                sender,
                rids: RequestIdSequence::new(),
                state: Mutex::new(SessionState::new()),
                not_full: Notify::new(),
                not_empty: Notify::new(),
                drained: Notify::new(),
                listeners: Listeners::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Send one wrapper to the connection manager.
    ///
    /// Blocks while the session cannot admit another request. The first
    /// send of a session carries the session-creation attributes; all
    /// later sends carry `sid`, `rid`, and acknowledgements as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] when the session is disposed and
    /// the body is not a termination.
    pub async fn send(&self, body: Body) -> Result<()> {
        self.inner.send_body(body).await
    }

    /// Terminate the session with an empty terminate request.
    ///
    /// # Errors
    ///
    /// Propagates [`BoshClient::send`] errors.
    pub async fn disconnect(&self) -> Result<()> {
        self.disconnect_with(Body::empty()).await
    }

    /// Terminate the session, delivering `body` as the final payload.
    ///
    /// # Errors
    ///
    /// Propagates [`BoshClient::send`] errors.
    pub async fn disconnect_with(&self, body: Body) -> Result<()> {
        let terminate = body
            .rebuild()
            .set_attribute(QName::bosh("type"), Some("terminate"))
            .build();
        self.inner.send_body(terminate).await
    }

    /// Ask the connection manager for the longest pause it offered.
    ///
    /// Returns `false` without sending anything when the session does not
    /// support pausing (no `maxpause` was advertised).
    ///
    /// # Errors
    ///
    /// Propagates [`BoshClient::send`] errors.
    pub async fn pause(&self) -> Result<bool> {
        let maxpause = {
            let st = self.inner.state.lock().await;
            st.params.as_ref().and_then(SessionParams::maxpause)
        };
        let Some(maxpause) = maxpause else {
            return Ok(false);
        };
        let body = Body::builder()
            .set_attribute(QName::bosh("pause"), Some(maxpause.to_string()))
            .build();
        self.inner.send_body(body).await?;
        Ok(true)
    }

    /// Dispose of the session immediately, without sending anything.
    ///
    /// Fires the connection-closed listeners with a
    /// [`Error::SessionClosed`] cause; subsequent sends fail.
    pub async fn close(&self) {
        self.inner.dispose(Some(Error::SessionClosed)).await;
    }

    /// Wait until every in-flight exchange has been integrated.
    ///
    /// A keep-alive timer that is merely scheduled does not hold up drain;
    /// an established session always keeps one pending.
    pub async fn drain(&self) {
        self.inner
            .wait_for(&self.inner.drained, |st| {
                (st.queue.is_empty() || !st.working()).then_some(())
            })
            .await;
    }

    /// The negotiated session parameters, once the session is established.
    pub async fn session_params(&self) -> Option<SessionParams> {
        self.inner.state.lock().await.params.clone()
    }

    /// Register a connection lifecycle listener.
    pub fn add_connection_listener(
        &self,
        listener: impl Fn(&ConnectionEvent) + Send + Sync + 'static,
    ) {
        self.inner.listeners.add_connection_listener(listener);
    }

    /// Register a listener for every dispatched request wrapper.
    pub fn add_request_listener(&self, listener: impl Fn(&Body) + Send + Sync + 'static) {
        self.inner.listeners.add_request_listener(listener);
    }

    /// Register a listener for every received response wrapper.
    pub fn add_response_listener(&self, listener: impl Fn(&Body) + Send + Sync + 'static) {
        self.inner.listeners.add_response_listener(listener);
    }
}

impl Drop for BoshClient {
    /// Best-effort teardown for clients dropped without [`BoshClient::close`]:
    /// workers stop and in-flight requests unblock, but close listeners
    /// only fire through an explicit close or disconnect.
    fn drop(&mut self) {
        self.inner.cancel.cancel();
        self.inner.sender.destroy();
        self.inner.not_empty.notify_waiters();
        self.inner.not_full.notify_waiters();
        self.inner.drained.notify_waiters();
    }
}
