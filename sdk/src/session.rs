//! Session state machine: handshake, readiness, command traffic and inbound
//! routing for one embedded-app instance.
//!
//! LIFECYCLE
//! =========
//! 1. `new` with a client id → `AwaitingTransport`. With no host window the
//!    session is `Degraded` instead: placeholder ids, no handshake.
//! 2. Launch params are read, a one-shot `READY` listener is registered and the
//!    `HANDSHAKE` envelope is posted → `Handshaking`.
//! 3. The host's `HANDSHAKE` reply (or a legacy `HELLO`) opens command
//!    traffic. The dispatched `READY` event moves the session to `Ready`.
//! 4. Any fatal contract violation → `Fatal`. Terminal: inbound traffic is
//!    ignored and pending commands fail.
//!
//! ROUTING
//! =======
//! `accept` applies the origin guard and envelope decoding and is cheap enough
//! to run on the delivery path. `route` does the opcode switch and `FRAME`
//! routing: dispatches go to the bus, error replies to the pending command
//! and the generic `"error"` event, and any other reply carrying a nonce to
//! the pending command.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use frames::{
    Data, Envelope, HandshakeBody, IncomingPayload, Opcode, PayloadKind, READY, SUBSCRIBE, UNSUBSCRIBE, classify,
    command_body, decode_envelope,
};
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::SdkConfig;
use crate::error::{CommandError, HostErrorEvent, SdkError};
use crate::event_bus::EventBus;
use crate::launch::{LaunchParams, Platform};
use crate::origin::OriginGuard;
use crate::pending::{CommandOutcome, PendingCommands};
use crate::subscriptions::{Subscription, SubscriptionTable};
use crate::transport::{FrameContext, HostWindow};

/// Bus event carrying a [`HostErrorEvent`] for every host error reply.
pub const ERROR_EVENT: &str = "error";

/// Bus event carrying the payload of a `CLOSE` envelope.
pub const CLOSE_EVENT: &str = "close";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    AwaitingTransport,
    Handshaking,
    Ready,
    /// No host window: placeholder identifiers, no handshake.
    Degraded,
    /// Terminal.
    Fatal,
}

/// Identifiers of one embedded-app instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub client_id: String,
    pub frame_id: String,
    pub instance_id: String,
    pub platform: Platform,
    pub channel_id: Option<String>,
    pub guild_id: Option<String>,
}

impl SessionInfo {
    fn placeholder(client_id: String) -> Self {
        Self {
            client_id,
            frame_id: String::new(),
            instance_id: String::new(),
            platform: Platform::Desktop,
            channel_id: None,
            guild_id: None,
        }
    }

    fn from_launch(client_id: String, params: LaunchParams) -> Self {
        Self {
            client_id,
            frame_id: params.frame_id,
            instance_id: params.instance_id,
            platform: params.platform,
            channel_id: params.channel_id,
            guild_id: params.guild_id,
        }
    }
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session{{client_id: {}, frame_id: {}, instance_id: {}, platform: {}, channel_id: {}, guild_id: {}}}",
            self.client_id,
            self.frame_id,
            self.instance_id,
            self.platform,
            self.channel_id.as_deref().unwrap_or(""),
            self.guild_id.as_deref().unwrap_or(""),
        )
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    info: SessionInfo,
    config: SdkConfig,
    guard: OriginGuard,
    host: Option<HostWindow>,
    target_origin: String,
    state: watch::Sender<SessionState>,
    handshake_acked: AtomicBool,
    failure: Mutex<Option<SdkError>>,
    bus: EventBus,
    pending: Arc<PendingCommands>,
    subscriptions: SubscriptionTable,
}

impl Session {
    /// Start a session. `frame` is `None` when the execution context offers no
    /// host window.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::MissingClientId`], [`SdkError::MissingParam`] or
    /// [`SdkError::InvalidPlatform`] for bad configuration, and a transport
    /// error if the handshake cannot be posted.
    pub fn new(config: SdkConfig, frame: Option<FrameContext>) -> Result<Arc<Self>, SdkError> {
        if config.client_id.is_empty() {
            return Err(SdkError::MissingClientId);
        }

        let Some(frame) = frame else {
            warn!(client_id = %config.client_id, "no host window; starting degraded session");
            let guard = OriginGuard::new("", config.extra_origins.iter().cloned());
            let info = SessionInfo::placeholder(config.client_id.clone());
            let session = Self::build(info, config, guard, None);
            session.transition(SessionState::Degraded);
            return Ok(Arc::new(session));
        };

        let params = LaunchParams::from_query(&frame.query)?;
        let guard = OriginGuard::new(&frame.own_origin, config.extra_origins.iter().cloned());
        let info = SessionInfo::from_launch(config.client_id.clone(), params);
        let session = Arc::new(Self::build(info, config, guard, Some(frame.host)));
        session.transition(SessionState::AwaitingTransport);

        session.add_ready_listener();
        session.handshake()?;
        Ok(session)
    }

    fn build(info: SessionInfo, config: SdkConfig, guard: OriginGuard, host: Option<HostWindow>) -> Self {
        let target_origin = host.as_ref().map(HostWindow::trusted_origin).unwrap_or_default();
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            info,
            config,
            guard,
            host,
            target_origin,
            state,
            handshake_acked: AtomicBool::new(false),
            failure: Mutex::new(None),
            bus: EventBus::new(),
            pending: Arc::new(PendingCommands::new()),
            subscriptions: SubscriptionTable::new(),
        }
    }

    fn add_ready_listener(self: &Arc<Self>) {
        let session = Arc::downgrade(self);
        self.bus.once(READY, move |_| {
            if let Some(session) = session.upgrade() {
                session.mark_ready();
            }
        });
    }

    fn handshake(&self) -> Result<(), SdkError> {
        let host = self.host.as_ref().ok_or(SdkError::MissingTransport)?;
        let envelope = HandshakeBody::new(self.info.client_id.clone(), self.info.frame_id.clone()).into_envelope();
        host.transport.post(&envelope.to_value(), &self.target_origin)?;
        self.transition(SessionState::Handshaking);
        info!(
            client_id = %self.info.client_id,
            frame_id = %self.info.frame_id,
            target_origin = %self.target_origin,
            "handshake sent"
        );
        Ok(())
    }

    /// Move to `next` unless already there or `Fatal`.
    fn transition(&self, next: SessionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == SessionState::Fatal || *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            debug!(state = ?next, "session state changed");
        }
        changed
    }

    fn mark_ready(&self) {
        if self.transition(SessionState::Ready) {
            info!(frame_id = %self.info.frame_id, instance_id = %self.info.instance_id, "session ready");
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    #[must_use]
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver observing every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Whether the host answered the handshake.
    #[must_use]
    pub fn handshake_acknowledged(&self) -> bool {
        self.handshake_acked.load(Ordering::SeqCst)
    }

    /// Origin every outbound message is addressed to (`"*"` when unknown).
    #[must_use]
    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    /// Local event bus. App code may listen for [`ERROR_EVENT`] and
    /// [`CLOSE_EVENT`] here; host events should go through [`Session::subscribe`].
    ///
    /// Listeners added directly with [`EventBus::on`] do not count as
    /// subscribers: they never send `SUBSCRIBE` and do not keep the host
    /// subscription alive after the last [`Subscription`] is dropped.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    /// The error that terminated the session, if any.
    #[must_use]
    pub fn failure(&self) -> Option<SdkError> {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Send a command and register `completion` for its reply.
    ///
    /// A fresh nonce is injected into `payload` and the completion is recorded
    /// before the envelope is posted, so a fast reply always finds it. The
    /// completion runs exactly once: on the reply, on an error reply, on the
    /// configured timeout, or when the session fails. Returns the nonce.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::MissingTransport`] before a host window is resolved,
    /// [`SdkError::SessionFailed`] after a fatal error, and a transport error if
    /// posting fails (the completion is then dropped without running).
    pub fn send_command<F>(&self, mut payload: Data, completion: F) -> Result<String, SdkError>
    where
        F: FnOnce(CommandOutcome) + Send + 'static,
    {
        if let Some(err) = self.failure() {
            return Err(SdkError::SessionFailed(err.to_string()));
        }
        let host = self.host.as_ref().ok_or(SdkError::MissingTransport)?;

        let nonce = Uuid::new_v4().to_string();
        payload.insert("nonce".into(), Value::from(nonce.clone()));
        let cmd = payload
            .get("cmd")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        self.pending.insert(nonce.clone(), Box::new(completion));
        let envelope = Envelope::new(Opcode::Frame, Value::Object(payload));
        if let Err(e) = host.transport.post(&envelope.to_value(), &self.target_origin) {
            self.pending.remove(&nonce);
            warn!(%nonce, %cmd, error = %e, "command post failed");
            return Err(e.into());
        }

        debug!(%nonce, %cmd, "command sent");
        self.arm_timeout(&nonce);
        Ok(nonce)
    }

    /// Send a command and wait for its reply.
    ///
    /// # Errors
    ///
    /// Everything [`Session::send_command`] returns, plus the command's own
    /// failure as [`SdkError::Command`].
    pub async fn command(&self, payload: Data) -> Result<Value, SdkError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(payload, move |outcome| {
            let _ = tx.send(outcome);
        })?;

        match rx.await {
            Ok(outcome) => outcome.map_err(SdkError::from),
            Err(_) => Err(CommandError::Abandoned.into()),
        }
    }

    fn arm_timeout(&self, nonce: &str) {
        let Some(limit) = self.config.command_timeout else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%nonce, "no async runtime; command deadline not armed");
            return;
        };

        let pending = Arc::clone(&self.pending);
        let key = nonce.to_owned();
        let deadline = runtime.spawn(async move {
            tokio::time::sleep(limit).await;
            if pending.resolve(&key, Err(CommandError::Timeout(limit))) {
                warn!(nonce = %key, ?limit, "command timed out");
            }
        });
        self.pending.set_deadline(nonce, deadline.abort_handle());
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Listen for `event`. The first local subscriber of a known host event
    /// also sends `SUBSCRIBE` with `args`; failures of that command are logged.
    ///
    /// Refcount transitions and their `SUBSCRIBE`/`UNSUBSCRIBE` posts happen
    /// under one lock, so concurrent subscribe and unsubscribe calls reach
    /// the host in the order their counts changed. A [`crate::Transport`]
    /// must therefore not subscribe or unsubscribe from inside `post`.
    ///
    /// # Errors
    ///
    /// Returns the [`Session::send_command`] error when the `SUBSCRIBE` command
    /// cannot be sent. The listener is not left registered in that case.
    pub fn subscribe<F>(&self, event: &str, listener: F, args: Value) -> Result<Subscription, SdkError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let listener = self.bus.on(event, listener);
        let acquired = self.subscriptions.acquire(event, || {
            if !self.forwards(event) {
                return Ok(());
            }
            let payload = command_body(SUBSCRIBE, args.clone(), Some(event));
            self.send_command(payload, log_failure(SUBSCRIBE, event)).map(|_| ())
        });
        if let Err(e) = acquired {
            self.bus.remove_listener(event, listener);
            return Err(e);
        }
        Ok(Subscription { event: event.to_owned(), listener, args })
    }

    /// Drop a subscription. The last local subscriber of a known host event
    /// also sends `UNSUBSCRIBE`.
    ///
    /// # Errors
    ///
    /// Returns the [`Session::send_command`] error when `UNSUBSCRIBE` cannot be
    /// sent. The local listener is removed regardless.
    pub fn unsubscribe(&self, subscription: Subscription) -> Result<(), SdkError> {
        let Subscription { event, listener, args } = subscription;
        self.bus.remove_listener(&event, listener);
        self.subscriptions.release(&event, || {
            if !self.forwards(&event) {
                return Ok(());
            }
            let payload = command_body(UNSUBSCRIBE, args, Some(&event));
            self.send_command(payload, log_failure(UNSUBSCRIBE, &event)).map(|_| ())
        })?;
        Ok(())
    }

    /// Local subscriber count for `event`.
    #[must_use]
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscriptions.count(event)
    }

    fn forwards(&self, event: &str) -> bool {
        event != READY && self.config.catalog.is_event(event)
    }

    // =========================================================================
    // READINESS
    // =========================================================================

    /// Wait until the host dispatches `READY`.
    ///
    /// Must not be awaited from inside a bus listener: the listener runs on
    /// the delivery path that would deliver `READY`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::MissingTransport`] for a degraded session and
    /// [`SdkError::SessionFailed`] if the session fails first.
    pub async fn wait_until_ready(&self) -> Result<(), SdkError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| matches!(s, SessionState::Ready | SessionState::Degraded | SessionState::Fatal))
            .await
            .map(|s| *s)
            .map_err(|_| SdkError::SessionFailed("session dropped".into()))?;

        match state {
            SessionState::Ready => Ok(()),
            SessionState::Degraded => Err(SdkError::MissingTransport),
            _ => Err(SdkError::SessionFailed(self.failure().map(|e| e.to_string()).unwrap_or_default())),
        }
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Origin guard plus envelope decoding. `Ok(None)` means the message was
    /// dropped silently.
    ///
    /// # Errors
    ///
    /// Returns a fatal codec error for an unknown integer opcode.
    pub fn accept(&self, origin: &str, message: &Value) -> Result<Option<Envelope>, SdkError> {
        if self.state() == SessionState::Fatal {
            return Ok(None);
        }
        if !self.guard.allows(origin) {
            trace!(%origin, "dropped message from untrusted origin");
            return Ok(None);
        }
        let envelope = decode_envelope(message)?;
        if envelope.is_none() {
            trace!(%origin, "dropped malformed message");
        }
        Ok(envelope)
    }

    /// Handle one accepted envelope.
    ///
    /// # Errors
    ///
    /// Returns a fatal error for unknown commands or events and for responses
    /// without a nonce.
    pub fn route(&self, envelope: Envelope) -> Result<(), SdkError> {
        if self.state() == SessionState::Fatal {
            return Ok(());
        }
        match envelope.opcode {
            // Legacy hosts greet with HELLO instead of answering the handshake.
            Opcode::Hello => Ok(()),
            Opcode::Close => {
                self.handle_close(&envelope.body);
                Ok(())
            }
            Opcode::Handshake => {
                self.handle_handshake();
                Ok(())
            }
            Opcode::Frame => self.handle_frame(&envelope.body),
        }
    }

    /// `accept` then `route` on the caller's thread.
    ///
    /// # Errors
    ///
    /// Same as [`Session::accept`] and [`Session::route`].
    pub fn deliver(&self, origin: &str, message: &Value) -> Result<(), SdkError> {
        match self.accept(origin, message)? {
            Some(envelope) => self.route(envelope),
            None => Ok(()),
        }
    }

    fn handle_close(&self, body: &Value) {
        info!(payload = %body, "host closed the channel");
        self.bus.emit(CLOSE_EVENT, body);
    }

    fn handle_handshake(&self) {
        if !self.handshake_acked.swap(true, Ordering::SeqCst) {
            info!(frame_id = %self.info.frame_id, "handshake acknowledged");
        }
    }

    fn handle_frame(&self, body: &Value) -> Result<(), SdkError> {
        let payload = classify(body, &self.config.catalog)?;

        if payload.is_dispatch() {
            debug!(evt = %payload.evt, "dispatch");
            self.bus.emit(&payload.evt, &payload.data);
            return Ok(());
        }

        if payload.kind == PayloadKind::Error {
            self.handle_error_reply(&payload);
            return Ok(());
        }

        if payload.nonce.is_empty() {
            if payload.kind == PayloadKind::Response {
                return Err(SdkError::MissingNonce { cmd: payload.cmd });
            }
            debug!(cmd = %payload.cmd, evt = %payload.evt, "event reply without nonce ignored");
            return Ok(());
        }

        let IncomingPayload { cmd, nonce, data, .. } = payload;
        if !self.pending.resolve(&nonce, Ok(data)) {
            debug!(%nonce, %cmd, "reply for unknown nonce");
        }
        Ok(())
    }

    fn handle_error_reply(&self, payload: &IncomingPayload) {
        let event = HostErrorEvent::from_data(&payload.data);
        warn!(
            cmd = %payload.cmd,
            nonce = %payload.nonce,
            code = event.code,
            message = %event.message,
            "host error reply"
        );
        if !payload.nonce.is_empty() {
            self.pending
                .resolve(&payload.nonce, Err(event.to_command_error(&payload.data)));
        }
        self.bus.emit(ERROR_EVENT, &event.to_value());
    }

    // =========================================================================
    // FAILURE
    // =========================================================================

    /// Terminate the session after a fatal error. Pending commands fail with
    /// [`CommandError::SessionFailed`]. Only the first error is kept.
    pub fn fail(&self, error: &SdkError) {
        {
            let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
            if failure.is_some() {
                return;
            }
            *failure = Some(error.clone());
        }
        self.transition(SessionState::Fatal);
        error!(error = %error, frame_id = %self.info.frame_id, "session terminated");

        let failed = self.pending.fail_all(&CommandError::SessionFailed(error.to_string()));
        if failed > 0 {
            warn!(failed, "pending commands failed");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("info", &self.info)
            .field("state", &self.state())
            .field("target_origin", &self.target_origin)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

/// Default completion for subscription commands: log failures, never escalate.
fn log_failure(cmd: &'static str, event: &str) -> impl FnOnce(CommandOutcome) + Send + 'static {
    let event = event.to_owned();
    move |outcome| {
        if let Err(e) = outcome {
            warn!(cmd, %event, error = %e, "subscription command failed");
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
