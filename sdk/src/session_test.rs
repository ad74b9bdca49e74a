use super::*;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::transport::{ChannelTransport, OutboundMessage};

const HOST: &str = "https://discord.com";
const QUERY: &str = "?frame_id=F1&instance_id=I1&platform=desktop&guild_id=G1";

fn frame_context(query: &str) -> (FrameContext, UnboundedReceiver<OutboundMessage>) {
    let (transport, rx) = ChannelTransport::new();
    let host = HostWindow::resolve(Arc::new(transport), None, HOST);
    let frame = FrameContext { own_origin: "https://app.example".into(), query: query.into(), host };
    (frame, rx)
}

fn start(config: SdkConfig) -> (Arc<Session>, UnboundedReceiver<OutboundMessage>) {
    let (frame, mut rx) = frame_context(QUERY);
    let session = Session::new(config, Some(frame)).expect("session");
    let handshake = rx.try_recv().expect("handshake");
    assert_eq!(handshake.message[0], json!(0));
    (session, rx)
}

fn connected() -> (Arc<Session>, UnboundedReceiver<OutboundMessage>) {
    start(SdkConfig::new("client-1"))
}

/// Next outbound `FRAME` body.
fn next_frame(rx: &mut UnboundedReceiver<OutboundMessage>) -> Value {
    let sent = rx.try_recv().expect("outbound frame");
    assert_eq!(sent.target_origin, HOST);
    assert_eq!(sent.message[0], json!(1));
    sent.message[1].clone()
}

fn frame(body: Value) -> Value {
    json!([1, body])
}

fn ready_dispatch() -> Value {
    frame(json!({"cmd": "DISPATCH", "evt": "READY", "nonce": null, "data": {"v": 1}}))
}

fn counter() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::clone(&seen);
    (seen, move |args: &Value| inner.lock().unwrap().push(args.clone()))
}

fn get_guild() -> Data {
    command_body("GET_GUILD", json!({"guild_id": "G1"}), None)
}

// =============================================================================
// STARTUP
// =============================================================================

#[test]
fn new_posts_exactly_one_handshake_to_trusted_origin() {
    let (frame, mut rx) = frame_context(QUERY);
    let session = Session::new(SdkConfig::new("client-1"), Some(frame)).expect("session");

    let sent = rx.try_recv().expect("handshake");
    assert_eq!(sent.target_origin, HOST);
    assert_eq!(
        sent.message,
        json!([0, {"v": 1, "encoding": "json", "client_id": "client-1", "frame_id": "F1"}])
    );
    assert!(rx.try_recv().is_err());

    assert_eq!(session.state(), SessionState::Handshaking);
    assert!(!session.is_ready());
    assert!(!session.handshake_acknowledged());
}

#[test]
fn new_reads_launch_parameters() {
    let (session, _rx) = connected();
    let info = session.info();
    assert_eq!(info.client_id, "client-1");
    assert_eq!(info.frame_id, "F1");
    assert_eq!(info.instance_id, "I1");
    assert_eq!(info.platform, Platform::Desktop);
    assert_eq!(info.guild_id.as_deref(), Some("G1"));
    assert_eq!(info.channel_id, None);
}

#[test]
fn session_info_display_lists_identifiers() {
    let (session, _rx) = connected();
    let text = session.info().to_string();
    assert!(text.contains("frame_id: F1"));
    assert!(text.contains("platform: desktop"));
    assert!(text.contains("channel_id: ,"));
}

#[test]
fn new_without_referrer_targets_any_origin() {
    let (transport, mut rx) = ChannelTransport::new();
    let host = HostWindow::resolve(Arc::new(transport), None, "");
    let frame = FrameContext { own_origin: String::new(), query: QUERY.into(), host };

    let session = Session::new(SdkConfig::new("client-1"), Some(frame)).expect("session");
    assert_eq!(session.target_origin(), "*");
    assert_eq!(rx.try_recv().expect("handshake").target_origin, "*");
}

#[test]
fn missing_client_id_is_fatal() {
    let (frame, mut rx) = frame_context(QUERY);
    let err = Session::new(SdkConfig::new(""), Some(frame)).expect_err("should fail");
    assert_eq!(err, SdkError::MissingClientId);
    assert!(err.is_fatal());
    assert!(rx.try_recv().is_err());
}

#[test]
fn missing_frame_id_is_fatal_and_sends_nothing() {
    let (frame, mut rx) = frame_context("?instance_id=I1&platform=desktop");
    let err = Session::new(SdkConfig::new("client-1"), Some(frame)).expect_err("should fail");
    assert_eq!(err, SdkError::MissingParam("frame_id"));
    assert!(err.is_fatal());
    assert!(rx.try_recv().is_err());
}

#[test]
fn invalid_platform_is_fatal() {
    let (frame, _rx) = frame_context("?frame_id=F1&instance_id=I1&platform=console");
    let err = Session::new(SdkConfig::new("client-1"), Some(frame)).expect_err("should fail");
    assert_eq!(err, SdkError::InvalidPlatform("console".into()));
}

#[test]
fn no_host_window_starts_degraded() {
    let session = Session::new(SdkConfig::new("client-1"), None).expect("session");
    assert_eq!(session.state(), SessionState::Degraded);
    assert_eq!(session.info().frame_id, "");
    assert_eq!(session.info().instance_id, "");
    assert_eq!(session.info().platform, Platform::Desktop);

    let err = session.send_command(get_guild(), |_| {}).expect_err("should fail");
    assert_eq!(err, SdkError::MissingTransport);
}

#[tokio::test]
async fn wait_until_ready_reports_degraded_session() {
    let session = Session::new(SdkConfig::new("client-1"), None).expect("session");
    assert_eq!(session.wait_until_ready().await, Err(SdkError::MissingTransport));
}

// =============================================================================
// READINESS
// =============================================================================

#[test]
fn handshake_reply_does_not_mark_ready() {
    let (session, _rx) = connected();
    session.deliver(HOST, &json!([0, {}])).expect("deliver");
    assert!(session.handshake_acknowledged());
    assert!(!session.is_ready());
}

#[test]
fn ready_dispatch_marks_ready() {
    let (session, _rx) = connected();
    session.deliver(HOST, &ready_dispatch()).expect("deliver");
    assert!(session.is_ready());
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn hello_is_ignored() {
    let (session, mut rx) = connected();
    session.deliver(HOST, &json!([3, {"v": 1}])).expect("deliver");
    assert_eq!(session.state(), SessionState::Handshaking);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn wait_until_ready_resolves_on_ready_dispatch() {
    let (session, _rx) = connected();
    let waiter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.wait_until_ready().await })
    };
    tokio::task::yield_now().await;
    session.deliver(HOST, &ready_dispatch()).expect("deliver");

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("resolved")
        .expect("join");
    assert_eq!(result, Ok(()));
}

// =============================================================================
// INBOUND FILTERING
// =============================================================================

#[test]
fn untrusted_origin_has_no_effect() {
    let (session, _rx) = connected();
    let (seen, listener) = counter();
    session.bus().on("VOICE_STATE_UPDATE", listener);
    session.send_command(get_guild(), |_| {}).expect("send");

    let dispatch = frame(json!({"cmd": "DISPATCH", "evt": "VOICE_STATE_UPDATE", "data": {}}));
    session.deliver("https://evil.example", &dispatch).expect("deliver");
    session.deliver("https://evil.example", &ready_dispatch()).expect("deliver");
    session.deliver("https://evil.example", &json!([99, {}])).expect("deliver");

    assert!(seen.lock().unwrap().is_empty());
    assert!(!session.is_ready());
    assert_eq!(session.pending_commands(), 1);
    assert_eq!(session.failure(), None);
}

#[test]
fn own_and_null_origins_are_trusted() {
    let (session, _rx) = connected();
    session.deliver("null", &json!([0, {}])).expect("deliver");
    assert!(session.handshake_acknowledged());

    session.deliver("https://app.example", &ready_dispatch()).expect("deliver");
    assert!(session.is_ready());
}

#[test]
fn extra_origin_is_trusted() {
    let (session, _rx) = start(SdkConfig::new("client-1").with_extra_origin("https://proxy.example"));
    session.deliver("https://proxy.example", &ready_dispatch()).expect("deliver");
    assert!(session.is_ready());
}

#[test]
fn malformed_envelopes_are_dropped_silently() {
    let (session, _rx) = connected();
    for message in [json!({"op": 1}), json!([]), json!([1]), json!([null, {}]), json!([1, null])] {
        assert_eq!(session.accept(HOST, &message), Ok(None));
    }
    assert_eq!(session.state(), SessionState::Handshaking);
}

#[test]
fn non_integer_opcode_is_fatal() {
    let (session, _rx) = connected();
    let err = session.deliver(HOST, &json!(["1", {}])).expect_err("should fail");
    assert!(matches!(err, SdkError::Codec(frames::CodecError::NonIntegerOpcode(_))));
    assert!(err.is_fatal());
}

#[test]
fn unknown_opcode_is_fatal() {
    let (session, _rx) = connected();
    let err = session.deliver(HOST, &json!([7, {}])).expect_err("should fail");
    assert_eq!(err, SdkError::Codec(frames::CodecError::InvalidOpcode(7)));
    assert!(err.is_fatal());
}

// =============================================================================
// COMMANDS
// =============================================================================

#[test]
fn send_command_injects_nonce_and_posts_frame() {
    let (session, mut rx) = connected();
    let nonce = session.send_command(get_guild(), |_| {}).expect("send");

    let body = next_frame(&mut rx);
    assert_eq!(body["cmd"], "GET_GUILD");
    assert_eq!(body["args"], json!({"guild_id": "G1"}));
    assert_eq!(body["nonce"], json!(nonce));
    assert_eq!(session.pending_commands(), 1);
}

#[test]
fn nonces_are_unique() {
    let (session, _rx) = connected();
    let a = session.send_command(get_guild(), |_| {}).expect("send");
    let b = session.send_command(get_guild(), |_| {}).expect("send");
    assert_ne!(a, b);
    assert_eq!(session.pending_commands(), 2);
}

#[test]
fn response_resolves_completion_exactly_once() {
    let (session, _rx) = connected();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::clone(&seen);
    let nonce = session
        .send_command(get_guild(), move |outcome| inner.lock().unwrap().push(outcome))
        .expect("send");

    let reply = frame(json!({"cmd": "GET_GUILD", "nonce": nonce, "data": {"id": "G1"}}));
    session.deliver(HOST, &reply).expect("deliver");
    session.deliver(HOST, &reply).expect("deliver");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], Ok(json!({"id": "G1"})));
    assert_eq!(session.pending_commands(), 0);
}

#[test]
fn response_without_nonce_is_fatal() {
    let (session, _rx) = connected();
    let reply = frame(json!({"cmd": "GET_GUILD", "data": {}}));
    let err = session.deliver(HOST, &reply).expect_err("should fail");
    assert_eq!(err, SdkError::MissingNonce { cmd: "GET_GUILD".into() });
    assert!(err.is_fatal());
}

#[test]
fn response_for_unknown_command_is_fatal() {
    let (session, _rx) = connected();
    let reply = frame(json!({"cmd": "LAUNCH_ROCKET", "nonce": "n", "data": {}}));
    let err = session.deliver(HOST, &reply).expect_err("should fail");
    assert!(matches!(err, SdkError::Codec(frames::CodecError::UnknownCommand(_))));
}

#[test]
fn dispatch_of_unknown_event_is_fatal() {
    let (session, _rx) = connected();
    let dispatch = frame(json!({"cmd": "DISPATCH", "evt": "SOLAR_FLARE", "data": {}}));
    let err = session.deliver(HOST, &dispatch).expect_err("should fail");
    assert!(matches!(err, SdkError::Codec(frames::CodecError::UnknownEvent(_))));
}

#[test]
fn error_reply_fails_completion_and_emits_one_error_event() {
    let (session, _rx) = connected();
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::clone(&outcomes);
    let nonce = session
        .send_command(get_guild(), move |outcome| inner.lock().unwrap().push(outcome))
        .expect("send");
    let (errors, listener) = counter();
    session.bus().on(ERROR_EVENT, listener);

    let data = json!({"code": 4006, "message": "Invalid guild"});
    let reply = frame(json!({"cmd": "GET_GUILD", "evt": "ERROR", "nonce": nonce, "data": data.clone()}));
    session.deliver(HOST, &reply).expect("deliver");

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0],
        Err(CommandError::Host { code: 4006, message: "Invalid guild".into(), data })
    );

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0], json!({"code": 4006, "message": "Invalid guild", "source": "Discord SDK Error"}));
    assert_eq!(session.pending_commands(), 0);
    assert_eq!(session.failure(), None);
}

#[test]
fn error_reply_without_nonce_still_emits_error_event() {
    let (session, _rx) = connected();
    let (errors, listener) = counter();
    session.bus().on(ERROR_EVENT, listener);

    let reply = frame(json!({"cmd": "GET_GUILD", "evt": "ERROR", "data": {"code": 1000, "message": "boom"}}));
    session.deliver(HOST, &reply).expect("deliver");
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[test]
fn dispatch_invokes_listeners_and_leaves_pending_untouched() {
    let (session, _rx) = connected();
    let nonce = session.send_command(get_guild(), |_| {}).expect("send");
    let (first, a) = counter();
    let (second, b) = counter();
    session.bus().on("VOICE_STATE_UPDATE", a);
    session.bus().on("VOICE_STATE_UPDATE", b);

    let dispatch = frame(json!({
        "cmd": "DISPATCH",
        "evt": "VOICE_STATE_UPDATE",
        "nonce": nonce,
        "data": {"user_id": "U1", "mute": true}
    }));
    session.deliver(HOST, &dispatch).expect("deliver");

    assert_eq!(*first.lock().unwrap(), vec![json!({"user_id": "U1", "mute": true})]);
    assert_eq!(*second.lock().unwrap(), vec![json!({"user_id": "U1", "mute": true})]);
    assert_eq!(session.pending_commands(), 1);
}

#[test]
fn close_emits_close_event() {
    let (session, _rx) = connected();
    let (closes, listener) = counter();
    session.bus().on(CLOSE_EVENT, listener);

    session.deliver(HOST, &json!([2, {"code": 1000, "message": "bye"}])).expect("deliver");
    assert_eq!(*closes.lock().unwrap(), vec![json!({"code": 1000, "message": "bye"})]);
}

#[tokio::test]
async fn command_resolves_with_reply_data() {
    let (session, mut rx) = connected();
    let task = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.command(get_guild()).await })
    };

    let sent = rx.recv().await.expect("frame");
    let nonce = sent.message[1]["nonce"].clone();
    session
        .deliver(HOST, &frame(json!({"cmd": "GET_GUILD", "nonce": nonce, "data": {"name": "guild"}})))
        .expect("deliver");

    let reply = task.await.expect("join");
    assert_eq!(reply, Ok(json!({"name": "guild"})));
}

#[tokio::test]
async fn command_times_out_and_removes_pending_entry() {
    let (session, _rx) = start(SdkConfig::new("client-1").with_command_timeout(Duration::from_millis(20)));

    let err = session.command(get_guild()).await.expect_err("should time out");
    assert_eq!(err, SdkError::Command(CommandError::Timeout(Duration::from_millis(20))));
    assert_eq!(session.pending_commands(), 0);
}

#[test]
fn send_failure_leaves_no_pending_entry() {
    let (session, rx) = connected();
    drop(rx);
    let err = session.send_command(get_guild(), |_| {}).expect_err("should fail");
    assert_eq!(err, SdkError::Transport(crate::TransportError::Closed));
    assert_eq!(session.pending_commands(), 0);
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[test]
fn subscribers_share_one_host_subscription() {
    let (session, mut rx) = connected();
    let args = json!({"channel_id": "C1"});

    let first = session.subscribe("VOICE_STATE_UPDATE", |_| {}, args.clone()).expect("subscribe");
    let second = session.subscribe("VOICE_STATE_UPDATE", |_| {}, args.clone()).expect("subscribe");
    let third = session.subscribe("VOICE_STATE_UPDATE", |_| {}, args.clone()).expect("subscribe");

    let body = next_frame(&mut rx);
    assert_eq!(body["cmd"], "SUBSCRIBE");
    assert_eq!(body["evt"], "VOICE_STATE_UPDATE");
    assert_eq!(body["args"], args);
    assert!(rx.try_recv().is_err());
    assert_eq!(session.subscriber_count("VOICE_STATE_UPDATE"), 3);

    session.unsubscribe(first).expect("unsubscribe");
    session.unsubscribe(second).expect("unsubscribe");
    assert!(rx.try_recv().is_err());

    session.unsubscribe(third).expect("unsubscribe");
    let body = next_frame(&mut rx);
    assert_eq!(body["cmd"], "UNSUBSCRIBE");
    assert_eq!(body["evt"], "VOICE_STATE_UPDATE");
    assert_eq!(body["args"], args);
    assert!(rx.try_recv().is_err());
    assert_eq!(session.bus().listener_count("VOICE_STATE_UPDATE"), 0);
}

#[test]
fn subscribing_to_ready_or_local_events_sends_nothing() {
    let (session, mut rx) = connected();
    let ready = session.subscribe(READY, |_| {}, json!({})).expect("subscribe");
    let local = session.subscribe("my-local-event", |_| {}, json!({})).expect("subscribe");
    assert!(rx.try_recv().is_err());

    session.unsubscribe(ready).expect("unsubscribe");
    session.unsubscribe(local).expect("unsubscribe");
    assert!(rx.try_recv().is_err());
}

#[test]
fn subscribed_listener_receives_dispatch() {
    let (session, _rx) = connected();
    let (seen, listener) = counter();
    let subscription = session.subscribe("SPEAKING_START", listener, json!({})).expect("subscribe");
    assert_eq!(subscription.event(), "SPEAKING_START");

    let dispatch = frame(json!({"cmd": "DISPATCH", "evt": "SPEAKING_START", "data": {"user_id": "U1"}}));
    session.deliver(HOST, &dispatch).expect("deliver");
    assert_eq!(seen.lock().unwrap().len(), 1);

    session.unsubscribe(subscription).expect("unsubscribe");
    session.deliver(HOST, &dispatch).expect("deliver");
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn direct_bus_listeners_do_not_hold_host_subscription() {
    let (session, mut rx) = connected();
    let (seen, listener) = counter();
    session.bus().on("SPEAKING_START", listener);
    assert!(rx.try_recv().is_err());

    let subscription = session.subscribe("SPEAKING_START", |_| {}, json!({})).expect("subscribe");
    assert_eq!(next_frame(&mut rx)["cmd"], "SUBSCRIBE");

    session.unsubscribe(subscription).expect("unsubscribe");
    assert_eq!(next_frame(&mut rx)["cmd"], "UNSUBSCRIBE");
    assert_eq!(session.bus().listener_count("SPEAKING_START"), 1);

    let dispatch = frame(json!({"cmd": "DISPATCH", "evt": "SPEAKING_START", "data": {}}));
    session.deliver(HOST, &dispatch).expect("deliver");
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn failed_subscribe_rolls_back_registration() {
    let (session, rx) = connected();
    drop(rx);
    let err = session.subscribe("VOICE_STATE_UPDATE", |_| {}, json!({})).expect_err("should fail");
    assert!(matches!(err, SdkError::Transport(_)));
    assert_eq!(session.subscriber_count("VOICE_STATE_UPDATE"), 0);
    assert_eq!(session.bus().listener_count("VOICE_STATE_UPDATE"), 0);
}

/// Records every posted command once it reaches the wire. The first post of
/// `gated_cmd` parks inside `post` until released, then fails if `fail_gated`.
struct GatedTransport {
    gated_cmd: &'static str,
    fail_gated: bool,
    gate_used: std::sync::atomic::AtomicBool,
    wire: Mutex<Vec<String>>,
    entered: Mutex<std::sync::mpsc::Sender<()>>,
    release: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl crate::Transport for GatedTransport {
    fn post(&self, message: &Value, _target_origin: &str) -> Result<(), crate::TransportError> {
        let Some(cmd) = message[1].get("cmd").and_then(Value::as_str) else {
            return Ok(());
        };
        if cmd == self.gated_cmd && !self.gate_used.swap(true, Ordering::SeqCst) {
            self.entered.lock().unwrap().send(()).expect("test alive");
            self.release.lock().unwrap().recv().expect("released");
            if self.fail_gated {
                return Err(crate::TransportError::Post("rejected".into()));
            }
        }
        self.wire.lock().unwrap().push(cmd.to_owned());
        Ok(())
    }
}

struct Gate {
    transport: Arc<GatedTransport>,
    session: Arc<Session>,
    entered: std::sync::mpsc::Receiver<()>,
    release: std::sync::mpsc::Sender<()>,
}

fn gated(gated_cmd: &'static str, fail_gated: bool) -> Gate {
    let (entered_tx, entered) = std::sync::mpsc::channel();
    let (release, release_rx) = std::sync::mpsc::channel();
    let transport = Arc::new(GatedTransport {
        gated_cmd,
        fail_gated,
        gate_used: std::sync::atomic::AtomicBool::new(false),
        wire: Mutex::default(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let host = HostWindow::resolve(Arc::<GatedTransport>::clone(&transport), None, HOST);
    let frame = FrameContext { own_origin: "https://app.example".into(), query: QUERY.into(), host };
    let session = Session::new(SdkConfig::new("client-1"), Some(frame)).expect("session");
    Gate { transport, session, entered, release }
}

fn subscribe_on_thread(session: &Arc<Session>) -> std::thread::JoinHandle<Result<Subscription, SdkError>> {
    let session = Arc::clone(session);
    std::thread::spawn(move || session.subscribe("VOICE_STATE_UPDATE", |_| {}, json!({})))
}

#[test]
fn subscribe_racing_last_unsubscribe_leaves_host_subscribed() {
    let gate = gated(UNSUBSCRIBE, false);
    let first = gate
        .session
        .subscribe("VOICE_STATE_UPDATE", |_| {}, json!({}))
        .expect("subscribe");

    let unsubscriber = {
        let session = Arc::clone(&gate.session);
        std::thread::spawn(move || session.unsubscribe(first))
    };
    gate.entered.recv().expect("unsubscribe reached the transport");

    let subscriber = subscribe_on_thread(&gate.session);
    std::thread::sleep(Duration::from_millis(50));
    gate.release.send(()).expect("release");

    unsubscriber.join().expect("join").expect("unsubscribe");
    subscriber.join().expect("join").expect("subscribe");

    assert_eq!(*gate.transport.wire.lock().unwrap(), vec!["SUBSCRIBE", "UNSUBSCRIBE", "SUBSCRIBE"]);
    assert_eq!(gate.session.subscriber_count("VOICE_STATE_UPDATE"), 1);
}

#[test]
fn subscribe_racing_failed_first_subscribe_sends_its_own() {
    let gate = gated(SUBSCRIBE, true);

    let failing = subscribe_on_thread(&gate.session);
    gate.entered.recv().expect("subscribe reached the transport");

    let waiting = subscribe_on_thread(&gate.session);
    std::thread::sleep(Duration::from_millis(50));
    gate.release.send(()).expect("release");

    let err = failing.join().expect("join").expect_err("first subscribe should fail");
    assert_eq!(err, SdkError::Transport(crate::TransportError::Post("rejected".into())));
    waiting.join().expect("join").expect("subscribe");

    assert_eq!(*gate.transport.wire.lock().unwrap(), vec!["SUBSCRIBE"]);
    assert_eq!(gate.session.subscriber_count("VOICE_STATE_UPDATE"), 1);
    assert_eq!(gate.session.bus().listener_count("VOICE_STATE_UPDATE"), 1);
}

// =============================================================================
// FAILURE
// =============================================================================

#[test]
fn fail_is_terminal_and_fails_pending_commands() {
    let (session, _rx) = connected();
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::clone(&outcomes);
    session
        .send_command(get_guild(), move |outcome| inner.lock().unwrap().push(outcome))
        .expect("send");

    session.fail(&SdkError::MissingNonce { cmd: "GET_GUILD".into() });
    session.fail(&SdkError::MissingTransport);

    assert_eq!(session.state(), SessionState::Fatal);
    assert_eq!(session.failure(), Some(SdkError::MissingNonce { cmd: "GET_GUILD".into() }));
    assert!(matches!(outcomes.lock().unwrap()[0], Err(CommandError::SessionFailed(_))));

    session.deliver(HOST, &ready_dispatch()).expect("ignored");
    assert_eq!(session.state(), SessionState::Fatal);

    let err = session.send_command(get_guild(), |_| {}).expect_err("should fail");
    assert!(matches!(err, SdkError::SessionFailed(_)));
}

#[tokio::test]
async fn wait_until_ready_reports_failure() {
    let (session, _rx) = connected();
    session.fail(&SdkError::MissingNonce { cmd: "GET_GUILD".into() });
    let err = session.wait_until_ready().await.expect_err("should fail");
    assert_eq!(err, SdkError::SessionFailed("missing nonce in GET_GUILD response".into()));
}
