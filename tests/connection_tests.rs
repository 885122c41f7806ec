// ConnectionManager state machine, driven by hand with explicit instants

mod common;

use common::{GET_METRICS, MockTransport, endpoint};
use pulseboard::connection::{
    ConnectionManager, ConnectionSignal, ConnectionState, FixedDelay, RetryPolicy, TransportEvent,
    TransportEventKind,
};
use pulseboard::error::TransportError;
use pulseboard::models::OutboundMessage;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

const DELAY: Duration = Duration::from_millis(5000);

fn manager() -> (ConnectionManager<MockTransport>, MockTransport, mpsc::Receiver<TransportEvent>) {
    let transport = MockTransport::new();
    let (tx, rx) = mpsc::channel(16);
    let manager = ConnectionManager::new(
        endpoint(),
        transport.clone(),
        Box::new(FixedDelay(DELAY)),
        tx,
    );
    (manager, transport, rx)
}

fn connected() -> (ConnectionManager<MockTransport>, MockTransport, Instant) {
    let (mut m, t, _rx) = manager();
    let now = Instant::now();
    m.connect();
    let signal = m.handle_event(t.event(TransportEventKind::Opened), now);
    assert_eq!(signal, Some(ConnectionSignal::Opened));
    (m, t, now)
}

#[test]
fn test_initial_state_and_connect() {
    let (mut m, t, _rx) = manager();
    assert_eq!(m.state(), ConnectionState::Disconnected);
    m.connect();
    assert_eq!(m.state(), ConnectionState::Connecting);
    assert_eq!(t.opens(), vec![1]);

    // Second connect while an attempt is active is ignored.
    m.connect();
    assert_eq!(t.opens(), vec![1]);
}

#[test]
fn test_open_moves_to_connected() {
    let (m, _t, _) = connected();
    assert_eq!(m.state(), ConnectionState::Connected);
    assert_eq!(m.retry_at(), None);
}

#[test]
fn test_send_only_when_connected() {
    let (mut m, t, _rx) = manager();
    assert!(!m.send(&OutboundMessage::GetMetrics));
    m.connect();
    assert!(!m.send(&OutboundMessage::GetMetrics));
    assert!(t.sent().is_empty());

    m.handle_event(t.event(TransportEventKind::Opened), Instant::now());
    assert!(m.send(&OutboundMessage::GetMetrics));
    assert_eq!(t.sent(), vec![GET_METRICS.to_string()]);
}

#[test]
fn test_send_failure_is_swallowed() {
    let (mut m, t, _) = connected();
    t.set_fail_send(true);
    assert!(!m.send(&OutboundMessage::GetMetrics));
    assert_eq!(m.state(), ConnectionState::Connected);
}

#[test]
fn test_messages_forwarded_only_when_connected() {
    let (mut m, t, _rx) = manager();
    m.connect();
    let early = m.handle_event(
        t.event(TransportEventKind::Message("{}".into())),
        Instant::now(),
    );
    assert_eq!(early, None);

    m.handle_event(t.event(TransportEventKind::Opened), Instant::now());
    let signal = m.handle_event(
        t.event(TransportEventKind::Message("hello".into())),
        Instant::now(),
    );
    assert_eq!(signal, Some(ConnectionSignal::Message("hello".into())));
}

#[test]
fn test_close_schedules_reconnect_after_exact_delay() {
    let (mut m, t, t0) = connected();
    m.handle_event(t.event(TransportEventKind::Closed), t0);

    assert_eq!(m.state(), ConnectionState::Disconnected);
    assert_eq!(m.retry_at(), Some(t0 + DELAY));
    assert_eq!(t.closes(), 1);

    assert!(!m.poll_retry(t0));
    assert!(!m.poll_retry(t0 + DELAY - Duration::from_millis(1)));
    assert_eq!(m.state(), ConnectionState::Disconnected);
    assert_eq!(t.opens().len(), 1);

    assert!(m.poll_retry(t0 + DELAY));
    assert_eq!(m.state(), ConnectionState::Connecting);
    assert_eq!(t.opens(), vec![1, 2]);
    assert_eq!(m.retry_at(), None);
}

#[test]
fn test_failed_connect_resolves_to_retry() {
    let (mut m, t, _rx) = manager();
    let t0 = Instant::now();
    m.connect();
    m.handle_event(
        t.event(TransportEventKind::Failed(TransportError::Timeout(10_000))),
        t0,
    );
    assert_eq!(m.state(), ConnectionState::Disconnected);
    assert_eq!(m.retry_at(), Some(t0 + DELAY));
}

#[test]
fn test_retries_forever_with_fixed_delay() {
    let (mut m, t, _rx) = manager();
    let mut now = Instant::now();
    m.connect();
    for attempt in 0..20u64 {
        m.handle_event(t.event(TransportEventKind::Closed), now);
        assert_eq!(m.retry_at(), Some(now + DELAY), "attempt {attempt}");
        now += DELAY;
        assert!(m.poll_retry(now));
    }
    assert_eq!(t.opens().len(), 21);
}

#[test]
fn test_stale_events_are_ignored() {
    let (mut m, t, t0) = connected();
    let old = t.event(TransportEventKind::Closed);
    m.handle_event(t.event(TransportEventKind::Closed), t0);
    assert!(m.poll_retry(t0 + DELAY));
    assert_eq!(m.state(), ConnectionState::Connecting);

    // A late close from generation 1 must not knock down attempt 2.
    assert_eq!(m.handle_event(old, t0 + DELAY), None);
    assert_eq!(m.state(), ConnectionState::Connecting);
    assert_eq!(m.retry_at(), None);
}

#[test]
fn test_duplicate_close_does_not_reschedule() {
    let (mut m, t, t0) = connected();
    m.handle_event(t.event(TransportEventKind::Closed), t0);
    m.handle_event(
        t.event(TransportEventKind::Failed(TransportError::Closed("reset".into()))),
        t0 + Duration::from_millis(100),
    );
    assert_eq!(m.retry_at(), Some(t0 + DELAY));
    assert_eq!(t.closes(), 1);
}

struct Doubling;

impl RetryPolicy for Doubling {
    fn next_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(100 * 2u64.pow(attempt))
    }
}

#[test]
fn test_injected_retry_policy_and_attempt_reset_on_open() {
    let (mut m, t, _rx) = manager();
    m.set_retry_policy(Box::new(Doubling));
    let t0 = Instant::now();
    m.connect();
    m.handle_event(t.event(TransportEventKind::Closed), t0);
    assert_eq!(m.retry_at(), Some(t0 + Duration::from_millis(100)));
    m.poll_retry(t0 + Duration::from_millis(100));
    m.handle_event(t.event(TransportEventKind::Closed), t0);
    assert_eq!(m.retry_at(), Some(t0 + Duration::from_millis(200)));

    m.poll_retry(t0 + Duration::from_millis(200));
    m.handle_event(t.event(TransportEventKind::Opened), t0);
    m.handle_event(t.event(TransportEventKind::Closed), t0);
    assert_eq!(m.retry_at(), Some(t0 + Duration::from_millis(100)));
}

#[test]
fn test_shutdown_cancels_pending_reconnect() {
    let (mut m, t, t0) = connected();
    m.handle_event(t.event(TransportEventKind::Closed), t0);
    m.shutdown();
    assert_eq!(m.state(), ConnectionState::Disconnected);
    assert_eq!(m.retry_at(), None);
    assert!(!m.poll_retry(t0 + DELAY * 10));
    assert_eq!(t.opens().len(), 1);
}

#[test]
fn test_fixed_delay_default_is_five_seconds() {
    assert_eq!(FixedDelay::default().next_delay(0), Duration::from_millis(5000));
    assert_eq!(FixedDelay::default().next_delay(99), Duration::from_millis(5000));
}
