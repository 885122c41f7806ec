// Connection lifecycle: Disconnected -> Connecting -> Connected -> Disconnected -> ...
//
// The manager is a plain state machine. Transports report what happened through a single
// event queue; the owner of the queue feeds events back in via `handle_event`, and drives
// reconnects with `poll_retry`. Time is always passed in, so tests can use any clock.

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use url::Url;

use crate::error::TransportError;
use crate::models::OutboundMessage;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Opened,
    Message(String),
    Closed,
    Failed(TransportError),
}

/// Event from one connection attempt. `generation` identifies the attempt so that events
/// from a connection the manager already gave up on are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub generation: u64,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(generation: u64, kind: TransportEventKind) -> Self {
        Self { generation, kind }
    }
}

pub type EventSender = mpsc::Sender<TransportEvent>;

/// A message channel to the backend.
///
/// `open` starts one attempt and returns immediately. The attempt must end in exactly one
/// `Opened` followed (eventually) by `Closed`/`Failed`, or in `Closed`/`Failed` directly.
pub trait Transport: Send {
    fn open(&mut self, endpoint: &Url, generation: u64, events: EventSender);

    /// Queue a text frame on the open connection.
    fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Tear down the current attempt, if any. Must not emit further events for it.
    fn close(&mut self);
}

/// How long to wait before reconnect attempt number `attempt` (0-based, reset on open).
pub trait RetryPolicy: Send {
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Same delay every time, no cap on attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay(DEFAULT_RECONNECT_DELAY)
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// What the owner of the manager must react to after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// The channel just opened (time to poke the backend for data).
    Opened,
    /// A text frame arrived on the open channel.
    Message(String),
}

/// Best-effort, at-most-once outbound delivery.
pub trait MessageSink {
    /// Returns whether the message was handed to the transport.
    fn send(&mut self, message: &OutboundMessage) -> bool;
}

pub struct ConnectionManager<T: Transport> {
    endpoint: Url,
    transport: T,
    retry: Box<dyn RetryPolicy>,
    events: EventSender,
    state: ConnectionState,
    generation: u64,
    attempt: u32,
    retry_at: Option<Instant>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        endpoint: Url,
        transport: T,
        retry: Box<dyn RetryPolicy>,
        events: EventSender,
    ) -> Self {
        Self {
            endpoint,
            transport,
            retry,
            events,
            state: ConnectionState::Disconnected,
            generation: 0,
            attempt: 0,
            retry_at: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Current connection attempt id.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the next reconnect is due, if one is scheduled.
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Swap the reconnect strategy; applies from the next disconnect.
    pub fn set_retry_policy(&mut self, retry: Box<dyn RetryPolicy>) {
        self.retry = retry;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Start a connection attempt. No-op unless Disconnected.
    pub fn connect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = %self.state, "connect ignored, attempt already active");
            return;
        }
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.retry_at = None;
        tracing::info!(
            endpoint = %self.endpoint,
            generation = self.generation,
            attempt = self.attempt,
            "Connecting to backend"
        );
        self.transport
            .open(&self.endpoint, self.generation, self.events.clone());
    }

    /// Apply one transport event. Events for older attempts are dropped.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) -> Option<ConnectionSignal> {
        if event.generation != self.generation {
            tracing::trace!(
                event_generation = event.generation,
                generation = self.generation,
                "stale transport event dropped"
            );
            return None;
        }
        match event.kind {
            TransportEventKind::Opened => {
                if self.state != ConnectionState::Connecting {
                    return None;
                }
                self.state = ConnectionState::Connected;
                self.attempt = 0;
                tracing::info!(endpoint = %self.endpoint, "Backend connection open");
                Some(ConnectionSignal::Opened)
            }
            TransportEventKind::Message(text) => {
                if self.state == ConnectionState::Connected {
                    Some(ConnectionSignal::Message(text))
                } else {
                    None
                }
            }
            TransportEventKind::Closed => {
                self.on_disconnect(now, None);
                None
            }
            TransportEventKind::Failed(e) => {
                self.on_disconnect(now, Some(e));
                None
            }
        }
    }

    fn on_disconnect(&mut self, now: Instant, error: Option<TransportError>) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.transport.close();
        self.state = ConnectionState::Disconnected;
        let delay = self.retry.next_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.retry_at = Some(now + delay);
        match error {
            Some(e) => tracing::warn!(
                error = %e,
                delay_ms = delay.as_millis() as u64,
                "Backend connection failed, reconnect scheduled"
            ),
            None => tracing::info!(
                delay_ms = delay.as_millis() as u64,
                "Backend connection closed, reconnect scheduled"
            ),
        }
    }

    /// Reconnect if the scheduled delay has elapsed at `now`. Returns whether it did.
    pub fn poll_retry(&mut self, now: Instant) -> bool {
        match self.retry_at {
            Some(at) if now >= at => {
                self.connect();
                true
            }
            _ => false,
        }
    }

    /// Send when Connected; otherwise the message is dropped, not queued.
    pub fn send(&mut self, message: &OutboundMessage) -> bool {
        if self.state != ConnectionState::Connected {
            tracing::debug!(state = %self.state, ?message, "not connected, message dropped");
            return false;
        }
        let json = match message.to_json() {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, operation = "encode_message", "message dropped");
                return false;
            }
        };
        match self.transport.send(json) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, operation = "send_message", "message dropped");
                false
            }
        }
    }

    /// Teardown: close the transport and cancel any pending reconnect.
    pub fn shutdown(&mut self) {
        self.transport.close();
        self.state = ConnectionState::Disconnected;
        self.retry_at = None;
        // Anything the old attempt still reports is now stale.
        self.generation += 1;
        tracing::debug!("Connection manager shut down");
    }
}

impl<T: Transport> MessageSink for ConnectionManager<T> {
    fn send(&mut self, message: &OutboundMessage) -> bool {
        ConnectionManager::send(self, message)
    }
}
