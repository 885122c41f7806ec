// Shared test helpers: in-memory transport and canned backend messages

#![allow(dead_code)]

use pulseboard::connection::{EventSender, Transport, TransportEvent, TransportEventKind};
use pulseboard::error::TransportError;
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Debug, Default)]
pub struct MockState {
    /// Generation of every `open` call, in order.
    pub opens: Vec<u64>,
    pub sent: Vec<String>,
    pub closes: usize,
    pub events: Option<EventSender>,
    pub fail_send: bool,
}

/// Transport that records calls; tests push events through [`MockTransport::emit`].
#[derive(Clone, Default)]
pub struct MockTransport {
    pub state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opens(&self) -> Vec<u64> {
        self.state.lock().unwrap().opens.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.state.lock().unwrap().fail_send = fail;
    }

    /// Event for the latest attempt, as the real transport would report it.
    pub fn event(&self, kind: TransportEventKind) -> TransportEvent {
        let generation = *self.state.lock().unwrap().opens.last().expect("never opened");
        TransportEvent::new(generation, kind)
    }

    /// Push an event for the latest attempt into the manager's queue.
    pub async fn emit(&self, kind: TransportEventKind) {
        let tx = self
            .state
            .lock()
            .unwrap()
            .events
            .clone()
            .expect("never opened");
        tx.send(self.event(kind)).await.expect("event queue closed");
    }
}

impl Transport for MockTransport {
    fn open(&mut self, _endpoint: &Url, generation: u64, events: EventSender) {
        let mut state = self.state.lock().unwrap();
        state.opens.push(generation);
        state.events = Some(events);
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send {
            return Err(TransportError::Send("mock send failure".into()));
        }
        state.sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closes += 1;
    }
}

pub const GET_METRICS: &str = r#"{"type":"get_metrics"}"#;

pub fn metrics_update(cpu: f64, memory: f64, disk: f64) -> String {
    serde_json::json!({
        "type": "metrics_update",
        "data": {
            "system": {
                "cpu_percent": cpu,
                "memory_percent": memory,
                "disk_usage": disk
            }
        }
    })
    .to_string()
}

pub fn endpoint() -> Url {
    Url::parse("ws://127.0.0.1:8000/ws").unwrap()
}
