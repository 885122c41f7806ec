// WebSocket transport for the backend channel (tokio-tungstenite).
// One spawned task per connection attempt; it only forwards events into the manager's queue.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::connection::{EventSender, Transport, TransportEvent, TransportEventKind};
use crate::error::TransportError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Max time to wait for a frame write before treating the connection as dead.
const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WsTransport {
    connect_timeout: Duration,
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            outbound: None,
            task: None,
        }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Transport for WsTransport {
    fn open(&mut self, endpoint: &Url, generation: u64, events: EventSender) {
        self.close();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        self.outbound = Some(out_tx);
        let url = endpoint.clone();
        let connect_timeout = self.connect_timeout;
        self.task = Some(tokio::spawn(async move {
            let kind = match run_connection(&url, generation, connect_timeout, out_rx, &events).await
            {
                Ok(()) => TransportEventKind::Closed,
                Err(e) => TransportEventKind::Failed(e),
            };
            let _ = events.send(TransportEvent::new(generation, kind)).await;
        }));
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        match &self.outbound {
            Some(tx) => tx
                .send(text)
                .map_err(|_| TransportError::Closed("writer stopped".into())),
            None => Err(TransportError::NotConnected),
        }
    }

    fn close(&mut self) {
        self.outbound = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect, report `Opened`, then pump frames both ways until either side ends.
/// `Ok` means an orderly close, `Err` a transport failure.
async fn run_connection(
    url: &Url,
    generation: u64,
    connect_timeout: Duration,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    events: &EventSender,
) -> Result<(), TransportError> {
    let (ws, _response) = match timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str())).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => return Err(TransportError::Connect(e.to_string())),
        Err(_) => return Err(TransportError::Timeout(connect_timeout.as_millis() as u64)),
    };
    if events
        .send(TransportEvent::new(generation, TransportEventKind::Opened))
        .await
        .is_err()
    {
        return Ok(());
    }

    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                let Some(text) = outbound else {
                    let _ = write.close().await;
                    return Ok(());
                };
                match timeout(WS_SEND_TIMEOUT, write.send(Message::Text(text.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(TransportError::Send(e.to_string())),
                    Err(_) => return Err(TransportError::Send("send timed out".into())),
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let event = TransportEvent::new(
                            generation,
                            TransportEventKind::Message(text.as_str().to_owned()),
                        );
                        if events.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        match frame {
                            Some(cf) => tracing::info!(code = %cf.code, reason = %cf.reason, "Backend sent close frame"),
                            None => tracing::info!("Backend sent close frame"),
                        }
                        return Ok(());
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong/Binary; tungstenite answers pings itself.
                    }
                    Some(Err(e)) => return Err(TransportError::Closed(e.to_string())),
                    None => return Ok(()),
                }
            }
        }
    }
}
