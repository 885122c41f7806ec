// Owned dashboard lifecycle: init (page load) -> run (event loop) -> teardown (page unload).
// One task owns all state; transport events, the polling timer, the reconnect timer and
// shutdown are multiplexed through a single select loop.

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::Instrument;

use crate::config::AppConfig;
use crate::connection::{
    ConnectionManager, ConnectionSignal, FixedDelay, RetryPolicy, Transport, TransportEvent,
};
use crate::controller::DashboardController;
use crate::view::Renderer;

pub struct DashboardContext<T: Transport, R: Renderer> {
    controller: DashboardController,
    connection: ConnectionManager<T>,
    renderer: R,
    events_rx: mpsc::Receiver<TransportEvent>,
    poll_interval: Duration,
}

impl<T: Transport, R: Renderer> DashboardContext<T, R> {
    /// Build all dashboard state from config. Config errors (bad series, bad endpoint) fail here.
    pub fn init(config: &AppConfig, transport: T, renderer: R) -> anyhow::Result<Self> {
        let tracked = config.tracked_series()?;
        let controller = DashboardController::new(
            tracked,
            config.history.capacity,
            config.history.missing_fields,
        )?;
        let endpoint = config.backend.endpoint()?;
        let (events_tx, events_rx) = mpsc::channel(config.publishing.event_channel_capacity);
        let retry = Box::new(FixedDelay(Duration::from_millis(config.reconnect.delay_ms)));
        let connection = ConnectionManager::new(endpoint, transport, retry, events_tx);
        Ok(Self {
            controller,
            connection,
            renderer,
            events_rx,
            poll_interval: Duration::from_millis(config.polling.interval_ms),
        })
    }

    pub fn with_retry_policy(mut self, retry: Box<dyn RetryPolicy>) -> Self {
        self.connection.set_retry_policy(retry);
        self
    }

    pub fn controller(&self) -> &DashboardController {
        &self.controller
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    /// Apply one transport event: poke the backend on open, render on a metrics update.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match self.connection.handle_event(event, now) {
            Some(ConnectionSignal::Opened) => {
                self.controller.tick(&mut self.connection);
            }
            Some(ConnectionSignal::Message(text)) => {
                if let Some(view) = self.controller.on_message(&text, Utc::now()) {
                    self.renderer.render(&view);
                }
            }
            None => {}
        }
    }

    /// Polling tick.
    pub fn tick(&mut self) -> bool {
        self.controller.tick(&mut self.connection)
    }

    /// Runs until `shutdown_rx` fires (or its sender is dropped), then tears down.
    pub async fn run(&mut self, shutdown_rx: oneshot::Receiver<()>) {
        let span = tracing::debug_span!("dashboard", endpoint = %self.connection.endpoint());
        self.event_loop(shutdown_rx).instrument(span).await;
        self.teardown();
    }

    async fn event_loop(&mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        self.connection.connect();
        let mut poll = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let retry_at = self.connection.retry_at();
            tokio::select! {
                _ = &mut shutdown_rx => {
                    tracing::debug!("Dashboard shutting down");
                    break;
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_transport_event(event, Instant::now()),
                        None => break,
                    }
                }
                _ = poll.tick() => {
                    self.tick();
                }
                _ = sleep_until_deadline(retry_at) => {
                    self.connection.poll_retry(Instant::now());
                }
            }
        }
    }

    /// Close the channel and cancel the pending reconnect. The polling timer lives in the
    /// event loop and is dropped with it.
    pub fn teardown(&mut self) {
        self.connection.shutdown();
        tracing::info!("Dashboard stopped");
    }
}

impl<T, R> DashboardContext<T, R>
where
    T: Transport + 'static,
    R: Renderer + 'static,
{
    /// Spawns the event loop; send on (or drop) the shutdown sender to stop it.
    pub fn spawn(mut self, shutdown_rx: oneshot::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown_rx).await;
        })
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
