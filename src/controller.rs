// Dashboard controller: routes inbound messages into history and service state,
// derives the view model, and issues polling requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::connection::MessageSink;
use crate::error::HistoryError;
use crate::history::MetricsHistoryBuffer;
use crate::models::{
    InboundMessage, MetricKind, MetricSample, MetricsUpdate, OutboundMessage, ServiceStatus,
    SystemMetricsSnapshot, decode,
};
use crate::view::ViewModel;

/// What to record for a tracked series whose field is missing from a present `system` object.
/// The gauge shows 0 either way.
///
/// `Skip` keeps trend lengths in step with the fields actually received, so a cpu-only
/// update grows only the cpu trend. `Zero` plots a 0 point instead, which keeps every
/// trend on the same time axis at the cost of fake dips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// Record nothing for that series on this update.
    #[default]
    Skip,
    /// Record a 0.0 sample.
    Zero,
}

pub struct DashboardController {
    tracked: Vec<MetricKind>,
    history: MetricsHistoryBuffer,
    missing_fields: MissingFieldPolicy,
    system: SystemMetricsSnapshot,
    services: BTreeMap<String, ServiceStatus>,
    view: Option<Arc<ViewModel>>,
}

impl DashboardController {
    pub fn new(
        tracked: Vec<MetricKind>,
        capacity: usize,
        missing_fields: MissingFieldPolicy,
    ) -> Result<Self, HistoryError> {
        let history = MetricsHistoryBuffer::new(tracked.iter().map(|k| k.series_name()), capacity)?;
        Ok(Self {
            tracked,
            history,
            missing_fields,
            system: SystemMetricsSnapshot::default(),
            services: BTreeMap::new(),
            view: None,
        })
    }

    /// Handle one raw inbound frame. Returns the fresh view when the frame changed state.
    /// Malformed and unknown messages leave all state untouched.
    pub fn on_message(&mut self, raw: &str, now: DateTime<Utc>) -> Option<Arc<ViewModel>> {
        match decode(raw) {
            Ok(InboundMessage::MetricsUpdate(update)) => Some(self.apply_update(update, now)),
            Ok(InboundMessage::Unknown(kind)) => {
                tracing::debug!(kind = %kind, "ignoring unknown message type");
                None
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    operation = "decode_message",
                    "inbound message dropped"
                );
                None
            }
        }
    }

    pub fn apply_update(&mut self, update: MetricsUpdate, now: DateTime<Utc>) -> Arc<ViewModel> {
        if let Some(system) = update.system {
            self.record_system(&system, now);
            self.system = system;
        }
        if let Some(services) = update.services {
            // Last write wins; no merge with the previous set.
            self.services = services;
        }
        let view = Arc::new(ViewModel::derive(
            &self.tracked,
            &self.history,
            &self.system,
            &self.services,
            now,
        ));
        self.view = Some(view.clone());
        view
    }

    fn record_system(&mut self, system: &SystemMetricsSnapshot, now: DateTime<Utc>) {
        for &kind in &self.tracked {
            let value = match (system.field(kind), self.missing_fields) {
                (Some(v), _) => v,
                (None, MissingFieldPolicy::Zero) => 0.0,
                (None, MissingFieldPolicy::Skip) => continue,
            };
            if let Err(e) = self
                .history
                .record(kind.series_name(), MetricSample::new(now, value))
            {
                tracing::error!(error = %e, series = %kind, "history record failed");
            }
        }
    }

    /// Polling tick: ask the backend for metrics. Dropped unless the channel is open.
    pub fn tick(&self, sink: &mut impl MessageSink) -> bool {
        let sent = sink.send(&OutboundMessage::GetMetrics);
        tracing::trace!(sent, "poll tick");
        sent
    }

    pub fn tracked(&self) -> &[MetricKind] {
        &self.tracked
    }

    pub fn history(&self) -> &MetricsHistoryBuffer {
        &self.history
    }

    pub fn system(&self) -> &SystemMetricsSnapshot {
        &self.system
    }

    pub fn services(&self) -> &BTreeMap<String, ServiceStatus> {
        &self.services
    }

    /// Latest derived view, if any update has arrived yet.
    pub fn view(&self) -> Option<&Arc<ViewModel>> {
        self.view.as_ref()
    }
}
