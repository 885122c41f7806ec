// Render-ready projection of dashboard state, and the renderers that consume it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::history::MetricsHistoryBuffer;
use crate::models::{MetricKind, MetricSample, ServiceState, ServiceStatus, SystemMetricsSnapshot};

pub const NOT_AVAILABLE: &str = "N/A";

const WARNING_THRESHOLD: f64 = 70.0;
const CRITICAL_THRESHOLD: f64 = 90.0;

/// Colour band of a gauge value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeLevel {
    Normal,
    Warning,
    Critical,
}

impl GaugeLevel {
    pub fn for_value(value: f64) -> Self {
        if value >= CRITICAL_THRESHOLD {
            GaugeLevel::Critical
        } else if value >= WARNING_THRESHOLD {
            GaugeLevel::Warning
        } else {
            GaugeLevel::Normal
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            GaugeLevel::Normal => "rgb(34, 197, 94)",
            GaugeLevel::Warning => "rgb(251, 146, 60)",
            GaugeLevel::Critical => "rgb(239, 68, 68)",
        }
    }
}

/// Instantaneous gauge. `value` is clamped to [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeView {
    pub element_id: String,
    pub title: &'static str,
    pub series: MetricKind,
    pub value: f64,
    /// e.g. "55.5%"
    pub label: String,
    pub level: GaugeLevel,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendView {
    pub element_id: String,
    pub title: String,
    pub series: MetricKind,
    pub points: Vec<MetricSample>,
}

/// One row of the service-status table, already formatted for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRow {
    pub name: String,
    pub status: ServiceState,
    pub status_class: &'static str,
    pub response_time: String,
    pub success_rate: String,
    pub last_check: String,
}

impl ServiceRow {
    pub fn from_status(name: &str, status: &ServiceStatus) -> Self {
        Self {
            name: name.to_string(),
            status: status.status,
            status_class: if status.is_up() {
                "status-up"
            } else {
                "status-down"
            },
            response_time: format_response_time(status.response_time),
            success_rate: format_success_rate(status.success_rate),
            last_check: format_last_check(status.last_check),
        }
    }
}

/// Everything the presentation layer needs for one frame. Never mutated after derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub generated_at: DateTime<Utc>,
    /// Latest raw system values as received.
    pub system: SystemMetricsSnapshot,
    pub gauges: Vec<GaugeView>,
    pub trends: Vec<TrendView>,
    pub services: Vec<ServiceRow>,
    pub service_status: BTreeMap<String, ServiceStatus>,
}

impl ViewModel {
    pub fn derive(
        tracked: &[MetricKind],
        history: &MetricsHistoryBuffer,
        system: &SystemMetricsSnapshot,
        services: &BTreeMap<String, ServiceStatus>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let gauges = tracked
            .iter()
            .map(|&kind| {
                let value = system.display_value(kind).clamp(0.0, 100.0);
                let level = GaugeLevel::for_value(value);
                GaugeView {
                    element_id: format!("{kind}-gauge"),
                    title: kind.title(),
                    series: kind,
                    value,
                    label: format!("{value:.1}%"),
                    level,
                    color: level.color(),
                }
            })
            .collect();
        let trends = tracked
            .iter()
            .map(|&kind| TrendView {
                element_id: format!("{kind}-trend"),
                title: format!("{} Trend", kind.title()),
                series: kind,
                points: history
                    .get(kind.series_name())
                    .map(|s| s.snapshot())
                    .unwrap_or_default(),
            })
            .collect();
        let rows = services
            .iter()
            .map(|(name, status)| ServiceRow::from_status(name, status))
            .collect();
        Self {
            generated_at,
            system: *system,
            gauges,
            trends,
            services: rows,
            service_status: services.clone(),
        }
    }

    pub fn gauge(&self, kind: MetricKind) -> Option<&GaugeView> {
        self.gauges.iter().find(|g| g.series == kind)
    }

    pub fn trend(&self, kind: MetricKind) -> Option<&TrendView> {
        self.trends.iter().find(|t| t.series == kind)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceRow> {
        self.services.iter().find(|r| r.name == name)
    }
}

// 0 reads as "no data", same as null.
fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && v.is_finite())
}

pub fn format_response_time(seconds: Option<f64>) -> String {
    present(seconds).map_or_else(|| NOT_AVAILABLE.to_string(), |s| format!("{s:.3}s"))
}

pub fn format_success_rate(rate: Option<f64>) -> String {
    present(rate).map_or_else(|| NOT_AVAILABLE.to_string(), |r| format!("{r:.1}%"))
}

pub fn format_last_check(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// Presentation layer. Must be a pure function of the view model it is given.
pub trait Renderer: Send {
    fn update_gauge(&mut self, _gauge: &GaugeView) {}

    fn update_trend(&mut self, _trend: &TrendView) {}

    fn refresh_table(&mut self, _rows: &[ServiceRow]) {}

    fn render(&mut self, view: &Arc<ViewModel>) {
        render_parts(self, view);
    }
}

/// Gauges, then trends, then the table. Overrides of `render` call this to keep the order.
pub fn render_parts<R: Renderer + ?Sized>(renderer: &mut R, view: &ViewModel) {
    for gauge in &view.gauges {
        renderer.update_gauge(gauge);
    }
    for trend in &view.trends {
        renderer.update_trend(trend);
    }
    renderer.refresh_table(&view.services);
}

/// Publishes the latest view for the view server. Last write wins.
pub struct WatchRenderer {
    tx: watch::Sender<Option<Arc<ViewModel>>>,
}

impl WatchRenderer {
    pub fn new() -> (Self, watch::Receiver<Option<Arc<ViewModel>>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ViewModel>>> {
        self.tx.subscribe()
    }
}

impl Default for WatchRenderer {
    /// No receiver yet; attach one with [`WatchRenderer::subscribe`].
    fn default() -> Self {
        Self::new().0
    }
}

impl Renderer for WatchRenderer {
    fn render(&mut self, view: &Arc<ViewModel>) {
        self.tx.send_replace(Some(view.clone()));
    }
}

/// Headless rendering into the log.
#[derive(Debug, Default)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn update_gauge(&mut self, gauge: &GaugeView) {
        tracing::debug!(
            element_id = %gauge.element_id,
            value = gauge.value,
            level = ?gauge.level,
            "{}: {}",
            gauge.title,
            gauge.label
        );
    }

    fn update_trend(&mut self, trend: &TrendView) {
        tracing::trace!(
            element_id = %trend.element_id,
            points = trend.points.len(),
            "{}",
            trend.title
        );
    }

    fn refresh_table(&mut self, rows: &[ServiceRow]) {
        for row in rows {
            tracing::info!(
                service = %row.name,
                status = row.status.as_str(),
                response_time = %row.response_time,
                success_rate = %row.success_rate,
                last_check = %row.last_check,
                "service status"
            );
        }
    }

    fn render(&mut self, view: &Arc<ViewModel>) {
        let summary = view
            .gauges
            .iter()
            .map(|g| format!("{}={}", g.series, g.label))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(services = view.services.len(), "metrics {}", summary);
        render_parts(self, view);
    }
}

/// Hands every view to each inner renderer in order.
#[derive(Default)]
pub struct Fanout(pub Vec<Box<dyn Renderer>>);

impl Renderer for Fanout {
    fn render(&mut self, view: &Arc<ViewModel>) {
        for renderer in &mut self.0 {
            renderer.render(view);
        }
    }
}
