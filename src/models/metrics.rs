// Metric samples, tracked series kinds and the inbound system snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point of a trend series. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Instantaneous system state from one `metrics_update`.
/// Fields the backend omits (or sends as `null`) stay `None`; extra fields are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricsSnapshot {
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
    #[serde(default)]
    pub disk_usage: Option<f64>,
}

impl SystemMetricsSnapshot {
    /// Raw field for a tracked series, `None` when the backend did not send it.
    pub fn field(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Cpu => self.cpu_percent,
            MetricKind::Memory => self.memory_percent,
            MetricKind::Disk => self.disk_usage,
        }
        .filter(|v| v.is_finite())
    }

    /// Display value: missing fields read as 0.
    pub fn display_value(&self, kind: MetricKind) -> f64 {
        self.field(kind).unwrap_or(0.0)
    }
}

/// The series a dashboard can track, keyed by their configured name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Cpu, MetricKind::Memory, MetricKind::Disk];

    /// Parse a configured series name ("cpu", "memory", "disk").
    pub fn from_series_name(name: &str) -> Option<Self> {
        match name {
            "cpu" => Some(MetricKind::Cpu),
            "memory" => Some(MetricKind::Memory),
            "disk" => Some(MetricKind::Disk),
            _ => None,
        }
    }

    pub fn series_name(self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Disk => "disk",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU Usage",
            MetricKind::Memory => "Memory Usage",
            MetricKind::Disk => "Disk Usage",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.series_name())
    }
}
