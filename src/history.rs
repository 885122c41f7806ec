// Bounded rolling window of metric samples, one ring buffer per configured series.

use std::collections::VecDeque;

use crate::error::HistoryError;
use crate::models::MetricSample;

pub const DEFAULT_CAPACITY: usize = 50;

/// Fixed-capacity, time-ordered series. At capacity, a new sample evicts the oldest (FIFO).
#[derive(Debug, Clone)]
pub struct MetricSeries {
    name: String,
    capacity: usize,
    samples: VecDeque<MetricSample>,
}

impl MetricSeries {
    fn new(name: String, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    /// Appends in O(1); returns the evicted sample when the series was full.
    fn push(&mut self, mut sample: MetricSample) -> Option<MetricSample> {
        // Wall clock can step backwards; keep the series chronological.
        if let Some(last) = self.samples.back()
            && sample.timestamp < last.timestamp
        {
            tracing::debug!(
                series = %self.name,
                "sample timestamp older than latest, clamping"
            );
            sample.timestamp = last.timestamp;
        }
        let evicted = if self.samples.len() >= self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    /// Owned copy in insertion order; later records do not affect it.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.samples.iter().copied().collect()
    }
}

/// Series name -> series. The key set is fixed at construction.
#[derive(Debug, Clone)]
pub struct MetricsHistoryBuffer {
    capacity: usize,
    series: Vec<MetricSeries>,
}

impl MetricsHistoryBuffer {
    /// Builds one empty series per name, in the given order.
    pub fn new<I, S>(names: I, capacity: usize) -> Result<Self, HistoryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if capacity == 0 {
            return Err(HistoryError::ZeroCapacity);
        }
        let mut series: Vec<MetricSeries> = Vec::new();
        for name in names {
            let name = name.into();
            if series.iter().any(|s| s.name == name) {
                return Err(HistoryError::DuplicateSeries(name));
            }
            series.push(MetricSeries::new(name, capacity));
        }
        if series.is_empty() {
            return Err(HistoryError::NoSeries);
        }
        Ok(Self { capacity, series })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends to the named series. Unknown names are rejected, never auto-created.
    pub fn record(
        &mut self,
        series_name: &str,
        sample: MetricSample,
    ) -> Result<Option<MetricSample>, HistoryError> {
        let series = self
            .series
            .iter_mut()
            .find(|s| s.name == series_name)
            .ok_or_else(|| HistoryError::UnknownSeries(series_name.to_string()))?;
        Ok(series.push(sample))
    }

    pub fn snapshot(&self, series_name: &str) -> Result<Vec<MetricSample>, HistoryError> {
        self.get(series_name)
            .map(MetricSeries::snapshot)
            .ok_or_else(|| HistoryError::UnknownSeries(series_name.to_string()))
    }

    pub fn get(&self, series_name: &str) -> Option<&MetricSeries> {
        self.series.iter().find(|s| s.name == series_name)
    }

    /// Series in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricSeries> {
        self.series.iter()
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(MetricSeries::name)
    }
}
