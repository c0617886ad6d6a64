//! Shared domain types.
//!
//! Signal data (`Trace`, `Stream`) is plain owned memory: a filtered variant is a
//! separate `Stream` value, so mutating one can never affect another, and
//! dropping it releases its samples immediately.

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::time::{add_seconds, seconds_between};
use crate::error::ConfigError;

/// Label used for the unfiltered variant.
pub const ORIGINAL_LABEL: &str = "original";

/// Inclusive bounds for the configured window length (minutes).
pub const WINDOW_MINUTES_MIN: u32 = 1;
pub const WINDOW_MINUTES_MAX: u32 = 1460;

/// Network/station/location/channel identity of one recording channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl TraceId {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }

    /// `NET.STA.LOC`, shared by all components of one instrument.
    pub fn station_id(&self) -> String {
        format!("{}.{}.{}", self.network, self.station, self.location)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// Band-pass provenance attached to every filtered trace.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTag {
    pub label: String,
    pub freqmin: f64,
    pub freqmax: f64,
}

/// One continuous channel recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub id: TraceId,
    pub starttime: DateTime<Utc>,
    /// Samples per second.
    pub sampling_rate: f64,
    pub data: Vec<f64>,
    pub filter: Option<FilterTag>,
}

impl Trace {
    pub fn new(id: TraceId, starttime: DateTime<Utc>, sampling_rate: f64, data: Vec<f64>) -> Self {
        Self {
            id,
            starttime,
            sampling_rate,
            data,
            filter: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample spacing in seconds.
    pub fn delta(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    /// Seconds from the first to the last sample.
    pub fn duration_seconds(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        (self.data.len() - 1) as f64 * self.delta()
    }

    /// Timestamp of the last sample.
    pub fn endtime(&self) -> DateTime<Utc> {
        add_seconds(self.starttime, self.duration_seconds())
    }

    pub fn time_at(&self, index: usize) -> DateTime<Utc> {
        add_seconds(self.starttime, index as f64 * self.delta())
    }

    /// Sample times relative to `starttime`, in seconds.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        let delta = self.delta();
        (0..self.data.len()).map(move |i| i as f64 * delta)
    }

    pub fn max_abs(&self) -> f64 {
        self.data
            .iter()
            .map(|v| v.abs())
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    /// Copy of the samples whose timestamps fall in `[t0, t1)`.
    ///
    /// Returns `None` when no sample qualifies.
    pub fn slice(&self, t0: DateTime<Utc>, t1: DateTime<Utc>) -> Option<Trace> {
        let (first, last) = self.index_range(t0, t1);
        if first >= last {
            return None;
        }
        Some(Trace {
            id: self.id.clone(),
            starttime: self.time_at(first),
            sampling_rate: self.sampling_rate,
            data: self.data[first..last].to_vec(),
            filter: self.filter.clone(),
        })
    }

    fn index_range(&self, t0: DateTime<Utc>, t1: DateTime<Utc>) -> (usize, usize) {
        // Offsets are measured in samples; the tolerance absorbs float noise
        // only (it is far below one nanosecond at any realistic rate).
        const EPS: f64 = 1e-9;
        let n = self.data.len() as f64;
        let to_index = |t: DateTime<Utc>| {
            let offset = seconds_between(self.starttime, t) * self.sampling_rate;
            (offset - EPS).ceil().clamp(0.0, n) as usize
        };
        (to_index(t0), to_index(t1))
    }
}

/// An ordered set of traces from one recording session ("stream").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    traces: Vec<Trace>,
}

impl Stream {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn traces_mut(&mut self) -> &mut [Trace] {
        &mut self.traces
    }

    pub fn into_traces(self) -> Vec<Trace> {
        self.traces
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trace> {
        self.traces.iter()
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// The trace that defines the recording span (the first one).
    pub fn reference(&self) -> Option<&Trace> {
        self.traces.first()
    }

    /// Earliest start time across all traces.
    pub fn starttime(&self) -> Option<DateTime<Utc>> {
        self.traces.iter().map(|t| t.starttime).min()
    }

    /// Slice every trace to `[t0, t1)`, dropping traces left empty.
    pub fn slice(&self, t0: DateTime<Utc>, t1: DateTime<Utc>) -> Stream {
        Stream {
            traces: self.traces.iter().filter_map(|tr| tr.slice(t0, t1)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Stream {
    type Item = &'a Trace;
    type IntoIter = std::slice::Iter<'a, Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}

/// A named frequency band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub label: String,
    pub freqmin: f64,
    pub freqmax: f64,
}

impl FilterSpec {
    /// Band with a label derived from its bounds (`0.5-2Hz`).
    pub fn new(freqmin: f64, freqmax: f64) -> Self {
        Self {
            label: format!("{}-{}Hz", fmt_hz(freqmin), fmt_hz(freqmax)),
            freqmin,
            freqmax,
        }
    }

    /// The four bands processed for every file, in processing order.
    pub fn defaults() -> Vec<FilterSpec> {
        vec![
            FilterSpec::new(0.5, 2.0),
            FilterSpec::new(2.0, 4.0),
            FilterSpec::new(5.0, 10.0),
            FilterSpec::new(1.0, 15.0),
        ]
    }
}

fn fmt_hz(v: f64) -> String {
    // `{}` on f64 already prints `2` for 2.0 and `0.5` for 0.5.
    format!("{v}")
}

/// A named version of a signal: the original recording or one filtered copy.
#[derive(Debug, Clone)]
pub struct Variant {
    pub label: String,
    pub stream: Stream,
}

impl Variant {
    pub fn original(stream: Stream) -> Self {
        Self {
            label: ORIGINAL_LABEL.to_string(),
            stream,
        }
    }

    pub fn is_original(&self) -> bool {
        self.label == ORIGINAL_LABEL
    }
}

/// A discrete phase arrival reported by a model.
///
/// Fields are optional because model backends are not required to fill all of
/// them; writers record missing values as `N/A`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pick {
    pub trace_id: Option<String>,
    pub phase: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub peak_time: Option<DateTime<Utc>>,
    pub peak_value: Option<f64>,
    /// Sample count of the trace the pick was made on.
    pub trace_length: Option<usize>,
}

/// An event-level interval reported by a model with detection capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub trace_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub peak_time: Option<DateTime<Utc>>,
    pub peak_value: Option<f64>,
}

impl Detection {
    /// `end - start` in seconds, when both are known.
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(seconds_between(start, end)),
            _ => None,
        }
    }
}

/// One plotting window `[t0, t1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Zero-based position in the plan (used in image names).
    pub index: usize,
    pub t0: DateTime<Utc>,
    pub t1: DateTime<Utc>,
}

impl Window {
    pub fn duration_seconds(&self) -> f64 {
        seconds_between(self.t0, self.t1)
    }
}

/// Compute device preferred for model inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

/// Image geometry for rendered windows (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Width of every image.
    pub width: u32,
    /// Height of a per-variant image.
    pub height: u32,
    /// Height of one variant group (signal + model panels) in comparison images.
    pub group_height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        // 15in wide figures at 150 dpi.
        Self {
            width: 2250,
            height: 1050,
            group_height: 900,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub window_minutes: u32,
    /// Pretrained weight set identity (e.g. `stead`).
    pub dataset: String,
    pub device: Device,
    /// Bands processed after the original, in order.
    pub filters: Vec<FilterSpec>,
    pub plot: PlotConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_minutes: 2,
            dataset: "stead".to_string(),
            device: Device::Cuda,
            filters: FilterSpec::defaults(),
            plot: PlotConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn window_seconds(&self) -> f64 {
        f64::from(self.window_minutes) * 60.0
    }

    /// Variant labels in processing order, `original` first.
    pub fn variant_labels(&self) -> Vec<String> {
        std::iter::once(ORIGINAL_LABEL.to_string())
            .chain(self.filters.iter().map(|f| f.label.clone()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(WINDOW_MINUTES_MIN..=WINDOW_MINUTES_MAX).contains(&self.window_minutes) {
            return Err(ConfigError::WindowLength {
                min: WINDOW_MINUTES_MIN,
                max: WINDOW_MINUTES_MAX,
                got: self.window_minutes,
            });
        }
        if self.dataset.trim().is_empty() {
            return Err(ConfigError::Invalid("dataset name must not be empty".into()));
        }
        if self.plot.width < 200 || self.plot.height < 200 || self.plot.group_height < 100 {
            return Err(ConfigError::Invalid(format!(
                "plot size {}x{} (group {}) is too small",
                self.plot.width, self.plot.height, self.plot.group_height
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &self.filters {
            if spec.label == ORIGINAL_LABEL || !seen.insert(spec.label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate filter label '{}'",
                    spec.label
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::parse_iso;

    fn trace(n: usize, rate: f64) -> Trace {
        Trace::new(
            TraceId::new("XX", "STA", "00", "HHZ"),
            parse_iso("2024-01-01T00:00:00").unwrap(),
            rate,
            (0..n).map(|i| i as f64).collect(),
        )
    }

    #[test]
    fn slice_is_half_open() {
        let tr = trace(1000, 100.0);
        let t0 = add_seconds(tr.starttime, 1.0);
        let t1 = add_seconds(tr.starttime, 2.0);
        let cut = tr.slice(t0, t1).unwrap();

        assert_eq!(cut.len(), 100);
        assert_eq!(cut.starttime, t0);
        assert_eq!(cut.data[0], 100.0);
        for i in 0..cut.len() {
            let t = cut.time_at(i);
            assert!(t >= t0 && t < t1);
        }
    }

    #[test]
    fn slice_between_samples_and_outside() {
        let tr = trace(10, 1.0);
        let t0 = add_seconds(tr.starttime, 2.5);
        let t1 = add_seconds(tr.starttime, 5.5);
        let cut = tr.slice(t0, t1).unwrap();
        assert_eq!(cut.data, vec![3.0, 4.0, 5.0]);

        let late = add_seconds(tr.starttime, 100.0);
        assert!(tr.slice(late, add_seconds(late, 10.0)).is_none());
    }

    #[test]
    fn stream_slice_drops_empty_traces() {
        let mut short = trace(5, 1.0);
        short.id.channel = "HHN".into();
        let stream = Stream::new(vec![trace(100, 1.0), short]);
        let t0 = add_seconds(stream.starttime().unwrap(), 10.0);
        let cut = stream.slice(t0, add_seconds(t0, 10.0));
        assert_eq!(cut.len(), 1);
        assert_eq!(cut.traces()[0].id.channel, "HHZ");
    }

    #[test]
    fn default_filter_labels() {
        let labels: Vec<String> = FilterSpec::defaults().into_iter().map(|f| f.label).collect();
        assert_eq!(labels, vec!["0.5-2Hz", "2-4Hz", "5-10Hz", "1-15Hz"]);
    }

    #[test]
    fn window_bounds_are_validated() {
        let mut cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.window_minutes = 0;
        assert!(cfg.validate().is_err());
        cfg.window_minutes = 1460;
        assert!(cfg.validate().is_ok());
        cfg.window_minutes = 1461;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn detection_duration_needs_both_ends() {
        let start = parse_iso("2024-01-01T00:00:00").unwrap();
        let mut det = Detection {
            start_time: Some(start),
            end_time: Some(add_seconds(start, 12.5)),
            ..Detection::default()
        };
        assert_eq!(det.duration_seconds(), Some(12.5));
        det.end_time = None;
        assert_eq!(det.duration_seconds(), None);
    }
}
