//! Built-in reference backend.
//!
//! Each model turns the energy ratio of short and long trailing windows into
//! class probabilities per station: `P` from the vertical component, `S` from
//! the horizontals, `N` as the remainder. The three models differ in window
//! lengths, sensitivity and framing, which is enough to give the pipeline three
//! independent, deterministic opinions about the same signal.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::time::{add_seconds, seconds_between};
use crate::domain::{Detection, Device, Pick, Stream, Trace, TraceId};
use crate::error::ModelError;
use crate::math::{classic_sta_lta, logistic, moving_max};
use crate::models::model::{EventDetector, ModelSlot, PhaseClassifier, PhaseThresholds};
use crate::models::picking::{detections_from_curve, picks_from_curve};

/// Weight sets the pretrained models can be loaded with.
pub const KNOWN_DATASETS: &[&str] = &[
    "stead", "instance", "ethz", "scedc", "geofon", "neic", "original", "iquique", "lendb", "obs",
];

/// Slot names, in processing order.
pub const MODEL_NAMES: [&str; 3] = ["PhaseNet", "EQTransformer", "GPD"];

/// Slots that also expose event detection.
pub const DETECTOR_NAMES: [&str; 1] = ["EQTransformer"];

/// The backend runs on the CPU only.
pub fn supports(device: Device) -> bool {
    matches!(device, Device::Cpu)
}

/// The three pretrained slots, in processing order.
pub fn pretrained(dataset: &str) -> Result<Vec<ModelSlot>, ModelError> {
    let name = dataset.trim().to_ascii_lowercase();
    if !KNOWN_DATASETS.contains(&name.as_str()) {
        return Err(ModelError::UnknownDataset(dataset.to_string()));
    }

    Ok(vec![
        ModelSlot::new(Box::new(StaLtaModel::phasenet()), None),
        ModelSlot::new(Box::new(StaLtaModel::eqtransformer()), Some(PhaseThresholds::uniform(0.6))),
        ModelSlot::new(Box::new(StaLtaModel::gpd()), Some(PhaseThresholds::uniform(0.75))),
    ])
}

#[derive(Debug, Clone, Copy)]
struct Characteristic {
    sta_seconds: f64,
    lta_seconds: f64,
    /// Ratio mapped to probability 0.5.
    midpoint: f64,
    steepness: f64,
    /// Annotation streams start this many seconds after the signal.
    offset_seconds: f64,
}

#[derive(Debug, Clone, Copy)]
struct EventParams {
    smoothing_seconds: f64,
    threshold: f64,
}

/// STA/LTA-driven phase classifier, optionally with event detection.
#[derive(Debug, Clone)]
pub struct StaLtaModel {
    name: &'static str,
    cf: Characteristic,
    defaults: PhaseThresholds,
    events: Option<EventParams>,
}

impl StaLtaModel {
    pub fn phasenet() -> Self {
        Self {
            name: "PhaseNet",
            cf: Characteristic {
                sta_seconds: 0.5,
                lta_seconds: 10.0,
                midpoint: 3.0,
                steepness: 2.0,
                offset_seconds: 0.0,
            },
            defaults: PhaseThresholds::uniform(0.3),
            events: None,
        }
    }

    pub fn eqtransformer() -> Self {
        Self {
            name: "EQTransformer",
            cf: Characteristic {
                sta_seconds: 1.0,
                lta_seconds: 20.0,
                midpoint: 3.0,
                steepness: 1.5,
                offset_seconds: 0.0,
            },
            defaults: PhaseThresholds::uniform(0.1),
            events: Some(EventParams {
                smoothing_seconds: 2.0,
                threshold: 0.3,
            }),
        }
    }

    pub fn gpd() -> Self {
        Self {
            name: "GPD",
            cf: Characteristic {
                sta_seconds: 0.5,
                lta_seconds: 8.0,
                midpoint: 3.5,
                steepness: 2.0,
                offset_seconds: 2.0,
            },
            defaults: PhaseThresholds::uniform(0.7),
            events: None,
        }
    }

    fn channel(&self, station: &TraceId, class: &str) -> TraceId {
        TraceId::new(
            station.network.clone(),
            station.station.clone(),
            station.location.clone(),
            format!("{}_{}", self.name, class),
        )
    }

    /// Probability traces for one station, or `None` when the framing offset
    /// consumes the whole recording.
    fn annotate_station(&self, components: &[&Trace]) -> Result<Option<Vec<Trace>>, ModelError> {
        let Some(reference) = components.first().copied() else {
            return Ok(None);
        };
        let rate = reference.sampling_rate;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ModelError::Inference {
                model: self.name.to_string(),
                message: format!("invalid sampling rate {rate} on {}", reference.id),
            });
        }

        let n = reference.len();
        let nsta = ((self.cf.sta_seconds * rate).round() as usize).max(1);
        let nlta = ((self.cf.lta_seconds * rate).round() as usize).max(nsta);

        let vertical: Vec<&Trace> = components.iter().copied().filter(|t| is_vertical(t)).collect();
        let horizontal: Vec<&Trace> = components.iter().copied().filter(|t| !is_vertical(t)).collect();
        let vertical = if vertical.is_empty() { components.to_vec() } else { vertical };
        let horizontal = if horizontal.is_empty() { vertical.clone() } else { horizontal };

        let p_ratio = self.mean_ratio(reference, &vertical, nsta, nlta);
        let s_ratio = self.mean_ratio(reference, &horizontal, nsta, nlta);

        let p: Vec<f64> = p_ratio
            .iter()
            .map(|&r| logistic(r, self.cf.midpoint, self.cf.steepness))
            .collect();
        let s: Vec<f64> = s_ratio
            .iter()
            .map(|&r| logistic(r, self.cf.midpoint, self.cf.steepness))
            .collect();

        let skip = (self.cf.offset_seconds * rate).round() as usize;
        if skip >= n {
            return Ok(None);
        }
        let start = add_seconds(reference.starttime, skip as f64 / rate);
        let framed = |values: Vec<f64>, class: &str| {
            Trace::new(self.channel(&reference.id, class), start, rate, values[skip..].to_vec())
        };

        let mut out = Vec::with_capacity(4);
        if let Some(events) = self.events {
            let width = ((events.smoothing_seconds * rate).round() as usize).max(1);
            let combined: Vec<f64> = p.iter().zip(&s).map(|(a, b)| a.max(*b)).collect();
            out.push(framed(moving_max(&combined, width), "Detection"));
        }
        let noise: Vec<f64> = p.iter().zip(&s).map(|(a, b)| 1.0 - a.max(*b)).collect();
        out.push(framed(p, "P"));
        out.push(framed(s, "S"));
        if self.events.is_none() {
            out.push(framed(noise, "N"));
        }
        Ok(Some(out))
    }

    /// Average STA/LTA ratio of `components` on the sample grid of `reference`.
    fn mean_ratio(&self, reference: &Trace, components: &[&Trace], nsta: usize, nlta: usize) -> Vec<f64> {
        let n = reference.len();
        let mut sum = vec![0.0; n];
        let mut count = vec![0usize; n];

        for tr in components {
            if (tr.sampling_rate - reference.sampling_rate).abs() > 1e-9 {
                debug!(model = self.name, trace = %tr.id, "component rate differs from reference, ignored");
                continue;
            }
            let offset = (seconds_between(reference.starttime, tr.starttime) * tr.sampling_rate).round() as i64;
            let clean: Vec<f64> = tr.data.iter().map(|v| if v.is_finite() { *v } else { 0.0 }).collect();
            for (j, r) in classic_sta_lta(&clean, nsta, nlta).into_iter().enumerate() {
                let i = offset + j as i64;
                if (0..n as i64).contains(&i) {
                    sum[i as usize] += r;
                    count[i as usize] += 1;
                }
            }
        }

        sum.iter()
            .zip(&count)
            .map(|(s, &c)| if c == 0 { 0.0 } else { s / c as f64 })
            .collect()
    }
}

fn is_vertical(tr: &Trace) -> bool {
    tr.id.channel.ends_with('Z')
}

/// Traces grouped by station id, in first-appearance order.
fn by_station(stream: &Stream) -> Vec<Vec<&Trace>> {
    let mut order: BTreeMap<String, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<&Trace>> = Vec::new();
    for tr in stream {
        let key = tr.id.station_id();
        match order.get(&key) {
            Some(&i) => groups[i].push(tr),
            None => {
                order.insert(key, groups.len());
                groups.push(vec![tr]);
            }
        }
    }
    groups
}

impl PhaseClassifier for StaLtaModel {
    fn name(&self) -> &str {
        self.name
    }

    fn default_thresholds(&self) -> PhaseThresholds {
        self.defaults
    }

    fn classify(&self, stream: &Stream, thresholds: &PhaseThresholds) -> Result<Vec<Pick>, ModelError> {
        let annotations = self.annotate(stream)?;
        let mut picks = Vec::new();
        for curve in &annotations {
            let station = curve.id.station_id();
            match curve.id.channel.rsplit('_').next() {
                Some("P") => picks.extend(picks_from_curve(curve, &station, "P", thresholds.p)),
                Some("S") => picks.extend(picks_from_curve(curve, &station, "S", thresholds.s)),
                _ => {}
            }
        }
        picks.sort_by_key(|p| p.peak_time);
        Ok(picks)
    }

    fn annotate(&self, stream: &Stream) -> Result<Stream, ModelError> {
        let mut out = Stream::default();
        for group in by_station(stream) {
            if let Some(traces) = self.annotate_station(&group)? {
                for tr in traces {
                    out.push(tr);
                }
            }
        }
        Ok(out)
    }

    fn event_detector(&self) -> Option<&dyn EventDetector> {
        self.events.as_ref().map(|_| self as &dyn EventDetector)
    }
}

impl EventDetector for StaLtaModel {
    fn detect(&self, stream: &Stream) -> Result<Vec<Detection>, ModelError> {
        let Some(events) = self.events else {
            return Ok(Vec::new());
        };
        let annotations = self.annotate(stream)?;
        Ok(annotations
            .iter()
            .filter(|t| t.id.channel.ends_with("_Detection"))
            .flat_map(|t| detections_from_curve(t, &t.id.station_id(), events.threshold))
            .collect())
    }
}
