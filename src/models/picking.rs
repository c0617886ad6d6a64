//! Turning probability curves into discrete events.

use crate::domain::{Detection, Pick, Trace};

/// A contiguous run of samples strictly above a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub start: usize,
    /// Inclusive.
    pub end: usize,
    pub peak: usize,
    pub peak_value: f64,
}

pub fn regions_above(values: &[f64], threshold: f64) -> Vec<Region> {
    let mut out = Vec::new();
    let mut current: Option<Region> = None;

    for (i, &v) in values.iter().enumerate() {
        if v > threshold {
            match current.as_mut() {
                Some(r) => {
                    r.end = i;
                    if v > r.peak_value {
                        r.peak = i;
                        r.peak_value = v;
                    }
                }
                None => {
                    current = Some(Region {
                        start: i,
                        end: i,
                        peak: i,
                        peak_value: v,
                    })
                }
            }
        } else if let Some(r) = current.take() {
            out.push(r);
        }
    }
    if let Some(r) = current {
        out.push(r);
    }
    out
}

/// Picks for `phase` from one probability trace.
pub fn picks_from_curve(curve: &Trace, station: &str, phase: &str, threshold: f64) -> Vec<Pick> {
    regions_above(&curve.data, threshold)
        .into_iter()
        .map(|r| Pick {
            trace_id: Some(station.to_string()),
            phase: Some(phase.to_string()),
            start_time: Some(curve.time_at(r.start)),
            end_time: Some(curve.time_at(r.end)),
            peak_time: Some(curve.time_at(r.peak)),
            peak_value: Some(r.peak_value),
            trace_length: Some(curve.len()),
        })
        .collect()
}

/// Event intervals from one detection-probability trace.
pub fn detections_from_curve(curve: &Trace, station: &str, threshold: f64) -> Vec<Detection> {
    regions_above(&curve.data, threshold)
        .into_iter()
        .map(|r| Detection {
            trace_id: Some(station.to_string()),
            start_time: Some(curve.time_at(r.start)),
            end_time: Some(curve.time_at(r.end)),
            peak_time: Some(curve.time_at(r.peak)),
            peak_value: Some(r.peak_value),
        })
        .collect()
}
