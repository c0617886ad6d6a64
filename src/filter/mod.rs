//! Band-pass variants of a stream.
//!
//! `apply` never touches its input: every trace is copied before filtering, so
//! the caller can drop the variant independently of the original.

use tracing::{debug, warn};

use crate::domain::{FilterSpec, FilterTag, Stream, Trace};
use crate::error::FilterError;
use crate::math::{Sos, butter_bandpass, butter_highpass};

/// Prototype order ("corners") of every band-pass.
pub const CORNERS: usize = 4;

/// Zero-phase Butterworth band-pass of every trace in `stream`.
pub fn apply(stream: &Stream, spec: &FilterSpec) -> Result<Stream, FilterError> {
    if !(spec.freqmin.is_finite() && spec.freqmax.is_finite())
        || spec.freqmin <= 0.0
        || spec.freqmin >= spec.freqmax
    {
        return Err(FilterError::InvalidBand {
            label: spec.label.clone(),
            freqmin: spec.freqmin,
            freqmax: spec.freqmax,
        });
    }

    let mut traces = Vec::with_capacity(stream.len());
    for tr in stream {
        let sos = design_for(tr, spec)?;
        let mut data = tr.data.clone();
        sos.filter_zero_phase(&mut data);
        traces.push(Trace {
            id: tr.id.clone(),
            starttime: tr.starttime,
            sampling_rate: tr.sampling_rate,
            data,
            filter: Some(FilterTag {
                label: spec.label.clone(),
                freqmin: spec.freqmin,
                freqmax: spec.freqmax,
            }),
        });
    }

    debug!(filter = %spec.label, traces = traces.len(), "applied band-pass");
    Ok(Stream::new(traces))
}

fn design_for(tr: &Trace, spec: &FilterSpec) -> Result<Sos, FilterError> {
    if !(tr.sampling_rate.is_finite() && tr.sampling_rate > 0.0) {
        return Err(FilterError::InvalidSamplingRate {
            label: spec.label.clone(),
            trace: tr.id.to_string(),
            sampling_rate: tr.sampling_rate,
        });
    }

    let nyquist = tr.sampling_rate / 2.0;
    let low = spec.freqmin / nyquist;
    let high = spec.freqmax / nyquist;

    if low >= 1.0 {
        return Err(FilterError::AboveNyquist {
            label: spec.label.clone(),
            freqmin: spec.freqmin,
            nyquist,
        });
    }

    let sos = if high - 1.0 > -1e-6 {
        warn!(
            filter = %spec.label,
            trace = %tr.id,
            nyquist,
            "upper corner at or above Nyquist, applying high-pass instead"
        );
        butter_highpass(CORNERS, low)
    } else {
        butter_bandpass(CORNERS, low, high)
    };

    if !sos.is_stable() {
        return Err(FilterError::Unstable {
            label: spec.label.clone(),
        });
    }
    Ok(sos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TraceId;
    use crate::domain::time::parse_iso;
    use std::f64::consts::PI;

    fn two_tone(rate: f64, n: usize) -> Stream {
        // 1 Hz + 8 Hz, equal amplitude.
        let data = (0..n)
            .map(|i| {
                let t = i as f64 / rate;
                (2.0 * PI * t).sin() + (2.0 * PI * 8.0 * t).sin()
            })
            .collect();
        Stream::new(vec![Trace::new(
            TraceId::new("XX", "STA", "00", "HHZ"),
            parse_iso("2024-01-01T00:00:00").unwrap(),
            rate,
            data,
        )])
    }

    fn rms(data: &[f64]) -> f64 {
        (data.iter().map(|v| v * v).sum::<f64>() / data.len() as f64).sqrt()
    }

    #[test]
    fn input_is_left_untouched() {
        let original = two_tone(100.0, 4000);
        let before = original.clone();
        for spec in FilterSpec::defaults() {
            let filtered = apply(&original, &spec).unwrap();
            assert_eq!(filtered.len(), original.len());
        }
        assert_eq!(original, before);
        assert!(original.traces()[0].filter.is_none());
    }

    #[test]
    fn band_selects_tone_and_tags_trace() {
        let stream = two_tone(100.0, 6000);
        let low = apply(&stream, &FilterSpec::new(0.5, 2.0)).unwrap();
        let high = apply(&stream, &FilterSpec::new(5.0, 10.0)).unwrap();

        // Ignore edges where the filter rings in.
        let mid = |s: &Stream| s.traces()[0].data[1000..5000].to_vec();
        let pure_low: Vec<f64> = (1000..5000)
            .map(|i| (2.0 * PI * i as f64 / 100.0).sin())
            .collect();
        assert!((rms(&mid(&low)) - rms(&pure_low)).abs() < 0.1);
        assert!((rms(&mid(&high)) - rms(&pure_low)).abs() < 0.1);

        let tag = low.traces()[0].filter.as_ref().unwrap();
        assert_eq!(tag.label, "0.5-2Hz");
        assert_eq!(tag.freqmin, 0.5);
        assert_eq!(tag.freqmax, 2.0);
    }

    #[test]
    fn invalid_bands_fail() {
        let stream = two_tone(100.0, 100);
        let inverted = FilterSpec {
            label: "bad".into(),
            freqmin: 4.0,
            freqmax: 2.0,
        };
        assert!(matches!(apply(&stream, &inverted), Err(FilterError::InvalidBand { .. })));

        let above = FilterSpec::new(60.0, 80.0);
        assert!(matches!(apply(&stream, &above), Err(FilterError::AboveNyquist { .. })));
    }

    #[test]
    fn upper_corner_above_nyquist_degrades_to_highpass() {
        // 20 Hz sampling: 1-15 Hz exceeds Nyquist (10 Hz).
        let stream = two_tone(20.0, 2000);
        let out = apply(&stream, &FilterSpec::new(1.0, 15.0)).unwrap();
        assert!(out.traces()[0].data.iter().all(|v| v.is_finite()));
    }
}
