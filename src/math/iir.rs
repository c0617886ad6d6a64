//! Butterworth IIR design and second-order-section filtering.
//!
//! Design follows the classic analog route:
//!
//! 1. Butterworth analog prototype (unit cut-off) as zeros/poles/gain
//! 2. frequency transform (low-pass → band-pass or high-pass) at pre-warped edges
//! 3. bilinear transform to the z-plane
//! 4. grouping into second-order sections (biquads) for numerical stability
//!
//! Frequencies passed to the design functions are normalized to Nyquist (0..1).

use std::f64::consts::PI;

use nalgebra::Complex;

type C64 = Complex<f64>;

/// Imaginary parts below this are treated as real roots.
const REAL_EPS: f64 = 1e-10;

/// Zeros/poles/gain representation of a transfer function.
#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<C64>,
    poles: Vec<C64>,
    gain: f64,
}

/// A cascade of biquads `[b0, b1, b2, a0, a1, a2]` with `a0 == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sos {
    sections: Vec<[f64; 6]>,
}

impl Sos {
    pub fn sections(&self) -> &[[f64; 6]] {
        &self.sections
    }

    /// True when every section's poles lie strictly inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(|s| {
            let (a1, a2) = (s[4], s[5]);
            // Jury conditions for a monic quadratic.
            a2.abs() < 1.0 && a1.abs() < 1.0 + a2
        })
    }

    /// Causal filtering, direct form II transposed, zero initial state.
    pub fn filter_in_place(&self, data: &mut [f64]) {
        for s in &self.sections {
            let [b0, b1, b2, _, a1, a2] = *s;
            let (mut z1, mut z2) = (0.0, 0.0);
            for x in data.iter_mut() {
                let y = b0 * *x + z1;
                z1 = b1 * *x - a1 * y + z2;
                z2 = b2 * *x - a2 * y;
                *x = y;
            }
        }
    }

    /// Forward pass, then a pass over the time-reversed output.
    ///
    /// The phase shifts of the two passes cancel; the magnitude response is
    /// squared.
    pub fn filter_zero_phase(&self, data: &mut [f64]) {
        self.filter_in_place(data);
        data.reverse();
        self.filter_in_place(data);
        data.reverse();
    }

    /// Magnitude response at a normalized frequency (fraction of Nyquist).
    pub fn magnitude_at(&self, freq: f64) -> f64 {
        let w = PI * freq;
        let z1 = C64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        self.sections
            .iter()
            .map(|s| {
                let num = C64::new(s[0], 0.0) + z1 * s[1] + z2 * s[2];
                let den = C64::new(s[3], 0.0) + z1 * s[4] + z2 * s[5];
                (num / den).norm()
            })
            .product()
    }
}

/// Band-pass Butterworth of prototype order `order` (the digital filter has
/// `2 * order` poles).
pub fn butter_bandpass(order: usize, low: f64, high: f64) -> Sos {
    let w1 = prewarp(low);
    let w2 = prewarp(high);
    let proto = butter_prototype(order);
    let analog = lp_to_bp(&proto, (w1 * w2).sqrt(), w2 - w1);
    zpk_to_sos(&bilinear(&analog, 2.0))
}

/// High-pass Butterworth with cut-off `low`.
pub fn butter_highpass(order: usize, low: f64) -> Sos {
    let proto = butter_prototype(order);
    let analog = lp_to_hp(&proto, prewarp(low));
    zpk_to_sos(&bilinear(&analog, 2.0))
}

/// Map a digital edge (fraction of Nyquist) to the analog frequency that the
/// bilinear transform (with `fs = 2`) sends back onto it.
fn prewarp(wn: f64) -> f64 {
    4.0 * (PI * wn / 2.0).tan()
}

fn butter_prototype(order: usize) -> Zpk {
    let n = order as f64;
    let poles = (0..order)
        .map(|k| {
            let m = -n + 1.0 + 2.0 * k as f64;
            -C64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();
    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

fn lp_to_bp(zpk: &Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = zpk.poles.len() - zpk.zeros.len();
    let wo2 = C64::new(wo * wo, 0.0);
    let split = |roots: &[C64]| -> Vec<C64> {
        let scaled: Vec<C64> = roots.iter().map(|&r| r * (bw / 2.0)).collect();
        let plus = scaled.iter().map(|&r| r + (r * r - wo2).sqrt());
        let minus = scaled.iter().map(|&r| r - (r * r - wo2).sqrt());
        plus.chain(minus).collect()
    };

    let mut zeros = split(&zpk.zeros);
    zeros.extend(std::iter::repeat(C64::new(0.0, 0.0)).take(degree));
    Zpk {
        zeros,
        poles: split(&zpk.poles),
        gain: zpk.gain * bw.powi(degree as i32),
    }
}

fn lp_to_hp(zpk: &Zpk, wo: f64) -> Zpk {
    let degree = zpk.poles.len() - zpk.zeros.len();
    let wo = C64::new(wo, 0.0);

    let mut zeros: Vec<C64> = zpk.zeros.iter().map(|&z| wo / z).collect();
    zeros.extend(std::iter::repeat(C64::new(0.0, 0.0)).take(degree));

    let num: C64 = zpk.zeros.iter().map(|&z| -z).product();
    let den: C64 = zpk.poles.iter().map(|&p| -p).product();
    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|&p| wo / p).collect(),
        gain: zpk.gain * (num / den).re,
    }
}

fn bilinear(zpk: &Zpk, fs: f64) -> Zpk {
    let degree = zpk.poles.len() - zpk.zeros.len();
    let fs2 = C64::new(2.0 * fs, 0.0);

    let mut zeros: Vec<C64> = zpk.zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    zeros.extend(std::iter::repeat(C64::new(-1.0, 0.0)).take(degree));

    let num: C64 = zpk.zeros.iter().map(|&z| fs2 - z).product();
    let den: C64 = zpk.poles.iter().map(|&p| fs2 - p).product();
    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect(),
        gain: zpk.gain * (num / den).re,
    }
}

/// Quadratic factors `[1, c1, c2]` for a set of conjugate-symmetric roots.
///
/// Complex roots become one factor per conjugate pair; real roots are paired
/// smallest-with-largest so band-pass sections get one zero at each end.
fn quadratic_factors(roots: &[C64], order_by_radius: bool) -> Vec<[f64; 3]> {
    let mut complex: Vec<C64> = roots.iter().copied().filter(|r| r.im > REAL_EPS).collect();
    let mut real: Vec<f64> = roots
        .iter()
        .filter(|r| r.im.abs() <= REAL_EPS)
        .map(|r| r.re)
        .collect();

    if order_by_radius {
        // Poles far from the unit circle first; the sharpest section runs last.
        complex.sort_by(|a, b| a.norm().partial_cmp(&b.norm()).unwrap_or(std::cmp::Ordering::Equal));
    }
    real.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<[f64; 3]> = complex
        .iter()
        .map(|r| [1.0, -2.0 * r.re, r.norm_sqr()])
        .collect();

    let (mut lo, mut hi) = (0usize, real.len());
    while hi - lo >= 2 {
        let (a, b) = (real[lo], real[hi - 1]);
        out.push([1.0, -(a + b), a * b]);
        lo += 1;
        hi -= 1;
    }
    if hi - lo == 1 {
        out.push([1.0, -real[lo], 0.0]);
    }
    out
}

fn zpk_to_sos(zpk: &Zpk) -> Sos {
    let pole_factors = quadratic_factors(&zpk.poles, true);
    let zero_factors = quadratic_factors(&zpk.zeros, false);

    let sections = pole_factors
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let mut b = zero_factors.get(i).copied().unwrap_or([1.0, 0.0, 0.0]);
            if i == 0 {
                for c in b.iter_mut() {
                    *c *= zpk.gain;
                }
            }
            [b[0], b[1], b[2], a[0], a[1], a[2]]
        })
        .collect();

    Sos { sections }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandpass_edges_are_half_power() {
        // 2-4 Hz at 100 Hz sampling.
        let nyq = 50.0;
        let sos = butter_bandpass(4, 2.0 / nyq, 4.0 / nyq);
        assert_eq!(sos.sections().len(), 4);
        assert!(sos.is_stable());

        let edge = std::f64::consts::FRAC_1_SQRT_2;
        assert!((sos.magnitude_at(2.0 / nyq) - edge).abs() < 1e-6);
        assert!((sos.magnitude_at(4.0 / nyq) - edge).abs() < 1e-6);
        assert!((sos.magnitude_at(8f64.sqrt() / nyq) - 1.0).abs() < 1e-2);
        assert!(sos.magnitude_at(0.5 / nyq) < 1e-2);
        assert!(sos.magnitude_at(20.0 / nyq) < 1e-2);
    }

    #[test]
    fn highpass_passes_high_and_blocks_dc() {
        let sos = butter_highpass(4, 0.1);
        assert_eq!(sos.sections().len(), 2);
        assert!(sos.is_stable());
        assert!((sos.magnitude_at(0.1) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(sos.magnitude_at(0.001) < 1e-6);
        assert!((sos.magnitude_at(0.9) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn zero_phase_keeps_peak_position() {
        let sos = butter_bandpass(4, 0.02, 0.2);
        let n = 2000;
        let center = 1000;
        // Gaussian-windowed 5 Hz burst at 100 Hz sampling (0.1 of Nyquist).
        let mut data: Vec<f64> = (0..n)
            .map(|i| {
                let t = (i as f64 - center as f64) / 100.0;
                (-t * t * 4.0).exp() * (2.0 * PI * 5.0 * t).cos()
            })
            .collect();
        sos.filter_zero_phase(&mut data);

        let peak = data
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak as i64 - center as i64).abs() <= 1);
    }
}
