//! Short-term / long-term average characteristic functions.

/// Classic STA/LTA ratio on signal energy.
///
/// Both averages use trailing windows ending at the current sample. Samples
/// before the long window has filled are 0.
pub fn classic_sta_lta(data: &[f64], nsta: usize, nlta: usize) -> Vec<f64> {
    let n = data.len();
    let mut out = vec![0.0; n];
    if nsta == 0 || nlta == 0 || nsta > nlta {
        return out;
    }

    let mut csum = Vec::with_capacity(n + 1);
    csum.push(0.0);
    let mut acc = 0.0;
    for &x in data {
        acc += x * x;
        csum.push(acc);
    }

    for i in (nlta - 1)..n {
        let end = i + 1;
        let sta = (csum[end] - csum[end - nsta]) / nsta as f64;
        let lta = (csum[end] - csum[end - nlta]) / nlta as f64;
        if lta > f64::EPSILON {
            out[i] = sta / lta;
        }
    }
    out
}

/// Centered moving maximum over `width` samples.
pub fn moving_max(data: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 {
        return data.to_vec();
    }
    let half = width / 2;
    (0..data.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(data.len());
            data[lo..hi].iter().copied().fold(f64::NEG_INFINITY, f64::max)
        })
        .collect()
}

/// Logistic squashing of a ratio into `[0, 1]`.
pub fn logistic(x: f64, midpoint: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-steepness * (x - midpoint)).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_jumps_at_onset() {
        let mut data = vec![1.0; 400];
        for (i, v) in data.iter_mut().enumerate().skip(300) {
            *v = if i % 2 == 0 { 10.0 } else { -10.0 };
        }
        let cf = classic_sta_lta(&data, 10, 100);

        assert_eq!(cf[50], 0.0);
        assert!((cf[200] - 1.0).abs() < 1e-12);
        assert!(cf[305] > 5.0);
    }

    #[test]
    fn moving_max_spreads_peaks() {
        let out = moving_max(&[0.0, 0.0, 1.0, 0.0, 0.0, 0.0], 3);
        assert_eq!(out, vec![0.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn logistic_is_centered() {
        assert!((logistic(3.0, 3.0, 2.0) - 0.5).abs() < 1e-12);
        assert!(logistic(1.0, 3.0, 2.0) < 0.05);
        assert!(logistic(6.0, 3.0, 2.0) > 0.99);
    }
}
