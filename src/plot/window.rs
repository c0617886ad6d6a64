//! Fixed-length windows covering a recording.

use chrono::{DateTime, Utc};

use crate::domain::time::{add_seconds, seconds_between};
use crate::domain::{Stream, Window};

/// A finite, restartable sequence of windows.
///
/// Iterating consumes a copy, so the same plan can be walked once per variant
/// and again for the comparison images.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPlan {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    length_seconds: f64,
    count: usize,
}

impl WindowPlan {
    /// Windows over `[start, end]` stepping `length_seconds` from `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, length_seconds: f64) -> Self {
        let duration = seconds_between(start, end);
        let count = if length_seconds > 0.0 && duration > 0.0 {
            // Absorb float noise so 600 s / 120 s is exactly 5.
            (duration / length_seconds - 1e-9).ceil() as usize
        } else {
            0
        };
        Self {
            start,
            end,
            length_seconds,
            count,
        }
    }

    /// Plan covering the reference (first) trace of `stream`.
    pub fn for_stream(stream: &Stream, length_seconds: f64) -> Option<Self> {
        let reference = stream.reference()?;
        Some(Self::new(reference.starttime, reference.endtime(), length_seconds))
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> Option<Window> {
        if index >= self.count {
            return None;
        }
        let t0 = add_seconds(self.start, index as f64 * self.length_seconds);
        let t1 = add_seconds(self.start, (index + 1) as f64 * self.length_seconds).min(self.end);
        Some(Window { index, t0, t1 })
    }

    pub fn iter(&self) -> impl Iterator<Item = Window> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }
}
