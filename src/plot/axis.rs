//! Time-axis labels and the shared palette.

use chrono::{DateTime, Utc};
use plotters::style::RGBColor;

use crate::domain::time::add_seconds;

/// Formats elapsed seconds within a window as the wall-clock time they fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedFormatter {
    pub reference: DateTime<Utc>,
}

impl ElapsedFormatter {
    pub fn new(reference: DateTime<Utc>) -> Self {
        Self { reference }
    }

    pub fn format(&self, elapsed_seconds: f64) -> String {
        add_seconds(self.reference, elapsed_seconds).format("%H:%M:%S").to_string()
    }
}

/// Trace colors, cycled by channel position.
pub const SIGNAL_COLORS: [RGBColor; 3] = [RGBColor(0, 0, 0), RGBColor(214, 39, 40), RGBColor(31, 119, 180)];

pub fn signal_color(index: usize) -> RGBColor {
    SIGNAL_COLORS[index % SIGNAL_COLORS.len()]
}

/// Color of a probability class, `None` for classes that are never drawn
/// (noise) or unknown.
pub fn class_color(class: &str) -> Option<RGBColor> {
    match class {
        "P" => Some(RGBColor(31, 119, 180)),
        "S" => Some(RGBColor(255, 127, 14)),
        "Detection" => Some(RGBColor(44, 160, 44)),
        _ => None,
    }
}
