//! Windowed figures of signals and model probabilities.
//!
//! - `window`: the window plan covering a recording
//! - `axis`: elapsed-time labels and palette
//! - `font`: the embedded label font
//! - `render`: per-variant and comparison PNGs

pub mod axis;
pub mod font;
pub mod render;
pub mod window;

pub use render::{PlotInput, PlotStats, plot_comparison, plot_per_variant};
pub use window::WindowPlan;
