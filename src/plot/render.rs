//! Per-window PNG figures.
//!
//! A figure is made of "groups": one signal panel (every trace normalized by its
//! own peak and stacked) followed by one probability panel per model, at height
//! ratio 2:1:1:1. Per-variant images hold one group; comparison images stack the
//! original and every filtered variant.
//!
//! Nothing here outlives a single window: slices, the bitmap and its backend are
//! dropped before the next window is started.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{debug, warn};

use crate::domain::time::seconds_between;
use crate::domain::{PlotConfig, Stream, Variant, Window};
use crate::error::WriteError;
use crate::io::layout::FileLayout;
use crate::models::{ModelAnnotation, split_annotation_channel};
use crate::plot::axis::{ElapsedFormatter, class_color, signal_color};
use crate::plot::font::{FONT_FAMILY, ensure_registered};
use crate::plot::window::WindowPlan;

/// Vertical distance between stacked, normalized traces.
const TRACE_SPACING: f64 = 1.2;
const PROBABILITY_MAX: f64 = 1.1;
/// Shortest x span drawn, so a degenerate last window still has an axis.
const MIN_SPAN_SECONDS: f64 = 1e-3;

/// One variant and the annotations computed on it.
#[derive(Debug, Clone, Copy)]
pub struct PlotInput<'a> {
    pub variant: &'a Variant,
    pub annotations: &'a [ModelAnnotation],
}

/// Outcome of plotting a sequence of windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlotStats {
    pub written: usize,
    /// Windows where the signal slice was empty.
    pub skipped: usize,
    /// Windows whose image failed to render or save (logged).
    pub failed: usize,
}

impl PlotStats {
    fn record(&mut self, outcome: Result<Option<PathBuf>, WriteError>) {
        match outcome {
            Ok(Some(_)) => self.written += 1,
            Ok(None) => self.skipped += 1,
            Err(e) => {
                warn!(error = %e, "image not written");
                self.failed += 1;
            }
        }
    }
}

/// Render one image per window of `plan` for a single variant.
///
/// Errors only when the output folder cannot be created; single-image failures
/// are logged and counted.
pub fn plot_per_variant(
    layout: &FileLayout,
    input: PlotInput<'_>,
    plan: &WindowPlan,
    plot: &PlotConfig,
) -> Result<PlotStats, WriteError> {
    create_dir(&layout.variant_images_dir(&input.variant.label))?;
    let mut stats = PlotStats::default();
    for window in plan.iter() {
        stats.record(plot_variant_window(layout, input, &window, plot));
    }
    debug!(variant = %input.variant.label, ?stats, "variant images done");
    Ok(stats)
}

/// Render the image of one window for one variant. `Ok(None)` when the
/// variant has no samples in the window.
pub fn plot_variant_window(
    layout: &FileLayout,
    input: PlotInput<'_>,
    window: &Window,
    plot: &PlotConfig,
) -> Result<Option<PathBuf>, WriteError> {
    let signal = input.variant.stream.slice(window.t0, window.t1);
    if signal.is_empty() {
        return Ok(None);
    }
    let models = slice_annotations(input.annotations, window);
    let path = layout.variant_image(&input.variant.label, window.index);
    ensure_registered().map_err(|e| render_err(&path, e))?;
    let title = format!("{} | {} | window {}", layout.basename, input.variant.label, window.index);

    {
        let root = BitMapBackend::new(&path, (plot.width, plot.height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| render_err(&path, e))?;
        draw_group(&root, &title, &signal, &models, window).map_err(|message| WriteError::Render {
            path: path.clone(),
            message,
        })?;
        root.present().map_err(|e| render_err(&path, e))?;
    }

    debug!(path = %path.display(), "image written");
    Ok(Some(path))
}

/// Render one comparison image per window of `plan`.
///
/// `inputs[0]` is the reference variant (the original): windows where it has
/// no samples are skipped.
pub fn plot_comparison(
    layout: &FileLayout,
    inputs: &[PlotInput<'_>],
    plan: &WindowPlan,
    plot: &PlotConfig,
) -> Result<PlotStats, WriteError> {
    create_dir(&layout.comparison_dir())?;
    let mut stats = PlotStats::default();
    for window in plan.iter() {
        stats.record(plot_comparison_window(layout, inputs, &window, plot));
    }
    debug!(?stats, "comparison images done");
    Ok(stats)
}

pub fn plot_comparison_window(
    layout: &FileLayout,
    inputs: &[PlotInput<'_>],
    window: &Window,
    plot: &PlotConfig,
) -> Result<Option<PathBuf>, WriteError> {
    let Some(reference) = inputs.first() else {
        return Ok(None);
    };
    if reference.variant.stream.slice(window.t0, window.t1).is_empty() {
        return Ok(None);
    }

    let path = layout.comparison_image(window.index);
    ensure_registered().map_err(|e| render_err(&path, e))?;
    let height = plot.group_height * inputs.len() as u32;
    {
        let root = BitMapBackend::new(&path, (plot.width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| render_err(&path, e))?;

        let groups = root.split_evenly((inputs.len(), 1));
        for (area, input) in groups.iter().zip(inputs) {
            let signal = input.variant.stream.slice(window.t0, window.t1);
            let models = slice_annotations(input.annotations, window);
            let title = format!("{} | {}", layout.basename, input.variant.label);
            draw_group(area, &title, &signal, &models, window).map_err(|message| WriteError::Render {
                path: path.clone(),
                message,
            })?;
        }
        root.present().map_err(|e| render_err(&path, e))?;
    }

    debug!(path = %path.display(), "comparison image written");
    Ok(Some(path))
}

fn slice_annotations<'a>(annotations: &'a [ModelAnnotation], window: &Window) -> Vec<(&'a str, Stream)> {
    annotations
        .iter()
        .map(|a| (a.model.as_str(), a.stream.slice(window.t0, window.t1)))
        .collect()
}

fn draw_group<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    signal: &Stream,
    models: &[(&str, Stream)],
    window: &Window,
) -> Result<(), String> {
    // The signal slice defines the time origin; annotations are placed relative
    // to it so framing offsets show up as a shift rather than a stretch.
    let origin = signal.starttime().unwrap_or(window.t0);
    let span = seconds_between(origin, window.t1).max(MIN_SPAN_SECONDS);

    let rows = 2 + models.len() as u32;
    let unit = (area.dim_in_pixel().1 / rows) as i32;
    let (top, rest) = area.split_vertically(2 * unit);

    draw_signal(&top, title, signal, origin, span)?;
    if models.is_empty() {
        return Ok(());
    }
    let panels = rest.split_evenly((models.len(), 1));
    for (panel, (model, annotations)) in panels.iter().zip(models) {
        draw_probabilities(panel, model, annotations, origin, span)?;
    }
    Ok(())
}

fn draw_signal<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    signal: &Stream,
    origin: DateTime<Utc>,
    span: f64,
) -> Result<(), String> {
    let n = signal.len().max(1);
    let top = (n - 1) as f64 * TRACE_SPACING + 1.1;
    let fmt = ElapsedFormatter::new(origin);

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT_FAMILY, 16))
        .margin(6)
        .x_label_area_size(24)
        .y_label_area_size(48)
        .build_cartesian_2d(0.0..span, -1.1..top)
        .map_err(|e| e.to_string())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(6)
        .y_labels(3)
        .x_label_formatter(&|v| fmt.format(*v))
        .draw()
        .map_err(|e| e.to_string())?;

    for (i, tr) in signal.iter().enumerate() {
        let peak = tr.max_abs();
        let scale = if peak > 0.0 { peak } else { 1.0 };
        let shift = seconds_between(origin, tr.starttime);
        // First trace on top.
        let offset = (n - 1 - i.min(n - 1)) as f64 * TRACE_SPACING;
        let color = signal_color(i);
        let points = tr
            .times()
            .zip(&tr.data)
            .filter(|(_, v)| v.is_finite())
            .map(|(t, v)| (shift + t, v / scale + offset));
        chart
            .draw_series(LineSeries::new(points, &color))
            .map_err(|e| e.to_string())?
            .label(tr.id.to_string())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| e.to_string())
}

fn draw_probabilities<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    model: &str,
    annotations: &Stream,
    origin: DateTime<Utc>,
    span: f64,
) -> Result<(), String> {
    let fmt = ElapsedFormatter::new(origin);
    let mut chart = ChartBuilder::on(area)
        .margin(6)
        .x_label_area_size(24)
        .y_label_area_size(48)
        .build_cartesian_2d(0.0..span, 0.0..PROBABILITY_MAX)
        .map_err(|e| e.to_string())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(6)
        .y_labels(3)
        .y_desc(model)
        .x_label_formatter(&|v| fmt.format(*v))
        .draw()
        .map_err(|e| e.to_string())?;

    let mut labelled = false;
    for tr in annotations {
        let (_, class) = split_annotation_channel(&tr.id.channel);
        let Some(color) = class_color(class) else {
            continue;
        };
        let shift = seconds_between(origin, tr.starttime);
        let points = tr
            .times()
            .zip(&tr.data)
            .filter(|(_, v)| v.is_finite())
            .map(|(t, v)| (shift + t, *v));
        chart
            .draw_series(LineSeries::new(points, &color))
            .map_err(|e| e.to_string())?
            .label(format!("{model} {class}"))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
        labelled = true;
    }

    if labelled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn create_dir(dir: &Path) -> Result<(), WriteError> {
    fs::create_dir_all(dir).map_err(|source| WriteError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn render_err(path: &Path, e: impl std::fmt::Display) -> WriteError {
    WriteError::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
