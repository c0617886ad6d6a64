//! Per-variant pick and detection tables.
//!
//! One CSV per (file, filter, model). Lists with no entries still produce the
//! header row, so downstream readers can tell "ran, found nothing" from "did
//! not run".

use std::path::{Path, PathBuf};

use csv::Writer;
use tracing::debug;

use crate::domain::time::format_iso;
use crate::domain::{Detection, Pick};
use crate::error::WriteError;

/// Marker written for attributes a model did not report.
pub const NOT_AVAILABLE: &str = "N/A";

pub const PICKS_HEADER: [&str; 10] = [
    "filename",
    "model",
    "filter_type",
    "channel",
    "phase",
    "start_time",
    "end_time",
    "peak_time",
    "peak_value",
    "trace_length",
];

pub const DETECTIONS_HEADER: [&str; 8] = [
    "filename",
    "filter_type",
    "channel",
    "start_time",
    "end_time",
    "peak_time",
    "peak_value",
    "duration",
];

pub fn picks_path(dir: &Path, basename: &str, filter_label: &str, model: &str) -> PathBuf {
    dir.join(format!("{basename}_{filter_label}_{model}_picks.csv"))
}

pub fn detections_path(dir: &Path, basename: &str, filter_label: &str, detector: &str) -> PathBuf {
    dir.join(format!("{basename}_{filter_label}_{detector}_detections.csv"))
}

/// Write one row per pick. Returns the path written.
pub fn write_picks(
    picks: &[Pick],
    model: &str,
    basename: &str,
    dir: &Path,
    filter_label: &str,
) -> Result<PathBuf, WriteError> {
    let path = picks_path(dir, basename, filter_label, model);
    let mut w = create(&path)?;
    w.write_record(PICKS_HEADER).map_err(|e| csv_err(&path, e))?;

    for p in picks {
        w.write_record([
            basename.to_string(),
            model.to_string(),
            filter_label.to_string(),
            or_na(p.trace_id.clone()),
            or_na(p.phase.clone()),
            or_na(p.start_time.map(format_iso)),
            or_na(p.end_time.map(format_iso)),
            or_na(p.peak_time.map(format_iso)),
            or_na(p.peak_value.map(|v| v.to_string())),
            or_na(p.trace_length.map(|v| v.to_string())),
        ])
        .map_err(|e| csv_err(&path, e))?;
    }

    finish(w, &path)?;
    debug!(path = %path.display(), rows = picks.len(), "picks written");
    Ok(path)
}

/// Write one row per detection. Returns the path written.
pub fn write_detections(
    detections: &[Detection],
    detector: &str,
    basename: &str,
    dir: &Path,
    filter_label: &str,
) -> Result<PathBuf, WriteError> {
    let path = detections_path(dir, basename, filter_label, detector);
    let mut w = create(&path)?;
    w.write_record(DETECTIONS_HEADER).map_err(|e| csv_err(&path, e))?;

    for d in detections {
        w.write_record([
            basename.to_string(),
            filter_label.to_string(),
            or_na(d.trace_id.clone()),
            or_na(d.start_time.map(format_iso)),
            or_na(d.end_time.map(format_iso)),
            or_na(d.peak_time.map(format_iso)),
            or_na(d.peak_value.map(|v| v.to_string())),
            or_na(d.duration_seconds().map(|v| v.to_string())),
        ])
        .map_err(|e| csv_err(&path, e))?;
    }

    finish(w, &path)?;
    debug!(path = %path.display(), rows = detections.len(), "detections written");
    Ok(path)
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn create(path: &Path) -> Result<Writer<std::fs::File>, WriteError> {
    Writer::from_path(path).map_err(|e| csv_err(path, e))
}

fn finish(mut w: Writer<std::fs::File>, path: &Path) -> Result<(), WriteError> {
    w.flush().map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn csv_err(path: &Path, source: csv::Error) -> WriteError {
    WriteError::Csv {
        path: path.to_path_buf(),
        source,
    }
}
