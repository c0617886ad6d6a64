//! Cross-file, cross-filter summary of the pick and detection tables.
//!
//! The summary is built from what is on disk, not from in-memory results, so it
//! can be regenerated for an existing results root at any time.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{Reader, Writer};
use tracing::{info, warn};

use crate::domain::ORIGINAL_LABEL;
use crate::error::WriteError;
use crate::io::export::{csv_err, detections_path, picks_path};
use crate::io::layout::{DETECTIONS_DIR, FileLayout, SUMMARY_FILE};

/// Column naming for the summary: which models and detectors to count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryColumns {
    pub models: Vec<String>,
    pub detectors: Vec<String>,
}

impl SummaryColumns {
    pub fn header(&self) -> Vec<String> {
        let mut h = vec!["filename".to_string(), "filter_type".to_string()];
        for m in &self.models {
            h.push(format!("{m}_P_picks"));
            h.push(format!("{m}_S_picks"));
        }
        for d in &self.detectors {
            h.push(format!("{d}_detections"));
        }
        h
    }
}

/// Counts for one (file, filter) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub filename: String,
    pub filter_type: String,
    /// `(P, S)` per model, in column order.
    pub picks: Vec<(usize, usize)>,
    pub detections: Vec<usize>,
}

impl SummaryRow {
    fn record(&self) -> Vec<String> {
        let mut r = vec![self.filename.clone(), self.filter_type.clone()];
        for (p, s) in &self.picks {
            r.push(p.to_string());
            r.push(s.to_string());
        }
        r.extend(self.detections.iter().map(|d| d.to_string()));
        r
    }
}

/// Rows for one processed file.
///
/// `labels` come first in the given order; any other filter label found in the
/// file's tables is appended in sorted order. Missing tables count as zero.
pub fn summarize_file(layout: &FileLayout, labels: &[String], columns: &SummaryColumns) -> Vec<SummaryRow> {
    let dir = layout.detections_dir();
    let mut all_labels: Vec<String> = labels.to_vec();
    for extra in discover_labels(&dir, &layout.basename, &columns.models) {
        if !all_labels.contains(&extra) {
            all_labels.push(extra);
        }
    }

    all_labels
        .into_iter()
        .map(|label| SummaryRow {
            filename: layout.basename.clone(),
            picks: columns
                .models
                .iter()
                .map(|m| count_phases(&picks_path(&dir, &layout.basename, &label, m)))
                .collect(),
            detections: columns
                .detectors
                .iter()
                .map(|d| count_rows(&detections_path(&dir, &layout.basename, &label, d)))
                .collect(),
            filter_type: label,
        })
        .collect()
}

/// Write `summary_results.csv` under `root` for the given files.
///
/// Files without a results directory (never loaded, or failed) are skipped with
/// a warning.
pub fn write_summary(
    root: &Path,
    basenames: &[String],
    labels: &[String],
    columns: &SummaryColumns,
) -> Result<PathBuf, WriteError> {
    let path = root.join(SUMMARY_FILE);
    let mut w = Writer::from_path(&path).map_err(|e| csv_err(&path, e))?;
    w.write_record(columns.header()).map_err(|e| csv_err(&path, e))?;

    let mut rows = 0;
    for basename in basenames {
        let layout = FileLayout::new(root, basename.as_str());
        if !layout.detections_dir().is_dir() {
            warn!(file = %basename, "no results directory, left out of summary");
            continue;
        }
        for row in summarize_file(&layout, labels, columns) {
            w.write_record(row.record()).map_err(|e| csv_err(&path, e))?;
            rows += 1;
        }
    }

    w.flush().map_err(|source| WriteError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), rows, "summary written");
    Ok(path)
}

/// Basenames of every processed file under `root`, sorted.
pub fn discover_basenames(root: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().join(DETECTIONS_DIR).is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Default label order: `original` then each configured filter.
pub fn default_labels(filters: &[String]) -> Vec<String> {
    std::iter::once(ORIGINAL_LABEL.to_string())
        .chain(filters.iter().cloned())
        .collect()
}

/// Filter labels that have a picks table for one of `models`.
fn discover_labels(dir: &Path, basename: &str, models: &[String]) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let prefix = format!("{basename}_");
    let mut labels: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let rest = name.strip_prefix(&prefix)?;
            models.iter().find_map(|m| {
                rest.strip_suffix(&format!("_{m}_picks.csv"))
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
            })
        })
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

fn count_phases(path: &Path) -> (usize, usize) {
    let Ok(mut r) = Reader::from_path(path) else {
        return (0, 0);
    };
    let phase_col = match r.headers() {
        Ok(h) => h.iter().position(|c| c == "phase"),
        Err(_) => None,
    };
    let Some(col) = phase_col else {
        warn!(path = %path.display(), "picks table has no phase column");
        return (0, 0);
    };

    let mut counts = (0, 0);
    for rec in r.records() {
        match rec {
            Ok(rec) => match rec.get(col) {
                Some("P") => counts.0 += 1,
                Some("S") => counts.1 += 1,
                _ => {}
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable row in picks table");
            }
        }
    }
    counts
}

fn count_rows(path: &Path) -> usize {
    match Reader::from_path(path) {
        Ok(mut r) => r.records().filter(|rec| rec.is_ok()).count(),
        Err(_) => 0,
    }
}
