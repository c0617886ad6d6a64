//! Batch outcome: what was processed, what was skipped, where results live.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WriteError;

pub mod format;

pub use format::{format_file_line, format_report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// All steps ran (individual filters or images may still have failed).
    Processed,
    /// The waveform could not be read; nothing was written.
    Skipped,
    /// Processing stopped part-way (model failure); partial output removed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub basename: String,
    pub status: FileStatus,
    /// Filter labels that could not be applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_filters: Vec<String>,
    pub images_written: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn skipped(input: &Path, basename: &str, error: String) -> Self {
        Self {
            input: input.to_path_buf(),
            basename: basename.to_string(),
            status: FileStatus::Skipped,
            failed_filters: Vec::new(),
            images_written: 0,
            error: Some(error),
        }
    }

    pub fn failed(input: &Path, basename: &str, error: String) -> Self {
        Self {
            status: FileStatus::Failed,
            ..Self::skipped(input, basename, error)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: usize,
    pub output_root: PathBuf,
    pub summary_file: Option<PathBuf>,
    pub files: Vec<FileReport>,
}

impl ProcessingReport {
    pub fn new(output_root: &Path, files: Vec<FileReport>, summary_file: Option<PathBuf>) -> Self {
        let processed_files = files.iter().filter(|f| f.status == FileStatus::Processed).count();
        Self {
            total_files: files.len(),
            processed_files,
            skipped_files: files.len() - processed_files,
            output_root: output_root.to_path_buf(),
            summary_file,
            files,
        }
    }

    /// Basenames of the files that produced results, in input order.
    pub fn processed_basenames(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Processed)
            .map(|f| f.basename.clone())
            .collect()
    }
}

/// Write `report` as pretty JSON.
pub fn write_json(path: &Path, report: &ProcessingReport) -> Result<(), WriteError> {
    let file = File::create(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, report).map_err(|source| WriteError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    w.flush().map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn processed(name: &str) -> FileReport {
        FileReport {
            input: PathBuf::from(format!("/in/{name}.mseed")),
            basename: name.to_string(),
            status: FileStatus::Processed,
            failed_filters: Vec::new(),
            images_written: 30,
            error: None,
        }
    }

    #[test]
    fn counts_follow_file_statuses() {
        let files = vec![
            processed("a"),
            FileReport::skipped(Path::new("/in/b.mseed"), "b", "corrupt".into()),
            processed("c"),
        ];
        let report = ProcessingReport::new(Path::new("/out"), files, None);
        assert_eq!(report.total_files, 3);
        assert_eq!(report.processed_files, 2);
        assert_eq!(report.skipped_files, 1);
        assert_eq!(report.processed_basenames(), vec!["a", "c"]);
    }

    #[test]
    fn json_export_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let report = ProcessingReport::new(
            dir.path(),
            vec![processed("a")],
            Some(dir.path().join("summary_results.csv")),
        );
        write_json(&path, &report).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"status\": \"processed\""));
        let back: ProcessingReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, report);
    }
}
