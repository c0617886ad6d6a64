//! Terminal output for a finished batch.

use crate::report::{FileReport, FileStatus, ProcessingReport};

pub fn format_report(report: &ProcessingReport) -> String {
    let mut out = String::new();

    out.push_str("=== seismo - batch summary ===\n");
    out.push_str(&format!("Output: {}\n", report.output_root.display()));
    out.push_str(&format!(
        "Files: {} total | {} processed | {} skipped\n",
        report.total_files, report.processed_files, report.skipped_files
    ));
    match &report.summary_file {
        Some(path) => out.push_str(&format!("Summary: {}\n", path.display())),
        None => out.push_str("Summary: not written\n"),
    }

    if !report.files.is_empty() {
        out.push('\n');
        for f in &report.files {
            out.push_str(&format_file_line(f));
            out.push('\n');
        }
    }
    out
}

pub fn format_file_line(f: &FileReport) -> String {
    let status = match f.status {
        FileStatus::Processed => "ok",
        FileStatus::Skipped => "skipped",
        FileStatus::Failed => "failed",
    };
    let mut line = format!("  {:<8} {:<24} images={}", status, f.basename, f.images_written);
    if !f.failed_filters.is_empty() {
        line.push_str(&format!(" failed-filters=[{}]", f.failed_filters.join(", ")));
    }
    if let Some(err) = &f.error {
        line.push_str(&format!(" ({err})"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn report_lists_each_file() {
        let files = vec![
            FileReport {
                input: PathBuf::from("a.mseed"),
                basename: "a".into(),
                status: FileStatus::Processed,
                failed_filters: vec!["bad".into()],
                images_written: 24,
                error: None,
            },
            FileReport::skipped(Path::new("b.mseed"), "b", "no traces".into()),
        ];
        let report = ProcessingReport::new(Path::new("/out"), files, None);
        let text = format_report(&report);
        assert!(text.contains("2 total | 1 processed | 1 skipped"));
        assert!(text.contains("failed-filters=[bad]"));
        assert!(text.contains("(no traces)"));
        assert!(text.contains("Summary: not written"));
    }
}
