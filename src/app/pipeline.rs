//! Batch processing of waveform files.
//!
//! Per file: load, then for the original and every filter band run the models
//! and write their tables, then render the per-variant and comparison images,
//! then release everything before the next file is loaded.
//!
//! Failures are contained at the smallest unit that can be skipped:
//! an unreadable file is skipped, a failing filter is skipped, a model failure
//! aborts the current file only, and image/table write failures are logged.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::domain::{PipelineConfig, Stream, Variant};
use crate::error::{ModelError, PipelineError, WriteError};
use crate::filter;
use crate::io::layout::{FileLayout, basename_of};
use crate::io::summary::{SummaryColumns, write_summary};
use crate::io::{waveform, write_detections, write_picks};
use crate::models::{self, ModelAnnotation, ModelSet};
use crate::plot::{PlotInput, WindowPlan, plot_comparison, plot_per_variant};
use crate::report::{FileReport, FileStatus, ProcessingReport};

/// One processed variant, kept until the comparison images are done.
struct VariantResult {
    variant: Variant,
    annotations: Vec<ModelAnnotation>,
}

impl VariantResult {
    fn as_input(&self) -> PlotInput<'_> {
        PlotInput {
            variant: &self.variant,
            annotations: &self.annotations,
        }
    }
}

struct FileOutcome {
    failed_filters: Vec<String>,
    images_written: usize,
}

/// Process `inputs` in order and write the batch summary under `root`.
///
/// `progress(current, total, message)` is called before each file and once
/// more with `(total, total, ..)` at the end, whether or not files failed.
pub fn process_files(
    inputs: &[PathBuf],
    root: &Path,
    config: &PipelineConfig,
    models: &ModelSet,
    progress: &mut dyn FnMut(usize, usize, &str),
) -> Result<ProcessingReport, PipelineError> {
    config.validate()?;
    if models.is_empty() {
        return Err(ModelError::NoModels.into());
    }
    fs::create_dir_all(root).map_err(|source| WriteError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let total = inputs.len();
    info!(files = total, root = %root.display(), window_minutes = config.window_minutes, "batch started");

    let mut files = Vec::with_capacity(total);
    for (i, (input, basename)) in inputs.iter().zip(unique_basenames(inputs)).enumerate() {
        progress(i, total, &format!("Processing {}", basename_of(input)));
        let layout = FileLayout::new(root, basename);
        files.push(process_file(input, &layout, config, models));
    }

    let mut report = ProcessingReport::new(root, files, None);
    let columns = SummaryColumns {
        models: models.names(),
        detectors: models.detector_names(),
    };
    match write_summary(root, &report.processed_basenames(), &config.variant_labels(), &columns) {
        Ok(path) => report.summary_file = Some(path),
        Err(e) => warn!(error = %e, "summary not written"),
    }

    progress(total, total, "Processing completed");
    info!(
        processed = report.processed_files,
        skipped = report.skipped_files,
        "batch finished"
    );
    Ok(report)
}

/// Output folder names for `inputs`: the file stem, or `{stem}_2`, `{stem}_3`,
/// ... when an earlier input of the batch already uses that stem.
fn unique_basenames(inputs: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = inputs.iter().map(|p| basename_of(p)).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(stems.len());
    let mut out = Vec::with_capacity(stems.len());
    for stem in &stems {
        let mut name = stem.clone();
        let mut n = 2;
        while taken.contains(&name) || (name != *stem && stems.contains(&name)) {
            name = format!("{stem}_{n}");
            n += 1;
        }
        if name != *stem {
            warn!(stem = %stem, folder = %name, "duplicate file name in batch, using a separate folder");
        }
        taken.insert(name.clone());
        out.push(name);
    }
    out
}

/// Process a single file into `layout`, never failing the batch.
///
/// Whatever an earlier run left in the file's folder is removed first, so the
/// folder only ever reflects this run.
pub fn process_file(input: &Path, layout: &FileLayout, config: &PipelineConfig, models: &ModelSet) -> FileReport {
    info!(file = %input.display(), folder = %layout.basename, "processing file");

    if let Err(e) = clear_dir(&layout.dir) {
        error!(file = %layout.basename, error = %e, "stale output could not be removed");
        return FileReport::failed(input, &layout.basename, e.to_string());
    }

    let stream = match waveform::load(input) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(file = %input.display(), error = %e, "skipping unreadable file");
            return FileReport::skipped(input, &layout.basename, e.to_string());
        }
    };

    match run_file(layout, stream, config, models) {
        Ok(outcome) => {
            info!(
                file = %layout.basename,
                images = outcome.images_written,
                failed_filters = outcome.failed_filters.len(),
                "file done"
            );
            FileReport {
                input: input.to_path_buf(),
                basename: layout.basename.clone(),
                status: FileStatus::Processed,
                failed_filters: outcome.failed_filters,
                images_written: outcome.images_written,
                error: None,
            }
        }
        Err(e) => {
            error!(file = %layout.basename, error = %e, "file aborted");
            if let Err(rm) = clear_dir(&layout.dir) {
                warn!(dir = %layout.dir.display(), error = %rm, "could not remove partial output");
            }
            FileReport::failed(input, &layout.basename, e.to_string())
        }
    }
}

fn clear_dir(dir: &Path) -> Result<(), WriteError> {
    if !dir.exists() {
        return Ok(());
    }
    fs::remove_dir_all(dir).map_err(|source| WriteError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn run_file(
    layout: &FileLayout,
    original: Stream,
    config: &PipelineConfig,
    models: &ModelSet,
) -> Result<FileOutcome, PipelineError> {
    for dir in [layout.detections_dir(), layout.images_dir()] {
        fs::create_dir_all(&dir).map_err(|source| WriteError::Io { path: dir, source })?;
    }

    let original = Variant::original(original);
    let first = analyze(layout, original, models)?;
    let mut results = vec![first];
    let mut failed_filters = Vec::new();

    for spec in &config.filters {
        let stream = match filter::apply(&results[0].variant.stream, spec) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(file = %layout.basename, filter = %spec.label, error = %e, "filter skipped");
                failed_filters.push(spec.label.clone());
                continue;
            }
        };
        let variant = Variant {
            label: spec.label.clone(),
            stream,
        };
        results.push(analyze(layout, variant, models)?);
    }

    let mut images_written = 0;
    if let Some(plan) = WindowPlan::for_stream(&results[0].variant.stream, config.window_seconds()) {
        debug!(file = %layout.basename, windows = plan.len(), "window plan");

        for result in &results {
            match plot_per_variant(layout, result.as_input(), &plan, &config.plot) {
                Ok(stats) => images_written += stats.written,
                Err(e) => warn!(variant = %result.variant.label, error = %e, "variant images skipped"),
            }
        }

        let inputs: Vec<PlotInput<'_>> = results.iter().map(VariantResult::as_input).collect();
        match plot_comparison(layout, &inputs, &plan, &config.plot) {
            Ok(stats) => images_written += stats.written,
            Err(e) => warn!(error = %e, "comparison images skipped"),
        }
    }

    // Every variant and annotation stream of this file is dropped here.
    drop(results);
    Ok(FileOutcome {
        failed_filters,
        images_written,
    })
}

/// Run every model on `variant`, write the pick/detection tables, and keep the
/// annotations for plotting.
fn analyze(layout: &FileLayout, variant: Variant, models: &ModelSet) -> Result<VariantResult, ModelError> {
    let dir = layout.detections_dir();
    for events in models::detect(&variant.stream, models)? {
        if let Err(e) = write_picks(&events.picks, &events.model, &layout.basename, &dir, &variant.label) {
            warn!(error = %e, "picks table not written");
        }
        if events.has_detector {
            if let Err(e) = write_detections(&events.detections, &events.model, &layout.basename, &dir, &variant.label) {
                warn!(error = %e, "detections table not written");
            }
        }
    }

    let annotations = models::annotate(&variant.stream, models)?;
    debug!(variant = %variant.label, models = annotations.len(), "annotated");
    Ok(VariantResult { variant, annotations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synth::{SynthSpec, generate_recording};
    use crate::domain::{Device, FilterSpec, Pick, PlotConfig};
    use crate::io::images::ImageIndex;
    use crate::io::layout::SUMMARY_FILE;
    use crate::io::waveform::write_slist;
    use crate::models::{ModelSlot, PhaseClassifier, PhaseThresholds};
    use tempfile::TempDir;

    fn config(window_minutes: u32) -> PipelineConfig {
        PipelineConfig {
            window_minutes,
            dataset: "stead".into(),
            device: Device::Cpu,
            filters: FilterSpec::defaults(),
            plot: PlotConfig {
                width: 400,
                height: 300,
                group_height: 200,
            },
        }
    }

    fn write_recording(dir: &Path, name: &str, minutes: f64) -> PathBuf {
        let stream = generate_recording(&SynthSpec {
            duration_seconds: minutes * 60.0,
            sampling_rate: 50.0,
            p_arrival_seconds: Some(100.0),
            s_arrival_seconds: Some(140.0),
            ..SynthSpec::default()
        })
        .unwrap();
        let path = dir.join(name);
        write_slist(&path, &stream).unwrap();
        path
    }

    fn model_set() -> ModelSet {
        ModelSet::load("stead", Device::Cpu).unwrap()
    }

    fn run(inputs: &[PathBuf], root: &Path, cfg: &PipelineConfig) -> (ProcessingReport, Vec<(usize, usize)>) {
        let mut calls = Vec::new();
        let report = process_files(inputs, root, cfg, &model_set(), &mut |c, t, _| calls.push((c, t))).unwrap();
        (report, calls)
    }

    #[test]
    fn ten_minutes_in_two_minute_windows() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let input = write_recording(data.path(), "rec.slist", 10.0);

        let (report, _) = run(&[input], out.path(), &config(2));
        assert_eq!(report.processed_files, 1);

        let index = ImageIndex::scan(&FileLayout::new(out.path(), "rec"));
        assert_eq!(index.original.len(), 5);
        assert_eq!(index.filtered.len(), 4);
        assert!(index.filtered.iter().all(|(_, images)| images.len() == 5));
        assert_eq!(index.comparison.len(), 5);
        assert_eq!(report.files[0].images_written, 30);

        let tables = FileLayout::new(out.path(), "rec").detections_dir();
        // 5 variants x 3 models of picks, plus 5 detection tables.
        assert_eq!(fs::read_dir(tables).unwrap().count(), 20);
        assert!(out.path().join(SUMMARY_FILE).is_file());
    }

    struct Mute;

    impl PhaseClassifier for Mute {
        fn name(&self) -> &str {
            "Mute"
        }
        fn default_thresholds(&self) -> PhaseThresholds {
            PhaseThresholds::uniform(0.5)
        }
        fn classify(&self, _: &Stream, _: &PhaseThresholds) -> Result<Vec<Pick>, ModelError> {
            Ok(Vec::new())
        }
        fn annotate(&self, _: &Stream) -> Result<Stream, ModelError> {
            Ok(Stream::default())
        }
    }

    #[test]
    fn silent_model_still_writes_header() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let input = write_recording(data.path(), "rec.slist", 2.0);
        let set = ModelSet::from_slots("stead", Device::Cpu, vec![ModelSlot::new(Box::new(Mute), None)]);
        let cfg = PipelineConfig {
            filters: Vec::new(),
            ..config(1)
        };

        process_files(&[input], out.path(), &cfg, &set, &mut |_, _, _| {}).unwrap();
        let table = FileLayout::new(out.path(), "rec")
            .detections_dir()
            .join("rec_original_Mute_picks.csv");
        let text = fs::read_to_string(table).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("filename,model,filter_type,channel,phase"));
    }

    #[test]
    fn failing_filter_is_skipped() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let input = write_recording(data.path(), "rec.slist", 3.0);
        let mut cfg = config(1);
        cfg.filters = vec![
            FilterSpec::new(0.5, 2.0),
            FilterSpec {
                label: "broken".into(),
                freqmin: 4.0,
                freqmax: 2.0,
            },
            FilterSpec::new(2.0, 4.0),
            FilterSpec::new(5.0, 10.0),
        ];

        let (report, _) = run(&[input], out.path(), &cfg);
        assert_eq!(report.files[0].status, FileStatus::Processed);
        assert_eq!(report.files[0].failed_filters, vec!["broken"]);

        let index = ImageIndex::scan(&FileLayout::new(out.path(), "rec"));
        assert_eq!(index.filtered.len(), 3);
        assert!(index.filtered_for("broken").is_empty());

        let mut r = csv::Reader::from_path(out.path().join(SUMMARY_FILE)).unwrap();
        let rows: Vec<csv::StringRecord> = r.records().map(Result::unwrap).collect();
        let labels: Vec<&str> = rows.iter().map(|r| &r[1]).collect();
        assert_eq!(labels, vec!["original", "0.5-2Hz", "broken", "2-4Hz", "5-10Hz"]);
        let broken = &rows[2];
        assert!(broken.iter().skip(2).all(|v| v == "0"));
    }

    #[test]
    fn corrupt_file_is_skipped_and_progress_completes() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let good = write_recording(data.path(), "good.slist", 2.0);
        let bad = data.path().join("bad.slist");
        fs::write(&bad, "this is not a waveform\n").unwrap();

        let (report, calls) = run(&[bad, good], out.path(), &config(1));
        assert_eq!(report.total_files, 2);
        assert_eq!(report.processed_files, 1);
        assert_eq!(report.files[0].status, FileStatus::Skipped);
        assert_eq!(calls.last(), Some(&(2, 2)));
        assert_eq!(calls.first(), Some(&(0, 2)));

        let dirs: Vec<String> = fs::read_dir(out.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(dirs, vec!["good"]);
    }

    #[test]
    fn rerun_produces_identical_tables() {
        let data = TempDir::new().unwrap();
        let input = write_recording(data.path(), "rec.slist", 3.0);
        let mut cfg = config(1);
        cfg.filters.truncate(2);

        let read_tables = |root: &Path| {
            let dir = FileLayout::new(root, "rec").detections_dir();
            let mut names: Vec<PathBuf> = fs::read_dir(&dir).unwrap().map(|e| e.unwrap().path()).collect();
            names.sort();
            let mut out: Vec<Vec<u8>> = names.iter().map(|p| fs::read(p).unwrap()).collect();
            out.push(fs::read(root.join(SUMMARY_FILE)).unwrap());
            out
        };

        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        run(&[input.clone()], a.path(), &cfg);
        run(&[input], b.path(), &cfg);
        assert_eq!(read_tables(a.path()), read_tables(b.path()));
    }

    #[test]
    fn invalid_window_is_rejected_up_front() {
        let out = TempDir::new().unwrap();
        let err = process_files(&[], out.path(), &config(0), &model_set(), &mut |_, _, _| {}).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    fn summary_rows(root: &Path) -> Vec<(String, String)> {
        let mut r = csv::Reader::from_path(root.join(SUMMARY_FILE)).unwrap();
        r.records()
            .map(Result::unwrap)
            .map(|rec| (rec[0].to_string(), rec[1].to_string()))
            .collect()
    }

    #[test]
    fn rerun_into_same_root_drops_stale_outputs() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let input = write_recording(data.path(), "rec.slist", 2.0);

        let mut cfg = config(1);
        cfg.filters = vec![FilterSpec::new(0.5, 2.0), FilterSpec::new(2.0, 4.0)];
        run(&[input.clone()], out.path(), &cfg);

        cfg.filters.truncate(1);
        run(&[input], out.path(), &cfg);

        let layout = FileLayout::new(out.path(), "rec");
        assert!(!layout.detections_dir().join("rec_2-4Hz_PhaseNet_picks.csv").exists());
        let index = ImageIndex::scan(&layout);
        let labels: Vec<&str> = index.filtered.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["0.5-2Hz"]);

        let filters: Vec<String> = summary_rows(out.path()).into_iter().map(|(_, f)| f).collect();
        assert_eq!(filters, vec!["original", "0.5-2Hz"]);
    }

    #[test]
    fn same_stem_inputs_get_separate_folders() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::create_dir_all(data.path().join("a")).unwrap();
        fs::create_dir_all(data.path().join("b")).unwrap();
        let first = write_recording(&data.path().join("a"), "rec.slist", 2.0);
        let second = write_recording(&data.path().join("b"), "rec.slist", 2.0);
        let cfg = PipelineConfig {
            filters: Vec::new(),
            ..config(1)
        };

        let (report, _) = run(&[first, second], out.path(), &cfg);
        assert_eq!(report.processed_basenames(), vec!["rec", "rec_2"]);
        assert!(FileLayout::new(out.path(), "rec").detections_dir().is_dir());
        assert!(FileLayout::new(out.path(), "rec_2").detections_dir().is_dir());
        assert_eq!(
            summary_rows(out.path()),
            vec![
                ("rec".to_string(), "original".to_string()),
                ("rec_2".to_string(), "original".to_string()),
            ]
        );
    }

    #[test]
    fn duplicate_stems_are_numbered_without_clashing() {
        let inputs = [
            PathBuf::from("a/rec.slist"),
            PathBuf::from("b/rec.slist"),
            PathBuf::from("rec_2.slist"),
        ];
        assert_eq!(unique_basenames(&inputs), vec!["rec", "rec_3", "rec_2"]);
    }
}
