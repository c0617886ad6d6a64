//! Top-level application orchestration.
//!
//! `src/main.rs` only maps the result to an exit code; this module parses the
//! CLI, sets up logging, loads the models once and dispatches to the pipeline.

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Command, ImagesArgs, RunArgs, SummaryArgs, SynthArgs};
use crate::data::synth::{SynthSpec, generate_recording};
use crate::domain::{FilterSpec, PipelineConfig, PlotConfig};
use crate::error::{AppError, ConfigError};
use crate::io::summary::{default_labels, discover_basenames};
use crate::io::{FileLayout, ImageIndex, SummaryColumns, basename_of, write_summary};
use crate::job::{Job, JobProgress};
use crate::models::{ModelSet, builtin};

pub mod pipeline;

/// Entry point for the `seismo` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Summary(args) => handle_summary(args),
        Command::Synth(args) => handle_synth(args),
        Command::Images(args) => handle_images(args),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("seismo_batch=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seismo_batch=info"))
    };
    // A second init (tests, embedding) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args);
    config.validate()?;
    let models = ModelSet::load(&config.dataset, config.device)?;

    let job = if args.job_dir {
        Job::new(args.files.clone(), &args.output, config)
    } else {
        Job::with_root(args.files.clone(), args.output.clone(), config)
    };
    let mut progress = JobProgress::default();
    let report = job.run(&models, &mut progress)?;

    println!("{}", crate::report::format_report(&report));

    if let Some(path) = &args.report_json {
        crate::report::write_json(path, &report)?;
        info!(path = %path.display(), "report written");
    }

    if report.total_files > 0 && report.processed_files == 0 {
        return Err(AppError::new(3, "no input file could be processed"));
    }
    Ok(())
}

fn handle_summary(args: SummaryArgs) -> Result<(), AppError> {
    let basenames = if args.files.is_empty() {
        discover_basenames(&args.output)
    } else {
        args.files.iter().map(|f| basename_of(f)).collect()
    };

    let filters: Vec<String> = FilterSpec::defaults().into_iter().map(|f| f.label).collect();
    let columns = builtin_summary_columns();

    std::fs::create_dir_all(&args.output).map_err(|source| crate::error::WriteError::Io {
        path: args.output.clone(),
        source,
    })?;
    let path = write_summary(&args.output, &basenames, &default_labels(&filters), &columns)?;
    println!("{}", path.display());
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SynthSpec {
        station: args.station,
        duration_seconds: args.minutes * 60.0,
        sampling_rate: args.sampling_rate,
        p_arrival_seconds: Some(args.p_arrival),
        s_arrival_seconds: Some(args.s_arrival),
        seed: args.seed,
        ..SynthSpec::default()
    };
    let stream = generate_recording(&spec)?;
    crate::io::waveform::write_slist(&args.output, &stream)?;
    info!(path = %args.output.display(), traces = stream.len(), "synthetic recording written");
    Ok(())
}

fn handle_images(args: ImagesArgs) -> Result<(), AppError> {
    let layout = FileLayout::for_input(&args.output, &args.file);
    if !layout.dir.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "no results for '{}' under '{}'",
            layout.basename,
            args.output.display()
        ))
        .into());
    }

    let index = ImageIndex::scan(&layout);
    if index.total() == 0 {
        warn!(file = %layout.basename, "no images found");
    }
    println!("{}", format_image_index(&index));
    Ok(())
}

fn format_image_index(index: &ImageIndex) -> String {
    let mut out = String::new();
    out.push_str(&format!("original ({})\n", index.original.len()));
    for p in &index.original {
        out.push_str(&format!("  {}\n", p.display()));
    }
    for (label, paths) in &index.filtered {
        out.push_str(&format!("{label} ({})\n", paths.len()));
        for p in paths {
            out.push_str(&format!("  {}\n", p.display()));
        }
    }
    out.push_str(&format!("comparison ({})\n", index.comparison.len()));
    for p in &index.comparison {
        out.push_str(&format!("  {}\n", p.display()));
    }
    out
}

/// Summary columns of the built-in slots, without loading any model.
fn builtin_summary_columns() -> SummaryColumns {
    SummaryColumns {
        models: builtin::MODEL_NAMES.iter().map(|s| s.to_string()).collect(),
        detectors: builtin::DETECTOR_NAMES.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn pipeline_config_from_args(args: &RunArgs) -> PipelineConfig {
    PipelineConfig {
        window_minutes: args.window_minutes,
        dataset: args.dataset.clone(),
        device: args.device,
        filters: FilterSpec::defaults(),
        plot: PlotConfig {
            width: args.width,
            height: args.height,
            group_height: args.group_height,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Device;
    use std::path::PathBuf;

    #[test]
    fn config_follows_args() {
        let cli = Cli::parse_from([
            "seismo",
            "run",
            "a.mseed",
            "--window-minutes",
            "10",
            "--device",
            "cpu",
            "--dataset",
            "instance",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = pipeline_config_from_args(&args);
        assert_eq!(config.window_minutes, 10);
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.dataset, "instance");
        assert_eq!(config.filters, FilterSpec::defaults());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn summary_columns_match_a_loaded_run() {
        let models = ModelSet::load("stead", Device::Cpu).unwrap();
        let columns = builtin_summary_columns();
        assert_eq!(columns.models, models.names());
        assert_eq!(columns.detectors, models.detector_names());
    }

    #[test]
    fn image_listing_groups_by_variant() {
        let index = ImageIndex {
            original: vec![PathBuf::from("a_original_window0.png")],
            filtered: vec![("1-3Hz".into(), vec![PathBuf::from("a_1-3Hz_window0.png")])],
            comparison: Vec::new(),
        };
        let text = format_image_index(&index);
        assert!(text.starts_with("original (1)\n"));
        assert!(text.contains("1-3Hz (1)\n  a_1-3Hz_window0.png"));
        assert!(text.ends_with("comparison (0)\n"));
    }
}
