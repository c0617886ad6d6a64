//! Command-line parsing for the seismic batch processor.
//!
//! Argument parsing and dispatch stay separate from the pipeline: everything
//! here is converted into a `PipelineConfig` before any work starts.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Device;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "seismo", version, about = "Batch seismic phase detection over filtered waveform views")]
pub struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process waveform files: detect, write tables, render window images.
    Run(RunArgs),
    /// Rebuild summary_results.csv from existing tables.
    Summary(SummaryArgs),
    /// Write a synthetic three-component recording.
    Synth(SynthArgs),
    /// List the images generated for one input file.
    Images(ImagesArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Waveform files, processed in the given order.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Results root.
    #[arg(short, long, env = "SEISMO_OUTPUT", default_value = "results")]
    pub output: PathBuf,

    /// Create a fresh job folder (named by a UUID) under the results root.
    #[arg(long)]
    pub job_dir: bool,

    /// Window length for images, in minutes (1-1460).
    #[arg(short, long, env = "SEISMO_WINDOW_MINUTES", default_value_t = 2)]
    pub window_minutes: u32,

    /// Pretrained weight set for the models.
    #[arg(short, long, env = "SEISMO_DATASET", default_value = "stead")]
    pub dataset: String,

    /// Preferred inference device; falls back to cpu when unavailable.
    #[arg(long, env = "SEISMO_DEVICE", value_enum, default_value_t = Device::Cuda)]
    pub device: Device,

    /// Image width in pixels.
    #[arg(long, default_value_t = 2250)]
    pub width: u32,

    /// Height of a per-variant image in pixels.
    #[arg(long, default_value_t = 1050)]
    pub height: u32,

    /// Height of one variant group in comparison images, in pixels.
    #[arg(long, default_value_t = 900)]
    pub group_height: u32,

    /// Also write the run report as JSON.
    #[arg(long, value_name = "PATH")]
    pub report_json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SummaryArgs {
    /// Results root containing one folder per processed file.
    #[arg(short, long, env = "SEISMO_OUTPUT", default_value = "results")]
    pub output: PathBuf,

    /// Restrict to these inputs (default: every folder under the root).
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output waveform file.
    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 10.0)]
    pub minutes: f64,

    #[arg(long, default_value_t = 100.0)]
    pub sampling_rate: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// P arrival, seconds after the start.
    #[arg(long, default_value_t = 120.0)]
    pub p_arrival: f64,

    /// S arrival, seconds after the start.
    #[arg(long, default_value_t = 180.0)]
    pub s_arrival: f64,

    /// Station code written into the trace ids.
    #[arg(long, default_value = "SYN")]
    pub station: String,
}

#[derive(Debug, Args, Clone)]
pub struct ImagesArgs {
    #[arg(short, long, env = "SEISMO_OUTPUT", default_value = "results")]
    pub output: PathBuf,

    /// Input file (or its basename).
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["seismo", "run", "a.mseed", "b.mseed"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.window_minutes, 2);
        assert_eq!(args.device, Device::Cuda);
        assert!(!cli.verbose);
    }

    #[test]
    fn run_requires_files() {
        assert!(Cli::try_parse_from(["seismo", "run"]).is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["seismo", "summary", "--output", "out", "-v"]);
        assert!(cli.verbose);
    }
}
