//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - signal containers (`Trace`, `Stream`, `Variant`)
//! - model outputs (`Pick`, `Detection`)
//! - run configuration (`FilterSpec`, `PipelineConfig`, `Device`)
//! - timestamp helpers (`time`)

pub mod time;
pub mod types;

pub use types::*;
