//! `seismo-batch` library crate.
//!
//! The binary (`seismo`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - a job runner other than the CLI can drive `Job` directly

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod filter;
pub mod io;
pub mod job;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
