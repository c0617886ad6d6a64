//! One submitted batch and its progress.
//!
//! A `Job` is plain context passed to the pipeline; nothing about it is global.
//! Whoever runs jobs in the background owns the `JobProgress` values and
//! answers status queries from them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::app::pipeline::process_files;
use crate::domain::PipelineConfig;
use crate::error::{PipelineError, WriteError};
use crate::models::ModelSet;
use crate::report::ProcessingReport;

/// Progress snapshot of a job, updated at file granularity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: usize,
    pub total: usize,
    pub message: String,
    /// Whole percent, 0 when there is nothing to do.
    pub percentage: u8,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgress {
    pub fn update(&mut self, current: usize, total: usize, message: &str) {
        self.current = current;
        self.total = total;
        self.message = message.to_string();
        self.percentage = if total > 0 {
            ((current.min(total) * 100) / total) as u8
        } else {
            0
        };
        self.completed = current >= total;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.message = message.clone();
        self.error = Some(message);
        self.percentage = 0;
        self.completed = true;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub inputs: Vec<PathBuf>,
    /// Results root owned by this job.
    pub root: PathBuf,
    pub config: PipelineConfig,
}

impl Job {
    /// New job with its own results root `<base>/<id>`.
    pub fn new(inputs: Vec<PathBuf>, base: &Path, config: PipelineConfig) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            inputs,
            root: base.join(id.to_string()),
            config,
        }
    }

    /// New job writing into an explicit results root.
    pub fn with_root(inputs: Vec<PathBuf>, root: PathBuf, config: PipelineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            inputs,
            root,
            config,
        }
    }

    pub fn run(&self, models: &ModelSet, progress: &mut JobProgress) -> Result<ProcessingReport, PipelineError> {
        info!(job = %self.id, files = self.inputs.len(), "job started");
        progress.update(0, self.inputs.len(), "Starting");

        let result = process_files(&self.inputs, &self.root, &self.config, models, &mut |c, t, m| {
            progress.update(c, t, m)
        });
        if let Err(e) = &result {
            progress.fail(e.to_string());
        }
        result
    }

    /// Remove everything the job wrote.
    pub fn cleanup(&self) -> Result<(), WriteError> {
        if !self.root.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&self.root).map_err(|source| WriteError::Io {
            path: self.root.clone(),
            source,
        })?;
        info!(job = %self.id, "job output removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Device;
    use tempfile::TempDir;

    #[test]
    fn progress_percentage_and_completion() {
        let mut p = JobProgress::default();
        p.update(1, 4, "Processing a");
        assert_eq!(p.percentage, 25);
        assert!(!p.completed);
        p.update(4, 4, "done");
        assert_eq!(p.percentage, 100);
        assert!(p.completed);

        p.update(0, 0, "nothing");
        assert_eq!(p.percentage, 0);
        assert!(p.completed);
    }

    #[test]
    fn job_root_is_namespaced_and_cleanup_removes_it() {
        let base = TempDir::new().unwrap();
        let job = Job::new(Vec::new(), base.path(), PipelineConfig::default());
        assert_eq!(job.root, base.path().join(job.id.to_string()));

        let models = ModelSet::load("stead", Device::Cpu).unwrap();
        let mut progress = JobProgress::default();
        let report = job.run(&models, &mut progress).unwrap();
        assert_eq!(report.total_files, 0);
        assert!(progress.completed);
        assert!(progress.error.is_none());
        assert!(job.root.is_dir());

        job.cleanup().unwrap();
        assert!(!job.root.exists());
        job.cleanup().unwrap();
    }

    #[test]
    fn failed_run_is_recorded() {
        let base = TempDir::new().unwrap();
        let config = PipelineConfig {
            window_minutes: 5000,
            ..PipelineConfig::default()
        };
        let job = Job::new(Vec::new(), base.path(), config);
        let models = ModelSet::load("stead", Device::Cpu).unwrap();
        let mut progress = JobProgress::default();
        assert!(job.run(&models, &mut progress).is_err());
        assert!(progress.completed);
        assert!(progress.error.unwrap().contains("window length"));
    }
}
