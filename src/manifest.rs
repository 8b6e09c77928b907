//! Run manifest
//!
//! One JSON document per run recording the effective options, the inputs and
//! outputs, a summary and one action per image.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::PageImagesConfig;
use crate::pipeline::{ImageReport, RunRequest, RunStats};

/// Action name recorded for every image
pub const ACTION_NAME: &str = "page_images";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to write manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode manifest: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ManifestError>;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "no-matches")]
    NoMatches,
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestInputs {
    pub in_dir: PathBuf,
    pub glob: String,
    pub mode: String,
    pub files_found: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestOutputs {
    pub out_dir: PathBuf,
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary {
    #[serde(flatten)]
    pub stats: RunStats,
    pub output_dir: PathBuf,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One manifest action
#[derive(Debug, Clone, Serialize)]
pub struct ManifestAction {
    pub timestamp: DateTime<Utc>,
    pub action: &'static str,
    pub status: String,
    #[serde(flatten)]
    pub report: Option<ImageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Complete manifest document
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub tool: &'static str,
    pub version: &'static str,
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub dry_run: bool,
    pub options: PageImagesConfig,
    pub inputs: ManifestInputs,
    pub outputs: ManifestOutputs,
    pub summary: ManifestSummary,
    pub action_counts: BTreeMap<String, usize>,
    pub actions: Vec<ManifestAction>,
}

/// Collects actions during a run and writes the manifest at the end
#[derive(Debug)]
pub struct ManifestRecorder {
    command: String,
    started_at: DateTime<Utc>,
    dry_run: bool,
    options: PageImagesConfig,
    inputs: ManifestInputs,
    outputs: ManifestOutputs,
    actions: Vec<ManifestAction>,
}

impl ManifestRecorder {
    pub fn new(config: &PageImagesConfig, request: &RunRequest) -> Self {
        Self {
            command: request.command.clone(),
            started_at: Utc::now(),
            dry_run: request.dry_run,
            options: config.clone(),
            inputs: ManifestInputs {
                in_dir: request.in_dir.clone(),
                glob: config.glob.clone(),
                mode: config.mode.as_str().to_string(),
                files_found: 0,
            },
            outputs: ManifestOutputs {
                out_dir: request.out_dir.clone(),
                manifest: request.manifest_path(),
            },
            actions: Vec::new(),
        }
    }

    pub fn set_files_found(&mut self, count: usize) {
        self.inputs.files_found = count;
    }

    /// Record the outcome of one image
    pub fn add_report(&mut self, report: &ImageReport) {
        self.actions.push(ManifestAction {
            timestamp: Utc::now(),
            action: ACTION_NAME,
            status: report.status.as_str().to_string(),
            report: Some(report.clone()),
            error: None,
        });
    }

    /// Record a run-aborting error
    pub fn add_error(&mut self, message: &str) {
        self.actions.push(ManifestAction {
            timestamp: Utc::now(),
            action: ACTION_NAME,
            status: "error".to_string(),
            report: None,
            error: Some(message.to_string()),
        });
    }

    /// Actions per status
    pub fn action_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for action in &self.actions {
            *counts.entry(action.status.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Assemble the final document
    pub fn build(&self, stats: RunStats, status: RunStatus, error: Option<String>) -> Manifest {
        Manifest {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            command: self.command.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            dry_run: self.dry_run,
            options: self.options.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            summary: ManifestSummary {
                stats,
                output_dir: self.outputs.out_dir.clone(),
                status,
                error,
            },
            action_counts: self.action_counts(),
            actions: self.actions.clone(),
        }
    }

    /// Write the manifest as pretty JSON, creating the parent directory.
    pub fn write(
        &self,
        path: &Path,
        stats: RunStats,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<()> {
        let io_err = |source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.build(stats, status, error))?;
        std::fs::write(path, json).map_err(io_err)?;
        Ok(())
    }
}
