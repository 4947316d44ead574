// src/error.rs
//! Unified error handling for trial preparation
//!
//! Every stage returns [`PrepError`]. The trial runner wraps it in a
//! [`TrialFailure`] tagged with the [`Stage`] that aborted, so a batch run can
//! report which trial failed where without retrying anything.

use crate::processing::filters::FilterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type PrepResult<T> = Result<T, PrepError>;

/// Unified error type for the preparation pipeline
#[derive(Debug, Error)]
pub enum PrepError {
    /// Filesystem failures while reading inputs or persisting stage tables
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed tabular input or output
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed annotation export
    #[error("Invalid annotation JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed TOML configuration
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration rejected by validation
    #[error("Invalid configuration for '{field}': {reason}")]
    Configuration { field: String, reason: String },

    /// A column the stage cannot work without is absent
    #[error("Required column '{0}' not found")]
    MissingColumn(String),

    /// The event marker never rises above zero
    #[error("Event marker '{0}' never goes high")]
    NoEventMarker(String),

    /// A crop removed every row
    #[error("No rows left after {0}")]
    EmptyWindow(String),

    /// Not enough genuine changes to infer a sampling rate
    #[error("Sampling rate for '{0}' could not be determined")]
    RateUndetermined(String),

    /// Filter construction rejected its parameters
    #[error("Filter design failed for '{channel}': {source}")]
    FilterDesign {
        channel: String,
        #[source]
        source: FilterError,
    },

    /// The external duration probe failed
    #[error("Video probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    /// Structurally invalid data handed to a stage
    #[error("Invalid data in {data_type}: {reason}")]
    InvalidData { data_type: String, reason: String },
}

impl PrepError {
    /// Wrap an I/O error with the path that caused it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PrepError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PrepError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_data(data_type: impl Into<String>, reason: impl Into<String>) -> Self {
        PrepError::InvalidData {
            data_type: data_type.into(),
            reason: reason.into(),
        }
    }

    pub fn filter(channel: impl Into<String>, source: FilterError) -> Self {
        PrepError::FilterDesign {
            channel: channel.into(),
            source,
        }
    }
}

/// Pipeline stages for failure attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Merge,
    Sync,
    Trim,
    Label,
    Features,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Merge => "merge",
            Stage::Sync => "sync",
            Stage::Trim => "trim",
            Stage::Label => "label",
            Stage::Features => "features",
        };
        f.write_str(name)
    }
}

/// A trial that aborted, with the stage it aborted in
#[derive(Debug, Error)]
#[error("trial {trial} failed at {stage} stage: {error}")]
pub struct TrialFailure {
    pub trial: PathBuf,
    pub stage: Stage,
    #[source]
    pub error: PrepError,
}

/// Attach a stage to a stage result
pub(crate) trait StageContext<T> {
    fn at_stage(self, trial: &std::path::Path, stage: Stage) -> Result<T, TrialFailure>;
}

impl<T> StageContext<T> for PrepResult<T> {
    fn at_stage(self, trial: &std::path::Path, stage: Stage) -> Result<T, TrialFailure> {
        self.map_err(|error| TrialFailure {
            trial: trial.to_path_buf(),
            stage,
            error,
        })
    }
}
