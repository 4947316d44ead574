// src/config/mod.rs
//! Trial configuration
//!
//! One [`TrialConfig`] value describes everything a pipeline run needs. There
//! are no process-wide settings: every stage receives the config explicitly.

pub mod constants;
pub mod loader;

pub use loader::ConfigLoader;

use crate::error::{PrepError, PrepResult};
use crate::labeling::IntervalPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration of one trial
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrialConfig {
    /// Directory holding the raw sensor exports, videos and annotations
    pub trial_path: PathBuf,

    /// Where stage tables are written; defaults to `trial_path`
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Restricts annotations to tasks whose video reference contains this id
    #[serde(default)]
    pub participant_id: Option<String>,

    /// Exactly two sensor ids, e.g. `["A5F2", "A19E"]`
    pub sensors_used: Vec<String>,

    #[serde(default = "defaults::tolerance_ms")]
    pub tolerance_ms: f64,

    #[serde(default)]
    pub keep_secondary_time: bool,

    pub trial_length: DurationSource,

    pub setup_buffer: SetupBuffer,

    #[serde(default = "defaults::frame_rate")]
    pub frame_rate: FrameRate,

    #[serde(default = "defaults::annotation_file")]
    pub annotation_file: PathBuf,

    #[serde(default)]
    pub interval_policy: IntervalPolicy,

    #[serde(default = "defaults::dynamic_accel_rate")]
    pub dynamic_accel_rate: DynamicAccelRate,

    /// Used for an IMU modality whose rate cannot be estimated
    #[serde(default)]
    pub imu_fallback_rate_hz: Option<f64>,

    #[serde(default = "defaults::persist_intermediates")]
    pub persist_intermediates: bool,
}

/// Length of the trial window after the event marker goes high
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    Seconds(f64),
    /// Duration of the stage-one trimmed video
    Video(PathBuf),
}

/// Setup interval dropped from the start of the synced window
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SetupBuffer {
    Seconds(f64),
    /// Trial length minus the duration of this (stage-two) video
    Video(PathBuf),
}

/// How annotation frame indices map to seconds
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FrameRate {
    Fps(f64),
    /// Frames spanning the trimmed timeline; `fps = frames / duration`
    TotalFrames(u64),
}

/// Rate the accelerometer gravity-removal high-pass is designed for
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DynamicAccelRate {
    Fixed(f64),
    Estimated,
}

/// A set of trials, one `[[trial]]` table each
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BatchConfig {
    #[serde(rename = "trial", default)]
    pub trials: Vec<TrialConfig>,
}

impl TrialConfig {
    /// Minimal config with defaults for everything but the trial inputs
    pub fn new(
        trial_path: impl Into<PathBuf>,
        sensors_used: [&str; 2],
        trial_length: DurationSource,
        setup_buffer: SetupBuffer,
    ) -> Self {
        Self {
            trial_path: trial_path.into(),
            output_path: None,
            participant_id: None,
            sensors_used: sensors_used.iter().map(|s| s.to_string()).collect(),
            tolerance_ms: defaults::tolerance_ms(),
            keep_secondary_time: false,
            trial_length,
            setup_buffer,
            frame_rate: defaults::frame_rate(),
            annotation_file: defaults::annotation_file(),
            interval_policy: IntervalPolicy::default(),
            dynamic_accel_rate: defaults::dynamic_accel_rate(),
            imu_fallback_rate_hz: None,
            persist_intermediates: defaults::persist_intermediates(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        self.output_path.as_deref().unwrap_or(&self.trial_path)
    }

    /// Raw export for one sensor: `<trial_path>/<id>.csv`
    pub fn sensor_file(&self, sensor_id: &str) -> PathBuf {
        self.trial_path
            .join(sensor_id)
            .with_extension(constants::paths::RAW_EXTENSION)
    }

    pub fn annotation_path(&self) -> PathBuf {
        self.resolve(&self.annotation_file)
    }

    /// Resolve a trial-relative path
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.trial_path.join(path)
        }
    }
}

/// Validate a trial configuration
pub fn validate_trial_config(config: &TrialConfig) -> PrepResult<()> {
    match config.sensors_used.as_slice() {
        [a, b] if a != b && !a.is_empty() && !b.is_empty() => {}
        _ => {
            return Err(PrepError::config(
                "sensors_used",
                format!("expected two distinct sensor ids, got {:?}", config.sensors_used),
            ))
        }
    }

    if !(config.tolerance_ms.is_finite() && config.tolerance_ms > 0.0) {
        return Err(PrepError::config("tolerance_ms", "must be a positive number of milliseconds"));
    }

    if let DurationSource::Seconds(seconds) = config.trial_length {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(PrepError::config("trial_length", "must be positive"));
        }
    }

    if let SetupBuffer::Seconds(seconds) = config.setup_buffer {
        if !(seconds.is_finite() && seconds >= 0.0) {
            return Err(PrepError::config("setup_buffer", "cannot be negative"));
        }
    }

    match config.frame_rate {
        FrameRate::Fps(fps) if !(fps.is_finite() && fps > 0.0) => {
            return Err(PrepError::config("frame_rate", "fps must be positive"));
        }
        FrameRate::TotalFrames(0) => {
            return Err(PrepError::config("frame_rate", "total_frames must be positive"));
        }
        _ => {}
    }

    if let DynamicAccelRate::Fixed(rate) = config.dynamic_accel_rate {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(PrepError::config("dynamic_accel_rate", "fixed rate must be positive"));
        }
    }

    if let Some(rate) = config.imu_fallback_rate_hz {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(PrepError::config("imu_fallback_rate_hz", "must be positive"));
        }
    }

    Ok(())
}

/// Default value providers using constants
mod defaults {
    use super::{DynamicAccelRate, FrameRate};
    use crate::config::constants::*;
    use std::path::PathBuf;

    pub fn tolerance_ms() -> f64 { sync::DEFAULT_TOLERANCE_MS }
    pub fn frame_rate() -> FrameRate { FrameRate::Fps(labeling::DEFAULT_FPS) }
    pub fn annotation_file() -> PathBuf { PathBuf::from(labeling::DEFAULT_ANNOTATION_FILE) }
    pub fn dynamic_accel_rate() -> DynamicAccelRate { DynamicAccelRate::Fixed(imu::DYNAMIC_ASSUMED_RATE_HZ) }
    pub fn persist_intermediates() -> bool { true }
}
