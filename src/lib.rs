//! EMG-Prep: offline preparation of wearable EMG/IMU trials
//!
//! Turns two independently clocked Shimmer recordings and a frame-indexed
//! annotation export into one time-aligned, filtered and labeled feature
//! table per trial. It provides:
//!
//! - Two-sensor clock reconciliation with nearest-neighbour matching
//! - Event-marker cropping against the trial video
//! - Interval labeling from Label-Studio exports
//! - Zero-phase EMG and IMU feature chains
//! - Parallel batch runs over independent trials
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use emg_prep::config::ConfigLoader;
//! use emg_prep::video::FfprobeProbe;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new("trial.toml").load_trial_config()?;
//!     let output = emg_prep::run_trial(&config, &FfprobeProbe::default())?;
//!
//!     println!("{} rows, EMG at {:?} Hz", output.features.len(), output.report.emg_rate_hz);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod labeling;
pub mod processing;
pub mod storage;
pub mod timeline;
pub mod trial;
pub mod video;

// Re-export commonly used types for convenience
pub use config::{ConfigLoader, TrialConfig};
pub use error::{PrepError, PrepResult, Stage, TrialFailure};
pub use timeline::{Column, Timeline};
pub use trial::{resume_trial, run_trial, run_trials, TrialOutput, TrialReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Offline EMG/IMU trial preparation".to_string(),
        features: vec![
            "Two-sensor clock reconciliation".to_string(),
            "Event-marker video sync".to_string(),
            "Annotation labeling".to_string(),
            "Zero-phase EMG and IMU features".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }
}
