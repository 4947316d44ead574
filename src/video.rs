// src/video.rs
//! Video duration probing

use crate::error::{PrepError, PrepResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Something that knows how long a video is
pub trait DurationProbe: Send + Sync {
    fn duration_seconds(&self, path: &Path) -> PrepResult<f64>;
}

/// Asks `ffprobe` for the first video stream's duration
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffprobe"),
        }
    }
}

impl FfprobeProbe {
    /// Use a specific ffprobe binary instead of the one on `PATH`
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl DurationProbe for FfprobeProbe {
    fn duration_seconds(&self, path: &Path) -> PrepResult<f64> {
        let probe_error = |reason: String| PrepError::Probe {
            path: path.to_path_buf(),
            reason,
        };

        let output = Command::new(&self.binary)
            .args(["-v", "error", "-select_streams", "v:0", "-show_entries", "stream=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .output()
            .map_err(|e| probe_error(format!("failed to run {}: {}", self.binary.display(), e)))?;

        if !output.status.success() {
            return Err(probe_error(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let seconds = parse_duration(&String::from_utf8_lossy(&output.stdout)).map_err(probe_error)?;
        debug!(path = %path.display(), seconds, "probed video duration");
        Ok(seconds)
    }
}

/// Durations known in advance, keyed by path
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    durations: HashMap<PathBuf, f64>,
}

impl FixedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, seconds: f64) -> Self {
        self.durations.insert(path.into(), seconds);
        self
    }
}

impl DurationProbe for FixedProbe {
    fn duration_seconds(&self, path: &Path) -> PrepResult<f64> {
        self.durations.get(path).copied().ok_or_else(|| PrepError::Probe {
            path: path.to_path_buf(),
            reason: "no duration registered".to_string(),
        })
    }
}

fn parse_duration(stdout: &str) -> Result<f64, String> {
    let text = stdout.trim();
    text.parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s > 0.0)
        .ok_or_else(|| format!("unusable duration output '{}'", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("492.710000\n"), Ok(492.71));
        assert!(parse_duration("N/A\n").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-1").is_err());
    }

    #[test]
    fn test_fixed_probe() {
        let probe = FixedProbe::new().with("/data/P01/trimmed_stage1.mp4", 300.0);
        assert_eq!(probe.duration_seconds(Path::new("/data/P01/trimmed_stage1.mp4")).unwrap(), 300.0);
        assert!(matches!(
            probe.duration_seconds(Path::new("/data/P01/other.mp4")),
            Err(PrepError::Probe { .. })
        ));
    }

    #[test]
    fn test_missing_binary() {
        let probe = FfprobeProbe::with_binary("/nonexistent/ffprobe");
        assert!(matches!(
            probe.duration_seconds(Path::new("video.mp4")),
            Err(PrepError::Probe { .. })
        ));
    }
}
