// src/labeling/labeler.rs
//! Interval labeling of the trimmed timeline

use crate::config::constants::labeling;
use crate::config::FrameRate;
use crate::error::{PrepError, PrepResult};
use crate::labeling::AnnotationInterval;
use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which rows an interval covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Boundary {
    /// `start <= t <= end`
    Closed,
    /// `start <= t < end`
    #[default]
    HalfOpen,
}

impl Boundary {
    fn covers(self, t: f64, start: f64, end: f64) -> bool {
        match self {
            Boundary::Closed => start <= t && t <= end,
            Boundary::HalfOpen => start <= t && t < end,
        }
    }
}

/// How intervals are painted onto rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IntervalPolicy {
    #[serde(default)]
    pub boundary: Boundary,
    /// Overwrite the first and last covered row with `Start` / `End`
    #[serde(default)]
    pub mark_boundaries: bool,
}

impl IntervalPolicy {
    pub fn closed_with_marks() -> Self {
        Self {
            boundary: Boundary::Closed,
            mark_boundaries: true,
        }
    }
}

/// Frames per second for annotation conversion.
///
/// `TotalFrames` spreads the frame count over the timeline's time span.
pub fn resolve_fps(frame_rate: FrameRate, timeline: &Timeline) -> PrepResult<f64> {
    match frame_rate {
        FrameRate::Fps(fps) => Ok(fps),
        FrameRate::TotalFrames(frames) => {
            let time = timeline.time();
            let span = match (time.first(), time.last()) {
                (Some(first), Some(last)) => last - first,
                _ => 0.0,
            };
            if span <= 0.0 {
                return Err(PrepError::invalid_data(
                    "frame rate",
                    format!("cannot spread {} frames over a {:.3}s timeline", frames, span),
                ));
            }
            Ok(frames as f64 / span)
        }
    }
}

/// Paint interval labels onto a copy of `timeline`.
///
/// Intervals are applied in order and later ones overwrite earlier ones.
/// Rows outside every interval stay unlabeled.
pub fn label_timeline(
    timeline: &Timeline,
    intervals: &[AnnotationInterval],
    fps: f64,
    policy: IntervalPolicy,
) -> PrepResult<Timeline> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(PrepError::invalid_data("frame rate", format!("fps must be positive, got {}", fps)));
    }

    let mut labels: Vec<Option<String>> = vec![None; timeline.len()];
    let mut empty_intervals = 0usize;

    for interval in intervals {
        let (start, end) = interval.to_times(fps);
        let covered: Vec<usize> = timeline
            .time()
            .iter()
            .enumerate()
            .filter(|(_, &t)| policy.boundary.covers(t, start, end))
            .map(|(i, _)| i)
            .collect();

        let (Some(&first), Some(&last)) = (covered.first(), covered.last()) else {
            empty_intervals += 1;
            continue;
        };

        for &i in &covered {
            labels[i] = Some(interval.label.clone());
        }
        if policy.mark_boundaries {
            labels[first] = Some(labeling::START_SENTINEL.to_string());
            labels[last] = Some(labeling::END_SENTINEL.to_string());
        }
    }

    let labeled_rows = labels.iter().filter(|l| l.is_some()).count();
    if empty_intervals > 0 {
        debug!(empty_intervals, "some intervals cover no rows");
    }
    info!(
        intervals = intervals.len(),
        labeled_rows,
        fps,
        boundary = ?policy.boundary,
        "labeled timeline"
    );

    let mut labeled = timeline.clone();
    labeled.set_labels(labels)?;
    Ok(labeled)
}
