// src/labeling/annotations.rs
//! Label-Studio timeline annotation export

use crate::error::{PrepError, PrepResult};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// One labeled frame range. Frames are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationInterval {
    pub label: String,
    pub start_frame: i64,
    pub end_frame: i64,
}

impl AnnotationInterval {
    pub fn new(label: impl Into<String>, start_frame: i64, end_frame: i64) -> Self {
        Self {
            label: label.into(),
            start_frame,
            end_frame,
        }
    }

    /// `(start_time, end_time)` in seconds at the given frame rate
    pub fn to_times(&self, fps: f64) -> (f64, f64) {
        (
            (self.start_frame - 1) as f64 / fps,
            (self.end_frame - 1) as f64 / fps,
        )
    }
}

#[derive(Debug, Deserialize)]
struct Task {
    data: TaskData,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    #[serde(default)]
    video: String,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    result: Vec<AnnotationResult>,
}

#[derive(Debug, Deserialize)]
struct AnnotationResult {
    value: ResultValue,
}

#[derive(Debug, Deserialize)]
struct ResultValue {
    #[serde(default)]
    timelinelabels: Vec<String>,
    #[serde(default)]
    ranges: Vec<FrameRange>,
}

#[derive(Debug, Deserialize)]
struct FrameRange {
    start: i64,
    end: i64,
}

/// Read the annotation export at `path`
pub fn read_annotations(path: &Path, participant_id: Option<&str>) -> PrepResult<Vec<AnnotationInterval>> {
    let content = std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
    parse_annotations(&content, participant_id)
}

/// Extract intervals in export order.
///
/// With a participant id, tasks whose video reference does not contain it
/// are skipped. Results missing a label or a range are skipped.
pub fn parse_annotations(json: &str, participant_id: Option<&str>) -> PrepResult<Vec<AnnotationInterval>> {
    let tasks: Vec<Task> = serde_json::from_str(json)?;

    let mut intervals = Vec::new();
    let mut skipped_tasks = 0usize;
    for task in &tasks {
        if let Some(id) = participant_id {
            if !task.data.video.contains(id) {
                skipped_tasks += 1;
                continue;
            }
        }

        for result in task.annotations.iter().flat_map(|a| &a.result) {
            match (result.value.timelinelabels.first(), result.value.ranges.first()) {
                (Some(label), Some(range)) => {
                    intervals.push(AnnotationInterval::new(label.clone(), range.start, range.end));
                }
                _ => warn!(video = %task.data.video, "skipping annotation result without label or range"),
            }
        }
    }

    debug!(
        tasks = tasks.len(),
        skipped_tasks,
        intervals = intervals.len(),
        "parsed annotations"
    );
    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"[
        {
            "data": {"video": "/upload/1/P32_V2_trimmed.mp4"},
            "annotations": [{
                "result": [
                    {"value": {"timelinelabels": ["reach"], "ranges": [{"start": 1, "end": 121}]}},
                    {"value": {"timelinelabels": ["grasp"], "ranges": [{"start": 100, "end": 240}]}},
                    {"value": {"timelinelabels": [], "ranges": [{"start": 5, "end": 6}]}}
                ]
            }]
        },
        {
            "data": {"video": "/upload/1/P07_V1_trimmed.mp4"},
            "annotations": [{
                "result": [
                    {"value": {"timelinelabels": ["idle"], "ranges": [{"start": 1, "end": 50}]}}
                ]
            }]
        }
    ]"#;

    #[test]
    fn test_frame_conversion() {
        let interval = AnnotationInterval::new("reach", 1, 121);
        assert_eq!(interval.to_times(120.0), (0.0, 1.0));
    }

    #[test]
    fn test_participant_filter() {
        let intervals = parse_annotations(EXPORT, Some("P32_V2")).unwrap();
        assert_eq!(
            intervals,
            vec![
                AnnotationInterval::new("reach", 1, 121),
                AnnotationInterval::new("grasp", 100, 240),
            ]
        );
    }

    #[test]
    fn test_without_filter_keeps_all_tasks() {
        let intervals = parse_annotations(EXPORT, None).unwrap();
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[2].label, "idle");
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_annotations("{not json", None),
            Err(PrepError::Json(_))
        ));
    }
}
