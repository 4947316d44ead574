// src/acquisition/event_sync.rs
//! Event-marker cropping
//!
//! The trial starts where the event marker first goes high. The window runs
//! for the trial length from there, and a leading setup interval is dropped
//! afterwards. The time axis is re-zeroed after each crop.

use crate::error::{PrepError, PrepResult};
use crate::timeline::{Timeline, EVENT_MARKER_COLUMN};
use tracing::debug;

/// Closed time interval `[start_time, end_time]` on the pre-crop axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialWindow {
    pub start_time: f64,
    pub end_time: f64,
}

impl TrialWindow {
    pub fn contains(&self, t: f64) -> bool {
        self.start_time <= t && t <= self.end_time
    }
}

/// Time of the first row whose event marker is strictly positive
pub fn find_event_start(timeline: &Timeline) -> PrepResult<f64> {
    let marker = timeline.require(EVENT_MARKER_COLUMN)?;

    timeline
        .time()
        .iter()
        .zip(marker)
        .find(|(_, m)| matches!(m, Some(v) if *v > 0.0))
        .map(|(&t, _)| t)
        .ok_or_else(|| PrepError::NoEventMarker(EVENT_MARKER_COLUMN.to_string()))
}

/// Crop to `[event start, event start + trial_length]` and re-zero at the event
pub fn sync_with_event(timeline: &Timeline, trial_length: f64) -> PrepResult<(Timeline, TrialWindow)> {
    let start_time = find_event_start(timeline)?;
    let window = TrialWindow {
        start_time,
        end_time: start_time + trial_length,
    };

    let mut synced = timeline.retain_rows(|t| window.contains(t));
    if synced.is_empty() {
        return Err(PrepError::EmptyWindow(format!(
            "no rows between {:.3}s and {:.3}s",
            window.start_time, window.end_time
        )));
    }
    synced.rezero(start_time);

    debug!(
        start_time,
        trial_length,
        rows_before = timeline.len(),
        rows_kept = synced.len(),
        "cropped to event window"
    );
    Ok((synced, window))
}

/// Drop rows with `time <= setup_buffer` and re-zero at the first kept row
pub fn drop_setup_time(timeline: &Timeline, setup_buffer: f64) -> PrepResult<Timeline> {
    let mut trimmed = timeline.retain_rows(|t| t > setup_buffer);
    let Some(&origin) = trimmed.time().first() else {
        return Err(PrepError::EmptyWindow(format!(
            "setup buffer of {:.3}s covers the whole trial",
            setup_buffer
        )));
    };
    trimmed.rezero(origin);

    debug!(
        setup_buffer,
        rows_dropped = timeline.len() - trimmed.len(),
        rows_kept = trimmed.len(),
        "dropped setup interval"
    );
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Column;

    fn marked(time: Vec<f64>, marker: Vec<f64>) -> Timeline {
        let n = time.len();
        Timeline::with_columns(
            time,
            vec![
                Column::new(EVENT_MARKER_COLUMN, marker.into_iter().map(Some).collect()),
                Column::new("A5F2_EMG1", (0..n).map(|i| Some(i as f64)).collect()),
            ],
        )
        .unwrap()
    }

    fn assert_times(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{} != {}", a, e);
        }
    }

    #[test]
    fn test_event_window() {
        let timeline = marked(vec![0.0, 0.1, 0.2, 0.3, 0.4], vec![0.0, 0.0, 5.0, 5.0, 5.0]);

        let (synced, window) = sync_with_event(&timeline, 0.2).unwrap();

        assert_eq!(window.start_time, 0.2);
        assert_times(synced.time(), &[0.0, 0.1, 0.2]);
        assert_eq!(
            synced.column("A5F2_EMG1").unwrap(),
            &[Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn test_missing_marker_crossing() {
        let timeline = marked(vec![0.0, 0.1], vec![0.0, 0.0]);
        assert!(matches!(
            sync_with_event(&timeline, 1.0),
            Err(PrepError::NoEventMarker(_))
        ));
    }

    #[test]
    fn test_missing_marker_column() {
        let timeline = Timeline::new(vec![0.0, 0.1]);
        assert!(matches!(
            find_event_start(&timeline),
            Err(PrepError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_missing_marker_values_are_not_high() {
        let mut timeline = Timeline::new(vec![0.0, 0.1, 0.2]);
        timeline
            .insert_column(EVENT_MARKER_COLUMN, vec![None, Some(-1.0), Some(1.0)])
            .unwrap();
        assert_eq!(find_event_start(&timeline).unwrap(), 0.2);
    }

    #[test]
    fn test_drop_setup_time() {
        let timeline = marked(vec![0.0, 0.5, 1.0, 1.5, 2.0], vec![1.0; 5]);

        let trimmed = drop_setup_time(&timeline, 1.0).unwrap();

        // the row at exactly the buffer is dropped too
        assert_times(trimmed.time(), &[0.0, 0.5]);
        assert_eq!(trimmed.column("A5F2_EMG1").unwrap(), &[Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_setup_covers_everything() {
        let timeline = marked(vec![0.0, 0.5], vec![1.0; 2]);
        assert!(matches!(
            drop_setup_time(&timeline, 1.0),
            Err(PrepError::EmptyWindow(_))
        ));
    }
}
