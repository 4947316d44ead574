// src/processing/rate_estimator.rs
//! Sampling-rate inference from timestamped samples
//!
//! Capture grids often repeat the last reading faster than the sensor
//! updates. Only rows where some axis genuinely changes count as samples.

use ndarray::{s, Array2, Axis};

/// Median of a non-empty slice, averaging the two middle values for even lengths
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    })
}

fn rate_from_times(times: &[f64]) -> Option<f64> {
    let mut positive: Vec<f64> = times
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|dt| *dt > 0.0)
        .collect();
    median(&mut positive).map(|dt| 1.0 / dt)
}

/// Rate of a co-sampled channel group by change detection.
///
/// A row is a new reading when any channel moves by more than `epsilon`
/// from the previous row; a missing value on either side is not a change.
/// Returns `None` when fewer than two such rows exist.
pub fn estimate_rate(time: &[f64], channels: &[&[Option<f64>]], epsilon: f64) -> Option<f64> {
    let rows = time.len();
    if rows < 2 || channels.is_empty() || channels.iter().any(|c| c.len() != rows) {
        return None;
    }

    let samples = Array2::from_shape_fn((rows, channels.len()), |(i, j)| {
        channels[j][i].unwrap_or(f64::NAN)
    });
    let steps = &samples.slice(s![1.., ..]) - &samples.slice(s![..-1, ..]);
    let changed = steps.map_axis(Axis(1), |row| row.iter().any(|d| d.abs() > epsilon));

    let change_times: Vec<f64> = changed
        .iter()
        .zip(&time[1..])
        .filter(|(&c, _)| c)
        .map(|(_, &t)| t)
        .collect();

    if change_times.len() < 2 {
        return None;
    }
    rate_from_times(&change_times)
}

/// Rate of a fully sampled axis: `round(1 / median(positive dt))`
pub fn estimate_uniform_rate(time: &[f64]) -> Option<f64> {
    rate_from_times(time).map(f64::round).filter(|fs| *fs > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, rate: f64) -> Vec<f64> {
        (0..rows).map(|i| i as f64 / rate).collect()
    }

    #[test]
    fn test_oversampled_axis() {
        // 100 Hz grid, one axis updates every 4th row
        let time = grid(400, 100.0);
        let x: Vec<Option<f64>> = (0..400).map(|i| Some((i / 4) as f64)).collect();
        let y = vec![Some(1.0); 400];
        let z = vec![Some(-9.81); 400];

        let rate = estimate_rate(&time, &[&x, &y, &z], 1e-6).unwrap();
        assert!((rate - 25.0).abs() / 25.0 < 0.05, "rate {}", rate);
    }

    #[test]
    fn test_any_axis_counts() {
        let time = grid(100, 50.0);
        let x: Vec<Option<f64>> = (0..100).map(|i| Some((i / 2) as f64)).collect();
        let y: Vec<Option<f64>> = (0..100).map(|i| Some(((i + 1) / 2) as f64)).collect();

        // x and y change on alternate rows, so together every row is new
        let rate = estimate_rate(&time, &[&x, &y], 1e-6).unwrap();
        assert!((rate - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_constant_signal_is_undetermined() {
        let time = grid(50, 100.0);
        let flat = vec![Some(0.0); 50];
        assert_eq!(estimate_rate(&time, &[&flat], 1e-6), None);
    }

    #[test]
    fn test_single_change_is_undetermined() {
        let time = grid(10, 100.0);
        let mut step = vec![Some(0.0); 10];
        for v in step.iter_mut().skip(5) {
            *v = Some(1.0);
        }
        assert_eq!(estimate_rate(&time, &[&step], 1e-6), None);
    }

    #[test]
    fn test_gaps_are_not_changes() {
        let time = grid(8, 100.0);
        let x = vec![Some(0.0), None, Some(0.0), None, Some(0.0), Some(1.0), Some(2.0), Some(3.0)];
        let rate = estimate_rate(&time, &[&x], 1e-6).unwrap();
        assert!((rate - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_uniform_rate() {
        let mut time = grid(1000, 500.0);
        // a duplicated timestamp and a dropped sample do not move the median
        time[10] = time[9];
        time.remove(500);
        assert_eq!(estimate_uniform_rate(&time), Some(500.0));
        assert_eq!(estimate_uniform_rate(&[0.0]), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }
}
