// src/acquisition/sample_sync.rs
//! Two-sensor clock reconciliation
//!
//! One sensor's clock becomes the master axis; the other sensor's samples are
//! snapped onto it by nearest timestamp within a tolerance. Unmatched master
//! rows carry `None` for every secondary channel.

use crate::acquisition::sensor_stream::{raw_column, sensor_column, SensorStream};
use crate::config::constants::{shimmer, sync};
use crate::error::{PrepError, PrepResult};
use crate::timeline::{Timeline, EVENT_MARKER_COLUMN};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Channel stem of the retained secondary timestamp in the canonical table
pub const SECONDARY_TIME: &str = "Time";

/// Reconciliation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Largest accepted |master - secondary| in milliseconds
    pub tolerance_ms: f64,
    /// Carry the matched secondary timestamp as a channel
    pub keep_secondary_time: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: sync::DEFAULT_TOLERANCE_MS,
            keep_secondary_time: false,
        }
    }
}

/// Which sensor's clock is authoritative, and whether its tail was clipped
#[derive(Debug, Clone, PartialEq)]
pub struct ClockPlan {
    pub master: String,
    pub secondary: String,
    /// Set when the master runs past the secondary's last sample
    pub clip_end: Option<f64>,
}

/// Match statistics for the secondary sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentStats {
    pub matched: usize,
    pub unmatched: usize,
}

impl AlignmentStats {
    pub fn match_ratio(&self) -> f64 {
        let total = self.matched + self.unmatched;
        if total == 0 {
            0.0
        } else {
            self.matched as f64 / total as f64
        }
    }
}

/// Master-clock table holding both sensors' channels
#[derive(Debug, Clone)]
pub struct MergedTimeline {
    pub master: String,
    pub secondary: String,
    /// Time axis is the master's Unix timestamp in milliseconds
    pub timeline: Timeline,
    pub stats: AlignmentStats,
}

/// Pick the master sensor from each sensor's `(start, end)` window.
///
/// The sensor that starts last is master. When it also ends first its window
/// is nested in the other's and is used as is; otherwise its tail is clipped
/// to the earliest end. Ties go to the sensor listed first.
pub fn select_master(windows: &[(String, f64, f64)]) -> PrepResult<ClockPlan> {
    let [first, second] = windows else {
        return Err(PrepError::invalid_data(
            "sensor windows",
            format!("expected exactly two sensors, got {}", windows.len()),
        ));
    };

    let mut latest_start = first;
    let mut earliest_end = first;
    for window in [first, second] {
        if window.1 > latest_start.1 {
            latest_start = window;
        }
        if window.2 < earliest_end.2 {
            earliest_end = window;
        }
    }

    let master = latest_start.0.clone();
    let clip_end = if latest_start.0 == earliest_end.0 {
        None
    } else {
        Some(earliest_end.2)
    };
    let secondary = if master == first.0 { second.0.clone() } else { first.0.clone() };

    Ok(ClockPlan {
        master,
        secondary,
        clip_end,
    })
}

/// For each master timestamp, the index of the nearest secondary timestamp
/// within `tolerance`. Both slices must be sorted ascending; on an exact tie
/// the earlier secondary sample wins.
pub fn nearest_within(master: &[f64], secondary: &[f64], tolerance: f64) -> Vec<Option<usize>> {
    master
        .iter()
        .map(|&t| {
            let split = secondary.partition_point(|&s| s <= t);
            let backward = split.checked_sub(1).map(|i| (i, t - secondary[i]));
            let forward = secondary.get(split).map(|&s| (split, s - t));

            let best = match (backward, forward) {
                (Some(b), Some(f)) => Some(if b.1 <= f.1 { b } else { f }),
                (b, f) => b.or(f),
            };
            best.filter(|&(_, delta)| delta <= tolerance).map(|(i, _)| i)
        })
        .collect()
}

/// Align two sensor streams onto one master clock
pub fn reconcile(a: SensorStream, b: SensorStream, config: &SyncConfig) -> PrepResult<MergedTimeline> {
    let windows = [&a, &b]
        .iter()
        .map(|s| {
            s.window()
                .map(|(start, end)| (s.sensor_id.clone(), start, end))
                .ok_or_else(|| PrepError::EmptyWindow(format!("loading sensor {}", s.sensor_id)))
        })
        .collect::<PrepResult<Vec<_>>>()?;

    let plan = select_master(&windows)?;
    info!(
        master = %plan.master,
        secondary = %plan.secondary,
        clip_end = ?plan.clip_end,
        "selected master clock"
    );

    let (master, secondary) = if plan.master == a.sensor_id { (a, b) } else { (b, a) };
    let mut master = master.sorted();
    if let Some(end) = plan.clip_end {
        master = master.clipped_to(end);
    }
    if master.timestamps.is_empty() {
        return Err(PrepError::EmptyWindow(format!(
            "sensor windows of {} and {} do not overlap",
            plan.master, plan.secondary
        )));
    }
    let secondary = secondary.sorted();

    align(master, secondary, config)
}

/// Nearest-neighbour alignment of `secondary` onto `master`'s clock
pub fn align(master: SensorStream, secondary: SensorStream, config: &SyncConfig) -> PrepResult<MergedTimeline> {
    let matches = nearest_within(&master.timestamps, &secondary.timestamps, config.tolerance_ms);
    let matched = matches.iter().filter(|m| m.is_some()).count();
    let stats = AlignmentStats {
        matched,
        unmatched: matches.len() - matched,
    };

    let master_marker = master.marker_channel().to_string();
    let secondary_marker = secondary.marker_channel().to_string();

    let mut timeline = Timeline::new(master.timestamps.clone());
    for channel in master.channels {
        let name = if channel.name == master_marker {
            EVENT_MARKER_COLUMN.to_string()
        } else {
            channel.name
        };
        timeline.insert_column(name, channel.values)?;
    }

    for channel in secondary.channels {
        if channel.name == secondary_marker {
            continue;
        }
        let name = if timeline.has_column(&channel.name) {
            sensor_column(&secondary.sensor_id, &channel.name)
        } else {
            channel.name
        };
        let values = matches
            .iter()
            .map(|m| m.and_then(|i| channel.values[i]))
            .collect();
        timeline.insert_column(name, values)?;
    }

    if config.keep_secondary_time {
        let values = matches
            .iter()
            .map(|m| m.map(|i| secondary.timestamps[i]))
            .collect();
        timeline.insert_column(raw_column(&secondary.sensor_id, shimmer::TIMESTAMP), values)?;
    }

    debug!(
        matched = stats.matched,
        unmatched = stats.unmatched,
        tolerance_ms = config.tolerance_ms,
        "aligned secondary sensor"
    );

    Ok(MergedTimeline {
        master: master.sensor_id,
        secondary: secondary.sensor_id,
        timeline,
        stats,
    })
}

impl MergedTimeline {
    /// Convert to the canonical trial table.
    ///
    /// The time axis becomes seconds since the first master sample, battery,
    /// status and sync-timestamp channels are dropped when present, and raw
    /// Shimmer channel names become `{sensor}_{Channel}`.
    ///
    /// With `keep_secondary_time` the matched secondary timestamp survives as
    /// `{secondary}_Time`, in seconds on the same origin as the time axis.
    pub fn into_canonical(self, sensors: &[String], keep_secondary_time: bool) -> PrepResult<Timeline> {
        let mut timeline = self.timeline;
        let origin = timeline.time().first().copied().unwrap_or(0.0);
        timeline.map_time(|t| (t - origin) / sync::MILLISECONDS_PER_SECOND);

        let secondary_time = raw_column(&self.secondary, shimmer::TIMESTAMP);
        if keep_secondary_time {
            if let Some(column) = timeline.take_column(&secondary_time) {
                let seconds = column
                    .values
                    .into_iter()
                    .map(|v| v.map(|t| (t - origin) / sync::MILLISECONDS_PER_SECOND))
                    .collect();
                timeline.insert_column(sensor_column(&self.secondary, SECONDARY_TIME), seconds)?;
            }
        }

        let drop: Vec<String> = sensors
            .iter()
            .flat_map(|id| {
                [shimmer::BATTERY, shimmer::STATUS, shimmer::TIMESTAMP]
                    .into_iter()
                    .map(move |stem| raw_column(id, stem))
            })
            .collect();
        timeline.drop_if_present(&drop);

        let renames: Vec<(String, String)> = sensors
            .iter()
            .flat_map(|id| {
                shimmer::CHANNEL_RENAMES
                    .iter()
                    .map(move |(raw, canonical)| (raw_column(id, raw), sensor_column(id, canonical)))
            })
            .collect();
        timeline.rename_if_present(&renames);

        Ok(timeline)
    }
}
