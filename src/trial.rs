// src/trial.rs
//! Per-trial stage entry points and the batch runner
//!
//! Every stage takes the previous stage's table plus an explicit
//! [`TrialConfig`] and returns a new table. [`run_trial`] chains them and
//! attributes any failure to the stage it happened in.

use crate::acquisition::{drop_setup_time, read_shimmer_export, reconcile, sync_with_event, AlignmentStats, SyncConfig};
use crate::config::constants::paths;
use crate::config::{DurationSource, SetupBuffer, TrialConfig};
use crate::error::{PrepError, PrepResult, Stage, StageContext, TrialFailure};
use crate::labeling::{label_timeline, read_annotations, resolve_fps};
use crate::processing::{FeatureEngine, ImuRates};
use crate::storage::{read_timeline, write_timeline};
use crate::timeline::Timeline;
use crate::video::DurationProbe;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

/// Outcome of the merge stage
#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub timeline: Timeline,
    pub master: String,
    pub secondary: String,
    pub stats: AlignmentStats,
}

/// What a trial run did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub trial: PathBuf,
    pub master: Option<String>,
    pub secondary: Option<String>,
    pub alignment: Option<AlignmentStats>,
    /// Event marker onset on the merged time axis
    pub event_start_s: Option<f64>,
    pub trial_length_s: Option<f64>,
    pub setup_buffer_s: Option<f64>,
    pub fps: Option<f64>,
    pub emg_rate_hz: Option<f64>,
    pub imu_rates: BTreeMap<String, ImuRates>,
    /// Row count after each completed stage
    pub rows: Vec<(Stage, usize)>,
}

/// Final feature table of a completed trial
#[derive(Debug, Clone)]
pub struct TrialOutput {
    pub features: Timeline,
    pub report: TrialReport,
}

/// Read both raw exports and reconcile them onto one clock
#[instrument(skip_all, fields(trial = %config.trial_path.display()))]
pub fn merge_sensors(config: &TrialConfig) -> PrepResult<MergeOutput> {
    let [a, b] = config.sensors_used.as_slice() else {
        return Err(PrepError::config("sensors_used", "expected exactly two sensors"));
    };

    let stream_a = read_shimmer_export(&config.sensor_file(a), a)?;
    let stream_b = read_shimmer_export(&config.sensor_file(b), b)?;

    let sync = SyncConfig {
        tolerance_ms: config.tolerance_ms,
        keep_secondary_time: config.keep_secondary_time,
    };
    let merged = reconcile(stream_a, stream_b, &sync)?;
    let (master, secondary, stats) = (merged.master.clone(), merged.secondary.clone(), merged.stats);
    let timeline = merged.into_canonical(&config.sensors_used, config.keep_secondary_time)?;

    info!(
        master = %master,
        matched = stats.matched,
        unmatched = stats.unmatched,
        rows = timeline.len(),
        "merged sensors"
    );
    Ok(MergeOutput {
        timeline,
        master,
        secondary,
        stats,
    })
}

/// Trial length in seconds, probing the video when configured so
pub fn resolve_trial_length(config: &TrialConfig, probe: &dyn DurationProbe) -> PrepResult<f64> {
    match &config.trial_length {
        DurationSource::Seconds(seconds) => Ok(*seconds),
        DurationSource::Video(video) => probe.duration_seconds(&config.resolve(video)),
    }
}

/// Setup interval in seconds. A video source means the trial length minus
/// that video's duration.
pub fn resolve_setup_buffer(config: &TrialConfig, trial_length: f64, probe: &dyn DurationProbe) -> PrepResult<f64> {
    match &config.setup_buffer {
        SetupBuffer::Seconds(seconds) => Ok(*seconds),
        SetupBuffer::Video(video) => {
            let remaining = probe.duration_seconds(&config.resolve(video))?;
            let setup = trial_length - remaining;
            if setup < 0.0 {
                return Err(PrepError::invalid_data(
                    "setup buffer",
                    format!("video {} is longer than the trial ({:.3}s > {:.3}s)", video.display(), remaining, trial_length),
                ));
            }
            Ok(setup)
        }
    }
}

/// Label the trimmed timeline from the trial's annotation export
#[instrument(skip_all, fields(trial = %config.trial_path.display()))]
pub fn label_trial(timeline: &Timeline, config: &TrialConfig) -> PrepResult<(Timeline, f64)> {
    let intervals = read_annotations(&config.annotation_path(), config.participant_id.as_deref())?;
    let fps = resolve_fps(config.frame_rate, timeline)?;
    let labeled = label_timeline(timeline, &intervals, fps, config.interval_policy)?;
    Ok((labeled, fps))
}

fn persist(config: &TrialConfig, file: &str, timeline: &Timeline, always: bool) -> PrepResult<()> {
    if always || config.persist_intermediates {
        write_timeline(timeline, &config.output_dir().join(file))?;
    }
    Ok(())
}

/// Run every stage of one trial
#[instrument(skip_all, fields(trial = %config.trial_path.display()))]
pub fn run_trial(config: &TrialConfig, probe: &dyn DurationProbe) -> Result<TrialOutput, TrialFailure> {
    let trial = config.trial_path.as_path();
    let mut report = TrialReport {
        trial: trial.to_path_buf(),
        ..TrialReport::default()
    };

    let merged = merge_sensors(config).at_stage(trial, Stage::Merge)?;
    persist(config, paths::MERGED, &merged.timeline, false).at_stage(trial, Stage::Merge)?;
    report.master = Some(merged.master);
    report.secondary = Some(merged.secondary);
    report.alignment = Some(merged.stats);
    report.rows.push((Stage::Merge, merged.timeline.len()));

    let trial_length = resolve_trial_length(config, probe).at_stage(trial, Stage::Sync)?;
    let (synced, window) = sync_with_event(&merged.timeline, trial_length).at_stage(trial, Stage::Sync)?;
    persist(config, paths::SYNCED, &synced, false).at_stage(trial, Stage::Sync)?;
    report.trial_length_s = Some(trial_length);
    report.event_start_s = Some(window.start_time);
    report.rows.push((Stage::Sync, synced.len()));

    let output = continue_from_trimmed(config, probe, &synced, trial_length, report)?;
    info!(rows = output.features.len(), "trial complete");
    Ok(output)
}

/// Resume a trial from the table persisted by the stage before `stage`.
///
/// `Stage::Merge` is a full run.
#[instrument(skip_all, fields(trial = %config.trial_path.display(), stage = %stage))]
pub fn resume_trial(
    config: &TrialConfig,
    probe: &dyn DurationProbe,
    stage: Stage,
) -> Result<TrialOutput, TrialFailure> {
    let trial = config.trial_path.as_path();
    let mut report = TrialReport {
        trial: trial.to_path_buf(),
        ..TrialReport::default()
    };
    let load = |file: &str, stage: Stage| read_timeline(&config.output_dir().join(file)).at_stage(trial, stage);

    match stage {
        Stage::Merge => run_trial(config, probe),
        Stage::Sync => {
            let merged = load(paths::MERGED, Stage::Sync)?;
            let trial_length = resolve_trial_length(config, probe).at_stage(trial, Stage::Sync)?;
            let (synced, window) = sync_with_event(&merged, trial_length).at_stage(trial, Stage::Sync)?;
            persist(config, paths::SYNCED, &synced, false).at_stage(trial, Stage::Sync)?;
            report.trial_length_s = Some(trial_length);
            report.event_start_s = Some(window.start_time);
            report.rows.push((Stage::Sync, synced.len()));
            continue_from_trimmed(config, probe, &synced, trial_length, report)
        }
        Stage::Trim => {
            let synced = load(paths::SYNCED, Stage::Trim)?;
            let trial_length = resolve_trial_length(config, probe).at_stage(trial, Stage::Trim)?;
            report.trial_length_s = Some(trial_length);
            continue_from_trimmed(config, probe, &synced, trial_length, report)
        }
        Stage::Label => {
            let trimmed = load(paths::TRIMMED, Stage::Label)?;
            continue_from_labeling(config, &trimmed, report)
        }
        Stage::Features => {
            let labeled = load(paths::LABELED, Stage::Features)?;
            finish_features(config, &labeled, report)
        }
    }
}

fn continue_from_trimmed(
    config: &TrialConfig,
    probe: &dyn DurationProbe,
    synced: &Timeline,
    trial_length: f64,
    mut report: TrialReport,
) -> Result<TrialOutput, TrialFailure> {
    let trial = config.trial_path.as_path();

    let setup = resolve_setup_buffer(config, trial_length, probe).at_stage(trial, Stage::Trim)?;
    let trimmed = drop_setup_time(synced, setup).at_stage(trial, Stage::Trim)?;
    persist(config, paths::TRIMMED, &trimmed, false).at_stage(trial, Stage::Trim)?;
    report.setup_buffer_s = Some(setup);
    report.rows.push((Stage::Trim, trimmed.len()));

    continue_from_labeling(config, &trimmed, report)
}

fn continue_from_labeling(
    config: &TrialConfig,
    trimmed: &Timeline,
    mut report: TrialReport,
) -> Result<TrialOutput, TrialFailure> {
    let trial = config.trial_path.as_path();

    let (labeled, fps) = label_trial(trimmed, config).at_stage(trial, Stage::Label)?;
    persist(config, paths::LABELED, &labeled, false).at_stage(trial, Stage::Label)?;
    report.fps = Some(fps);
    report.rows.push((Stage::Label, labeled.len()));

    finish_features(config, &labeled, report)
}

fn finish_features(
    config: &TrialConfig,
    labeled: &Timeline,
    mut report: TrialReport,
) -> Result<TrialOutput, TrialFailure> {
    let trial = config.trial_path.as_path();

    let (features, feature_report) = FeatureEngine::from_config(config)
        .run(labeled)
        .at_stage(trial, Stage::Features)?;
    persist(config, paths::FINAL, &features, true).at_stage(trial, Stage::Features)?;
    report.emg_rate_hz = Some(feature_report.emg_rate_hz);
    report.imu_rates = feature_report.imu_rates;
    report.rows.push((Stage::Features, features.len()));

    Ok(TrialOutput { features, report })
}

/// Run independent trials in parallel. Results keep the input order.
pub fn run_trials(configs: &[TrialConfig], probe: &dyn DurationProbe) -> Vec<Result<TrialOutput, TrialFailure>> {
    let results: Vec<_> = configs.par_iter().map(|config| run_trial(config, probe)).collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        error!(trial = %failure.trial.display(), stage = %failure.stage, error = %failure.error, "trial failed");
    }
    if failed > 0 {
        warn!(total = configs.len(), failed, "batch finished with failures");
    } else {
        info!(total = configs.len(), "batch finished");
    }
    results
}
