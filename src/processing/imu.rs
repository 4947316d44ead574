// src/processing/imu.rs
//! IMU conditioning per sensor and modality

use crate::config::constants::imu;
use crate::error::{PrepError, PrepResult};
use crate::processing::filters::{filtfilt, FilterSpec};
use crate::processing::normalize::{fill_for_filter, remask};
use crate::processing::rate_estimator::estimate_rate;
use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One inertial sensing modality, always three axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Accel,
    Gyro,
    Mag,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Accel, Modality::Gyro, Modality::Mag];

    pub fn axes(self) -> [&'static str; 3] {
        match self {
            Modality::Accel => imu::ACCEL_AXES,
            Modality::Gyro => imu::GYRO_AXES,
            Modality::Mag => imu::MAG_AXES,
        }
    }

    pub fn magnitude_name(self) -> &'static str {
        match self {
            Modality::Accel => imu::ACCEL_MAGNITUDE,
            Modality::Gyro => imu::GYRO_MAGNITUDE,
            Modality::Mag => imu::MAG_MAGNITUDE,
        }
    }

    pub fn lowpass(self) -> FilterSpec {
        let cutoff = match self {
            Modality::Accel => imu::ACCEL_LOWPASS_HZ,
            Modality::Gyro => imu::GYRO_LOWPASS_HZ,
            Modality::Mag => imu::MAG_LOWPASS_HZ,
        };
        FilterSpec::lowpass(cutoff, imu::LOWPASS_ORDER)
    }
}

/// Estimated rates of one sensor's three modalities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuRates {
    pub accel_hz: f64,
    pub gyro_hz: f64,
    pub mag_hz: f64,
}

impl ImuRates {
    pub fn get(&self, modality: Modality) -> f64 {
        match modality {
            Modality::Accel => self.accel_hz,
            Modality::Gyro => self.gyro_hz,
            Modality::Mag => self.mag_hz,
        }
    }
}

/// Column names of one sensor's modality axes
pub fn axis_columns(sensor_id: &str, modality: Modality) -> [String; 3] {
    modality.axes().map(|axis| format!("{}_{}", sensor_id, axis))
}

/// Estimate one modality's rate from the sensor's own three axes.
///
/// An undetermined rate falls back to `fallback` when given.
pub fn modality_rate(
    timeline: &Timeline,
    sensor_id: &str,
    modality: Modality,
    fallback: Option<f64>,
) -> PrepResult<f64> {
    let names = axis_columns(sensor_id, modality);
    let axes = names
        .iter()
        .map(|name| timeline.require(name))
        .collect::<PrepResult<Vec<_>>>()?;

    match estimate_rate(timeline.time(), &axes, imu::CHANGE_EPSILON) {
        Some(rate) => {
            debug!(sensor = sensor_id, ?modality, rate_hz = rate, "estimated modality rate");
            Ok(rate)
        }
        None => match fallback {
            Some(rate) => {
                warn!(sensor = sensor_id, ?modality, fallback_hz = rate, "rate undetermined, using fallback");
                Ok(rate)
            }
            None => Err(PrepError::RateUndetermined(format!("{} {:?}", sensor_id, modality))),
        },
    }
}

/// All three modality rates of one sensor
pub fn sensor_rates(timeline: &Timeline, sensor_id: &str, fallback: Option<f64>) -> PrepResult<ImuRates> {
    Ok(ImuRates {
        accel_hz: modality_rate(timeline, sensor_id, Modality::Accel, fallback)?,
        gyro_hz: modality_rate(timeline, sensor_id, Modality::Gyro, fallback)?,
        mag_hz: modality_rate(timeline, sensor_id, Modality::Mag, fallback)?,
    })
}

/// Zero-phase filter a channel with gaps.
///
/// Gaps are filled for the filter only; rows missing on input are missing
/// on output.
pub fn filter_masked(
    spec: &FilterSpec,
    sample_rate: f64,
    values: &[Option<f64>],
    channel: &str,
) -> PrepResult<Vec<Option<f64>>> {
    let Some(dense) = fill_for_filter(values) else {
        warn!(channel, "channel has no samples, left empty");
        return Ok(vec![None; values.len()]);
    };
    let filtered = filtfilt(spec, sample_rate, &dense).map_err(|e| PrepError::filter(channel, e))?;
    Ok(remask(filtered, values))
}
