// src/processing/pipeline.rs
//! Feature engine: the fixed EMG and IMU chains over a labeled timeline

use crate::config::constants::{emg, imu, normalize as norm};
use crate::config::{DynamicAccelRate, TrialConfig};
use crate::error::{PrepError, PrepResult};
use crate::processing::emg::EmgChain;
use crate::processing::filters::FilterSpec;
use crate::processing::imu::{filter_masked, sensor_rates, ImuRates, Modality};
use crate::processing::normalize::{magnitude, zscore};
use crate::processing::rate_estimator::estimate_uniform_rate;
use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Transform that produced a derived channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Filtered,
    Envelope,
    Dynamic,
    Magnitude,
    ZScore,
}

impl Transform {
    fn suffix(self) -> &'static str {
        match self {
            Transform::Filtered | Transform::Magnitude => "",
            Transform::Envelope => emg::ENVELOPE_SUFFIX,
            Transform::Dynamic => imu::DYNAMIC_SUFFIX,
            Transform::ZScore => norm::ZSCORE_SUFFIX,
        }
    }
}

/// A derived channel keyed by sensor, base channel and transform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureChannel {
    pub sensor_id: String,
    pub base: String,
    pub transform: Transform,
}

impl FeatureChannel {
    pub fn new(sensor_id: &str, base: &str, transform: Transform) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            base: base.to_string(),
            transform,
        }
    }

    /// Column name in the feature table, e.g. `A5F2_EMG1_ENV` or `A5F2_AccelMag_Z`
    pub fn column_name(&self) -> String {
        format!("{}_{}{}", self.sensor_id, self.base, self.transform.suffix())
    }

    /// The same base channel under another transform
    pub fn with_transform(&self, transform: Transform) -> Self {
        Self {
            transform,
            ..self.clone()
        }
    }
}

/// Settings the feature chains take from the trial configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSettings {
    pub sensors: Vec<String>,
    pub dynamic_accel_rate: DynamicAccelRate,
    pub imu_fallback_rate_hz: Option<f64>,
}

impl FeatureSettings {
    pub fn from_config(config: &TrialConfig) -> Self {
        Self {
            sensors: config.sensors_used.clone(),
            dynamic_accel_rate: config.dynamic_accel_rate,
            imu_fallback_rate_hz: config.imu_fallback_rate_hz,
        }
    }
}

/// Rates the chains ran at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub emg_rate_hz: f64,
    pub imu_rates: BTreeMap<String, ImuRates>,
}

/// Runs the EMG chain then the IMU chain
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    settings: FeatureSettings,
}

impl FeatureEngine {
    pub fn new(settings: FeatureSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &TrialConfig) -> Self {
        Self::new(FeatureSettings::from_config(config))
    }

    /// Produce the final feature table from a labeled timeline
    #[instrument(skip_all, fields(rows = timeline.len()))]
    pub fn run(&self, timeline: &Timeline) -> PrepResult<(Timeline, FeatureReport)> {
        let mut features = timeline.clone();
        let emg_rate_hz = self.apply_emg(&mut features)?;
        let imu_rates = self.apply_imu(&mut features)?;

        info!(emg_rate_hz, sensors = imu_rates.len(), "feature extraction complete");
        Ok((features, FeatureReport { emg_rate_hz, imu_rates }))
    }

    /// Band-pass and envelope every EMG channel; returns the EMG rate
    pub fn apply_emg(&self, timeline: &mut Timeline) -> PrepResult<f64> {
        let rate = estimate_uniform_rate(timeline.time())
            .ok_or_else(|| PrepError::RateUndetermined("EMG time axis".to_string()))?;

        let chain = EmgChain::for_sample_rate(rate);
        let filters = chain
            .design(rate)
            .map_err(|e| PrepError::filter("EMG", e))?;
        info!(rate_hz = rate, notches = filters.notch_count(), "designed EMG chain");

        for sensor in &self.settings.sensors {
            for &channel in emg::CHANNELS {
                let filtered = FeatureChannel::new(sensor, channel, Transform::Filtered);
                let envelope = FeatureChannel::new(sensor, channel, Transform::Envelope);

                let output = filters.apply(timeline.require(&filtered.column_name())?);
                timeline.insert_column(filtered.column_name(), output.filtered)?;
                timeline.insert_column(envelope.column_name(), output.envelope)?;
            }
        }
        Ok(rate)
    }

    /// Low-pass, dynamic component, magnitudes and z-scores for every sensor
    pub fn apply_imu(&self, timeline: &mut Timeline) -> PrepResult<BTreeMap<String, ImuRates>> {
        let sensors = &self.settings.sensors;

        let mut rates = BTreeMap::new();
        for sensor in sensors {
            let sensor_rate = sensor_rates(timeline, sensor, self.settings.imu_fallback_rate_hz)?;
            info!(
                sensor = %sensor,
                accel_hz = sensor_rate.accel_hz,
                gyro_hz = sensor_rate.gyro_hz,
                mag_hz = sensor_rate.mag_hz,
                "estimated IMU rates"
            );
            rates.insert(sensor.clone(), sensor_rate);
        }

        let dynamic = FilterSpec::highpass(imu::DYNAMIC_HIGHPASS_HZ, imu::DYNAMIC_HIGHPASS_ORDER);
        for modality in Modality::ALL {
            for sensor in sensors {
                let rate = rates[sensor].get(modality);
                let spec = modality.lowpass();

                for axis in modality.axes() {
                    let filtered = FeatureChannel::new(sensor, axis, Transform::Filtered);
                    let name = filtered.column_name();
                    let smoothed = filter_masked(&spec, rate, timeline.require(&name)?, &name)?;
                    timeline.insert_column(name.clone(), smoothed)?;

                    if modality == Modality::Accel {
                        let dynamic_rate = match self.settings.dynamic_accel_rate {
                            DynamicAccelRate::Fixed(hz) => hz,
                            DynamicAccelRate::Estimated => rate,
                        };
                        let values = filter_masked(&dynamic, dynamic_rate, timeline.require(&name)?, &name)?;
                        timeline.insert_column(filtered.with_transform(Transform::Dynamic).column_name(), values)?;
                    }
                }
            }
        }

        for sensor in sensors {
            for modality in Modality::ALL {
                let [x, y, z] = modality
                    .axes()
                    .map(|axis| FeatureChannel::new(sensor, axis, Transform::Filtered).column_name());
                let values = magnitude([timeline.require(&x)?, timeline.require(&y)?, timeline.require(&z)?]);
                let channel = FeatureChannel::new(sensor, modality.magnitude_name(), Transform::Magnitude);
                timeline.insert_column(channel.column_name(), values)?;
            }
        }

        let mut normalized: Vec<FeatureChannel> = Modality::ALL
            .into_iter()
            .flat_map(move |m| {
                sensors
                    .iter()
                    .flat_map(move |s| m.axes().map(|axis| FeatureChannel::new(s, axis, Transform::Filtered)))
            })
            .collect();
        normalized.extend(sensors.iter().flat_map(|s| {
            Modality::ALL
                .into_iter()
                .map(move |m| FeatureChannel::new(s, m.magnitude_name(), Transform::Magnitude))
        }));

        for channel in normalized {
            let values = zscore(timeline.require(&channel.column_name())?);
            timeline.insert_column(channel.with_transform(Transform::ZScore).column_name(), values)?;
        }

        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::imu::axis_columns;
    use crate::timeline::Column;
    use std::f64::consts::PI;

    const FS: f64 = 500.0;

    fn synthetic(sensors: &[&str], rows: usize) -> Timeline {
        let time: Vec<f64> = (0..rows).map(|i| i as f64 / FS).collect();
        let mut columns = Vec::new();
        for (s, sensor) in sensors.iter().enumerate() {
            for (k, channel) in emg::CHANNELS.iter().enumerate() {
                let f = 80.0 + 10.0 * (k + s) as f64;
                let values = time.iter().map(|t| Some((2.0 * PI * f * t).sin())).collect();
                columns.push(Column::new(format!("{}_{}", sensor, channel), values));
            }
            for modality in Modality::ALL {
                for (k, name) in axis_columns(sensor, modality).into_iter().enumerate() {
                    // IMU holds each reading for 5 rows: 100 Hz
                    let values = (0..rows)
                        .map(|i| Some((2.0 * PI * 1.5 * (i / 5) as f64 / 100.0 + k as f64).sin() + 9.81))
                        .collect();
                    columns.push(Column::new(name, values));
                }
            }
        }
        Timeline::with_columns(time, columns).unwrap()
    }

    fn settings(sensors: &[&str]) -> FeatureSettings {
        FeatureSettings {
            sensors: sensors.iter().map(|s| s.to_string()).collect(),
            dynamic_accel_rate: DynamicAccelRate::Fixed(imu::DYNAMIC_ASSUMED_RATE_HZ),
            imu_fallback_rate_hz: None,
        }
    }

    #[test]
    fn test_column_names() {
        assert_eq!(FeatureChannel::new("A5F2", "EMG1", Transform::Envelope).column_name(), "A5F2_EMG1_ENV");
        assert_eq!(FeatureChannel::new("A5F2", "AccelX", Transform::Dynamic).column_name(), "A5F2_AccelX_DYN");
        assert_eq!(FeatureChannel::new("A19E", "GyroMag", Transform::Magnitude).column_name(), "A19E_GyroMag");
        assert_eq!(FeatureChannel::new("A19E", "MagnetMag", Transform::ZScore).column_name(), "A19E_MagnetMag_Z");
    }

    #[test]
    fn test_full_feature_table() {
        let sensors = ["A5F2", "A19E"];
        let timeline = synthetic(&sensors, 3000);
        let (features, report) = FeatureEngine::new(settings(&sensors)).run(&timeline).unwrap();

        assert_eq!(report.emg_rate_hz, FS);
        for sensor in sensors {
            let rates = report.imu_rates[sensor];
            assert!((rates.accel_hz - 100.0).abs() < 1.0);
            assert!((rates.mag_hz - 100.0).abs() < 1.0);

            for name in ["EMG1_ENV", "EMG2_ENV", "AccelX_DYN", "AccelMag", "GyroMag", "MagnetMag", "MagX_Z", "AccelMag_Z"] {
                assert!(features.has_column(&format!("{}_{}", sensor, name)), "missing {}_{}", sensor, name);
            }
            assert!(!features.has_column(&format!("{}_EMG1_Z", sensor)));
            assert!(!features.has_column(&format!("{}_AccelX_DYN_Z", sensor)));
        }

        // z-scored channels are centred with unit sample deviation
        let z = features.column("A5F2_GyroY_Z").unwrap();
        let (mean, std) = crate::processing::normalize::mean_std(z).unwrap();
        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-6);

        // the dynamic component has no gravity offset
        let dynamic = features.column("A19E_AccelZ_DYN").unwrap();
        let mean_dyn = dynamic.iter().flatten().sum::<f64>() / dynamic.len() as f64;
        assert!(mean_dyn.abs() < 0.2, "dynamic mean {}", mean_dyn);
    }

    #[test]
    fn test_missing_emg_channel() {
        let timeline = synthetic(&["A5F2"], 1000);
        let result = FeatureEngine::new(settings(&["A5F2", "A19E"])).run(&timeline);
        assert!(matches!(result, Err(PrepError::MissingColumn(name)) if name == "A19E_EMG1"));
    }

    #[test]
    fn test_estimated_dynamic_rate() {
        let sensors = ["A5F2"];
        let timeline = synthetic(&sensors, 2000);
        let mut cfg = settings(&sensors);
        cfg.dynamic_accel_rate = DynamicAccelRate::Estimated;

        let (estimated, report) = FeatureEngine::new(cfg).run(&timeline).unwrap();
        let (fixed, _) = FeatureEngine::new(settings(&sensors)).run(&timeline).unwrap();
        assert!((report.imu_rates["A5F2"].accel_hz - 100.0).abs() < 1.0);

        // 0.3 Hz designed at 100 Hz instead of 50 Hz: the same samples give a different output
        let a = estimated.column("A5F2_AccelY_DYN").unwrap();
        let b = fixed.column("A5F2_AccelY_DYN").unwrap();
        let max_diff = a
            .iter()
            .zip(b)
            .filter_map(|(x, y)| Some((x.as_ref()? - y.as_ref()?).abs()))
            .fold(0.0, f64::max);
        assert!(max_diff > 1e-3, "dynamic outputs differ by only {}", max_diff);

        // low-pass outputs do not depend on the dynamic rate
        assert_eq!(estimated.column("A5F2_AccelY"), fixed.column("A5F2_AccelY"));
    }
}
