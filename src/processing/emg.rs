// src/processing/emg.rs
//! EMG conditioning: drift removal, mains notches, band-pass and envelope

use crate::config::constants::emg;
use crate::processing::filters::{design_or_skip, FilterError, FilterSpec, SosFilter};
use crate::processing::normalize::fill_for_filter;
use tracing::debug;

/// Filter stages for one EMG sampling rate
#[derive(Debug, Clone, PartialEq)]
pub struct EmgChain {
    pub highpass: FilterSpec,
    pub notches: Vec<FilterSpec>,
    pub bandpass: FilterSpec,
    pub envelope: FilterSpec,
}

impl EmgChain {
    /// Standard chain; the band-pass upper edge follows the sampling rate
    pub fn for_sample_rate(sample_rate: f64) -> Self {
        let upper = emg::BANDPASS_HIGH_HZ.min(emg::BANDPASS_HIGH_FRACTION * sample_rate);
        Self {
            highpass: FilterSpec::highpass(emg::HIGHPASS_CUTOFF_HZ, emg::HIGHPASS_ORDER),
            notches: emg::NOTCH_FREQUENCIES_HZ
                .iter()
                .map(|&f| FilterSpec::notch(f, emg::NOTCH_QUALITY))
                .collect(),
            bandpass: FilterSpec::bandpass(emg::BANDPASS_LOW_HZ, upper, emg::BANDPASS_ORDER),
            envelope: FilterSpec::lowpass(emg::ENVELOPE_CUTOFF_HZ, emg::ENVELOPE_ORDER),
        }
    }

    /// Design every stage. Notches above Nyquist drop out here.
    pub fn design(&self, sample_rate: f64) -> Result<EmgFilters, FilterError> {
        let mut notches = Vec::with_capacity(self.notches.len());
        for spec in &self.notches {
            if let Some(filter) = design_or_skip(spec, sample_rate)? {
                notches.push(filter);
            }
        }

        Ok(EmgFilters {
            highpass: SosFilter::design(&self.highpass, sample_rate)?,
            notches,
            bandpass: SosFilter::design(&self.bandpass, sample_rate)?,
            envelope: SosFilter::design(&self.envelope, sample_rate)?,
        })
    }
}

/// Designed EMG cascades, reused for every channel of a trial
#[derive(Debug, Clone)]
pub struct EmgFilters {
    highpass: SosFilter,
    notches: Vec<SosFilter>,
    bandpass: SosFilter,
    envelope: SosFilter,
}

/// Band-passed signal and its linear envelope
#[derive(Debug, Clone, PartialEq)]
pub struct EmgChannelOutput {
    pub filtered: Vec<Option<f64>>,
    pub envelope: Vec<Option<f64>>,
}

impl EmgFilters {
    pub fn notch_count(&self) -> usize {
        self.notches.len()
    }

    /// Filter one dense signal
    pub fn apply_dense(&self, signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut x = self.highpass.filtfilt(signal);
        for notch in &self.notches {
            x = notch.filtfilt(&x);
        }
        let band = self.bandpass.filtfilt(&x);

        let rectified: Vec<f64> = band.iter().map(|v| v.abs()).collect();
        let envelope = self.envelope.filtfilt(&rectified);
        (band, envelope)
    }

    /// Filter one channel with gaps.
    ///
    /// Gaps are linearly interpolated first. Rows before the first present
    /// sample have nothing to interpolate from and stay missing; a channel
    /// with no samples at all comes back all missing.
    pub fn apply(&self, values: &[Option<f64>]) -> EmgChannelOutput {
        let Some(dense) = fill_for_filter(values) else {
            return EmgChannelOutput {
                filtered: vec![None; values.len()],
                envelope: vec![None; values.len()],
            };
        };

        let leading = values.iter().take_while(|v| v.is_none()).count();
        let (band, envelope) = self.apply_dense(&dense);
        debug!(rows = values.len(), leading_gap = leading, "filtered EMG channel");

        let mask = |signal: Vec<f64>| {
            signal
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i >= leading).then_some(v))
                .collect()
        };
        EmgChannelOutput {
            filtered: mask(band),
            envelope: mask(envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_band_edge_follows_rate() {
        let chain = EmgChain::for_sample_rate(1000.0);
        assert_eq!(chain.bandpass, FilterSpec::bandpass(20.0, 240.0, 4));

        let chain = EmgChain::for_sample_rate(500.0);
        assert_eq!(chain.bandpass, FilterSpec::bandpass(20.0, 225.0, 4));
    }

    #[test]
    fn test_notches_skipped_at_low_rate() {
        // Nyquist 100 Hz keeps the 60 Hz notch only
        let filters = EmgChain::for_sample_rate(200.0).design(200.0).unwrap();
        assert_eq!(filters.notch_count(), 1);

        let filters = EmgChain::for_sample_rate(1000.0).design(1000.0).unwrap();
        assert_eq!(filters.notch_count(), 2);
    }

    #[test]
    fn test_low_rate_is_design_error() {
        // 20 Hz high-pass cannot exist at 30 Hz sampling
        assert!(EmgChain::for_sample_rate(30.0).design(30.0).is_err());
    }

    #[test]
    fn test_in_band_tone_survives() {
        let fs = 1000.0;
        let filters = EmgChain::for_sample_rate(fs).design(fs).unwrap();
        let signal = sine(90.0, fs, 4000);

        let (band, envelope) = filters.apply_dense(&signal);
        let gain = rms(&band[1000..3000]) / rms(&signal[1000..3000]);
        assert!(gain > 0.8 && gain < 1.2, "gain {}", gain);

        // envelope of a unit sine settles near its mean absolute value 2/π
        let mean_env = envelope[1000..3000].iter().sum::<f64>() / 2000.0;
        assert!((mean_env - 2.0 / PI).abs() < 0.1, "envelope {}", mean_env);
    }

    #[test]
    fn test_drift_removed() {
        let fs = 1000.0;
        let filters = EmgChain::for_sample_rate(fs).design(fs).unwrap();
        let drift: Vec<f64> = (0..4000).map(|i| 5.0 + 0.001 * i as f64).collect();

        let (band, _) = filters.apply_dense(&drift);
        assert!(rms(&band[500..3500]) < 0.05);
    }

    #[test]
    fn test_gaps_and_leading_missing() {
        let fs = 1000.0;
        let filters = EmgChain::for_sample_rate(fs).design(fs).unwrap();
        let mut values: Vec<Option<f64>> = sine(90.0, fs, 500).into_iter().map(Some).collect();
        values[0] = None;
        values[1] = None;
        values[200] = None;

        let out = filters.apply(&values);
        assert_eq!(out.filtered[0], None);
        assert_eq!(out.envelope[1], None);
        assert!(out.filtered[200].is_some());
        assert_eq!(out.filtered.len(), 500);

        let empty = filters.apply(&[None, None]);
        assert_eq!(empty.filtered, vec![None, None]);
    }
}
