// src/processing/filters/zero_phase.rs
//! Forward-backward application of a section cascade
//!
//! Non-causal: the whole signal must be in memory. The signal is extended at
//! both ends by an odd reflection and each pass starts from the cascade's
//! steady state so the edges do not ring.

use super::{FilterError, FilterSpec, SosFilter};
use tracing::debug;

/// Design `spec` for `sample_rate` and apply it with zero phase.
///
/// A notch whose centre sits at or above Nyquist is skipped and the signal is
/// returned unchanged; every other out-of-range edge is an error.
pub fn filtfilt(spec: &FilterSpec, sample_rate: f64, signal: &[f64]) -> Result<Vec<f64>, FilterError> {
    Ok(match design_or_skip(spec, sample_rate)? {
        Some(filter) => filter.filtfilt(signal),
        None => signal.to_vec(),
    })
}

/// Design `spec`, or `None` for a notch that cannot exist at this rate
pub fn design_or_skip(spec: &FilterSpec, sample_rate: f64) -> Result<Option<SosFilter>, FilterError> {
    if let FilterSpec::Notch { center_hz, .. } = *spec {
        if sample_rate.is_finite() && center_hz >= 0.5 * sample_rate {
            debug!(center_hz, sample_rate, "notch at or above Nyquist skipped");
            return Ok(None);
        }
    }
    SosFilter::design(spec, sample_rate).map(Some)
}

impl SosFilter {
    /// Zero-phase application of an already designed cascade
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }

        let pad = self.pad_length().min(n - 1);
        let mut extended = odd_extension(signal, pad);

        let first = extended[0];
        self.run(&mut extended, first);

        extended.reverse();
        let first = extended[0];
        self.run(&mut extended, first);
        extended.reverse();

        extended[pad..pad + n].to_vec()
    }
}

fn odd_extension(signal: &[f64], pad: usize) -> Vec<f64> {
    let n = signal.len();
    let head = signal[0];
    let tail = signal[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * head - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=pad).map(|i| 2.0 * tail - signal[n - 1 - i]));
    extended
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
    fn test_odd_extension() {
        let ext = odd_extension(&[1.0, 2.0, 4.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 6.0, 7.0]);
    }

    #[test]
    fn test_constant_passes_lowpass_unchanged() {
        let signal = vec![3.5; 200];
        let out = filtfilt(&FilterSpec::lowpass(5.0, 4), 100.0, &signal).unwrap();
        for v in out {
            assert!((v - 3.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_removed_by_highpass() {
        let signal = vec![10.0; 500];
        let out = filtfilt(&FilterSpec::highpass(0.3, 2), 50.0, &signal).unwrap();
        for v in out {
            assert!(v.abs() < 1e-9);
        }
    }

    #[test]
    fn test_no_phase_shift() {
        let fs = 500.0;
        let signal = sine(2.5, fs, 2000);
        let out = filtfilt(&FilterSpec::lowpass(20.0, 4), fs, &signal).unwrap();

        // Peak of the second cycle lands exactly on sample 250
        let window = 200..400;
        let argmax = |x: &[f64]| {
            window
                .clone()
                .max_by(|&a, &b| x[a].total_cmp(&x[b]))
                .unwrap_or(0)
        };
        assert_eq!(argmax(&signal), argmax(&out));

        let gain_db = 20.0 * (rms(&out[500..1500]) / rms(&signal[500..1500])).log10();
        assert!(gain_db.abs() < 1.0);
    }

    #[test]
    fn test_skips_notch_above_nyquist() {
        let signal = sine(10.0, 200.0, 100);
        let out = filtfilt(&FilterSpec::notch(120.0, 35.0), 200.0, &signal).unwrap();
        assert_eq!(out, signal);
    }

    #[test]
    fn test_short_and_empty_signals() {
        assert!(filtfilt(&FilterSpec::lowpass(5.0, 4), 100.0, &[]).unwrap().is_empty());

        let out = filtfilt(&FilterSpec::lowpass(5.0, 4), 100.0, &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| (v - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_invalid_design_is_error() {
        let result = filtfilt(&FilterSpec::lowpass(60.0, 4), 100.0, &[0.0; 10]);
        assert!(result.is_err());
    }
}
