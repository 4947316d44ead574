// src/processing/filters/mod.rs
//! Declarative zero-phase digital filters
//!
//! A [`FilterSpec`] only describes a filter. [`SosFilter::design`] turns it
//! into a cascade of second-order sections after checking every edge against
//! Nyquist, and [`zero_phase::filtfilt`] runs it forward and backward over a
//! whole in-memory signal.

pub mod coefficients;
pub mod notch;
pub mod zero_phase;

pub use coefficients::{Biquad, SosFilter};
pub use zero_phase::{design_or_skip, filtfilt};

use crate::config::constants::filters::{MAX_FILTER_ORDER, MIN_FILTER_ORDER};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Filter response families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// Description of one zero-phase filter
///
/// Butterworth for the pass/stop families, a second-order IIR notch for
/// [`FilterSpec::Notch`]. Frequencies are in Hz and normalised against the
/// sampling rate the filter is designed for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilterSpec {
    Lowpass { cutoff_hz: f64, order: usize },
    Highpass { cutoff_hz: f64, order: usize },
    Bandpass { low_hz: f64, high_hz: f64, order: usize },
    Notch { center_hz: f64, quality: f64 },
}

impl FilterSpec {
    pub fn lowpass(cutoff_hz: f64, order: usize) -> Self {
        FilterSpec::Lowpass { cutoff_hz, order }
    }

    pub fn highpass(cutoff_hz: f64, order: usize) -> Self {
        FilterSpec::Highpass { cutoff_hz, order }
    }

    pub fn bandpass(low_hz: f64, high_hz: f64, order: usize) -> Self {
        FilterSpec::Bandpass { low_hz, high_hz, order }
    }

    pub fn notch(center_hz: f64, quality: f64) -> Self {
        FilterSpec::Notch { center_hz, quality }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterSpec::Lowpass { .. } => FilterKind::Lowpass,
            FilterSpec::Highpass { .. } => FilterKind::Highpass,
            FilterSpec::Bandpass { .. } => FilterKind::Bandpass,
            FilterSpec::Notch { .. } => FilterKind::Notch,
        }
    }

    /// Check every edge against the Nyquist frequency of `sample_rate`
    pub fn validate(&self, sample_rate: f64) -> Result<(), FilterError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(FilterError::InvalidSampleRate(sample_rate));
        }
        let nyquist = 0.5 * sample_rate;

        let check_order = |order: usize| {
            if (MIN_FILTER_ORDER..=MAX_FILTER_ORDER).contains(&order) {
                Ok(())
            } else {
                Err(FilterError::InvalidOrder(order))
            }
        };
        let check_edge = |cutoff_hz: f64| {
            if cutoff_hz.is_finite() && cutoff_hz > 0.0 && cutoff_hz < nyquist {
                Ok(())
            } else {
                Err(FilterError::CutoffOutOfRange { cutoff_hz, nyquist_hz: nyquist })
            }
        };

        match *self {
            FilterSpec::Lowpass { cutoff_hz, order } | FilterSpec::Highpass { cutoff_hz, order } => {
                check_order(order)?;
                check_edge(cutoff_hz)
            }
            FilterSpec::Bandpass { low_hz, high_hz, order } => {
                check_order(order)?;
                check_edge(low_hz)?;
                check_edge(high_hz)?;
                if low_hz >= high_hz {
                    return Err(FilterError::InvertedBand { low_hz, high_hz });
                }
                Ok(())
            }
            FilterSpec::Notch { center_hz, quality } => {
                if !(quality.is_finite() && quality > 0.0) {
                    return Err(FilterError::InvalidQuality(quality));
                }
                check_edge(center_hz)
            }
        }
    }
}

/// Filter design errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("filter order {0} is outside the supported range")]
    InvalidOrder(usize),

    #[error("cutoff {cutoff_hz} Hz must lie strictly between 0 and Nyquist ({nyquist_hz} Hz)")]
    CutoffOutOfRange { cutoff_hz: f64, nyquist_hz: f64 },

    #[error("band edges inverted: low {low_hz} Hz >= high {high_hz} Hz")]
    InvertedBand { low_hz: f64, high_hz: f64 },

    #[error("sampling rate {0} Hz is not usable")]
    InvalidSampleRate(f64),

    #[error("notch quality factor {0} must be positive")]
    InvalidQuality(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_at_nyquist_rejected() {
        let spec = FilterSpec::lowpass(50.0, 4);
        assert_eq!(
            spec.validate(100.0),
            Err(FilterError::CutoffOutOfRange { cutoff_hz: 50.0, nyquist_hz: 50.0 })
        );
        assert!(spec.validate(101.0).is_ok());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(FilterSpec::lowpass(10.0, 0).validate(100.0).is_err());
        assert!(FilterSpec::highpass(0.0, 2).validate(100.0).is_err());
        assert!(FilterSpec::bandpass(30.0, 20.0, 4).validate(500.0).is_err());
        assert!(FilterSpec::notch(60.0, 0.0).validate(500.0).is_err());
        assert!(FilterSpec::lowpass(10.0, 2).validate(f64::NAN).is_err());
    }

    #[test]
    fn test_spec_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            filter: FilterSpec,
        }

        let parsed: Wrapper =
            toml::from_str("[filter]\nkind = \"bandpass\"\nlow_hz = 20.0\nhigh_hz = 240.0\norder = 4\n").unwrap();
        assert_eq!(parsed.filter, FilterSpec::bandpass(20.0, 240.0, 4));
        assert_eq!(parsed.filter.kind(), FilterKind::Bandpass);
    }
}
