// src/processing/filters/notch.rs
//! Second-order notch for power line interference removal

use super::Biquad;
use std::f64::consts::PI;

/// Notch section centred at `normalized_center` (fraction of Nyquist).
///
/// The -3 dB bandwidth is `center / quality`, so a quality of 35 at 60 Hz
/// removes roughly 1.7 Hz around the mains line.
pub fn notch_section(normalized_center: f64, quality: f64) -> Biquad {
    let w0 = normalized_center * PI;
    let bandwidth = w0 / quality;

    // Attenuation at the band edges is -3 dB, which makes beta = tan(bw / 2)
    let beta = (bandwidth / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);
    let cos_w0 = w0.cos();

    Biquad {
        b: [gain, -2.0 * gain * cos_w0, gain],
        a: [1.0, -2.0 * gain * cos_w0, 2.0 * gain - 1.0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::filters::{FilterSpec, SosFilter};

    #[test]
    fn test_notch_nulls_center() {
        let filter = SosFilter::design(&FilterSpec::notch(60.0, 35.0), 500.0).unwrap();
        assert!(filter.magnitude_at(60.0, 500.0) < 1e-9);
        assert!((filter.magnitude_at(10.0, 500.0) - 1.0).abs() < 1e-3);
        assert!((filter.magnitude_at(0.0, 500.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_notch_bandwidth() {
        let fs = 1000.0;
        let filter = SosFilter::design(&FilterSpec::notch(120.0, 35.0), fs).unwrap();
        let half_bw = 120.0 / 35.0 / 2.0;

        let edge = filter.magnitude_at(120.0 + half_bw, fs);
        assert!((edge - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.02);
    }
}
