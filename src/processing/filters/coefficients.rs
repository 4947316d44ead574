// src/processing/filters/coefficients.rs
//! Butterworth design as cascaded second-order sections
//!
//! The analog prototype is pre-warped, transformed to the requested band and
//! mapped through the bilinear transform. Poles are grouped in conjugate
//! pairs so every section stays well conditioned at order 4 band-pass and up.

use super::notch::notch_section;
use super::{FilterError, FilterSpec};
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

const IMAG_TOLERANCE: f64 = 1e-12;

/// One second-order section, `a[0]` normalised to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Steady-state state vector for a unit step (direct form II transposed)
    pub fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let rhs0 = b1 - a1 * b0;
        let rhs1 = b2 - a2 * b0;
        let z0 = (rhs0 + rhs1) / (1.0 + a1 + a2);
        [z0, rhs1 - a2 * z0]
    }

    /// DC gain of the section
    pub fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z_inv2 * self.b[2];
        let den = self.a[0] + z_inv * self.a[1] + z_inv2 * self.a[2];
        num / den
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    pub fn from_sections(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    /// Validate a spec against `sample_rate` and build its sections
    pub fn design(spec: &FilterSpec, sample_rate: f64) -> Result<Self, FilterError> {
        spec.validate(sample_rate)?;
        let nyquist = 0.5 * sample_rate;

        let sections = match *spec {
            FilterSpec::Lowpass { cutoff_hz, order } => {
                let k = prewarp(cutoff_hz / nyquist);
                let analog = Zpk::butterworth_prototype(order).to_lowpass(k);
                analog.bilinear().into_sections()
            }
            FilterSpec::Highpass { cutoff_hz, order } => {
                let k = prewarp(cutoff_hz / nyquist);
                let analog = Zpk::butterworth_prototype(order).to_highpass(k);
                analog.bilinear().into_sections()
            }
            FilterSpec::Bandpass { low_hz, high_hz, order } => {
                let k_low = prewarp(low_hz / nyquist);
                let k_high = prewarp(high_hz / nyquist);
                let analog = Zpk::butterworth_prototype(order).to_bandpass(k_low, k_high);
                analog.bilinear().into_sections()
            }
            FilterSpec::Notch { center_hz, quality } => vec![notch_section(center_hz / nyquist, quality)],
        };

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at `freq_hz` for a filter running at `sample_rate`
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / sample_rate;
        let z_inv = Complex64::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }

    /// Run the cascade once over `signal`, seeding each section with its
    /// steady state scaled by `initial`
    pub(crate) fn run(&self, signal: &mut [f64], initial: f64) {
        let mut scale = 1.0;
        for section in &self.sections {
            let [b0, b1, b2] = section.b;
            let [_, a1, a2] = section.a;
            let [zi0, zi1] = section.step_state();
            let mut z0 = zi0 * scale * initial;
            let mut z1 = zi1 * scale * initial;

            for x in signal.iter_mut() {
                let input = *x;
                let y = b0 * input + z0;
                z0 = b1 * input - a1 * y + z1;
                z1 = b2 * input - a2 * y;
                *x = y;
            }

            scale *= section.dc_gain();
        }
    }

    /// Edge padding used by the forward-backward pass
    pub(crate) fn pad_length(&self) -> usize {
        let trailing_b = self.sections.iter().filter(|s| s.b[2] == 0.0).count();
        let trailing_a = self.sections.iter().filter(|s| s.a[2] == 0.0).count();
        let taps = 2 * self.sections.len() + 1 - trailing_b.min(trailing_a);
        3 * taps
    }
}

fn prewarp(normalized_cutoff: f64) -> f64 {
    (PI * normalized_cutoff / 2.0).tan()
}

/// Zeros, poles and gain of a transfer function
#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

impl Zpk {
    /// Unit-cutoff analog Butterworth prototype
    fn butterworth_prototype(order: usize) -> Self {
        let n = order as f64;
        let poles = (0..order)
            .map(|k| Complex64::from_polar(1.0, PI * (2.0 * k as f64 + 1.0 + n) / (2.0 * n)))
            .collect();
        Self {
            zeros: Vec::new(),
            poles,
            gain: 1.0,
        }
    }

    fn to_lowpass(self, wc: f64) -> Self {
        let degree = (self.poles.len() - self.zeros.len()) as i32;
        Self {
            zeros: self.zeros.iter().map(|z| *z * wc).collect(),
            poles: self.poles.iter().map(|p| *p * wc).collect(),
            gain: self.gain * wc.powi(degree),
        }
    }

    fn to_highpass(self, wc: f64) -> Self {
        let degree = self.poles.len() - self.zeros.len();
        let neg_zeros: Complex64 = self.zeros.iter().map(|z| -*z).product();
        let neg_poles: Complex64 = self.poles.iter().map(|p| -*p).product();

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(|z| wc / *z).collect();
        zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

        Self {
            zeros,
            poles: self.poles.iter().map(|p| wc / *p).collect(),
            gain: self.gain * (neg_zeros / neg_poles).re,
        }
    }

    fn to_bandpass(self, w_low: f64, w_high: f64) -> Self {
        let degree = self.poles.len() - self.zeros.len();
        let w0_sq = Complex64::new(w_low * w_high, 0.0);
        let bw = w_high - w_low;

        let split = |roots: &[Complex64]| -> Vec<Complex64> {
            let scaled: Vec<Complex64> = roots.iter().map(|r| *r * (bw / 2.0)).collect();
            let plus = scaled.iter().map(|&r| r + (r * r - w0_sq).sqrt());
            let minus = scaled.iter().map(|&r| r - (r * r - w0_sq).sqrt());
            plus.chain(minus).collect()
        };

        let mut zeros = split(&self.zeros);
        zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

        Self {
            zeros,
            poles: split(&self.poles),
            gain: self.gain * bw.powi(degree as i32),
        }
    }

    /// Bilinear transform with `s = (z - 1) / (z + 1)`
    fn bilinear(self) -> Self {
        let one = Complex64::new(1.0, 0.0);
        let degree = self.poles.len() - self.zeros.len();

        let num: Complex64 = self.zeros.iter().map(|&z| one - z).product();
        let den: Complex64 = self.poles.iter().map(|&p| one - p).product();

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(|&z| (one + z) / (one - z)).collect();
        zeros.extend(std::iter::repeat(-one).take(degree));

        Self {
            zeros,
            poles: self.poles.iter().map(|&p| (one + p) / (one - p)).collect(),
            gain: self.gain * (num / den).re,
        }
    }

    /// Group conjugate pole pairs (and leftover real poles) into sections
    fn into_sections(self) -> Vec<Biquad> {
        let mut pole_groups: Vec<Vec<Complex64>> = Vec::new();
        let mut real_poles: Vec<Complex64> = Vec::new();

        for p in &self.poles {
            if p.im > IMAG_TOLERANCE {
                pole_groups.push(vec![*p, p.conj()]);
            } else if p.im.abs() <= IMAG_TOLERANCE {
                real_poles.push(Complex64::new(p.re, 0.0));
            }
        }
        for pair in real_poles.chunks(2) {
            pole_groups.push(pair.to_vec());
        }

        // Interleave zeros at +1 and -1 so band-pass sections each get one of each
        let (mut positive, mut rest): (Vec<Complex64>, Vec<Complex64>) =
            self.zeros.iter().partition(|z| z.re > 0.0);
        let mut zeros = Vec::with_capacity(self.zeros.len());
        while !positive.is_empty() || !rest.is_empty() {
            if let Some(z) = positive.pop() {
                zeros.push(z);
            }
            if let Some(z) = rest.pop() {
                zeros.push(z);
            }
        }
        let mut zeros = zeros.into_iter();

        let mut sections: Vec<Biquad> = pole_groups
            .iter()
            .map(|group| {
                let section_zeros: Vec<Complex64> = zeros.by_ref().take(group.len()).collect();
                Biquad {
                    b: polynomial(&section_zeros),
                    a: polynomial(group),
                }
            })
            .collect();

        if let Some(first) = sections.first_mut() {
            for b in &mut first.b {
                *b *= self.gain;
            }
        }
        sections
    }
}

/// Monic polynomial in `z^-1` with the given roots (at most two), real part only
fn polynomial(roots: &[Complex64]) -> [f64; 3] {
    match roots {
        [] => [1.0, 0.0, 0.0],
        [r] => [1.0, -r.re, 0.0],
        [r1, r2] => [1.0, -(r1 + r2).re, (r1 * r2).re],
        _ => unreachable!("sections hold at most two roots"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 1000.0;

    fn db(x: f64) -> f64 {
        20.0 * x.log10()
    }

    #[test]
    fn test_lowpass_response() {
        let filter = SosFilter::design(&FilterSpec::lowpass(20.0, 4), FS).unwrap();
        assert_eq!(filter.sections().len(), 2);

        assert!((filter.magnitude_at(0.0, FS) - 1.0).abs() < 1e-9);
        assert!((db(filter.magnitude_at(20.0, FS)) + 3.0103).abs() < 0.05);
        assert!(db(filter.magnitude_at(200.0, FS)) < -70.0);
    }

    #[test]
    fn test_highpass_response() {
        let filter = SosFilter::design(&FilterSpec::highpass(20.0, 2), FS).unwrap();
        assert_eq!(filter.sections().len(), 1);

        assert!(filter.magnitude_at(0.0, FS) < 1e-9);
        assert!((db(filter.magnitude_at(20.0, FS)) + 3.0103).abs() < 0.05);
        assert!((filter.magnitude_at(400.0, FS) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_odd_order_lowpass() {
        let filter = SosFilter::design(&FilterSpec::lowpass(50.0, 3), FS).unwrap();
        assert_eq!(filter.sections().len(), 2);
        assert_eq!(filter.sections()[1].a[2], 0.0);
        assert!((filter.magnitude_at(0.0, FS) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bandpass_response() {
        let filter = SosFilter::design(&FilterSpec::bandpass(20.0, 240.0, 4), FS).unwrap();
        assert_eq!(filter.sections().len(), 4);

        let center = (20.0f64 * 240.0).sqrt();
        assert!(db(filter.magnitude_at(center, FS)).abs() < 0.1);
        assert!((db(filter.magnitude_at(20.0, FS)) + 3.0103).abs() < 0.1);
        assert!((db(filter.magnitude_at(240.0, FS)) + 3.0103).abs() < 0.1);
        assert!(filter.magnitude_at(0.0, FS) < 1e-6);
        assert!(filter.magnitude_at(499.9, FS) < 1e-3);
    }

    #[test]
    fn test_sections_are_stable() {
        let filter = SosFilter::design(&FilterSpec::bandpass(20.0, 225.0, 4), 500.0).unwrap();
        for section in filter.sections() {
            // Both roots inside the unit circle iff |a2| < 1 and |a1| < 1 + a2
            assert!(section.a[2].abs() < 1.0);
            assert!(section.a[1].abs() < 1.0 + section.a[2]);
        }
    }

    #[test]
    fn test_design_rejects_cutoff_above_nyquist() {
        let result = SosFilter::design(&FilterSpec::lowpass(60.0, 4), 100.0);
        assert!(matches!(result, Err(FilterError::CutoffOutOfRange { .. })));
    }

    #[test]
    fn test_pad_length() {
        let filter = SosFilter::design(&FilterSpec::lowpass(20.0, 4), FS).unwrap();
        assert_eq!(filter.pad_length(), 15);

        let filter = SosFilter::design(&FilterSpec::lowpass(20.0, 1), FS).unwrap();
        assert_eq!(filter.pad_length(), 6);
    }
}
