//! The affine ADC-to-physical conversion of one channel.

/// Calibration constants of a channel.
///
/// A raw value maps to `(raw - ad_zero) * conversion_factor * 10^exponent`;
/// `tick` is the sampling interval in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub ad_zero: i32,
    pub conversion_factor: i64,
    pub exponent: i32,
    pub tick: i64,
}

impl Calibration {
    /// Physical value of one raw sample.
    pub fn apply(&self, raw: i64) -> f64 {
        (raw as f64 - f64::from(self.ad_zero))
            * self.conversion_factor as f64
            * 10f64.powi(self.exponent)
    }

    /// Physical values of a row of raw samples, narrowed to `f32`.
    pub fn apply_all(&self, raw: &[i64]) -> Vec<f32> {
        raw.iter().map(|&r| self.apply(r) as f32).collect()
    }

    /// Sampling frequency in Hz: `1_000_000 / tick`.
    pub fn sampling_frequency(&self) -> f64 {
        1_000_000.0 / self.tick as f64
    }
}
