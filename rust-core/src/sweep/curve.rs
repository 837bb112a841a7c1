//! Measured response curves

use crate::constants::SWEEP_LENGTH;
use num_complex::Complex32;

/// Floor for magnitudes converted to dB
const MIN_MAGNITUDE: f64 = 1e-10;

/// Transfer function of one excitation level over the sweep positions
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCurve {
    responses: [Complex32; SWEEP_LENGTH],

    /// 20*log10(|H|) per position, for plotting
    magnitudes_db: [f64; SWEEP_LENGTH],

    /// arg(H) in radians per position, for plotting
    phases: [f64; SWEEP_LENGTH],
}

impl ResponseCurve {
    pub fn new() -> Self {
        Self {
            responses: [Complex32::new(0.0, 0.0); SWEEP_LENGTH],
            magnitudes_db: [0.0; SWEEP_LENGTH],
            phases: [0.0; SWEEP_LENGTH],
        }
    }

    /// Store a measurement and its plot values
    pub fn record(&mut self, position: usize, response: Complex32) {
        let magnitude = (response.norm() as f64).max(MIN_MAGNITUDE);
        self.responses[position] = response;
        self.magnitudes_db[position] = 20.0 * magnitude.log10();
        self.phases[position] = response.arg() as f64;
    }

    pub fn response(&self, position: usize) -> Complex32 {
        self.responses[position]
    }

    pub fn responses(&self) -> &[Complex32] {
        &self.responses
    }

    pub fn magnitudes_db(&self) -> &[f64] {
        &self.magnitudes_db
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_record_derives_plot_values() {
        let mut curve = ResponseCurve::new();
        curve.record(10, Complex32::new(0.0, 0.1));

        assert_eq!(curve.response(10), Complex32::new(0.0, 0.1));
        assert_relative_eq!(curve.magnitudes_db()[10], -20.0, epsilon = 1e-5);
        assert_relative_eq!(curve.phases()[10], FRAC_PI_2, epsilon = 1e-6);
        assert_eq!(curve.magnitudes_db()[11], 0.0);
    }

    #[test]
    fn test_zero_response_is_floored() {
        let mut curve = ResponseCurve::new();
        curve.record(0, Complex32::new(0.0, 0.0));
        assert_relative_eq!(curve.magnitudes_db()[0], -200.0, epsilon = 1e-9);
    }
}
