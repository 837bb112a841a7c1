//! Analysis window
//!
//! The measurement uses a single Hann window, computed once for the FFT
//! size and reused for every batch.

use std::f64::consts::PI;

/// Symmetric Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
pub fn hann_window(length: usize) -> Vec<f64> {
    if length < 2 {
        return vec![1.0; length];
    }
    let m = length as f64;
    (0..length)
        .map(|n| {
            let angle = 2.0 * PI * n as f64 / (m - 1.0);
            0.5 - 0.5 * angle.cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_shape() {
        let length = 161;
        let hann = hann_window(length);

        assert_eq!(hann.len(), length);
        assert!(hann[0].abs() < 1e-12);
        assert!((hann[0] - hann[length - 1]).abs() < 1e-12);
        assert!((hann[length / 2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hann_coherent_gain_is_one_half() {
        // The engine's 4/N scaling relies on this
        let hann = hann_window(4096);
        let mean = hann.iter().sum::<f64>() / hann.len() as f64;
        assert!((mean - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_lengths() {
        assert!(hann_window(0).is_empty());
        assert_eq!(hann_window(1), vec![1.0]);
    }
}
