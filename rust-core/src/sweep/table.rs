//! Logarithmic sweep frequency table

use crate::constants::{FREQ_MAX, FREQ_MIN, SWEEP_LENGTH};

/// Frequencies of the sweep positions, log-spaced from FREQ_MIN to FREQ_MAX
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyTable {
    frequencies: [f64; SWEEP_LENGTH],
}

impl FrequencyTable {
    pub fn new() -> Self {
        let lx1 = FREQ_MIN.log10();
        let lx2 = FREQ_MAX.log10();

        let mut frequencies = [0.0; SWEEP_LENGTH];
        for (i, freq) in frequencies.iter_mut().enumerate() {
            let r = i as f64 / (SWEEP_LENGTH - 1) as f64;
            *freq = 10f64.powf(lx1 + r * (lx2 - lx1));
        }

        Self { frequencies }
    }

    /// Frequency of sweep position `index` in Hz
    pub fn frequency(&self, index: usize) -> f64 {
        self.frequencies[index]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.frequencies
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Sweep position of the `nth` tone of a batch of `count` for a sweep index
///
/// Tones of one batch are spread evenly over the sweep.
pub fn nth_bin_position(sweep_index: usize, nth: usize, count: usize) -> usize {
    (sweep_index + nth * SWEEP_LENGTH / count.max(1)) % SWEEP_LENGTH
}
