//! Sweep progress bookkeeping

use crate::constants::SWEEP_LENGTH;

/// Set of sweep positions measured during the current revolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSet {
    bits: u128,
}

impl ProgressSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: usize) {
        debug_assert!(position < SWEEP_LENGTH);
        self.bits |= 1u128 << position;
    }

    pub fn contains(&self, position: usize) -> bool {
        position < SWEEP_LENGTH && self.bits & (1u128 << position) != 0
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_complete(&self) -> bool {
        self.count() == SWEEP_LENGTH
    }

    /// Measured share of the sweep, 0..=1
    pub fn fraction(&self) -> f64 {
        self.count() as f64 / SWEEP_LENGTH as f64
    }

    pub fn clear(&mut self) {
        self.bits = 0;
    }
}
