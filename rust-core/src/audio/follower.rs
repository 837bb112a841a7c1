//! Peak envelope follower for level metering
//!
//! Instant attack, exponential release with a time constant fixed at
//! construction.

/// Asymmetric peak detector
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    /// Release pole, exp(-1 / release_samples)
    pole: f32,

    /// Decaying peak memory
    memory: f32,
}

impl EnvelopeFollower {
    /// Create a new follower
    ///
    /// # Arguments
    /// * `release_samples` - Release time constant in samples (e.g. 50 ms * fs)
    pub fn new(release_samples: f64) -> Self {
        Self {
            pole: Self::release_to_pole(release_samples),
            memory: 0.0,
        }
    }

    /// Convert a release time constant in samples to the one-pole coefficient
    fn release_to_pole(release_samples: f64) -> f32 {
        (-1.0 / release_samples).exp() as f32
    }

    /// Process a single sample and return the current level
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let a = x.abs();
        if a > self.memory {
            self.memory = a;
            a
        } else {
            self.memory *= self.pole;
            self.memory + (1.0 - self.pole) * a
        }
    }

    /// Process a block, returning the level after its last sample
    pub fn process_block(&mut self, block: &[f32], mut level: f32) -> f32 {
        for &x in block {
            level = self.process(x);
        }
        level
    }

    pub fn pole(&self) -> f32 {
        self.pole
    }
}
