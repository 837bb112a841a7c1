//! Engine and sweep configuration

use crate::audio::engine::EngineError;
use crate::audio::messages::MAX_WIRE_SIZE;
use crate::constants::{
    CHANNEL_CAPACITY, DEFAULT_GLOBAL_GAIN, LEVEL_RELEASE_SECONDS, MAX_BINS_AT_ONCE,
};
use std::time::Duration;

/// Smallest analysis block the engine accepts
pub const MIN_FFT_SIZE: usize = 256;

/// Transfer-function engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sample rate of the measured signal path in Hz
    pub sample_rate: f64,

    /// Initial linear gain applied to both excitation levels
    pub global_gain: f32,

    /// Release time of the level meters in seconds
    pub level_release_seconds: f64,

    /// Capacity in bytes of each direction of the message channel
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            global_gain: DEFAULT_GLOBAL_GAIN,
            level_release_seconds: LEVEL_RELEASE_SECONDS,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Configuration for a given sample rate, everything else default
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// FFT size used for a measurement: the next power of two covering half
    /// a second of signal
    pub fn fft_size(&self) -> usize {
        ((0.5 * self.sample_rate).ceil() as usize).next_power_of_two()
    }

    /// Level meter release time in samples
    pub fn release_samples(&self) -> f64 {
        self.level_release_seconds * self.sample_rate
    }

    /// Check the configuration before any buffer is allocated
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(self.sample_rate));
        }
        if !self.level_release_seconds.is_finite() || self.level_release_seconds <= 0.0 {
            return Err(EngineError::InvalidRelease(self.level_release_seconds));
        }
        if self.fft_size() < MIN_FFT_SIZE {
            return Err(EngineError::FftTooSmall {
                fft_size: self.fft_size(),
                minimum: MIN_FFT_SIZE,
            });
        }
        if self.channel_capacity < MAX_WIRE_SIZE {
            return Err(EngineError::ChannelTooSmall {
                capacity: self.channel_capacity,
                required: MAX_WIRE_SIZE,
            });
        }
        Ok(())
    }
}

/// Bounded retry for commands posted from the non-real-time side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of attempts before giving up (at least one is always made)
    pub attempts: u32,

    /// Sleep between two attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 100,
            backoff: Duration::from_millis(10),
        }
    }
}

/// Sweep scheduler configuration
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Tones measured simultaneously per batch (1..=32)
    pub bins_at_once: usize,

    /// Measure the Lo excitation level
    pub lo_enabled: bool,

    /// Measure the Hi excitation level
    pub hi_enabled: bool,

    /// Retry policy for posting commands to the engine
    pub retry: RetryPolicy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            bins_at_once: 1,
            lo_enabled: true,
            hi_enabled: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Clamp a requested batch size into the supported range
pub fn clamp_bins_at_once(count: usize) -> usize {
    count.clamp(1, MAX_BINS_AT_ONCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_size_for_common_rates() {
        assert_eq!(EngineConfig::with_sample_rate(48000.0).fft_size(), 32768);
        assert_eq!(EngineConfig::with_sample_rate(44100.0).fft_size(), 32768);
        assert_eq!(EngineConfig::with_sample_rate(96000.0).fft_size(), 65536);
        assert_eq!(EngineConfig::with_sample_rate(8000.0).fft_size(), 4096);
    }

    #[test]
    fn test_release_samples() {
        let config = EngineConfig::default();
        assert!((config.release_samples() - 2400.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate() {
        assert!(EngineConfig::default().validate().is_ok());
        assert_eq!(
            EngineConfig::with_sample_rate(f64::NAN).validate().map_err(|e| e.to_string()),
            Err("Invalid sample rate: NaN Hz".to_string())
        );
        let no_release = EngineConfig {
            level_release_seconds: 0.0,
            ..EngineConfig::default()
        };
        assert_eq!(no_release.validate(), Err(EngineError::InvalidRelease(0.0)));
        assert_eq!(
            EngineConfig::with_sample_rate(100.0).validate(),
            Err(EngineError::FftTooSmall {
                fft_size: 64,
                minimum: MIN_FFT_SIZE
            })
        );
    }

    #[test]
    fn test_clamp_bins_at_once() {
        assert_eq!(clamp_bins_at_once(0), 1);
        assert_eq!(clamp_bins_at_once(4), 4);
        assert_eq!(clamp_bins_at_once(100), MAX_BINS_AT_ONCE);
    }
}
