//! Fixed parameters of the measurement
//!
//! Sweep geometry, excitation limits and channel sizing shared by the
//! real-time engine and the sweep scheduler.

/// Lowest swept frequency in Hz
pub const FREQ_MIN: f64 = 10.0;

/// Highest swept frequency in Hz
pub const FREQ_MAX: f64 = 21000.0;

/// Number of frequency positions in one sweep revolution
pub const SWEEP_LENGTH: usize = 128;

/// Upper bound on tones generated and measured in a single batch
pub const MAX_BINS_AT_ONCE: usize = 32;

/// Smoothed output level under which a new batch may start generating
pub const SILENCE_THRESHOLD: f32 = 1e-4;

/// Capacity of each direction of the engine message channel, in bytes
pub const CHANNEL_CAPACITY: usize = 8192;

/// Excitation gain applied on top of the per-level base amplitude
pub const DEFAULT_GLOBAL_GAIN: f32 = 0.5;

/// Release time of the input/output level meters, in seconds
pub const LEVEL_RELEASE_SECONDS: f64 = 0.050;

/// Suggested magnitude plot range in dB
pub const DB_RANGE_MIN: f64 = -40.0;
pub const DB_RANGE_MAX: f64 = 40.0;

// The progress set stores one bit per sweep position in a u128.
const _: () = assert!(SWEEP_LENGTH <= 128);
const _: () = assert!(MAX_BINS_AT_ONCE <= SWEEP_LENGTH);
