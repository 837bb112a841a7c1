//! Spectral Profiler - Real-Time Frequency Response Measurement
//!
//! Plays batches of phase-tracked sine tones through a device under test,
//! captures what comes back and derives the complex transfer function at
//! each tone, sweeping a log-spaced frequency grid at two excitation levels.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![allow(non_local_definitions)]

pub mod audio;
pub mod config;
pub mod constants;
pub mod level;
pub mod spectrum;
pub mod sweep;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use audio::{EngineHandle, TransferEngine};
pub use config::{EngineConfig, RetryPolicy, SweepConfig};
pub use level::Level;
pub use sweep::{SweepObserver, SweepScheduler};
