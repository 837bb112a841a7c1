//! Spectral analysis with FFT

pub mod fft;
pub mod windowing;

pub use fft::FftEngine;
pub use windowing::hann_window;
