//! FFT engine using realfft for real-valued signals
//!
//! All buffers, including the FFT scratch space, are allocated at
//! construction so `transform_windowed` can run on the audio thread.

use num_complex::Complex;
use realfft::{FftError, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// FFT engine for real-valued signals
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable input buffer
    input_buffer: Vec<f64>,

    /// Reusable output buffer (complex spectrum)
    output_buffer: Vec<Complex<f64>>,

    /// Scratch space for the transform
    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let input_buffer = r2c.make_input_vec();
        let output_buffer = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        Self {
            fft_size,
            r2c,
            input_buffer,
            output_buffer,
            scratch,
        }
    }

    /// Window a block of samples and transform it
    ///
    /// # Arguments
    /// * `signal` - Input samples (zero-padded if shorter than fft_size)
    /// * `window` - Window coefficients, `fft_size` long
    ///
    /// # Returns
    /// Spectrum X[k] for k = 0..=fft_size/2
    pub fn transform_windowed(
        &mut self,
        signal: &[f32],
        window: &[f64],
    ) -> Result<&[Complex<f64>], FftError> {
        let copy_len = signal.len().min(self.fft_size);
        for ((dst, &x), &w) in self.input_buffer[..copy_len]
            .iter_mut()
            .zip(signal)
            .zip(window)
        {
            *dst = x as f64 * w;
        }
        self.input_buffer[copy_len..].fill(0.0);

        self.r2c.process_with_scratch(
            &mut self.input_buffer,
            &mut self.output_buffer,
            &mut self.scratch,
        )?;

        Ok(&self.output_buffer)
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Nearest FFT bin for a frequency in Hz, clamped to [0, fft_size/2]
    pub fn nearest_bin(&self, frequency_hz: f64, sample_rate: f64) -> usize {
        let bin = (self.fft_size as f64 * frequency_hz / sample_rate).round();
        if bin.is_nan() || bin <= 0.0 {
            0
        } else {
            (bin as usize).min(self.fft_size / 2)
        }
    }

    /// Centre frequency of a bin in cycles per sample
    pub fn bin_to_normalized(&self, bin: usize) -> f64 {
        bin as f64 / self.fft_size as f64
    }
}
