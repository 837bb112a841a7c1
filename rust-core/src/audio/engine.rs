//! Real-time transfer-function engine
//!
//! Runs inside the audio callback: generates the excitation tones, captures
//! one FFT block of the measured path's output, and reports the complex
//! response at each excited bin. Everything it touches in `process` is
//! allocated in `TransferEngine::new`; the non-real-time side talks to it
//! only through the two message channels and the shared atomics held by
//! [`EngineHandle`].

use super::channel::{ByteRing, ChannelError};
use super::follower::EnvelopeFollower;
use super::messages::{
    AnalysisResult, Message, MessageReceiver, MessageSender, MessageTag, ToneBatch,
};
use crate::config::{EngineConfig, RetryPolicy};
use crate::constants::{MAX_BINS_AT_ONCE, SILENCE_THRESHOLD};
use crate::level::Level;
use crate::spectrum::{hann_window, FftEngine};
use atomic_float::AtomicF32;
use num_complex::{Complex, Complex32};
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),

    #[error("Invalid level meter release time: {0} s")]
    InvalidRelease(f64),

    #[error("FFT size {fft_size} is below the minimum of {minimum}")]
    FftTooSmall { fft_size: usize, minimum: usize },

    #[error("Channel capacity of {capacity} bytes cannot hold a {required}-byte message")]
    ChannelTooSmall { capacity: usize, required: usize },
}

/// Smoothed input/output peak levels, written by the audio thread
#[derive(Debug, Default)]
pub struct LevelMeters {
    input: AtomicF32,
    output: AtomicF32,
}

impl LevelMeters {
    pub fn input(&self) -> f32 {
        self.input.load(Ordering::Relaxed)
    }

    pub fn output(&self) -> f32 {
        self.output.load(Ordering::Relaxed)
    }

    fn publish(&self, input: f32, output: f32) {
        self.input.store(input, Ordering::Relaxed);
        self.output.store(output, Ordering::Relaxed);
    }
}

/// Scale applied to a sum of `bin_count` equal tones so its RMS matches a
/// single tone's
pub fn gain_compensation(bin_count: usize) -> f64 {
    let rms_single = FRAC_1_SQRT_2;
    let rms_sum = (0.5 * bin_count.max(1) as f64).sqrt();
    rms_single / rms_sum
}

/// Oscillator state of one excited bin
#[derive(Debug, Clone, Copy, Default)]
struct Tone {
    /// Frequency in cycles per sample, on the FFT grid
    frequency: f64,

    /// Phase accumulator in [0, 1)
    phase: f64,

    /// Phase when generation was armed, reference for the response
    starting_phase: f64,
}

/// Non-real-time side of the engine
pub struct EngineHandle {
    commands: MessageSender,
    results: MessageReceiver,
    levels: Arc<LevelMeters>,
    global_gain: Arc<AtomicF32>,
    fft_size: usize,
    sample_rate: f64,
}

impl EngineHandle {
    /// Post a command, sleeping between attempts while the channel is full
    pub fn send(&mut self, message: &Message, policy: &RetryPolicy) -> Result<(), ChannelError> {
        self.commands.send_with_retry(message, policy)
    }

    /// Post a command with a single attempt
    pub fn try_send(&mut self, message: &Message) -> bool {
        self.commands.try_send(message)
    }

    /// Next message from the engine, if one is complete
    pub fn receive(&mut self) -> Option<Message> {
        self.results.try_recv()
    }

    pub fn input_level(&self) -> f32 {
        self.levels.input()
    }

    pub fn output_level(&self) -> f32 {
        self.levels.output()
    }

    /// Set the linear excitation gain; picked up by the next generated block
    pub fn set_global_gain(&self, gain: f32) {
        self.global_gain.store(gain, Ordering::Relaxed);
    }

    pub fn global_gain(&self) -> f32 {
        self.global_gain.load(Ordering::Relaxed)
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

/// Real-time side of the engine, owned by the audio callback
pub struct TransferEngine {
    commands: MessageReceiver,
    results: MessageSender,
    levels: Arc<LevelMeters>,
    global_gain: Arc<AtomicF32>,
    sample_rate: f64,

    in_follower: EnvelopeFollower,
    out_follower: EnvelopeFollower,
    in_level: f32,
    out_level: f32,

    /// A batch is running
    active: bool,

    /// Output was silent enough, tones are playing and input is captured
    armed: bool,

    /// The result of the current batch has been posted
    finished: bool,

    level: Level,
    serial: u32,
    tones: [Tone; MAX_BINS_AT_ONCE],
    bin_count: usize,
    gain_compensation: f64,

    capture: Vec<f32>,
    capture_fill: usize,
    window: Vec<f64>,
    fft: FftEngine,
}

impl TransferEngine {
    /// Create the engine and its non-real-time handle
    pub fn new(config: &EngineConfig) -> Result<(Self, EngineHandle), EngineError> {
        config.validate()?;

        let fft_size = config.fft_size();
        let (command_writer, command_reader) = ByteRing::new(config.channel_capacity).split();
        let (result_writer, result_reader) = ByteRing::new(config.channel_capacity).split();

        let levels = Arc::new(LevelMeters::default());
        let global_gain = Arc::new(AtomicF32::new(config.global_gain));

        log::info!(
            "Transfer engine: {} Hz, FFT size {}, {} byte channels",
            config.sample_rate,
            fft_size,
            config.channel_capacity
        );

        let engine = Self {
            commands: MessageReceiver::new(command_reader),
            results: MessageSender::new(result_writer),
            levels: Arc::clone(&levels),
            global_gain: Arc::clone(&global_gain),
            sample_rate: config.sample_rate,
            in_follower: EnvelopeFollower::new(config.release_samples()),
            out_follower: EnvelopeFollower::new(config.release_samples()),
            in_level: 0.0,
            out_level: 0.0,
            active: false,
            armed: false,
            finished: false,
            level: Level::Lo,
            serial: 0,
            tones: [Tone::default(); MAX_BINS_AT_ONCE],
            bin_count: 0,
            gain_compensation: 1.0,
            capture: vec![0.0; fft_size],
            capture_fill: 0,
            window: hann_window(fft_size),
            fft: FftEngine::new(fft_size),
        };

        let handle = EngineHandle {
            commands: MessageSender::new(command_writer),
            results: MessageReceiver::new(result_reader),
            levels,
            global_gain,
            fft_size,
            sample_rate: config.sample_rate,
        };

        Ok((engine, handle))
    }

    /// Audio callback entry point
    ///
    /// # Arguments
    /// * `input` - Block captured from the measured path
    /// * `output` - Block sent to the measured path, overwritten
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        output.fill(0.0);

        self.handle_messages();

        if self.active {
            if self.armed {
                self.collect(input);
                if !self.finished && self.capture_fill == self.capture.len() {
                    self.post_result();
                }
            }

            // Wait for the previous response to ring out before measuring
            if !self.armed && self.out_level < SILENCE_THRESHOLD {
                self.arm();
            }

            if self.armed {
                self.generate(output);
            }
        }

        self.update_levels(input, output);
    }

    fn handle_messages(&mut self) {
        while let Some(message) = self.commands.try_recv() {
            match message {
                Message::StartToneBatch(batch) => self.start_batch(&batch),
                Message::StopGeneration => self.stop(),
                Message::AnalysisResult(_) => {
                    panic!("analysis result received on the command channel")
                }
            }
        }
    }

    fn start_batch(&mut self, batch: &ToneBatch) {
        self.active = true;
        self.armed = false;
        self.finished = false;
        self.level = batch.level();
        self.serial = batch.serial();

        let frequencies = batch.frequencies();
        self.bin_count = frequencies.len();
        for (tone, &hz) in self.tones.iter_mut().zip(frequencies) {
            let bin = self.fft.nearest_bin(hz as f64, self.sample_rate);
            *tone = Tone {
                frequency: self.fft.bin_to_normalized(bin),
                phase: 0.0,
                starting_phase: 0.0,
            };
        }
        self.capture_fill = 0;
        self.gain_compensation = gain_compensation(self.bin_count);
    }

    fn stop(&mut self) {
        self.active = false;
        self.armed = false;
        self.capture_fill = 0;
    }

    fn arm(&mut self) {
        self.armed = true;
        for tone in &mut self.tones[..self.bin_count] {
            tone.starting_phase = tone.phase;
        }
    }

    fn collect(&mut self, input: &[f32]) {
        let free = self.capture.len() - self.capture_fill;
        let n = input.len().min(free);
        self.capture[self.capture_fill..self.capture_fill + n].copy_from_slice(&input[..n]);
        self.capture_fill += n;
    }

    /// One attempt per callback; retried on the next one if the channel is full
    fn post_result(&mut self) {
        if self.results.size_free() < MessageTag::AnalysisResult.wire_size() {
            return;
        }

        let mut result = AnalysisResult::new(self.level, self.bin_count).with_serial(self.serial);
        if !self.compute_response(&mut result) {
            return;
        }
        if self.results.try_send(&Message::AnalysisResult(result)) {
            self.finished = true;
        }
    }

    fn compute_response(&mut self, result: &mut AnalysisResult) -> bool {
        let fft_size = self.capture.len();
        let spectrum = match self.fft.transform_windowed(&self.capture, &self.window) {
            Ok(spectrum) => spectrum,
            Err(_) => return false,
        };

        let amplitude = self.level.amplitude(self.global_gain.load(Ordering::Relaxed))
            * self.gain_compensation;
        let scale = 4.0 / fft_size as f64;

        for (index, tone) in self.tones[..self.bin_count].iter().enumerate() {
            let bin = ((tone.frequency * fft_size as f64).round() as usize).min(fft_size / 2);
            let h_out = spectrum[bin] * scale;
            let h_in = Complex::from_polar(amplitude, 2.0 * PI * tone.starting_phase);

            let response = if amplitude > 0.0 {
                h_out / h_in
            } else {
                Complex::new(0.0, 0.0)
            };
            result.set_bin(
                index,
                (tone.frequency * self.sample_rate) as f32,
                Complex32::new(response.re as f32, response.im as f32),
            );
        }
        true
    }

    fn generate(&mut self, output: &mut [f32]) {
        let amplitude = self.level.amplitude(self.global_gain.load(Ordering::Relaxed));

        for tone in &mut self.tones[..self.bin_count] {
            let f = tone.frequency;
            let mut p = tone.phase;
            for sample in output.iter_mut() {
                *sample += (amplitude * (2.0 * PI * p).cos()) as f32;
                p += f;
                p -= p.floor();
            }
            tone.phase = p;
        }

        let compensation = self.gain_compensation as f32;
        for sample in output.iter_mut() {
            *sample *= compensation;
        }
    }

    fn update_levels(&mut self, input: &[f32], output: &[f32]) {
        self.in_level = self.in_follower.process_block(input, self.in_level);
        self.out_level = self.out_follower.process_block(output, self.out_level);
        self.levels.publish(self.in_level, self.out_level);
    }

    pub fn fft_size(&self) -> usize {
        self.capture.len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}
