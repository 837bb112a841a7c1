//! Simulated measurement path between the engine's output and input

use spectral_profiler::TransferEngine;
use std::collections::VecDeque;

pub const BLOCK: usize = 512;

/// Feeds each rendered block back as input, one callback later plus
/// `extra_delay` samples, scaled by `gain`
pub struct Loopback {
    line: VecDeque<f32>,
    gain: f32,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl Loopback {
    pub fn new(extra_delay: usize, gain: f32) -> Self {
        Self {
            line: std::iter::repeat(0.0).take(BLOCK + extra_delay).collect(),
            gain,
            input: vec![0.0; BLOCK],
            output: vec![0.0; BLOCK],
        }
    }

    pub fn run(&mut self, engine: &mut TransferEngine) {
        for (slot, sample) in self.input.iter_mut().zip(self.line.drain(..BLOCK)) {
            *slot = sample;
        }
        engine.process(&self.input, &mut self.output);
        let gain = self.gain;
        self.line.extend(self.output.iter().map(|&s| s * gain));
    }
}
