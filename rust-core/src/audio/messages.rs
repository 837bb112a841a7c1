//! Messages exchanged with the real-time engine
//!
//! Every message kind has a fixed layout, so its frame size is known from the
//! tag alone and frames need no length prefix. A frame is one tag byte
//! followed by the raw bytes of the kind's payload.

use super::channel::{ChannelError, ChannelReader, ChannelWriter};
use crate::config::RetryPolicy;
use crate::constants::MAX_BINS_AT_ONCE;
use crate::level::Level;
use bytemuck::{Pod, Zeroable};
use num_complex::Complex32;
use std::mem::size_of;

/// Bytes read by `peek` to identify a frame
pub const HEADER_SIZE: usize = 1;

/// Message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    StartToneBatch = 0,
    StopGeneration = 1,
    AnalysisResult = 2,
}

impl MessageTag {
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MessageTag::StartToneBatch),
            1 => Some(MessageTag::StopGeneration),
            2 => Some(MessageTag::AnalysisResult),
            _ => None,
        }
    }

    /// Exact frame size of this kind: header plus payload
    pub const fn wire_size(self) -> usize {
        HEADER_SIZE
            + match self {
                MessageTag::StartToneBatch => size_of::<ToneBatch>(),
                MessageTag::StopGeneration => 0,
                MessageTag::AnalysisResult => size_of::<AnalysisResult>(),
            }
    }
}

const fn max_usize(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Largest frame of the catalog
pub const MAX_WIRE_SIZE: usize = max_usize(
    MessageTag::StartToneBatch.wire_size(),
    max_usize(
        MessageTag::StopGeneration.wire_size(),
        MessageTag::AnalysisResult.wire_size(),
    ),
);

/// Request to generate and measure up to 32 simultaneous tones
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ToneBatch {
    level: u32,
    bin_count: u32,
    /// Batch id, echoed back in the result
    serial: u32,
    /// Requested frequencies in Hz
    frequencies: [f32; MAX_BINS_AT_ONCE],
}

impl ToneBatch {
    /// Build a batch; at most `MAX_BINS_AT_ONCE` frequencies are kept
    pub fn new(level: Level, frequencies_hz: &[f32]) -> Self {
        debug_assert!(!frequencies_hz.is_empty());
        let count = frequencies_hz.len().min(MAX_BINS_AT_ONCE);

        let mut batch = Self::zeroed();
        batch.level = level.to_wire();
        batch.bin_count = count as u32;
        batch.frequencies[..count].copy_from_slice(&frequencies_hz[..count]);
        batch
    }

    pub fn with_serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    pub fn level(&self) -> Level {
        decode_level(self.level)
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn bin_count(&self) -> usize {
        (self.bin_count as usize).min(MAX_BINS_AT_ONCE)
    }

    /// Requested frequencies in Hz
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies[..self.bin_count()]
    }
}

/// One completed measurement batch
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AnalysisResult {
    level: u32,
    bin_count: u32,
    /// Serial of the batch this result answers
    serial: u32,
    /// Measured frequencies in Hz, after snapping to the FFT grid
    frequencies: [f32; MAX_BINS_AT_ONCE],
    /// Transfer function as (re, im) pairs
    responses: [[f32; 2]; MAX_BINS_AT_ONCE],
}

impl AnalysisResult {
    pub fn new(level: Level, bin_count: usize) -> Self {
        let mut result = Self::zeroed();
        result.level = level.to_wire();
        result.bin_count = bin_count.min(MAX_BINS_AT_ONCE) as u32;
        result
    }

    pub fn with_serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn set_bin(&mut self, index: usize, frequency_hz: f32, response: Complex32) {
        self.frequencies[index] = frequency_hz;
        self.responses[index] = [response.re, response.im];
    }

    pub fn level(&self) -> Level {
        decode_level(self.level)
    }

    pub fn bin_count(&self) -> usize {
        (self.bin_count as usize).min(MAX_BINS_AT_ONCE)
    }

    /// Measured frequencies in Hz
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies[..self.bin_count()]
    }

    pub fn response(&self, index: usize) -> Complex32 {
        let [re, im] = self.responses[index];
        Complex32::new(re, im)
    }

    pub fn responses(&self) -> impl Iterator<Item = Complex32> + '_ {
        (0..self.bin_count()).map(move |i| self.response(i))
    }
}

fn decode_level(code: u32) -> Level {
    match Level::from_wire(code) {
        Some(level) => level,
        None => panic!("invalid excitation level code {code} in message"),
    }
}

/// Engine message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    /// Non-real-time to real-time: start a new tone batch
    StartToneBatch(ToneBatch),

    /// Non-real-time to real-time: stop generating
    StopGeneration,

    /// Real-time to non-real-time: a finished measurement
    AnalysisResult(AnalysisResult),
}

impl Message {
    pub fn tag(&self) -> MessageTag {
        match self {
            Message::StartToneBatch(_) => MessageTag::StartToneBatch,
            Message::StopGeneration => MessageTag::StopGeneration,
            Message::AnalysisResult(_) => MessageTag::AnalysisResult,
        }
    }

    /// Write the frame into `frame`, which must hold `MAX_WIRE_SIZE` bytes
    ///
    /// # Returns
    /// Frame size in bytes
    pub fn encode(&self, frame: &mut [u8]) -> usize {
        let tag = self.tag();
        let size = tag.wire_size();
        frame[0] = tag as u8;

        let payload: &[u8] = match self {
            Message::StartToneBatch(batch) => bytemuck::bytes_of(batch),
            Message::StopGeneration => &[],
            Message::AnalysisResult(result) => bytemuck::bytes_of(result),
        };
        frame[HEADER_SIZE..size].copy_from_slice(payload);
        size
    }

    /// Read a complete frame
    ///
    /// # Panics
    /// On a tag or level outside the catalog. Both ends are built from this
    /// module, so this can only be memory corruption or a framing bug.
    pub fn decode(frame: &[u8]) -> Self {
        let tag = match MessageTag::from_wire(frame[0]) {
            Some(tag) => tag,
            None => panic!("unknown message tag {} on engine channel", frame[0]),
        };
        let payload = &frame[HEADER_SIZE..tag.wire_size()];

        match tag {
            MessageTag::StartToneBatch => {
                let batch: ToneBatch = bytemuck::pod_read_unaligned(payload);
                decode_level(batch.level);
                Message::StartToneBatch(batch)
            }
            MessageTag::StopGeneration => Message::StopGeneration,
            MessageTag::AnalysisResult => {
                let result: AnalysisResult = bytemuck::pod_read_unaligned(payload);
                decode_level(result.level);
                Message::AnalysisResult(result)
            }
        }
    }
}

/// Typed writing end of an engine channel
pub struct MessageSender {
    writer: ChannelWriter,
    frame: [u8; MAX_WIRE_SIZE],
}

impl MessageSender {
    pub fn new(writer: ChannelWriter) -> Self {
        assert!(
            writer.capacity() >= MAX_WIRE_SIZE,
            "channel capacity {} cannot hold a {MAX_WIRE_SIZE}-byte frame",
            writer.capacity()
        );
        Self {
            writer,
            frame: [0; MAX_WIRE_SIZE],
        }
    }

    /// Single attempt, safe to call from the real-time thread
    pub fn try_send(&mut self, message: &Message) -> bool {
        let size = message.encode(&mut self.frame);
        self.writer.try_put(&self.frame[..size])
    }

    /// Retry with a sleep between attempts; non-real-time callers only
    pub fn send_with_retry(
        &mut self,
        message: &Message,
        policy: &RetryPolicy,
    ) -> Result<(), ChannelError> {
        let attempts = policy.attempts.max(1);
        for attempt in 0..attempts {
            if self.try_send(message) {
                return Ok(());
            }
            if attempt + 1 < attempts {
                std::thread::sleep(policy.backoff);
            }
        }
        Err(ChannelError::Full {
            needed: message.tag().wire_size(),
            free: self.writer.size_free(),
        })
    }

    pub fn size_free(&self) -> usize {
        self.writer.size_free()
    }
}

/// Typed reading end of an engine channel
pub struct MessageReceiver {
    reader: ChannelReader,
    frame: [u8; MAX_WIRE_SIZE],
}

impl MessageReceiver {
    pub fn new(reader: ChannelReader) -> Self {
        Self {
            reader,
            frame: [0; MAX_WIRE_SIZE],
        }
    }

    /// Take the next complete message, if any
    pub fn try_recv(&mut self) -> Option<Message> {
        let mut header = [0u8; HEADER_SIZE];
        if !self.reader.peek(&mut header) {
            return None;
        }

        let size = match MessageTag::from_wire(header[0]) {
            Some(tag) => tag.wire_size(),
            None => panic!("unknown message tag {} on engine channel", header[0]),
        };
        if self.reader.size_used() < size {
            return None;
        }

        self.reader.get(&mut self.frame[..size]);
        Some(Message::decode(&self.frame[..size]))
    }

    pub fn size_used(&self) -> usize {
        self.reader.size_used()
    }
}
