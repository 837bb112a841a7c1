//! Excitation levels
//!
//! The sweep measures the signal path at two amplitudes 40 dB apart, to
//! compare its small-signal and large-signal behaviour.

/// Excitation level of a measurement batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Small-signal excitation, amplitude 0.01 before global gain
    Lo,

    /// Large-signal excitation, amplitude 1.0 before global gain
    Hi,
}

impl Level {
    pub const ALL: [Level; 2] = [Level::Lo, Level::Hi];

    /// Amplitude of this level before the global gain is applied
    pub fn base_amplitude(self) -> f64 {
        match self {
            Level::Lo => 0.01,
            Level::Hi => 1.0,
        }
    }

    /// Excitation amplitude once scaled by `global_gain`
    pub fn amplitude(self, global_gain: f32) -> f64 {
        self.base_amplitude() * global_gain as f64
    }

    /// Code used for this level inside message frames
    pub fn to_wire(self) -> u32 {
        match self {
            Level::Lo => 0,
            Level::Hi => 1,
        }
    }

    pub fn from_wire(code: u32) -> Option<Self> {
        match code {
            0 => Some(Level::Lo),
            1 => Some(Level::Hi),
            _ => None,
        }
    }

    /// Short name, also the stem of the exported profile file
    pub fn name(self) -> &'static str {
        match self {
            Level::Lo => "lo",
            Level::Hi => "hi",
        }
    }
}
