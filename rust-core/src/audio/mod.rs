//! Real-time side: byte channel, wire messages, envelope follower and the
//! transfer-function engine, plus the cpal host behind the `host` feature

pub mod buffer;
pub mod channel;
pub mod engine;
pub mod follower;
pub mod messages;

#[cfg(feature = "host")]
pub mod host;

pub use buffer::AudioRingBuffer;
pub use channel::{ByteRing, ChannelError, ChannelReader, ChannelWriter};
pub use engine::{EngineError, EngineHandle, LevelMeters, TransferEngine};
pub use follower::EnvelopeFollower;
pub use messages::{AnalysisResult, Message, MessageReceiver, MessageSender, ToneBatch};

#[cfg(feature = "host")]
pub use host::{AudioDeviceInfo, AudioError, AudioHost};
