//! Lock-free sample ring between the capture and playback callbacks
//!
//! The input stream pushes captured samples; the output stream, which runs
//! the engine, pops the same number of samples it is about to render.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Mono sample ring buffer
pub struct AudioRingBuffer {
    producer: HeapProducer<f32>,
    consumer: HeapConsumer<f32>,
}

impl AudioRingBuffer {
    /// Create new ring buffer with given capacity
    ///
    /// # Arguments
    /// * `capacity` - Buffer capacity in samples
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<f32>::new(capacity);
        let (producer, consumer) = rb.split();

        Self { producer, consumer }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
            },
            AudioConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer end of the sample ring (capture callback)
pub struct AudioProducer {
    producer: HeapProducer<f32>,
}

impl AudioProducer {
    /// Write samples, dropping what does not fit
    ///
    /// # Returns
    /// Number of samples actually written
    pub fn write(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Write one channel of an interleaved block
    ///
    /// # Returns
    /// Number of frames actually written
    pub fn write_channel(&mut self, interleaved: &[f32], channels: usize, channel: usize) -> usize {
        let mut frames = interleaved
            .chunks_exact(channels.max(1))
            .map(|frame| frame[channel.min(frame.len() - 1)]);
        self.producer.push_iter(&mut frames)
    }
}

/// Consumer end of the sample ring (playback callback)
pub struct AudioConsumer {
    consumer: HeapConsumer<f32>,
}

impl AudioConsumer {
    /// Fill `buffer`, zero-padding whatever the ring could not supply
    ///
    /// # Returns
    /// Number of samples actually read
    pub fn read_padded(&mut self, buffer: &mut [f32]) -> usize {
        let read = self.consumer.pop_slice(buffer);
        buffer[read..].fill(0.0);
        read
    }

    /// Drop buffered samples beyond `keep`, bounding capture-to-playback latency
    pub fn trim_to(&mut self, keep: usize) -> usize {
        let excess = self.consumer.len().saturating_sub(keep);
        self.consumer.skip(excess)
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}
