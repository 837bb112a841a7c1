//! Lock-free byte channel between the real-time and non-real-time threads
//!
//! Single-producer/single-consumer byte queue with a fixed capacity. Frames
//! are written with a single `try_put`, so the reader never observes half a
//! frame: the write cursor is published only after the whole payload has
//! been copied, and the read cursor only after a frame was fully consumed.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel full: frame needs {needed} bytes, {free} free")]
    Full { needed: usize, free: usize },
}

/// Fixed-capacity byte ring, split into its two ends before use
pub struct ByteRing {
    producer: HeapProducer<u8>,
    consumer: HeapConsumer<u8>,
    capacity: usize,
}

impl ByteRing {
    /// Create new byte ring
    ///
    /// # Arguments
    /// * `capacity` - Capacity in bytes, never grows afterwards
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<u8>::new(capacity);
        let (producer, consumer) = rb.split();

        Self {
            producer,
            consumer,
            capacity,
        }
    }

    /// Split into writer and reader ends
    pub fn split(self) -> (ChannelWriter, ChannelReader) {
        (
            ChannelWriter {
                producer: self.producer,
                capacity: self.capacity,
            },
            ChannelReader {
                consumer: self.consumer,
                capacity: self.capacity,
            },
        )
    }
}

/// Writing end of a byte ring
pub struct ChannelWriter {
    producer: HeapProducer<u8>,
    capacity: usize,
}

impl ChannelWriter {
    /// Copy a whole frame in, or nothing at all
    ///
    /// # Returns
    /// `true` if the frame fit in the free space and was published
    pub fn try_put(&mut self, bytes: &[u8]) -> bool {
        if self.producer.free_len() < bytes.len() {
            return false;
        }
        self.producer.push_slice(bytes) == bytes.len()
    }

    /// Bytes written but not yet consumed
    pub fn size_used(&self) -> usize {
        self.producer.len()
    }

    /// Bytes available for writing
    pub fn size_free(&self) -> usize {
        self.producer.free_len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Reading end of a byte ring
pub struct ChannelReader {
    consumer: HeapConsumer<u8>,
    capacity: usize,
}

impl ChannelReader {
    /// Copy the first `header.len()` bytes without consuming them
    ///
    /// # Returns
    /// `false` if fewer bytes than the header are available
    pub fn peek(&self, header: &mut [u8]) -> bool {
        if self.consumer.len() < header.len() {
            return false;
        }
        for (dst, src) in header.iter_mut().zip(self.consumer.iter()) {
            *dst = *src;
        }
        true
    }

    /// Consume exactly `buffer.len()` bytes
    ///
    /// # Returns
    /// Number of bytes consumed, 0 if the frame is not complete yet
    pub fn get(&mut self, buffer: &mut [u8]) -> usize {
        if self.consumer.len() < buffer.len() {
            return 0;
        }
        self.consumer.pop_slice(buffer)
    }

    /// Bytes available for reading
    pub fn size_used(&self) -> usize {
        self.consumer.len()
    }

    pub fn size_free(&self) -> usize {
        self.capacity - self.consumer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_fifo_across_wraparound() {
        let (mut writer, mut reader) = ByteRing::new(64).split();

        let mut next_written = 0u8;
        let mut next_read = 0u8;
        for _ in 0..50 {
            let frame: Vec<u8> = (0..24).map(|i| next_written.wrapping_add(i)).collect();
            assert!(writer.try_put(&frame));
            next_written = next_written.wrapping_add(24);

            let mut out = [0u8; 24];
            assert_eq!(reader.get(&mut out), 24);
            for (i, &byte) in out.iter().enumerate() {
                assert_eq!(byte, next_read.wrapping_add(i as u8));
            }
            next_read = next_read.wrapping_add(24);
        }
        assert_eq!(reader.size_used(), 0);
    }

    #[test]
    fn test_try_put_fails_when_frame_exceeds_free_space() {
        let (mut writer, reader) = ByteRing::new(100).split();

        while writer.size_free() >= 30 {
            assert!(writer.try_put(&[1u8; 30]));
        }
        let used = writer.size_used();
        assert!(!writer.try_put(&[2u8; 30]));

        // A failed put leaves the channel untouched
        assert_eq!(writer.size_used(), used);
        assert_eq!(reader.size_used(), used);
    }

    #[test]
    fn test_both_ends_agree_on_space() {
        let (mut writer, mut reader) = ByteRing::new(48).split();
        assert_eq!(writer.capacity(), 48);
        assert_eq!(reader.capacity(), 48);
        assert_eq!(reader.size_free(), 48);

        assert!(writer.try_put(&[3u8; 20]));
        assert_eq!(writer.size_free(), 28);
        assert_eq!(reader.size_free(), 28);
        assert_eq!(reader.size_used() + reader.size_free(), reader.capacity());

        let mut frame = [0u8; 20];
        assert_eq!(reader.get(&mut frame), 20);
        assert_eq!(reader.size_free(), 48);
        assert_eq!(writer.size_free(), 48);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let (mut writer, mut reader) = ByteRing::new(32).split();
        let mut header = [0u8; 2];
        assert!(!reader.peek(&mut header));

        assert!(writer.try_put(&[7, 8, 9]));
        assert!(reader.peek(&mut header));
        assert_eq!(header, [7, 8]);
        assert_eq!(reader.size_used(), 3);

        let mut frame = [0u8; 3];
        assert_eq!(reader.get(&mut frame), 3);
        assert_eq!(frame, [7, 8, 9]);
    }

    #[test]
    fn test_get_refuses_incomplete_frame() {
        let (mut writer, mut reader) = ByteRing::new(32).split();
        assert!(writer.try_put(&[1, 2]));

        let mut frame = [0u8; 4];
        assert_eq!(reader.get(&mut frame), 0);
        assert_eq!(reader.size_used(), 2);
    }

    #[test]
    fn test_concurrent_frames_arrive_whole_and_in_order() {
        const FRAME: usize = 17;
        const FRAMES: usize = 20_000;

        let (mut writer, mut reader) = ByteRing::new(256).split();

        let producer = std::thread::spawn(move || {
            for n in 0..FRAMES {
                let frame = [(n % 251) as u8; FRAME];
                while !writer.try_put(&frame) {
                    std::thread::yield_now();
                }
            }
        });

        let mut received = 0;
        let mut header = [0u8; 1];
        let mut frame = [0u8; FRAME];
        while received < FRAMES {
            if !reader.peek(&mut header) || reader.size_used() < FRAME {
                std::thread::yield_now();
                continue;
            }
            assert_eq!(reader.get(&mut frame), FRAME);
            let expected = (received % 251) as u8;
            assert_eq!(header[0], expected);
            assert!(frame.iter().all(|&b| b == expected));
            received += 1;
        }

        producer.join().unwrap();
    }
}
