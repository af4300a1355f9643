use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;

/// Thread-safe ring buffer of audio samples shared with a device callback
#[derive(Clone)]
pub struct AudioRingBuffer {
    buffer: Arc<Mutex<HeapRb<f32>>>,
}

impl AudioRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(HeapRb::new(capacity.max(1)))),
        }
    }

    /// Write as many samples as fit; returns how many were taken
    pub fn write_available(&self, samples: &[f32]) -> usize {
        self.buffer.lock().push_slice(samples)
    }

    /// Fill `out` from the buffer; returns how many samples were read
    pub fn read_into(&self, out: &mut [f32]) -> usize {
        self.buffer.lock().pop_slice(out)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read() {
        let buffer = AudioRingBuffer::new(1024);
        let data: Vec<f32> = (0..100).map(|i| i as f32).collect();

        assert_eq!(buffer.write_available(&data), 100);
        assert_eq!(buffer.len(), 100);
        let mut out = vec![0.0; 100];
        assert_eq!(buffer.read_into(&mut out), 100);
        assert_eq!(out, data);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_write_available_stops_when_full() {
        let buffer = AudioRingBuffer::new(10);
        let data: Vec<f32> = (0..20).map(|i| i as f32).collect();

        assert_eq!(buffer.write_available(&data), 10);
        let mut out = vec![0.0; 20];
        assert_eq!(buffer.read_into(&mut out), 10);
        assert_eq!(out[..10], data[..10]);
    }

    #[test]
    fn test_clones_share_samples() {
        let producer = AudioRingBuffer::new(16);
        let consumer = producer.clone();
        producer.write_available(&[0.25; 4]);

        let mut out = [0.0; 8];
        assert_eq!(consumer.read_into(&mut out), 4);
        assert_eq!(consumer.capacity(), 16);

        producer.write_available(&[0.5; 4]);
        consumer.clear();
        assert!(producer.is_empty());
    }
}
