//! Circular sample buffer sized for ~60s of audio. A single allocation
//! indexed by absolute sample count modulo capacity; overrun is signaled
//! rather than panicking, per the caller's soft-reset contract.

pub struct RingBuffer {
    data: Vec<f32>,
    capacity: usize,
    /// Absolute count of samples ever written.
    written: u64,
}

impl RingBuffer {
    pub fn with_seconds(sample_rate: u32, seconds: u32) -> Self {
        let capacity = sample_rate as usize * seconds as usize;
        RingBuffer {
            data: vec![0.0; capacity],
            capacity,
            written: 0,
        }
    }

    pub fn push(&mut self, sample: f32) {
        let idx = (self.written % self.capacity as u64) as usize;
        self.data[idx] = sample;
        self.written += 1;
    }

    pub fn push_slice(&mut self, samples: &[f32]) {
        for &s in samples {
            self.push(s);
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True if the absolute range `[start, end)` has been at least
    /// partially overwritten since it was written (i.e. reading it now
    /// would not return the original samples).
    pub fn is_overrun(&self, start: u64, end: u64) -> bool {
        end > start && self.written.saturating_sub(end) >= self.capacity as u64
    }

    /// Read the absolute range `[start, end)`. Returns `None` on overrun or
    /// if the range hasn't been written yet.
    pub fn read(&self, start: u64, end: u64) -> Option<Vec<f32>> {
        if start >= end || end > self.written || self.is_overrun(start, end) {
            return None;
        }
        Some(
            (start..end)
                .map(|i| self.data[(i % self.capacity as u64) as usize])
                .collect(),
        )
    }

    pub fn reset(&mut self) {
        self.data.iter_mut().for_each(|s| *s = 0.0);
        self.written = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_written_samples() {
        let mut rb = RingBuffer::with_seconds(1000, 1);
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        rb.push_slice(&samples);
        let read = rb.read(0, 100).unwrap();
        assert_eq!(read, samples);
    }

    #[test]
    fn detects_overrun() {
        let mut rb = RingBuffer::with_seconds(10, 1); // capacity 10
        rb.push_slice(&vec![0.0; 25]);
        assert!(rb.is_overrun(0, 5));
        assert!(rb.read(0, 5).is_none());
        assert!(!rb.is_overrun(20, 25));
        assert!(rb.read(20, 25).is_some());
    }

    #[test]
    fn reset_clears_state() {
        let mut rb = RingBuffer::with_seconds(10, 1);
        rb.push_slice(&[1.0, 2.0, 3.0]);
        rb.reset();
        assert_eq!(rb.written(), 0);
    }
}
