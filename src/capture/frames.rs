//! Bounded buffer of recent JPEG frames.

use std::collections::VecDeque;

/// Default number of frames kept between turns.
pub const DEFAULT_FRAME_CAPACITY: usize = 20;

/// One rasterized preview frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position in the capture order, starting at 0 for each capture session
    pub seq: u64,
    /// JPEG bytes
    pub jpeg: Vec<u8>,
}

/// Ring buffer of frames; once full, each push evicts the oldest frame.
#[derive(Debug)]
pub struct FrameRing {
    frames: VecDeque<Frame>,
    capacity: usize,
    next_seq: u64,
    evicted: u64,
}

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
            evicted: 0,
        }
    }

    /// Appends a frame, returning its sequence number.
    pub fn push(&mut self, jpeg: Vec<u8>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frames.push_back(Frame { seq, jpeg });
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
            self.evicted += 1;
        }
        seq
    }

    /// Removes and returns every buffered frame, oldest first.
    pub fn drain(&mut self) -> Vec<Frame> {
        self.frames.drain(..).collect()
    }

    /// Drops buffered frames and restarts numbering.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.next_seq = 0;
        self.evicted = 0;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total frames pushed since the last reset.
    pub fn pushed(&self) -> u64 {
        self.next_seq
    }

    /// Frames dropped by the capacity bound since the last reset.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Default for FrameRing {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest_beyond_capacity() {
        let mut ring = FrameRing::new(3);
        for i in 0..5u8 {
            ring.push(vec![i]);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.evicted(), 2);

        let seqs: Vec<u64> = ring.drain().iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
    }

    #[test]
    fn test_drain_is_exhaustive() {
        let mut ring = FrameRing::default();
        ring.push(vec![1]);
        ring.push(vec![2]);
        assert_eq!(ring.drain().len(), 2);
        assert!(ring.drain().is_empty());
    }

    #[test]
    fn test_interleaved_drains_see_every_frame_once() {
        let mut ring = FrameRing::new(20);
        let mut seen = Vec::new();
        for round in 0..7u64 {
            for _ in 0..(round * 3 % 11) {
                ring.push(vec![0xff]);
            }
            let drained = ring.drain();
            assert!(drained.len() <= ring.capacity());
            seen.extend(drained.into_iter().map(|f| f.seq));
        }
        let expected: Vec<u64> = (0..ring.pushed()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let mut ring = FrameRing::new(2);
        ring.push(vec![1]);
        ring.push(vec![2]);
        ring.push(vec![3]);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.push(vec![4]), 0);
        assert_eq!(ring.evicted(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut ring = FrameRing::new(0);
        ring.push(vec![1]);
        ring.push(vec![2]);
        assert_eq!(ring.len(), 1);
    }
}
