//! Bounded recent-history buffer for late-joiner catch-up
//!
//! Holds the most recent `capacity` bytes of the live stream as a sliding
//! window. New subscribers receive a snapshot of it before live data so that
//! playback can start immediately instead of waiting for the player's own
//! buffer to fill.

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

/// Sliding window over the tail of the stream
///
/// Not synchronized; the broadcaster wraps it in a mutex.
#[derive(Debug)]
pub struct HistoryBuffer {
    data: VecDeque<u8>,
    capacity: usize,
    /// Bytes ever appended since the last clear
    total_appended: u64,
    /// Bytes evicted to make room for newer data
    evicted: u64,
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
            total_appended: 0,
            evicted: 0,
        }
    }

    /// Append a chunk, discarding the oldest bytes if it would overflow
    ///
    /// When `len + chunk.len() > capacity`, only the newest
    /// `capacity - chunk.len()` existing bytes survive (none if the chunk is
    /// at least `capacity` long). A chunk longer than the whole buffer keeps
    /// only its own last `capacity` bytes.
    pub fn append(&mut self, chunk: &[u8]) {
        self.total_appended += chunk.len() as u64;

        if self.data.len() + chunk.len() > self.capacity {
            let keep = self.capacity.saturating_sub(chunk.len());
            let excess = self.data.len() - keep.min(self.data.len());
            self.data.drain(..excess);
            self.evicted += excess as u64;
        }

        let tail = if chunk.len() > self.capacity {
            self.evicted += (chunk.len() - self.capacity) as u64;
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };
        self.data.extend(tail);
    }

    /// Copy of the current contents, oldest byte first
    pub fn snapshot(&self) -> Bytes {
        let (front, back) = self.data.as_slices();
        let mut out = BytesMut::with_capacity(self.data.len());
        out.extend_from_slice(front);
        out.extend_from_slice(back);
        out.freeze()
    }

    /// Drop all contents and reset counters, keeping the capacity
    pub fn clear(&mut self) {
        self.data.clear();
        self.total_appended = 0;
        self.evicted = 0;
    }

    /// Current length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of bytes retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes appended since the last clear
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    /// Bytes discarded since the last clear
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_within_capacity() {
        let mut history = HistoryBuffer::new(8);
        history.append(b"abc");
        history.append(b"de");

        assert_eq!(history.len(), 5);
        assert_eq!(&history.snapshot()[..], b"abcde");
        assert_eq!(history.evicted(), 0);
    }

    #[test]
    fn test_sliding_window() {
        let mut history = HistoryBuffer::new(8);
        history.append(b"abcdef");
        history.append(b"ghij");

        assert_eq!(&history.snapshot()[..], b"cdefghij");
        assert_eq!(history.evicted(), 2);
        assert_eq!(history.total_appended(), 10);
    }

    #[test]
    fn test_chunk_exactly_capacity() {
        let mut history = HistoryBuffer::new(4);
        history.append(b"xy");
        history.append(b"abcd");

        assert_eq!(&history.snapshot()[..], b"abcd");
    }

    #[test]
    fn test_oversized_chunk_keeps_own_tail() {
        let mut history = HistoryBuffer::new(4);
        history.append(b"xy");
        history.append(b"abcdefg");

        assert_eq!(&history.snapshot()[..], b"defg");
        assert_eq!(history.len(), history.capacity());
    }

    #[test]
    fn test_clear() {
        let mut history = HistoryBuffer::new(4);
        history.append(b"abcdef");
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.total_appended(), 0);
        assert_eq!(history.capacity(), 4);
    }

    #[test]
    fn test_catchup_after_200k_in_2k_chunks() {
        const CAPACITY: usize = 128 * 1024;
        let mut history = HistoryBuffer::new(CAPACITY);
        let mut sent = Vec::new();

        for i in 0..100u32 {
            let chunk: Vec<u8> = (0..2048u32).map(|j| ((i * 7 + j) % 251) as u8).collect();
            history.append(&chunk);
            sent.extend_from_slice(&chunk);
        }

        assert_eq!(sent.len(), 200 * 1024);
        assert_eq!(&history.snapshot()[..], &sent[sent.len() - CAPACITY..]);
    }

    proptest! {
        #[test]
        fn prop_contents_are_suffix_of_everything_appended(
            capacity in 1usize..64,
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..100), 0..40),
        ) {
            let mut history = HistoryBuffer::new(capacity);
            let mut all = Vec::new();

            for chunk in &chunks {
                history.append(chunk);
                all.extend_from_slice(chunk);
                prop_assert!(history.len() <= capacity);
            }

            let expected_len = all.len().min(capacity);
            prop_assert_eq!(history.len(), expected_len);
            let snapshot = history.snapshot();
            prop_assert_eq!(&snapshot[..], &all[all.len() - expected_len..]);
        }
    }
}
