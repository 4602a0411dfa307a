//! Sequence counter shared between producers and consumers.
//!
//! A `Sequence` tracks progress through the ring: the producer cursor is a
//! `Sequence`, and every consumer advertises its own. The counter is padded
//! to a full cache line so that two sequences updated by different threads
//! never share a line.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::INITIAL_CURSOR_VALUE;

/// A cache-line-padded atomic sequence number.
///
/// Mutated by exactly one owner (the sequencer for the cursor, a consumer
/// worker for its own sequence) and read by many.
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Create a sequence with the given initial value.
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial_value)),
        }
    }

    /// Current value, acquire ordering.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Store a value, release ordering.
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Add `delta` and return the new value.
    #[inline]
    pub fn increment_and_get(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// Compare-and-set; returns true when the swap took effect.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Minimum value across `sequences`, or `i64::MAX` when empty.
    ///
    /// Used for producer gating: an empty gating set never limits the
    /// producer.
    pub fn minimum(sequences: &[Arc<Sequence>]) -> i64 {
        sequences
            .iter()
            .map(|s| s.get())
            .min()
            .unwrap_or(i64::MAX)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence").field("value", &self.get()).finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sequence_starts_at_initial_cursor_value() {
        let seq = Sequence::default();
        assert_eq!(seq.get(), INITIAL_CURSOR_VALUE);
    }

    #[test]
    fn test_sequence_set_get() {
        let seq = Sequence::new(0);
        seq.set(100);
        assert_eq!(seq.get(), 100);
    }

    #[test]
    fn test_sequence_increment_and_get() {
        let seq = Sequence::new(0);
        assert_eq!(seq.increment_and_get(1), 1);
        assert_eq!(seq.increment_and_get(5), 6);
        assert_eq!(seq.get(), 6);
    }

    #[test]
    fn test_sequence_compare_and_set() {
        let seq = Sequence::new(10);

        assert!(seq.compare_and_set(10, 20));
        assert_eq!(seq.get(), 20);

        assert!(!seq.compare_and_set(10, 30));
        assert_eq!(seq.get(), 20);
    }

    #[test]
    fn test_minimum_of_empty_slice_is_max() {
        assert_eq!(Sequence::minimum(&[]), i64::MAX);
    }

    #[test]
    fn test_minimum_across_sequences() {
        let sequences = vec![
            Arc::new(Sequence::new(10)),
            Arc::new(Sequence::new(5)),
            Arc::new(Sequence::new(20)),
        ];
        assert_eq!(Sequence::minimum(&sequences), 5);
    }

    #[test]
    fn test_concurrent_increments() {
        let seq = Arc::new(Sequence::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let seq = Arc::clone(&seq);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    seq.increment_and_get(1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seq.get(), 8000);
    }
}
