//! Claim strategies: index assignment for producers.
//!
//! A claim strategy hands out monotonically increasing slot indices,
//! enforces ring capacity against the slowest gating sequence, and defines
//! how publication is recorded. Single-producer encodes publication in the
//! cursor position alone; multi-producer tracks per-slot availability and
//! exposes the longest contiguous published prefix to readers.

use parking_lot::RwLock;
use std::hint;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::sequence::Sequence;
use crate::{DisruptorError, Result, INITIAL_CURSOR_VALUE};

/// Spin iterations before a capacity-blocked claimer starts yielding.
const CLAIM_SPIN_TRIES: u32 = 100;

/// Index assignment and publication protocol for one ring.
///
/// A claim never fails: `claim_n` blocks (spin, then yield) until the ring
/// has capacity against the slowest gating sequence. `try_claim_n` is the
/// non-blocking variant.
pub trait ClaimStrategy: Send + Sync + std::fmt::Debug {
    /// Ring capacity.
    fn buffer_size(&self) -> i64;

    /// The cursor sequence this strategy publishes through.
    fn cursor_sequence(&self) -> Arc<Sequence>;

    /// Replace the gating set. Must not be called once producers are live.
    fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>);

    /// Claim the next `n` indices, blocking for capacity; returns the
    /// highest claimed index.
    fn claim_n(&self, n: i64) -> i64;

    /// Claim the next `n` indices without blocking.
    fn try_claim_n(&self, n: i64) -> Result<i64>;

    /// Record indices `low..=high` as published.
    fn publish(&self, low: i64, high: i64);

    /// Whether `sequence` has been published.
    fn is_available(&self, sequence: i64) -> bool;

    /// Highest index in `from..=until` such that every index up to it is
    /// published; `from - 1` when `from` itself is not.
    fn highest_published(&self, from: i64, until: i64) -> i64;

    /// Free slots remaining against the slowest gating sequence.
    /// Advisory under concurrency.
    fn remaining_capacity(&self) -> i64;
}

#[inline]
fn capacity_back_off(tries: &mut u32) {
    if *tries < CLAIM_SPIN_TRIES {
        *tries += 1;
        hint::spin_loop();
    } else {
        thread::yield_now();
    }
}

/// Claim strategy for exactly one producer thread.
///
/// The next-to-claim counter and the cached gating minimum are private to
/// the single producer, so they use relaxed loads and stores; only the
/// cursor publication is a release store. Calling `claim_n`, `try_claim_n`
/// or `publish` from more than one thread violates the contract and
/// corrupts the sequence stream.
#[derive(Debug)]
pub struct SingleProducerClaim {
    buffer_size: i64,
    cursor: Arc<Sequence>,
    next: AtomicI64,
    cached_gate: AtomicI64,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
}

impl SingleProducerClaim {
    /// # Panics
    /// Panics if `buffer_size` is not a power of two.
    pub fn new(buffer_size: usize) -> Self {
        assert!(
            crate::is_power_of_two(buffer_size),
            "buffer size must be a power of 2, got: {buffer_size}"
        );
        Self {
            buffer_size: buffer_size as i64,
            cursor: Arc::new(Sequence::default()),
            next: AtomicI64::new(INITIAL_CURSOR_VALUE),
            cached_gate: AtomicI64::new(INITIAL_CURSOR_VALUE),
            gating_sequences: RwLock::new(Vec::new()),
        }
    }

    fn minimum_gate(&self) -> i64 {
        Sequence::minimum(&self.gating_sequences.read())
    }
}

impl ClaimStrategy for SingleProducerClaim {
    fn buffer_size(&self) -> i64 {
        self.buffer_size
    }

    fn cursor_sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>) {
        *self.gating_sequences.write() = sequences;
    }

    fn claim_n(&self, n: i64) -> i64 {
        let next = self.next.load(Ordering::Relaxed) + n;
        let wrap_point = next - self.buffer_size;

        if wrap_point > self.cached_gate.load(Ordering::Relaxed) {
            let mut tries = 0;
            let mut min_gate = self.minimum_gate();
            while wrap_point > min_gate {
                capacity_back_off(&mut tries);
                min_gate = self.minimum_gate();
            }
            self.cached_gate.store(min_gate, Ordering::Relaxed);
        }

        self.next.store(next, Ordering::Relaxed);
        next
    }

    fn try_claim_n(&self, n: i64) -> Result<i64> {
        let next = self.next.load(Ordering::Relaxed) + n;
        let wrap_point = next - self.buffer_size;

        if wrap_point > self.cached_gate.load(Ordering::Relaxed) {
            let min_gate = self.minimum_gate();
            if wrap_point > min_gate {
                return Err(DisruptorError::InsufficientCapacity);
            }
            self.cached_gate.store(min_gate, Ordering::Relaxed);
        }

        self.next.store(next, Ordering::Relaxed);
        Ok(next)
    }

    fn publish(&self, _low: i64, high: i64) {
        // One producer: cursor position alone encodes "all <= high
        // published".
        self.cursor.set(high);
    }

    fn is_available(&self, sequence: i64) -> bool {
        sequence <= self.cursor.get()
    }

    fn highest_published(&self, _from: i64, until: i64) -> i64 {
        until
    }

    fn remaining_capacity(&self) -> i64 {
        let produced = self.next.load(Ordering::Relaxed);
        let consumed = self.minimum_gate();
        (self.buffer_size - (produced - consumed)).min(self.buffer_size)
    }
}

/// Claim strategy for concurrent producers.
///
/// Indices are assigned through a CAS loop over the shared cursor, which
/// therefore tracks the claim high-water mark rather than the published
/// one. Publication is recorded per slot in an availability word holding
/// the wrap generation (`sequence >> log2(N)`); readers must go through a
/// barrier, which clamps to the longest contiguous available prefix via
/// [`ClaimStrategy::highest_published`].
#[derive(Debug)]
pub struct MultiProducerClaim {
    buffer_size: i64,
    index_mask: i64,
    index_shift: u32,
    cursor: Arc<Sequence>,
    available: Box<[AtomicI32]>,
    cached_gate: AtomicI64,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
}

impl MultiProducerClaim {
    /// # Panics
    /// Panics if `buffer_size` is not a power of two: the wrap-generation
    /// index math in `is_available`/`highest_published` depends on it.
    pub fn new(buffer_size: usize) -> Self {
        assert!(
            crate::is_power_of_two(buffer_size),
            "buffer size must be a power of 2, got: {buffer_size}"
        );
        let available: Box<[AtomicI32]> =
            (0..buffer_size).map(|_| AtomicI32::new(-1)).collect();
        Self {
            buffer_size: buffer_size as i64,
            index_mask: (buffer_size - 1) as i64,
            index_shift: buffer_size.trailing_zeros(),
            cursor: Arc::new(Sequence::default()),
            available,
            cached_gate: AtomicI64::new(INITIAL_CURSOR_VALUE),
            gating_sequences: RwLock::new(Vec::new()),
        }
    }

    fn minimum_gate(&self) -> i64 {
        Sequence::minimum(&self.gating_sequences.read())
    }

    #[inline]
    fn availability_flag(&self, sequence: i64) -> i32 {
        (sequence >> self.index_shift) as i32
    }

    #[inline]
    fn set_available(&self, sequence: i64) {
        let index = (sequence & self.index_mask) as usize;
        self.available[index].store(self.availability_flag(sequence), Ordering::Release);
    }
}

impl ClaimStrategy for MultiProducerClaim {
    fn buffer_size(&self) -> i64 {
        self.buffer_size
    }

    fn cursor_sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>) {
        *self.gating_sequences.write() = sequences;
    }

    fn claim_n(&self, n: i64) -> i64 {
        let mut tries = 0;
        loop {
            let current = self.cursor.get();
            let next = current + n;
            let wrap_point = next - self.buffer_size;

            if wrap_point > self.cached_gate.load(Ordering::Acquire) {
                let min_gate = self.minimum_gate();
                self.cached_gate.store(min_gate, Ordering::Release);
                if wrap_point > min_gate {
                    capacity_back_off(&mut tries);
                    continue;
                }
            }

            if self.cursor.compare_and_set(current, next) {
                return next;
            }
        }
    }

    fn try_claim_n(&self, n: i64) -> Result<i64> {
        loop {
            let current = self.cursor.get();
            let next = current + n;
            let wrap_point = next - self.buffer_size;

            if wrap_point > self.cached_gate.load(Ordering::Acquire) {
                let min_gate = self.minimum_gate();
                self.cached_gate.store(min_gate, Ordering::Release);
                if wrap_point > min_gate {
                    return Err(DisruptorError::InsufficientCapacity);
                }
            }

            // CAS failure means another producer won the slot, not that
            // capacity ran out; retry.
            if self.cursor.compare_and_set(current, next) {
                return Ok(next);
            }
        }
    }

    fn publish(&self, low: i64, high: i64) {
        for sequence in low..=high {
            self.set_available(sequence);
        }
    }

    fn is_available(&self, sequence: i64) -> bool {
        let index = (sequence & self.index_mask) as usize;
        self.available[index].load(Ordering::Acquire) == self.availability_flag(sequence)
    }

    fn highest_published(&self, from: i64, until: i64) -> i64 {
        let mut sequence = from;
        while sequence <= until {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
            sequence += 1;
        }
        until
    }

    fn remaining_capacity(&self) -> i64 {
        let produced = self.cursor.get();
        let consumed = self.minimum_gate();
        (self.buffer_size - (produced - consumed)).min(self.buffer_size)
    }
}
