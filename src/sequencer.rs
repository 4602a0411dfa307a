//! The sequencer: ring storage plus the claim/publish protocol.

use std::sync::Arc;

use crate::claim_strategy::{ClaimStrategy, MultiProducerClaim, SingleProducerClaim};
use crate::ring_buffer::RingBuffer;
use crate::sequence::Sequence;
use crate::sequence_barrier::SequenceBarrier;
use crate::wait_strategy::{BusySpinWaitStrategy, WaitStrategy};
use crate::Result;

/// Owns a power-of-two ring of payload slots, the cursor, a claim strategy
/// and a wait strategy, and the producer-gating sequence list.
///
/// Producers claim indices, write the slot, then publish; consumers create
/// barriers ([`Sequencer::new_barrier`]) to wait for published indices and
/// advertise their progress through their own [`Sequence`], which must be
/// registered as a gating sequence before publication begins.
#[derive(Debug)]
pub struct Sequencer<T> {
    buffer: RingBuffer<T>,
    claim: Arc<dyn ClaimStrategy>,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
}

impl<T> Sequencer<T>
where
    T: Send + Sync,
{
    /// Single-producer sequencer with the busy-spin wait strategy.
    pub fn new(buffer_size: usize) -> Result<Self>
    where
        T: Default,
    {
        Self::with_strategies(
            RingBuffer::new(buffer_size)?,
            Arc::new(SingleProducerClaim::new(buffer_size)),
            Arc::new(BusySpinWaitStrategy::new()),
        )
    }

    /// Multi-producer sequencer with the busy-spin wait strategy.
    pub fn multi_producer(buffer_size: usize) -> Result<Self>
    where
        T: Default,
    {
        Self::with_strategies(
            RingBuffer::new(buffer_size)?,
            Arc::new(MultiProducerClaim::new(buffer_size)),
            Arc::new(BusySpinWaitStrategy::new()),
        )
    }

    /// Single-producer sequencer over a caller-supplied buffer; the buffer
    /// length is the ring capacity.
    pub fn from_buffer(buffer: Vec<T>) -> Result<Self> {
        let ring = RingBuffer::from_buffer(buffer)?;
        let size = ring.len();
        Self::with_strategies(
            ring,
            Arc::new(SingleProducerClaim::new(size)),
            Arc::new(BusySpinWaitStrategy::new()),
        )
    }

    /// Full-control constructor: explicit storage, claim strategy and wait
    /// strategy.
    ///
    /// # Panics
    /// Panics if the claim strategy was built for a different capacity
    /// than the buffer holds.
    pub fn with_strategies(
        buffer: RingBuffer<T>,
        claim: Arc<dyn ClaimStrategy>,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self> {
        assert_eq!(
            claim.buffer_size() as usize,
            buffer.len(),
            "claim strategy capacity does not match the ring buffer"
        );
        let cursor = claim.cursor_sequence();
        Ok(Self {
            buffer,
            claim,
            wait_strategy,
            cursor,
        })
    }

    /// Ring capacity.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Highest published index (single producer) or claim high-water mark
    /// (multi producer); acquire load.
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    /// The cursor sequence itself, for gating or observation.
    pub fn cursor_sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    /// Claim the next index, blocking until the ring has capacity against
    /// the slowest gating sequence.
    pub fn claim(&self) -> i64 {
        self.claim.claim_n(1)
    }

    /// Claim the next `n` indices; returns the highest.
    pub fn claim_n(&self, n: i64) -> i64 {
        self.claim.claim_n(n)
    }

    /// Non-blocking claim.
    pub fn try_claim(&self) -> Result<i64> {
        self.claim.try_claim_n(1)
    }

    /// Non-blocking batch claim.
    pub fn try_claim_n(&self, n: i64) -> Result<i64> {
        self.claim.try_claim_n(n)
    }

    /// Publish a claimed index, making the slot visible to consumers, and
    /// wake blocking waiters.
    pub fn publish(&self, sequence: i64) {
        self.claim.publish(sequence, sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Publish the claimed range `low..=high`.
    pub fn publish_range(&self, low: i64, high: i64) {
        self.claim.publish(low, high);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Whether `sequence` has been published.
    pub fn is_available(&self, sequence: i64) -> bool {
        self.claim.is_available(sequence)
    }

    /// Shared reference to the slot for `sequence`. Unchecked: for reads
    /// the caller must have observed the index as published.
    #[inline]
    pub fn get(&self, sequence: i64) -> &T {
        self.buffer.get(sequence)
    }

    /// Raw mutable pointer to the slot for `sequence`.
    ///
    /// # Safety
    /// The caller must hold the claim on `sequence` and be its only writer
    /// until publication.
    #[inline]
    pub unsafe fn slot_mut(&self, sequence: i64) -> *mut T {
        self.buffer.get_mut_unchecked(sequence)
    }

    /// Write `value` into the slot for a claimed `sequence`.
    #[inline]
    pub fn write(&self, sequence: i64, value: T) {
        // SAFETY: writing a claimed, unpublished slot; capacity gating
        // guarantees no reader still observes the previous lap.
        unsafe { *self.buffer.get_mut_unchecked(sequence) = value };
    }

    /// Replace the gating set. Must not be called once producers are live.
    pub fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>) {
        self.claim.set_gating_sequences(sequences);
    }

    /// Free slots remaining against the slowest gating sequence.
    pub fn remaining_capacity(&self) -> i64 {
        self.claim.remaining_capacity()
    }

    /// Create a barrier over this sequencer's cursor and wait strategy,
    /// additionally gated by `dependents` for pipelined consumer stages.
    pub fn new_barrier(&self, dependents: Vec<Arc<Sequence>>) -> SequenceBarrier {
        SequenceBarrier::new(
            Arc::clone(&self.cursor),
            Arc::clone(&self.wait_strategy),
            dependents,
            Arc::clone(&self.claim),
        )
    }
}
