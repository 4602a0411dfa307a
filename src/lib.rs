//! `spindle` - bounded lock-free inter-thread messaging
//!
//! A disruptor-style ring buffer for ultra-low-latency producer/consumer
//! communication between threads in a single process, plus a distributor
//! layer for composing sequential and parallel message fan-out pipelines
//! on top of it.
//!
//! ## Core pieces
//!
//! - [`Sequence`]: a cache-line-padded atomic counter shared between
//!   producers and consumers.
//! - [`Sequencer`]: owns a power-of-two ring of payload slots, a cursor,
//!   a claim strategy and a wait strategy; producers claim indices, write
//!   the slot and publish.
//! - [`SequenceBarrier`]: lets a consumer block, spin or time out until a
//!   target index has been published, with support for dependency chains.
//! - [`Distributor`] variants ([`SingleDistributor`],
//!   [`SequentialDistributor`], [`ParallelDistributor`],
//!   [`CompositeDistributor`]) fan payloads out to [`Handler`]s, either on
//!   the calling thread or through dedicated worker threads each driving
//!   their own consumer sequence.
//!
//! ## Quick start
//!
//! ```
//! use spindle::{Sequencer, Sequence};
//! use std::sync::Arc;
//!
//! let sequencer: Sequencer<i64> = Sequencer::new(16).unwrap();
//! let consumer = Arc::new(Sequence::default());
//! sequencer.set_gating_sequences(vec![Arc::clone(&consumer)]);
//!
//! let idx = sequencer.claim();
//! sequencer.write(idx, 42);
//! sequencer.publish(idx);
//!
//! let barrier = sequencer.new_barrier(vec![]);
//! let available = barrier.wait_for(idx).unwrap();
//! assert!(available >= idx);
//! assert_eq!(*sequencer.get(idx), 42);
//! consumer.set(idx);
//! ```

pub mod claim_strategy;
pub mod composite;
pub mod distributor;
pub mod handler;
pub mod parallel;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod sequencer;
pub mod thread_management;
pub mod wait_strategy;

#[cfg(test)]
mod property_tests;

pub use claim_strategy::{ClaimStrategy, MultiProducerClaim, SingleProducerClaim};
pub use composite::CompositeDistributor;
pub use distributor::{Distributor, SequentialDistributor, SingleDistributor};
pub use handler::{Connector, Handler};
pub use parallel::ParallelDistributor;
pub use ring_buffer::RingBuffer;
pub use sequence::Sequence;
pub use sequence_barrier::SequenceBarrier;
pub use sequencer::Sequencer;
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, WaitStrategy,
    YieldingWaitStrategy,
};

/// The initial value of every cursor and consumer sequence: "nothing
/// published yet".
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Stop signal meaning "drain through the last claimed index, then stop".
///
/// Passing this to [`Distributor::signal`] asks async workers to keep
/// consuming until they have processed everything that was distributed
/// before the signal, and only then exit.
pub const DEFAULT_STOP_SIGNAL: i64 = i64::MIN;

/// Stop signal meaning "exit on the next loop iteration without draining".
pub const STOP_IMMEDIATELY_SIGNAL: i64 = i64::MIN + 1;

/// Errors reported by the crate's cold paths.
///
/// The hot path (claim, publish, slot access, `process`) never reports
/// errors; it blocks or succeeds.
#[derive(Debug, thiserror::Error)]
pub enum DisruptorError {
    /// Ring capacity must be a power of two.
    #[error("buffer size must be a power of 2, got: {0}")]
    InvalidBufferSize(usize),

    /// A non-blocking claim found no free slots.
    #[error("insufficient capacity in ring buffer")]
    InsufficientCapacity,

    /// A barrier wait was interrupted by an alert.
    #[error("sequence barrier alerted")]
    Alerted,

    /// A worker thread could not be spawned.
    #[error("worker thread error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Utility to check the ring-capacity constraint.
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_power_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(2));
        assert!(is_power_of_two(1024));

        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(3));
        assert!(!is_power_of_two(1000));
    }

    #[test]
    fn test_sentinels_are_distinct() {
        assert_ne!(DEFAULT_STOP_SIGNAL, STOP_IMMEDIATELY_SIGNAL);
        assert_ne!(DEFAULT_STOP_SIGNAL, INITIAL_CURSOR_VALUE);
        assert_ne!(STOP_IMMEDIATELY_SIGNAL, INITIAL_CURSOR_VALUE);
    }
}
