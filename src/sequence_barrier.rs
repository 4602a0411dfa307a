//! Coordination barrier between the cursor and downstream consumers.

use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::claim_strategy::ClaimStrategy;
use crate::sequence::Sequence;
use crate::wait_strategy::WaitStrategy;
use crate::{DisruptorError, Result};

/// A view over the producer cursor plus upstream consumer sequences.
///
/// A consumer repeatedly calls [`SequenceBarrier::wait_for`] with the index
/// after its own sequence, processes every slot up to the returned value,
/// then advances its sequence once per batch. Listing another consumer's
/// sequence in `dependents` pipelines the two stages: this barrier never
/// returns an index beyond that dependent's advertised progress.
pub struct SequenceBarrier {
    cursor: Arc<Sequence>,
    wait_strategy: Arc<dyn WaitStrategy>,
    dependents: Vec<Arc<Sequence>>,
    claim: Arc<dyn ClaimStrategy>,
    alerted: AtomicBool,
}

impl SequenceBarrier {
    pub(crate) fn new(
        cursor: Arc<Sequence>,
        wait_strategy: Arc<dyn WaitStrategy>,
        dependents: Vec<Arc<Sequence>>,
        claim: Arc<dyn ClaimStrategy>,
    ) -> Self {
        Self {
            cursor,
            wait_strategy,
            dependents,
            claim,
            alerted: AtomicBool::new(false),
        }
    }

    /// Block until a value `>= sequence` is observable; returns the highest
    /// contiguously published index reachable, or
    /// [`DisruptorError::Alerted`].
    pub fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;

        let available = self.wait_strategy.wait_for(
            sequence,
            &self.cursor,
            &self.dependents,
            &self.alerted,
        )?;

        // Pair with the producer's release publish before any slot read.
        fence(Ordering::Acquire);

        if available < sequence {
            return Ok(available);
        }
        Ok(self.claim.highest_published(sequence, available))
    }

    /// As [`SequenceBarrier::wait_for`], but returns the last observed
    /// value (possibly `< sequence`) once `timeout` expires. Callers must
    /// compare the result against the requested target.
    pub fn wait_for_timeout(&self, sequence: i64, timeout: Duration) -> Result<i64> {
        self.check_alert()?;

        let available = self.wait_strategy.wait_for_timeout(
            sequence,
            &self.cursor,
            &self.dependents,
            &self.alerted,
            timeout,
        )?;

        fence(Ordering::Acquire);

        if available < sequence {
            return Ok(available);
        }
        Ok(self.claim.highest_published(sequence, available))
    }

    /// Raise the alert flag and wake parked waiters; subsequent and
    /// in-flight waits return [`DisruptorError::Alerted`] promptly.
    pub fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Lower the alert flag so the barrier can be used again.
    pub fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            Err(DisruptorError::Alerted)
        } else {
            Ok(())
        }
    }

    /// Current cursor value; acquire load.
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }
}

impl std::fmt::Debug for SequenceBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBarrier")
            .field("cursor", &self.cursor.get())
            .field("dependents", &self.dependents.len())
            .field("alerted", &self.is_alerted())
            .finish()
    }
}
