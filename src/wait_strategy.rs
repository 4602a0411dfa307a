//! Wait strategies for consumers.
//!
//! A wait strategy determines how a consumer waits until a target index has
//! been published: burning a core, yielding, sleeping, or parking on a
//! condition variable. Strategies are swappable without changing the
//! sequencer contract; latency-sensitive deployments busy-spin, server
//! deployments block.

use std::hint;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::sequence::Sequence;
use crate::{DisruptorError, Result};

/// How long a blocking waiter parks before re-checking the alert flag.
const BLOCKING_RECHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Strategy for waiting until the ring has published a target index.
///
/// `wait_for` blocks until the observable index reaches `sequence`, the
/// alert flag is raised, or (for the timed variant) the timeout expires.
/// The observable index is the cursor clamped by the slowest dependent
/// sequence, which is what makes pipelined consumer stages possible: a
/// downstream consumer never sees past its upstream.
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait until a value `>= sequence` is observable.
    ///
    /// Returns the observed value, or [`DisruptorError::Alerted`] if the
    /// alert flag was raised while waiting.
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64>;

    /// As [`WaitStrategy::wait_for`], but gives up after `timeout` and
    /// returns the last observed value, which may be less than `sequence`.
    /// Callers must compare the result against the requested target.
    fn wait_for_timeout(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
        timeout: Duration,
    ) -> Result<i64>;

    /// Wake any parked waiters. Producers call this after publishing;
    /// no-op for strategies that never park.
    fn signal_all_when_blocking(&self);
}

/// Cursor position clamped by the slowest dependent sequence.
#[inline]
fn observable(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> i64 {
    let current = cursor.get();
    if dependents.is_empty() {
        current
    } else {
        current.min(Sequence::minimum(dependents))
    }
}

#[inline]
fn check_alert(alerted: &AtomicBool) -> Result<()> {
    if alerted.load(Ordering::Acquire) {
        Err(DisruptorError::Alerted)
    } else {
        Ok(())
    }
}

/// Tightest possible loop; lowest latency, one core pegged per waiter.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64> {
        loop {
            check_alert(alerted)?;
            let available = observable(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            hint::spin_loop();
        }
    }

    fn wait_for_timeout(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
        timeout: Duration,
    ) -> Result<i64> {
        let deadline = Instant::now() + timeout;
        loop {
            check_alert(alerted)?;
            let available = observable(cursor, dependents);
            if available >= sequence || Instant::now() >= deadline {
                return Ok(available);
            }
            hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Spins a bounded number of iterations, then yields the scheduler.
#[derive(Debug)]
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    pub fn new() -> Self {
        Self { spin_tries: 100 }
    }

    /// Number of spin iterations before each yield.
    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }

    #[inline]
    fn back_off(&self, counter: &mut u32) {
        if *counter > 0 {
            *counter -= 1;
            hint::spin_loop();
        } else {
            thread::yield_now();
        }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64> {
        let mut counter = self.spin_tries;
        loop {
            check_alert(alerted)?;
            let available = observable(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            self.back_off(&mut counter);
        }
    }

    fn wait_for_timeout(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
        timeout: Duration,
    ) -> Result<i64> {
        let deadline = Instant::now() + timeout;
        let mut counter = self.spin_tries;
        loop {
            check_alert(alerted)?;
            let available = observable(cursor, dependents);
            if available >= sequence || Instant::now() >= deadline {
                return Ok(available);
            }
            self.back_off(&mut counter);
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Parks on a condition variable; producers signal after publish.
///
/// Trades latency for CPU. The only strategy whose waiters consume no
/// cycles while idle.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64> {
        loop {
            check_alert(alerted)?;
            let available = observable(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            let guard = self.mutex.lock().unwrap();
            // Re-check under the lock so a publish between the check and
            // the park cannot be missed, then park with a bounded wait so
            // alerts are noticed even without a signal.
            if observable(cursor, dependents) < sequence {
                let _unused = self
                    .condvar
                    .wait_timeout(guard, BLOCKING_RECHECK_INTERVAL)
                    .unwrap();
            }
        }
    }

    fn wait_for_timeout(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
        timeout: Duration,
    ) -> Result<i64> {
        let deadline = Instant::now() + timeout;
        loop {
            check_alert(alerted)?;
            let available = observable(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(available);
            }
            let park = (deadline - now).min(BLOCKING_RECHECK_INTERVAL);
            let guard = self.mutex.lock().unwrap();
            if observable(cursor, dependents) < sequence {
                let _unused = self.condvar.wait_timeout(guard, park).unwrap();
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        self.condvar.notify_all();
    }
}

/// Bounded micro-sleeps between checks; lowest CPU, highest latency.
#[derive(Debug)]
pub struct SleepingWaitStrategy {
    sleep_interval: Duration,
}

impl SleepingWaitStrategy {
    pub fn new() -> Self {
        Self {
            sleep_interval: Duration::from_micros(100),
        }
    }

    pub fn with_interval(sleep_interval: Duration) -> Self {
        Self { sleep_interval }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
    ) -> Result<i64> {
        loop {
            check_alert(alerted)?;
            let available = observable(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            thread::sleep(self.sleep_interval);
        }
    }

    fn wait_for_timeout(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &AtomicBool,
        timeout: Duration,
    ) -> Result<i64> {
        let deadline = Instant::now() + timeout;
        loop {
            check_alert(alerted)?;
            let available = observable(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(available);
            }
            thread::sleep((deadline - now).min(self.sleep_interval));
        }
    }

    fn signal_all_when_blocking(&self) {}
}
