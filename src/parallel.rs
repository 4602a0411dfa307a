//! Queue-backed parallel fan-out.
//!
//! A [`ParallelDistributor`] owns its own ring: `distribute` claims a slot,
//! copies the payload in and publishes; every registered handler gets a
//! dedicated worker thread that observes published slots in order through
//! its own consumer sequence. All workers see every payload.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

use crate::claim_strategy::{ClaimStrategy, MultiProducerClaim};
use crate::distributor::Distributor;
use crate::handler::{same_handler, Handler};
use crate::ring_buffer::RingBuffer;
use crate::sequence::Sequence;
use crate::sequence_barrier::SequenceBarrier;
use crate::sequencer::Sequencer;
use crate::thread_management::{ManagedThread, ThreadBuilder};
use crate::wait_strategy::{BusySpinWaitStrategy, WaitStrategy};
use crate::{DisruptorError, Result, DEFAULT_STOP_SIGNAL, STOP_IMMEDIATELY_SIGNAL};

/// Default cadence for timed waits and pause polling.
const DEFAULT_TIMEOUT_INTERVAL: Duration = Duration::from_millis(1);

/// A distributor that fans payloads out through an internal ring to one
/// worker thread per handler.
///
/// Lifecycle: register handlers, [`start`](Distributor::start), feed
/// payloads through [`distribute`](Distributor::distribute), then
/// [`signal`](Distributor::signal) and [`join`](Distributor::join).
/// Payloads distributed before `start` are silently dropped; handler
/// registration is rejected once started. Signalling with
/// [`DEFAULT_STOP_SIGNAL`] drains every payload distributed so far before
/// workers exit; [`STOP_IMMEDIATELY_SIGNAL`] exits without draining.
pub struct ParallelDistributor<T> {
    sequencer: Arc<Sequencer<T>>,
    handlers: Mutex<Vec<Arc<dyn Handler<T>>>>,
    workers: Mutex<Vec<AsyncHandlerWrapper>>,
    started: AtomicBool,
    last_claimed: AtomicI64,
    handler_signal: AtomicI64,
    timeout_interval: Option<Duration>,
    pin_cores: Vec<usize>,
}

impl<T> ParallelDistributor<T>
where
    T: Copy + Default + Send + Sync + 'static,
{
    /// Ring of `buffer_size` slots, multi-producer claiming (any thread may
    /// call `distribute`), busy-spin waiting.
    pub fn new(buffer_size: usize) -> Result<Self> {
        Self::with_strategies(
            buffer_size,
            Arc::new(MultiProducerClaim::new(buffer_size)),
            Arc::new(BusySpinWaitStrategy::new()),
        )
    }

    /// Explicit claim and wait strategies for the internal ring.
    pub fn with_strategies(
        buffer_size: usize,
        claim: Arc<dyn ClaimStrategy>,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self> {
        let sequencer = Sequencer::with_strategies(
            RingBuffer::new(buffer_size)?,
            claim,
            wait_strategy,
        )?;
        Ok(Self {
            sequencer: Arc::new(sequencer),
            handlers: Mutex::new(Vec::new()),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            last_claimed: AtomicI64::new(crate::INITIAL_CURSOR_VALUE),
            handler_signal: AtomicI64::new(DEFAULT_STOP_SIGNAL),
            timeout_interval: Some(DEFAULT_TIMEOUT_INTERVAL),
            pin_cores: Vec::new(),
        })
    }

    /// Cadence for worker timed waits and pause polling.
    pub fn with_timeout_interval(mut self, interval: Duration) -> Self {
        self.timeout_interval = Some(interval);
        self
    }

    /// Workers wait without a timeout; stop signals still interrupt the
    /// wait through the barrier alert.
    pub fn without_timeout(mut self) -> Self {
        self.timeout_interval = None;
        self
    }

    /// Pin worker `i` to `cores[i % cores.len()]`.
    pub fn with_core_pinning(mut self, cores: Vec<usize>) -> Self {
        self.pin_cores = cores;
        self
    }

    /// Highest index claimed by `distribute` so far.
    pub fn last_claimed(&self) -> i64 {
        self.last_claimed.load(Ordering::Acquire)
    }

    /// Each live worker's consumer sequence value, in handler registration
    /// order. Empty before `start` and after `join`.
    pub fn processed_sequences(&self) -> Vec<i64> {
        self.workers
            .lock()
            .iter()
            .map(|w| w.sequence.get())
            .collect()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Hold all workers in their pause loop after the current batch.
    /// Lossless: payloads keep queueing in the ring until resume.
    pub fn signal_pause_all(&self) {
        for worker in self.workers.lock().iter() {
            worker.paused.store(true, Ordering::Release);
        }
    }

    /// Release paused workers.
    pub fn signal_resume_all(&self) {
        for worker in self.workers.lock().iter() {
            worker.paused.store(false, Ordering::Release);
        }
    }
}

impl<T> Distributor<T> for ParallelDistributor<T>
where
    T: Copy + Default + Send + Sync + 'static,
{
    fn add_handler(&self, handler: Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>> {
        if self.is_started() {
            return None;
        }
        let mut handlers = self.handlers.lock();
        if !handlers.iter().any(|h| same_handler(h, &handler)) {
            handlers.push(Arc::clone(&handler));
        }
        Some(handler)
    }

    fn remove_handler(&self, handler: &Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>> {
        if self.is_started() {
            return None;
        }
        let mut handlers = self.handlers.lock();
        let position = handlers.iter().position(|h| same_handler(h, handler))?;
        Some(handlers.remove(position))
    }

    fn distribute(&self, message: &T) {
        if !self.is_started() {
            trace!("payload distributed before start, dropped");
            return;
        }
        let idx = self.sequencer.claim();
        self.sequencer.write(idx, *message);
        self.sequencer.publish(idx);
        self.last_claimed.fetch_max(idx, Ordering::AcqRel);
    }

    fn start(&self) -> Result<()> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        match self.launch_workers() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.started.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn signal(&self, stop_signal: i64) {
        self.handler_signal.store(stop_signal, Ordering::Release);
        let target = if stop_signal == DEFAULT_STOP_SIGNAL {
            self.last_claimed()
        } else {
            stop_signal
        };
        for worker in self.workers.lock().iter() {
            worker.signal(target);
        }
    }

    fn join(&self) {
        let workers: Vec<_> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            worker.join();
        }

        // Nested distributors are signalled only after our workers have
        // drained, so everything forwarded to them is already in their
        // rings.
        let stop_signal = self.handler_signal.load(Ordering::Acquire);
        for handler in self.handlers.lock().iter() {
            handler.signal(stop_signal);
            handler.join();
        }

        self.started.store(false, Ordering::Release);
        debug!("parallel distributor joined");
    }
}

impl<T> ParallelDistributor<T>
where
    T: Copy + Default + Send + Sync + 'static,
{
    fn launch_workers(&self) -> Result<()> {
        let handlers = self.handlers.lock().clone();
        let mut workers = self.workers.lock();
        debug_assert!(workers.is_empty());

        // Start nested workers (connectors wrapping inner distributors)
        // before our own, so the tree is live bottom-up.
        for handler in &handlers {
            handler.start()?;
        }

        // Workers only see payloads distributed after this point.
        let initial = self.sequencer.cursor();
        let mut sequences = Vec::with_capacity(handlers.len());

        for (i, handler) in handlers.iter().enumerate() {
            let mut builder = ThreadBuilder::new().thread_name(format!("spindle-worker-{i}"));
            if !self.pin_cores.is_empty() {
                builder = builder.pin_at_core(self.pin_cores[i % self.pin_cores.len()]);
            }
            let wrapper = AsyncHandlerWrapper::launch(
                builder,
                Arc::clone(&self.sequencer),
                Arc::clone(handler),
                initial,
                self.timeout_interval,
            )?;
            sequences.push(Arc::clone(&wrapper.sequence));
            workers.push(wrapper);
        }

        // Gating must be in place before the first publish; handler
        // registration is frozen from here on, so the set is final.
        self.sequencer.set_gating_sequences(sequences);
        debug!(workers = workers.len(), "parallel distributor started");
        Ok(())
    }
}

impl<T> Drop for ParallelDistributor<T> {
    fn drop(&mut self) {
        // Workers share the sequencer and handlers; never let them outlive
        // the distributor.
        let workers: Vec<_> = std::mem::take(&mut *self.workers.lock());
        for worker in &workers {
            worker.signal(STOP_IMMEDIATELY_SIGNAL);
        }
        for worker in workers {
            worker.join();
        }
    }
}

/// One consumer worker: a dedicated thread, its consumer sequence, and the
/// stop/pause flags the thread polls.
struct AsyncHandlerWrapper {
    sequence: Arc<Sequence>,
    stop_at: Arc<AtomicI64>,
    paused: Arc<AtomicBool>,
    barrier: Arc<SequenceBarrier>,
    thread: Option<ManagedThread>,
}

impl AsyncHandlerWrapper {
    fn launch<T>(
        builder: ThreadBuilder,
        sequencer: Arc<Sequencer<T>>,
        handler: Arc<dyn Handler<T>>,
        initial_sequence: i64,
        timeout_interval: Option<Duration>,
    ) -> Result<Self>
    where
        T: Send + Sync + 'static,
    {
        let sequence = Arc::new(Sequence::new(initial_sequence));
        let stop_at = Arc::new(AtomicI64::new(DEFAULT_STOP_SIGNAL));
        let paused = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(sequencer.new_barrier(vec![]));

        let thread = {
            let sequence = Arc::clone(&sequence);
            let stop_at = Arc::clone(&stop_at);
            let paused = Arc::clone(&paused);
            let barrier = Arc::clone(&barrier);
            builder.spawn(move || {
                worker_loop(
                    &sequencer,
                    handler.as_ref(),
                    &barrier,
                    &sequence,
                    &stop_at,
                    &paused,
                    initial_sequence,
                    timeout_interval,
                );
            })?
        };

        Ok(Self {
            sequence,
            stop_at,
            paused,
            barrier,
            thread: Some(thread),
        })
    }

    fn signal(&self, stop_target: i64) {
        self.stop_at.store(stop_target, Ordering::Release);
        // Wake the worker if it is parked waiting for an index that will
        // never be published.
        self.barrier.alert();
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            thread.join();
        }
    }
}

/// The hot loop of one async consumer.
///
/// Waits for the next published index, processes every slot up to the
/// observed cursor, then advances the consumer sequence once per batch.
/// Exits when the stop target is reached (drain), on the immediate-stop
/// sentinel, or on an alert that arrives with no drain work outstanding.
#[allow(clippy::too_many_arguments)]
fn worker_loop<T>(
    sequencer: &Sequencer<T>,
    handler: &dyn Handler<T>,
    barrier: &SequenceBarrier,
    sequence: &Sequence,
    stop_at: &AtomicI64,
    paused: &AtomicBool,
    initial_sequence: i64,
    timeout_interval: Option<Duration>,
) where
    T: Send + Sync,
{
    let poll_interval = timeout_interval.unwrap_or(DEFAULT_TIMEOUT_INTERVAL);
    let mut idx = initial_sequence;

    loop {
        while paused.load(Ordering::Acquire)
            && stop_at.load(Ordering::Acquire) == DEFAULT_STOP_SIGNAL
        {
            thread::sleep(poll_interval);
        }

        let stop = stop_at.load(Ordering::Acquire);
        if stop == STOP_IMMEDIATELY_SIGNAL {
            break;
        }

        let waited = match timeout_interval {
            Some(interval) => barrier.wait_for_timeout(idx + 1, interval),
            None => barrier.wait_for(idx + 1),
        };
        let cursor = match waited {
            Ok(cursor) => cursor,
            Err(DisruptorError::Alerted) => {
                let stop = stop_at.load(Ordering::Acquire);
                if stop == STOP_IMMEDIATELY_SIGNAL || stop == DEFAULT_STOP_SIGNAL {
                    break;
                }
                if idx >= stop {
                    break;
                }
                // Drain target not reached: the alert only meant "a stop
                // was requested", keep consuming.
                barrier.clear_alert();
                continue;
            }
            Err(_) => break,
        };

        let mut next = idx + 1;
        while next <= cursor {
            handler.process(sequencer.get(next));
            idx = next;
            next += 1;
        }
        sequence.set(idx);

        let stop = stop_at.load(Ordering::Acquire);
        if stop != DEFAULT_STOP_SIGNAL && idx >= stop {
            break;
        }
    }

    sequence.set(idx);
    trace!(last_processed = idx, "worker exiting");
}
