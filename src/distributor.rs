//! Distributors: fan payloads out to handlers.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::handler::{same_handler, Handler};
use crate::Result;

/// Fans payloads out to registered [`Handler`]s.
///
/// `add_handler` is idempotent and returns the handler back, or `None`
/// when the registration is rejected (occupied single slot, or an async
/// variant that has already started). `remove_handler` returns the removed
/// handler, or `None` when it was absent or removal is forbidden.
/// Registered handlers are shared `Arc`s: the distributor never owns
/// externally supplied handlers.
pub trait Distributor<T>: Send + Sync {
    fn add_handler(&self, handler: Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>>;

    fn remove_handler(&self, handler: &Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>>;

    /// Hand one payload to every registered handler.
    fn distribute(&self, message: &T);

    /// Start any owned workers and propagate `start` down the tree.
    fn start(&self) -> Result<()>;

    /// Propagate a stop signal; see [`crate::DEFAULT_STOP_SIGNAL`] and
    /// [`crate::STOP_IMMEDIATELY_SIGNAL`].
    fn signal(&self, stop_signal: i64);

    /// Wait for owned workers to exit and propagate `join` down the tree.
    fn join(&self);
}

/// Holds exactly one handler and invokes it synchronously.
pub struct SingleDistributor<T> {
    handler: RwLock<Option<Arc<dyn Handler<T>>>>,
}

impl<T> SingleDistributor<T> {
    pub fn new() -> Self {
        Self {
            handler: RwLock::new(None),
        }
    }

    pub fn with_handler(handler: Arc<dyn Handler<T>>) -> Self {
        Self {
            handler: RwLock::new(Some(handler)),
        }
    }
}

impl<T> Default for SingleDistributor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> Distributor<T> for SingleDistributor<T> {
    fn add_handler(&self, handler: Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>> {
        let mut slot = self.handler.write();
        match slot.as_ref() {
            None => {
                *slot = Some(Arc::clone(&handler));
                Some(handler)
            }
            Some(existing) if same_handler(existing, &handler) => Some(handler),
            Some(_) => None,
        }
    }

    fn remove_handler(&self, handler: &Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>> {
        let mut slot = self.handler.write();
        match slot.as_ref() {
            Some(existing) if same_handler(existing, handler) => slot.take(),
            _ => None,
        }
    }

    fn distribute(&self, message: &T) {
        if let Some(handler) = self.handler.read().as_ref() {
            handler.process(message);
        }
    }

    fn start(&self) -> Result<()> {
        if let Some(handler) = self.handler.read().as_ref() {
            handler.start()?;
        }
        Ok(())
    }

    fn signal(&self, stop_signal: i64) {
        if let Some(handler) = self.handler.read().as_ref() {
            handler.signal(stop_signal);
        }
    }

    fn join(&self) {
        if let Some(handler) = self.handler.read().as_ref() {
            handler.join();
        }
    }
}

/// An ordered, deduplicated chain of handlers invoked in registration
/// order, synchronously on the caller's thread.
pub struct SequentialDistributor<T> {
    chain: RwLock<Vec<Arc<dyn Handler<T>>>>,
}

impl<T> SequentialDistributor<T> {
    pub fn new() -> Self {
        Self {
            chain: RwLock::new(Vec::new()),
        }
    }

    pub fn with_handlers(handlers: Vec<Arc<dyn Handler<T>>>) -> Self {
        let chain = Self::new();
        {
            let mut guard = chain.chain.write();
            for handler in handlers {
                if !guard.iter().any(|h| same_handler(h, &handler)) {
                    guard.push(handler);
                }
            }
        }
        chain
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.read().is_empty()
    }
}

impl<T> Default for SequentialDistributor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> Distributor<T> for SequentialDistributor<T> {
    fn add_handler(&self, handler: Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>> {
        let mut chain = self.chain.write();
        if !chain.iter().any(|h| same_handler(h, &handler)) {
            chain.push(Arc::clone(&handler));
        }
        Some(handler)
    }

    fn remove_handler(&self, handler: &Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>> {
        let mut chain = self.chain.write();
        let position = chain.iter().position(|h| same_handler(h, handler))?;
        Some(chain.remove(position))
    }

    fn distribute(&self, message: &T) {
        for handler in self.chain.read().iter() {
            handler.process(message);
        }
    }

    fn start(&self) -> Result<()> {
        for handler in self.chain.read().iter() {
            handler.start()?;
        }
        Ok(())
    }

    fn signal(&self, stop_signal: i64) {
        for handler in self.chain.read().iter() {
            handler.signal(stop_signal);
        }
    }

    fn join(&self) {
        for handler in self.chain.read().iter() {
            handler.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct Recorder {
        sum: AtomicI64,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sum: AtomicI64::new(0),
            })
        }
    }

    impl Handler<i64> for Recorder {
        fn process(&self, message: &i64) {
            self.sum.fetch_add(*message, Ordering::AcqRel);
        }
    }

    #[test]
    fn test_single_distributor_slot_semantics() {
        let distributor = SingleDistributor::new();
        let first = Recorder::new() as Arc<dyn Handler<i64>>;
        let second = Recorder::new() as Arc<dyn Handler<i64>>;

        assert!(distributor.add_handler(first.clone()).is_some());
        // Re-adding the same handler is a no-op, a different one is
        // rejected.
        assert!(distributor.add_handler(first.clone()).is_some());
        assert!(distributor.add_handler(second.clone()).is_none());

        assert!(distributor.remove_handler(&second).is_none());
        assert!(distributor.remove_handler(&first).is_some());
        assert!(distributor.add_handler(second).is_some());
    }

    #[test]
    fn test_single_distributor_without_handler_drops() {
        let distributor: SingleDistributor<i64> = SingleDistributor::new();
        distributor.distribute(&1);
    }

    #[test]
    fn test_sequential_distribute_in_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let distributor = SequentialDistributor::new();

        for tag in 0..3 {
            let order = Arc::clone(&order);
            let handler = move |_message: &i64| order.lock().push(tag);
            distributor.add_handler(Arc::new(handler) as Arc<dyn Handler<i64>>);
        }

        distributor.distribute(&0);
        distributor.distribute(&0);
        assert_eq!(*order.lock(), vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_sequential_deduplicates() {
        let distributor = SequentialDistributor::new();
        let recorder = Recorder::new();
        let handler = recorder.clone() as Arc<dyn Handler<i64>>;

        assert!(distributor.add_handler(handler.clone()).is_some());
        assert!(distributor.add_handler(handler.clone()).is_some());
        assert_eq!(distributor.len(), 1);

        distributor.distribute(&5);
        assert_eq!(recorder.sum.load(Ordering::Acquire), 5);
    }

    #[test]
    fn test_sequential_remove_absent_handler() {
        let distributor = SequentialDistributor::new();
        let present = Recorder::new() as Arc<dyn Handler<i64>>;
        let absent = Recorder::new() as Arc<dyn Handler<i64>>;

        distributor.add_handler(present.clone());
        assert!(distributor.remove_handler(&absent).is_none());
        assert!(distributor.remove_handler(&present).is_some());
        assert!(distributor.is_empty());
    }

    #[test]
    fn test_with_handlers_deduplicates() {
        let recorder = Recorder::new();
        let handler = recorder as Arc<dyn Handler<i64>>;
        let distributor =
            SequentialDistributor::with_handlers(vec![handler.clone(), handler]);
        assert_eq!(distributor.len(), 1);
    }
}
