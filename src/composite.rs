//! Composite fan-out: mixing synchronous and async handler groups.

use std::sync::Arc;

use crate::distributor::{Distributor, SequentialDistributor};
use crate::handler::{Connector, Handler};
use crate::parallel::ParallelDistributor;
use crate::Result;

/// Default ring capacity for distributors created by the group helpers.
const DEFAULT_GROUP_CAPACITY: usize = 1024;

/// A sequential chain that can also attach whole groups of handlers as
/// async branches.
///
/// `add_parallel_group` gives each handler in the group its own worker
/// thread behind a shared ring; `add_async_sequential_group` runs the
/// group in registration order on a single worker. Either way the group is
/// wrapped in a [`Connector`] and joins the chain as one handler. The
/// composite owns the distributors it creates (they live and die with
/// their connector); externally supplied handlers are shared and never
/// destroyed.
pub struct CompositeDistributor<T> {
    chain: SequentialDistributor<T>,
}

impl<T> CompositeDistributor<T>
where
    T: Copy + Default + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            chain: SequentialDistributor::new(),
        }
    }

    /// Attach `handlers` as a parallel fan-out branch: each handler gets
    /// its own worker behind a ring of `DEFAULT_GROUP_CAPACITY` slots.
    /// Returns the connector that now represents the group in the chain.
    pub fn add_parallel_group(
        &self,
        handlers: Vec<Arc<dyn Handler<T>>>,
    ) -> Result<Arc<dyn Handler<T>>> {
        self.add_parallel_group_with_capacity(handlers, DEFAULT_GROUP_CAPACITY)
    }

    pub fn add_parallel_group_with_capacity(
        &self,
        handlers: Vec<Arc<dyn Handler<T>>>,
        capacity: usize,
    ) -> Result<Arc<dyn Handler<T>>> {
        let parallel = ParallelDistributor::new(capacity)?;
        for handler in handlers {
            parallel.add_handler(handler);
        }
        let connector: Arc<dyn Handler<T>> = Arc::new(Connector::new(Box::new(parallel)));
        self.chain.add_handler(Arc::clone(&connector));
        Ok(connector)
    }

    /// Attach `handlers` as an async-sequential branch: the group keeps
    /// its in-order, one-at-a-time semantics but runs on a single worker
    /// thread decoupled from the caller.
    pub fn add_async_sequential_group(
        &self,
        handlers: Vec<Arc<dyn Handler<T>>>,
    ) -> Result<Arc<dyn Handler<T>>> {
        self.add_async_sequential_group_with_capacity(handlers, DEFAULT_GROUP_CAPACITY)
    }

    pub fn add_async_sequential_group_with_capacity(
        &self,
        handlers: Vec<Arc<dyn Handler<T>>>,
        capacity: usize,
    ) -> Result<Arc<dyn Handler<T>>> {
        let sequential = SequentialDistributor::with_handlers(handlers);
        let parallel = ParallelDistributor::new(capacity)?;
        parallel.add_handler(Arc::new(Connector::new(Box::new(sequential))));
        let connector: Arc<dyn Handler<T>> = Arc::new(Connector::new(Box::new(parallel)));
        self.chain.add_handler(Arc::clone(&connector));
        Ok(connector)
    }
}

impl<T> Default for CompositeDistributor<T>
where
    T: Copy + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Distributor<T> for CompositeDistributor<T>
where
    T: Copy + Default + Send + Sync + 'static,
{
    fn add_handler(&self, handler: Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>> {
        self.chain.add_handler(handler)
    }

    fn remove_handler(&self, handler: &Arc<dyn Handler<T>>) -> Option<Arc<dyn Handler<T>>> {
        self.chain.remove_handler(handler)
    }

    fn distribute(&self, message: &T) {
        self.chain.distribute(message);
    }

    fn start(&self) -> Result<()> {
        self.chain.start()
    }

    fn signal(&self, stop_signal: i64) {
        self.chain.signal(stop_signal);
    }

    fn join(&self) {
        self.chain.join();
    }
}
