//! Message handlers and the distributor-to-handler adapter.

use std::sync::Arc;

use crate::distributor::Distributor;
use crate::Result;

/// Consumes payloads.
///
/// `process` is the hot path: it must be non-blocking and must not panic.
/// When the same handler instance is attached to more than one parallel
/// worker it will be invoked concurrently, so implementations are `&self`
/// over `Send + Sync` state.
///
/// The lifecycle hooks exist so that handler trees containing nested
/// distributors (see [`Connector`]) can be started, signalled and joined
/// through a uniform surface; leaf handlers inherit the no-op defaults.
pub trait Handler<T>: Send + Sync {
    /// Consume one payload.
    fn process(&self, message: &T);

    /// Launch any workers owned beneath this handler.
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Propagate a stop signal to workers beneath this handler.
    fn signal(&self, _stop_signal: i64) {}

    /// Wait for workers beneath this handler to exit.
    fn join(&self) {}
}

/// Any `Fn(&T)` closure is a leaf handler.
impl<T, F> Handler<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn process(&self, message: &T) {
        self(message)
    }
}

/// Adapts a [`Distributor`] into a [`Handler`] so fan-out trees compose:
/// `process` forwards to `distribute`, the lifecycle hooks forward to the
/// wrapped distributor, and the connector owns the distributor.
pub struct Connector<T> {
    distributor: Box<dyn Distributor<T>>,
}

impl<T> Connector<T> {
    pub fn new(distributor: Box<dyn Distributor<T>>) -> Self {
        Self { distributor }
    }

    /// The wrapped distributor.
    pub fn distributor(&self) -> &dyn Distributor<T> {
        self.distributor.as_ref()
    }
}

impl<T: Send + Sync> Handler<T> for Connector<T> {
    fn process(&self, message: &T) {
        self.distributor.distribute(message);
    }

    fn start(&self) -> Result<()> {
        self.distributor.start()
    }

    fn signal(&self, stop_signal: i64) {
        self.distributor.signal(stop_signal);
    }

    fn join(&self) {
        self.distributor.join();
    }
}

/// Handlers are registered as shared trait objects; identity (not value
/// equality) decides deduplication and removal.
pub(crate) fn same_handler<T>(a: &Arc<dyn Handler<T>>, b: &Arc<dyn Handler<T>>) -> bool {
    Arc::ptr_eq(a, b)
}
