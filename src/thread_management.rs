//! Worker thread plumbing: naming, optional core pinning, joinable handles.

use core_affinity::CoreId;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Builder for distributor worker threads.
///
/// Workers get a name (visible in debuggers and panic messages) and may be
/// pinned to a CPU core, which matters for busy-spin deployments.
#[derive(Debug, Default)]
pub struct ThreadBuilder {
    name: Option<String>,
    affinity: Option<CoreId>,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Pin the spawned thread to `core_id`.
    ///
    /// # Panics
    /// Panics if `core_id` is not present on this system.
    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        let available = available_cores();
        assert!(
            available.contains(&core_id),
            "CPU core {core_id} is not available, have: {available:?}"
        );
        self.affinity = Some(CoreId { id: core_id });
        self
    }

    /// Spawn `f` on a new thread with the configured name and affinity.
    pub fn spawn<F>(self, f: F) -> std::io::Result<ManagedThread>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = self.name.unwrap_or_else(|| "spindle-worker".to_string());
        let affinity = self.affinity;
        let name_in_thread = name.clone();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            if let Some(core_id) = affinity {
                if core_affinity::set_for_current(core_id) {
                    debug!(thread = %name_in_thread, core = core_id.id, "pinned worker");
                } else {
                    warn!(thread = %name_in_thread, core = core_id.id, "could not pin worker");
                }
            }
            f();
        })?;

        Ok(ManagedThread {
            handle: Some(handle),
            name,
        })
    }
}

/// A joinable worker thread; joined on drop if not joined explicitly.
#[derive(Debug)]
pub struct ManagedThread {
    handle: Option<JoinHandle<()>>,
    name: String,
}

impl ManagedThread {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the thread to finish. No-op if already joined.
    pub fn join(mut self) {
        self.join_inner();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn join_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(thread = %self.name, "worker terminated by panic");
            }
        }
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        self.join_inner();
    }
}

/// CPU core ids usable for pinning.
pub fn available_cores() -> Vec<usize> {
    core_affinity::get_core_ids()
        .unwrap_or_default()
        .into_iter()
        .map(|core| core.id)
        .collect()
}
