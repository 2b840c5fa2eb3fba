use std::process::{Command, ExitStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pipebridge_codec::Value;
use tracing::info;

use crate::error::{DispatchError, Result};
use crate::worker::{CommandFactory, Worker, WorkerConfig};

/// A fixed set of bridge processes serving calls in round-robin order.
///
/// Each worker handles one call at a time; calls routed to different workers
/// run in parallel. A worker whose process has died is restarted by the next
/// call routed to it.
pub struct BridgePool {
    workers: Vec<Mutex<Worker>>,
    next: AtomicUsize,
}

impl BridgePool {
    /// Start `size` bridge processes from `command` and wait until each is ready.
    pub fn start<F>(size: usize, command: F, config: WorkerConfig) -> Result<Self>
    where
        F: Fn() -> Command + Send + Sync + 'static,
    {
        if size == 0 {
            return Err(DispatchError::EmptyPool);
        }

        let command: CommandFactory = Arc::new(command);
        let workers = (0..size)
            .map(|_| {
                let mut worker = Worker::with_factory(Arc::clone(&command), config.clone());
                worker.start()?;
                Ok(Mutex::new(worker))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(size, "bridge pool ready");
        Ok(Self {
            workers,
            next: AtomicUsize::new(0),
        })
    }

    /// Invoke `function` on the next worker in turn.
    pub fn call(&self, function: &str, args: &Value) -> Result<Value> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        lock(&self.workers[index]).call(function, args)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Pids of the running bridge processes, in worker order.
    pub fn pids(&self) -> Vec<Option<u32>> {
        self.workers.iter().map(|worker| lock(worker).pid()).collect()
    }

    /// Stop every worker and return the exit status of each.
    pub fn shutdown(self) -> Result<Vec<Option<ExitStatus>>> {
        self.workers
            .into_iter()
            .map(|worker| {
                worker
                    .into_inner()
                    .unwrap_or_else(PoisonError::into_inner)
                    .shutdown()
            })
            .collect()
    }
}

impl std::fmt::Debug for BridgePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgePool")
            .field("size", &self.workers.len())
            .field("next", &self.next.load(Ordering::Relaxed))
            .finish()
    }
}

// Poisoning is ignored: a worker stays callable after a panicking call.
fn lock(worker: &Mutex<Worker>) -> MutexGuard<'_, Worker> {
    worker.lock().unwrap_or_else(PoisonError::into_inner)
}
