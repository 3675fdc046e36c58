//! Named executors: the processing pool and the delivery thread.

use crate::{Error, Result};
use crossbeam_channel::{unbounded, Sender};
use std::thread::{self, JoinHandle};

/// Work run on the delivery thread.
pub(crate) type Task = Box<dyn FnOnce() + Send>;

enum DeliveryCommand {
    Run(Task),
    Shutdown,
}

/// A single `pitchline-delivery` thread running tasks in submission order.
///
/// Every listener callback runs here, so a listener never sees two
/// callbacks at once.
pub(crate) struct DeliveryExecutor {
    cmd_tx: Sender<DeliveryCommand>,
    thread: Option<JoinHandle<()>>,
}

impl DeliveryExecutor {
    pub(crate) fn start() -> Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded::<DeliveryCommand>();

        let thread = thread::Builder::new()
            .name("pitchline-delivery".into())
            .spawn(move || {
                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        DeliveryCommand::Run(task) => {
                            let result =
                                std::panic::catch_unwind(std::panic::AssertUnwindSafe(task));
                            if result.is_err() {
                                tracing::error!("listener callback panicked");
                            }
                        }
                        DeliveryCommand::Shutdown => break,
                    }
                }
                tracing::debug!("delivery thread exiting");
            })
            .map_err(|e| Error::ThreadSpawn(format!("pitchline-delivery: {e}")))?;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    /// Queue `task`. Returns false if the delivery thread has exited.
    pub(crate) fn submit(&self, task: Task) -> bool {
        self.cmd_tx.send(DeliveryCommand::Run(task)).is_ok()
    }

    /// Let queued tasks finish, then join. Skips the join on the delivery
    /// thread itself.
    pub(crate) fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(DeliveryCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for DeliveryExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Processing pool size when none is configured.
pub(crate) fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

/// Thread pool running transform and estimation, threads `pitchline-worker-N`.
pub(crate) fn processing_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("pitchline-worker-{i}"))
        .build()
        .map_err(|e| Error::ThreadSpawn(format!("Thread pool creation failed: {e}")))
}
