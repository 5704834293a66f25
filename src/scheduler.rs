//! Single-worker task scheduler with a supersession fence.
//!
//! All index mutation and query execution runs on one worker thread that
//! owns the engine, so the store never needs internal locking. Every
//! submitted search bumps a shared fence counter and carries the stamp it
//! drew; when the fence has moved past a task's stamp the task is
//! superseded and aborts at its next checkpoint, silently. Rebuilds and
//! edit batches are never fenced; a newer search must not cancel indexing.

use crate::engine::{SearchEngine, SearchResult};
use crate::ontology::AxiomChange;
use crate::progress::ProgressSink;
use crate::query::CompiledQuery;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Cooperative cancellation token checked between evaluation units.
#[derive(Clone)]
pub struct Checkpoint {
    /// Fence counter and the stamp this task drew from it. `None` for
    /// tasks that cannot be superseded.
    fence: Option<(Arc<AtomicU64>, u64)>,
    stop: Arc<AtomicBool>,
}

impl Checkpoint {
    /// A checkpoint that only ever aborts on explicit stop.
    pub fn unfenced() -> Self {
        Self {
            fence: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn fenced(fence: Arc<AtomicU64>, stamp: u64, stop: Arc<AtomicBool>) -> Self {
        Self {
            fence: Some((fence, stamp)),
            stop,
        }
    }

    /// Request cancellation.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// A newer search has been submitted since this task was stamped.
    pub fn is_superseded(&self) -> bool {
        match &self.fence {
            Some((fence, stamp)) => fence.load(Ordering::SeqCst) != *stamp,
            None => false,
        }
    }

    pub fn should_abort(&self) -> bool {
        self.is_stopped() || self.is_superseded()
    }
}

/// Handle to a submitted task; dropping it does not cancel the task.
pub struct TaskHandle {
    stamp: u64,
    stop: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Fence stamp the task drew, 0 for unfenced tasks.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

enum Task {
    Search {
        query: CompiledQuery,
        checkpoint: Checkpoint,
        progress: Box<dyn ProgressSink>,
        callback: Box<dyn FnOnce(Vec<SearchResult>) + Send>,
    },
    Rebuild {
        checkpoint: Checkpoint,
        progress: Box<dyn ProgressSink>,
        done: Box<dyn FnOnce(bool) + Send>,
    },
    Edits {
        batch: Vec<AxiomChange>,
    },
    Shutdown,
}

/// Owns the worker thread and the fence.
pub struct SearchScheduler {
    tx: mpsc::Sender<Task>,
    fence: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl SearchScheduler {
    /// Move the engine onto a fresh worker thread.
    pub fn spawn(engine: SearchEngine) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let fence = Arc::new(AtomicU64::new(0));

        let worker = thread::Builder::new()
            .name("search-worker".to_string())
            .spawn(move || run_worker(engine, rx))?;

        Ok(Self {
            tx,
            fence,
            worker: Some(worker),
        })
    }

    /// Submit a search. The callback runs on the worker thread with the
    /// results; superseded, cancelled, and failed searches never call it.
    pub fn submit_search(
        &self,
        query: CompiledQuery,
        progress: Box<dyn ProgressSink>,
        callback: impl FnOnce(Vec<SearchResult>) + Send + 'static,
    ) -> TaskHandle {
        let stamp = self.fence.fetch_add(1, Ordering::SeqCst) + 1;
        let stop = Arc::new(AtomicBool::new(false));
        let checkpoint = Checkpoint::fenced(self.fence.clone(), stamp, stop.clone());

        let _ = self.tx.send(Task::Search {
            query,
            checkpoint,
            progress,
            callback: Box::new(callback),
        });
        TaskHandle { stamp, stop }
    }

    /// Submit a full rebuild. `done` receives `false` when the build was
    /// cancelled or failed.
    pub fn submit_rebuild(
        &self,
        progress: Box<dyn ProgressSink>,
        done: impl FnOnce(bool) + Send + 'static,
    ) -> TaskHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let checkpoint = Checkpoint {
            fence: None,
            stop: stop.clone(),
        };
        let _ = self.tx.send(Task::Rebuild {
            checkpoint,
            progress,
            done: Box::new(done),
        });
        TaskHandle { stamp: 0, stop }
    }

    /// Queue an edit batch behind any in-flight tasks.
    pub fn submit_edits(&self, batch: Vec<AxiomChange>) {
        let _ = self.tx.send(Task::Edits { batch });
    }

    /// Drain queued tasks and join the worker.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for SearchScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(Task::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(mut engine: SearchEngine, rx: mpsc::Receiver<Task>) {
    while let Ok(task) = rx.recv() {
        match task {
            Task::Search {
                query,
                checkpoint,
                mut progress,
                callback,
            } => {
                if checkpoint.should_abort() {
                    debug!("search superseded before start");
                    continue;
                }
                match engine.execute(&query, &checkpoint, progress.as_mut()) {
                    Ok(Some(results)) if !checkpoint.should_abort() => callback(results),
                    Ok(_) => debug!("search dropped at checkpoint"),
                    Err(e) => error!(error = %e, "search failed"),
                }
            }

            Task::Rebuild {
                checkpoint,
                mut progress,
                done,
            } => match engine.rebuild(&checkpoint, progress.as_mut()) {
                Ok(completed) => done(completed),
                Err(e) => {
                    error!(error = %e, "rebuild failed");
                    done(false);
                }
            },

            Task::Edits { batch } => {
                if let Err(e) = engine.apply_edits(&batch) {
                    error!(error = %e, "edit batch failed");
                }
            }

            Task::Shutdown => break,
        }
    }

    if let Err(e) = engine.dispose() {
        error!(error = %e, "dispose on shutdown failed");
    }
}
