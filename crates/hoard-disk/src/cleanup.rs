//! Background cleanup executor
//!
//! A single worker thread drains a queue of cleanup jobs (trim to size,
//! compact the journal). Jobs are idempotent and re-check cache state under
//! the cache lock, so submitting while one runs is always safe.
//!
//! Dropping the queue signals the worker by closing the channel and joins
//! it, so no job outlives the owning cache.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the single-worker cleanup thread.
pub(crate) struct CleanupQueue {
    tx: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name("hoard-disk-cleanup".to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
            })
            .ok();
        if worker.is_none() {
            tracing::warn!("failed to spawn cleanup thread; cleanup jobs will be dropped");
        }

        Self {
            tx: Mutex::new(worker.as_ref().map(|_| tx)),
            worker: Mutex::new(worker),
        }
    }

    /// Enqueue a job. Jobs submitted after shutdown are silently dropped,
    /// matching the close contract: a closed cache has nothing to clean.
    pub(crate) fn submit(&self, job: Job) {
        let tx = self.tx.lock();
        if let Some(tx) = tx.as_ref() {
            let _ = tx.send(job);
        }
    }

    /// Close the channel and wait for the worker to finish the queue.
    pub(crate) fn shutdown(&self) {
        self.tx.lock().take();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for CleanupQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_jobs_run_in_order() {
        let queue = CleanupQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let log = Arc::clone(&log);
            queue.submit(Box::new(move || log.lock().push(i)));
        }
        queue.shutdown();

        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_shutdown_drains_pending() {
        let queue = CleanupQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let ran = Arc::clone(&ran);
            queue.submit(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        queue.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_submit_after_shutdown_is_dropped() {
        let queue = CleanupQueue::new();
        queue.shutdown();

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        queue.submit(Box::new(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
