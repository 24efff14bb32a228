use std::future::Future;
use std::sync::Arc;

use kbm_types::Entity;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{EngineError, EngineResult};

/// Item passed from the producer to the workers.
#[derive(Debug)]
pub enum WorkItem {
    Job(Entity),
    /// Tells exactly one worker to stop.
    Shutdown,
}

/// Bounded FIFO between the producer and the workers. `push` waits while
/// the queue is full.
#[derive(Clone, Debug)]
pub struct WorkQueue {
    tx: mpsc::Sender<WorkItem>,
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

impl WorkQueue {
    pub fn bounded(capacity: usize) -> (Self, SharedReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, Arc::new(Mutex::new(rx)))
    }

    pub async fn push(&self, item: WorkItem) -> EngineResult<()> {
        self.tx.send(item).await.map_err(|_| EngineError::QueueClosed)
    }
}

/// Fixed set of workers draining a [`WorkQueue`].
///
/// Each worker handles one job at a time until it takes a shutdown
/// sentinel. Shutdown enqueues one sentinel per worker behind any pending
/// jobs, so queued work is finished first, then waits for every worker.
pub struct WorkerPool {
    queue: WorkQueue,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers running `handler` for every job. The queue
    /// holds at most `threads` pending jobs.
    pub fn start<F, Fut>(threads: usize, handler: F) -> Self
    where
        F: Fn(usize, Entity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let threads = threads.max(1);
        let (queue, rx) = WorkQueue::bounded(threads);
        let handler = Arc::new(handler);
        let handles = (0..threads)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    loop {
                        let item = rx.lock().await.recv().await;
                        match item {
                            Some(WorkItem::Job(entity)) => handler(worker, entity).await,
                            Some(WorkItem::Shutdown) | None => break,
                        }
                    }
                    debug!(worker, "worker stopped");
                })
            })
            .collect();
        Self { queue, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Enqueue one job, waiting for room.
    pub async fn submit(&self, entity: Entity) -> EngineResult<()> {
        self.queue.push(WorkItem::Job(entity)).await
    }

    /// Stop every worker after the queued jobs are done.
    pub async fn shutdown(self) -> EngineResult<()> {
        for _ in 0..self.handles.len() {
            // Fails only once every worker is gone.
            if self.queue.push(WorkItem::Shutdown).await.is_err() {
                break;
            }
        }
        let mut failures = Vec::new();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker panicked");
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Worker(failures.join("; ")))
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbm_types::EntityId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn entity(n: u64) -> Entity {
        Entity::new(EntityId::new(format!("Q{n}")).unwrap())
    }

    #[tokio::test]
    async fn all_jobs_run_before_shutdown_returns() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        let pool = WorkerPool::start(3, move |_, _| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(pool.size(), 3);
        for n in 1..=20 {
            pool.submit(entity(n)).await.unwrap();
        }
        pool.shutdown().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_run_in_parallel() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let pool = WorkerPool::start(4, move |_, _| {
            let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        });
        for n in 1..=8 {
            pool.submit(entity(n)).await.unwrap();
        }
        pool.shutdown().await.unwrap();
        assert!(peak.load(Ordering::SeqCst) > 1);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn zero_threads_still_starts_one_worker() {
        let pool = WorkerPool::start(0, |_, _| async {});
        assert_eq!(pool.size(), 1);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn panicking_job_is_reported() {
        let pool = WorkerPool::start(1, |_, e: Entity| async move {
            if e.id.numeric() == 2 {
                panic!("boom");
            }
        });
        pool.submit(entity(1)).await.unwrap();
        pool.submit(entity(2)).await.unwrap();
        let err = pool.shutdown().await.unwrap_err();
        assert!(matches!(err, EngineError::Worker(_)));
    }
}
