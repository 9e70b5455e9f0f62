//! Generic bounded worker pool.
//!
//! Producers enqueue messages onto a bounded channel; a dispatcher task pulls
//! them off and runs the registered processing function, at most `workers`
//! at a time. A permit is acquired before a message is dequeued, so with a
//! single worker messages are processed strictly in enqueue order.

use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use plaza_common::{AppError, AppResult, get_metrics};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// Function invoked once per dequeued message.
pub type ProcessFn<M> = Arc<dyn Fn(M) -> BoxFuture<'static, AppResult<()>> + Send + Sync>;

/// Misuse of the pool lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("worker pool {0} already started")]
    AlreadyStarted(String),

    #[error("worker pool {0} has no processing function")]
    NoProcessor(String),

    #[error("worker pool {0} not started")]
    NotStarted(String),

    #[error("worker pool {0} already stopped")]
    AlreadyStopped(String),

    #[error("pool closed")]
    Closed,

    #[error("worker pool {0} dispatcher failed: {1}")]
    Dispatcher(String, String),
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        Self::Queue(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Counters for one pool.
#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Messages accepted by `enqueue`.
    pub queued: u64,
    /// Messages processed successfully.
    pub processed: u64,
    /// Messages whose processing returned an error or panicked.
    pub failed: u64,
}

/// A bounded queue drained by a bounded number of concurrent workers.
pub struct WorkerPool<M> {
    name: String,
    workers: usize,
    state: Mutex<State>,
    sender: Mutex<Option<mpsc::Sender<M>>>,
    receiver: Mutex<Option<mpsc::Receiver<M>>>,
    processor: Mutex<Option<ProcessFn<M>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<M> WorkerPool<M>
where
    M: Debug + Send + 'static,
{
    /// Create a pool named `name` running up to `workers` messages at once,
    /// buffering up to `queue_size` pending messages.
    #[must_use]
    pub fn new(name: impl Into<String>, workers: usize, queue_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        Self {
            name: name.into(),
            workers: workers.max(1),
            state: Mutex::new(State::Idle),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            processor: Mutex::new(None),
            dispatcher: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register the processing function. Must be called before [`Self::start`].
    pub fn set_processor<F>(&self, process: F) -> Result<(), PoolError>
    where
        F: Fn(M) -> BoxFuture<'static, AppResult<()>> + Send + Sync + 'static,
    {
        if *lock(&self.state) != State::Idle {
            return Err(PoolError::AlreadyStarted(self.name.clone()));
        }
        *lock(&self.processor) = Some(Arc::new(process));
        Ok(())
    }

    /// Begin dequeuing messages.
    pub fn start(&self) -> Result<(), PoolError> {
        let mut state = lock(&self.state);
        if *state != State::Idle {
            return Err(PoolError::AlreadyStarted(self.name.clone()));
        }

        let process = lock(&self.processor)
            .clone()
            .ok_or_else(|| PoolError::NoProcessor(self.name.clone()))?;
        let receiver = lock(&self.receiver)
            .take()
            .ok_or_else(|| PoolError::AlreadyStarted(self.name.clone()))?;

        let handle = tokio::spawn(dispatch(
            self.name.clone(),
            receiver,
            Arc::new(Semaphore::new(self.workers)),
            process,
            Arc::clone(&self.counters),
        ));
        *lock(&self.dispatcher) = Some(handle);
        *state = State::Running;

        info!(pool = %self.name, workers = self.workers, "Worker pool started");
        Ok(())
    }

    /// Stop accepting messages, drain everything already queued, and wait for
    /// in-flight processing to finish.
    pub async fn stop(&self) -> Result<(), PoolError> {
        let handle = {
            let mut state = lock(&self.state);
            match *state {
                State::Idle => return Err(PoolError::NotStarted(self.name.clone())),
                State::Stopping | State::Stopped => {
                    return Err(PoolError::AlreadyStopped(self.name.clone()));
                }
                State::Running => {}
            }
            *state = State::Stopping;
            // the dispatcher exits once every sender is gone and the queue is empty
            lock(&self.sender).take();
            lock(&self.dispatcher).take()
        };

        info!(pool = %self.name, "Worker pool draining");
        let result = match handle {
            Some(handle) => handle
                .await
                .map_err(|e| PoolError::Dispatcher(self.name.clone(), e.to_string())),
            None => Ok(()),
        };

        *lock(&self.state) = State::Stopped;
        info!(pool = %self.name, "Worker pool stopped");
        result
    }

    /// Whether [`Self::enqueue`] currently accepts messages.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *lock(&self.state) == State::Running
    }

    /// Fail with [`PoolError::Closed`] unless the pool accepts messages.
    pub fn ensure_accepting(&self) -> Result<(), PoolError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(PoolError::Closed)
        }
    }

    /// Queue a message for processing. Waits while the queue is full.
    pub async fn enqueue(&self, msg: M) -> Result<(), PoolError> {
        let sender = {
            if *lock(&self.state) != State::Running {
                return Err(PoolError::Closed);
            }
            lock(&self.sender).clone().ok_or(PoolError::Closed)?
        };

        sender.send(msg).await.map_err(|_| PoolError::Closed)?;

        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        get_metrics()
            .messages_enqueued
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn dispatch<M>(
    name: String,
    mut receiver: mpsc::Receiver<M>,
    semaphore: Arc<Semaphore>,
    process: ProcessFn<M>,
    counters: Arc<Counters>,
) where
    M: Debug + Send + 'static,
{
    let mut tasks = JoinSet::new();

    loop {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let Some(msg) = receiver.recv().await else {
            break;
        };

        let process = Arc::clone(&process);
        let counters = Arc::clone(&counters);
        let name = name.clone();
        tasks.spawn(async move {
            let _permit = permit;
            run_one(&name, &process, msg, &counters).await;
        });

        while tasks.try_join_next().is_some() {}
    }

    while tasks.join_next().await.is_some() {}
    debug!(pool = %name, "Dispatcher exited");
}

async fn run_one<M>(name: &str, process: &ProcessFn<M>, msg: M, counters: &Counters)
where
    M: Debug + Send + 'static,
{
    let context = format!("{msg:?}");
    let fut = AssertUnwindSafe(async { process(msg).await }).catch_unwind();

    let failure = match fut.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(panic) => Some(panic_message(panic.as_ref())),
    };

    match failure {
        None => {
            counters.processed.fetch_add(1, Ordering::Relaxed);
            get_metrics().record_message(true);
        }
        Some(reason) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            get_metrics().record_message(false);
            error!(pool = %name, error = %reason, message = %context, "Error processing message");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| format!("panic: {s}"))
        .or_else(|| payload.downcast_ref::<String>().map(|s| format!("panic: {s}")))
        .unwrap_or_else(|| "panic".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn recording_pool(workers: usize) -> (WorkerPool<u32>, Arc<Mutex<Vec<u32>>>) {
        let pool = WorkerPool::new("test", workers, 8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        pool.set_processor(move |n: u32| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(n);
                Ok(())
            }
            .boxed()
        })
        .unwrap();
        (pool, seen)
    }

    #[tokio::test]
    async fn test_single_worker_preserves_order() {
        let (pool, seen) = recording_pool(1);
        pool.start().unwrap();

        for n in 0..100 {
            pool.enqueue(n).await.unwrap();
        }
        pool.stop().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
        assert_eq!(pool.stats().processed, 100);
    }

    #[tokio::test]
    async fn test_failures_and_panics_do_not_stop_pool() {
        let pool = WorkerPool::new("flaky", 1, 4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        pool.set_processor(move |n: u32| {
            let sink = Arc::clone(&sink);
            async move {
                match n {
                    3 => Err(AppError::Internal("boom".to_string())),
                    5 => panic!("worker blew up"),
                    _ => {
                        sink.lock().unwrap().push(n);
                        Ok(())
                    }
                }
            }
            .boxed()
        })
        .unwrap();
        pool.start().unwrap();

        for n in 0..10 {
            pool.enqueue(n).await.unwrap();
        }
        pool.stop().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 4, 6, 7, 8, 9]);
        let stats = pool.stats();
        assert_eq!(stats.processed, 8);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test]
    async fn test_lifecycle_misuse() {
        let pool: WorkerPool<u32> = WorkerPool::new("lifecycle", 2, 4);
        assert_eq!(pool.start(), Err(PoolError::NoProcessor("lifecycle".into())));
        assert_eq!(
            pool.stop().await,
            Err(PoolError::NotStarted("lifecycle".into()))
        );

        pool.set_processor(|_| async { Ok(()) }.boxed()).unwrap();
        pool.start().unwrap();
        assert_eq!(
            pool.start(),
            Err(PoolError::AlreadyStarted("lifecycle".into()))
        );

        pool.stop().await.unwrap();
        assert_eq!(
            pool.stop().await,
            Err(PoolError::AlreadyStopped("lifecycle".into()))
        );
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_is_closed() {
        let (pool, _) = recording_pool(2);
        assert_eq!(pool.enqueue(1).await, Err(PoolError::Closed));
        assert!(!pool.is_running());
        assert_eq!(pool.ensure_accepting(), Err(PoolError::Closed));

        pool.start().unwrap();
        assert!(pool.is_running());
        assert_eq!(pool.ensure_accepting(), Ok(()));
        pool.stop().await.unwrap();
        assert_eq!(pool.ensure_accepting(), Err(PoolError::Closed));
        assert_eq!(pool.enqueue(1).await, Err(PoolError::Closed));

        let err: AppError = PoolError::Closed.into();
        assert_eq!(err.error_code(), "QUEUE_ERROR");
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_work() {
        let pool = WorkerPool::new("slow", 4, 16);
        let done = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&done);
        pool.set_processor(move |_: u32| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
        .unwrap();
        pool.start().unwrap();

        for n in 0..12 {
            pool.enqueue(n).await.unwrap();
        }
        pool.stop().await.unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 12);
    }
}
