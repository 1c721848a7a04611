use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was shut down or cancelled.
    Closed,
    /// The queue is at capacity (only from [`WorkerPool::try_submit`]).
    Full,
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::Closed => write!(f, "worker pool is closed"),
            PoolError::Full => write!(f, "worker pool queue is full"),
        }
    }
}

impl std::error::Error for PoolError {}

/// A fixed set of tokio workers draining a bounded job queue.
///
/// Submitting waits for queue capacity, which is the pool's backpressure.
/// A job that panics is reported and does not take its worker down.
///
/// # Example
///
/// ```ignore
/// let pool = WorkerPool::new(PoolConfig { workers: 2, queue_capacity: 16 });
/// pool.submit(async { replicate().await }).await?;
/// pool.shutdown().await;
/// ```
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Start the workers. Must be called from within a tokio runtime.
    pub fn new(config: PoolConfig) -> Self {
        let config = PoolConfig {
            workers: config.workers.max(1),
            queue_capacity: config.queue_capacity.max(1),
        };
        let (sender, receiver) = mpsc::channel::<Job>(config.queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let cancel = CancellationToken::new();

        let workers = (0..config.workers)
            .map(|id| tokio::spawn(run_worker(id, receiver.clone(), cancel.clone())))
            .collect();
        tracing::info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            cancel,
            workers: Mutex::new(workers),
            config,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    fn sender(&self) -> Result<mpsc::Sender<Job>, PoolError> {
        if self.cancel.is_cancelled() {
            return Err(PoolError::Closed);
        }
        self.sender
            .lock()
            .map_err(|_| PoolError::Closed)?
            .clone()
            .ok_or(PoolError::Closed)
    }

    /// Queue `job`, waiting for capacity.
    pub async fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender()?;
        sender
            .send(Box::pin(job))
            .await
            .map_err(|_| PoolError::Closed)
    }

    /// Queue `job` without waiting.
    pub fn try_submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender()?;
        sender.try_send(Box::pin(job)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PoolError::Full,
            mpsc::error::TrySendError::Closed(_) => PoolError::Closed,
        })
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        match self.sender.lock() {
            Ok(guard) => guard
                .as_ref()
                .map_or(0, |s| s.max_capacity() - s.capacity()),
            Err(_) => 0,
        }
    }

    /// Stop workers after their current job; queued jobs are dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Close the queue, let the workers drain it, and wait for them.
    pub async fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handles: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = async { receiver.lock().await.recv().await } => job,
        };
        let Some(job) = job else {
            break;
        };
        if let Err(err) = tokio::spawn(job).await {
            tracing::error!(worker = id, error = %err, "worker job failed");
        }
    }
    tracing::debug!(worker = id, "worker exiting");
}
