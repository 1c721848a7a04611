//! Asynchronous replication of primary writes to secondary databases.

use std::sync::Arc;

use async_trait::async_trait;
use relmap_core::ReplicaSettings;
use relmap_data::{DataError, Executor, Statement};
use relmap_executor::{PoolConfig, WorkerPool};

use crate::executor::SqliteExecutor;
use crate::tx::Tx;

/// Opens a fresh connection to one replica.
#[async_trait]
pub trait ReplicaConnector: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<Arc<dyn Executor>, DataError>;
}

/// Connects to a SQLite replica by URL.
pub struct SqliteConnector {
    url: String,
}

impl SqliteConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ReplicaConnector for SqliteConnector {
    fn name(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<Arc<dyn Executor>, DataError> {
        Ok(Arc::new(SqliteExecutor::connect(&self.url).await?))
    }
}

/// Replicas plus the worker pool applying writes to them.
///
/// Each job connects, runs the statements in its own transaction and drops
/// the connection. Failures are logged and never reach the caller of the
/// primary write.
pub struct ReplicaSet {
    connectors: Vec<Arc<dyn ReplicaConnector>>,
    pool: WorkerPool,
}

impl ReplicaSet {
    /// Must be called from within a tokio runtime.
    pub fn new(connectors: Vec<Arc<dyn ReplicaConnector>>, config: PoolConfig) -> Self {
        Self {
            connectors,
            pool: WorkerPool::new(config),
        }
    }

    /// SQLite connectors for every configured URL, or `None` without URLs.
    pub fn from_settings(settings: &ReplicaSettings) -> Option<Self> {
        if settings.urls.is_empty() {
            return None;
        }
        let connectors = settings
            .urls
            .iter()
            .map(|url| Arc::new(SqliteConnector::new(url.clone())) as Arc<dyn ReplicaConnector>)
            .collect();
        Some(Self::new(
            connectors,
            PoolConfig {
                workers: settings.workers,
                queue_capacity: settings.queue_capacity,
            },
        ))
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Queue `statements` for every replica, waiting while the queue is full.
    pub async fn replicate(&self, statements: Vec<Statement>) {
        if statements.is_empty() {
            return;
        }
        let statements = Arc::new(statements);
        for connector in &self.connectors {
            let connector = connector.clone();
            let statements = statements.clone();
            let name = connector.name().to_string();
            let job = async move {
                if let Err(err) = apply(connector.as_ref(), &statements).await {
                    tracing::error!(replica = %connector.name(), error = %err, "replica write failed");
                }
            };
            if let Err(err) = self.pool.submit(job).await {
                tracing::error!(replica = %name, error = %err, "replica write not queued");
            }
        }
    }

    /// Wait for queued replica writes, then stop the workers.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

async fn apply(connector: &dyn ReplicaConnector, statements: &[Statement]) -> Result<(), DataError> {
    let executor = connector.connect().await?;
    let tx = Tx::begin(executor.as_ref()).await?;
    for statement in statements {
        if let Err(err) = tx.execute(statement).await {
            tx.rollback().await?;
            return Err(err);
        }
    }
    tx.commit().await?;
    tracing::debug!(replica = %connector.name(), statements = statements.len(), "replica updated");
    Ok(())
}
