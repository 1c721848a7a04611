//! Transaction guard over an [`Executor`].

use async_trait::async_trait;
use relmap_data::{DataError, EntityDescriptor, ExecOutcome, Executor, Row, Statement, Transaction};

/// An open transaction, finished by [`commit`](Tx::commit) or
/// [`rollback`](Tx::rollback).
///
/// The guard is itself an [`Executor`]: statements run through it land in
/// this transaction only. Dropping an unfinished guard rolls back and logs a
/// warning.
///
/// ```ignore
/// let tx = Tx::begin(executor).await?;
/// match write(&tx).await {
///     Ok(v) => { tx.commit().await?; Ok(v) }
///     Err(e) => { tx.rollback().await?; Err(e) }
/// }
/// ```
pub struct Tx<'a> {
    inner: Option<Box<dyn Transaction + 'a>>,
}

impl<'a> Tx<'a> {
    pub async fn begin(executor: &'a dyn Executor) -> Result<Tx<'a>, DataError> {
        let inner = executor.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    pub async fn commit(mut self) -> Result<(), DataError> {
        match self.inner.take() {
            Some(tx) => tx.commit().await,
            None => Ok(()),
        }
    }

    pub async fn rollback(mut self) -> Result<(), DataError> {
        match self.inner.take() {
            Some(tx) => tx.rollback().await,
            None => Ok(()),
        }
    }

    fn open(&self) -> Result<&(dyn Transaction + 'a), DataError> {
        self.inner
            .as_deref()
            .ok_or_else(|| DataError::Other("transaction already finished".into()))
    }
}

#[async_trait]
impl Executor for Tx<'_> {
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome, DataError> {
        self.open()?.execute(statement).await
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, DataError> {
        self.open()?.fetch_scalar(statement).await
    }

    async fn fetch_rows(
        &self,
        descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<Row>, DataError> {
        self.open()?.fetch_rows(descriptor, statement).await
    }

    async fn begin<'b>(&'b self) -> Result<Box<dyn Transaction + 'b>, DataError> {
        self.open()?.begin().await
    }
}

impl Drop for Tx<'_> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            tracing::warn!("transaction guard dropped without commit or rollback");
        }
    }
}
