use async_trait::async_trait;
use relmap_data::value::parse_date_time;
use relmap_data::{
    ColumnDescriptor, DataError, EntityDescriptor, ExecOutcome, Executor, Literal, Row, Statement,
    Transaction, Value, ValueType,
};
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row as _, Sqlite};
use tokio::sync::Mutex;

use crate::error::SqlxErrorExt;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// [`Executor`] over an `sqlx` SQLite pool.
///
/// Statements run on any pooled connection. [`begin`](Executor::begin) checks
/// out a connection for a [`SqliteTransaction`], so concurrent units of work
/// never share a transaction.
#[derive(Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect a new pool to `url`.
    pub async fn connect(url: &str) -> Result<Self, DataError> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// One open transaction, holding its connection until commit or rollback.
///
/// Dropping it unfinished rolls back, as `sqlx::Transaction` does.
pub struct SqliteTransaction {
    tx: Mutex<sqlx::Transaction<'static, Sqlite>>,
}

fn bind_all<'q>(statement: &'q Statement) -> SqliteQuery<'q> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            Literal::Null => query.bind(None::<String>),
            Literal::Integer(v) => query.bind(*v),
            Literal::Real(v) => query.bind(*v),
            Literal::Text(s) => query.bind(s.as_str()),
            Literal::Blob(bytes) => query.bind(bytes.as_slice()),
        };
    }
    query
}

fn column_for<'d>(descriptor: &'d EntityDescriptor, name: &str) -> Option<&'d ColumnDescriptor> {
    descriptor
        .column(name)
        .or_else(|| descriptor.columns().iter().find(|c| c.column == name))
}

/// SQLite stores values loosely, so decoding is unchecked and driven by the
/// declared column type instead.
fn decode_value(row: &SqliteRow, index: usize, value_type: ValueType) -> Result<Value, sqlx::Error> {
    let value = match value_type {
        ValueType::Short | ValueType::Int | ValueType::Long | ValueType::Bool => row
            .try_get_unchecked::<Option<i64>, _>(index)?
            .map_or(Value::Null, Value::Long),
        ValueType::Float | ValueType::Double | ValueType::Decimal => row
            .try_get_unchecked::<Option<f64>, _>(index)?
            .map_or(Value::Null, Value::Double),
        ValueType::String => row
            .try_get_unchecked::<Option<String>, _>(index)?
            .map_or(Value::Null, Value::Text),
        ValueType::DateTime => Value::DateTime(
            row.try_get_unchecked::<Option<String>, _>(index)?
                .as_deref()
                .and_then(parse_date_time),
        ),
        ValueType::Binary => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(index)?
            .map_or(Value::Null, Value::Binary),
    };
    Ok(value)
}

fn decode_row(descriptor: &EntityDescriptor, row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let Some(mapped) = column_for(descriptor, column.name()) else {
            continue;
        };
        decoded.insert(mapped.property, decode_value(row, column.ordinal(), mapped.value_type)?);
    }
    Ok(decoded)
}

async fn run_execute<'c, E>(conn: E, statement: &Statement) -> Result<ExecOutcome, DataError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    tracing::debug!(sql = %statement.sql, params = statement.params.len(), "execute");
    let result = bind_all(statement)
        .execute(conn)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(ExecOutcome {
        rows_affected: result.rows_affected(),
        last_insert_id: statement.is_insert().then(|| result.last_insert_rowid()),
    })
}

async fn run_scalar<'c, E>(conn: E, statement: &Statement) -> Result<i64, DataError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    tracing::debug!(sql = %statement.sql, "fetch scalar");
    let row = bind_all(statement)
        .fetch_optional(conn)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    match row {
        Some(row) => Ok(row
            .try_get_unchecked::<Option<i64>, _>(0)
            .map_err(SqlxErrorExt::into_data_error)?
            .unwrap_or(0)),
        None => Ok(0),
    }
}

async fn run_fetch<'c, E>(
    conn: E,
    descriptor: &EntityDescriptor,
    statement: &Statement,
) -> Result<Vec<Row>, DataError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    tracing::debug!(sql = %statement.sql, entity = descriptor.type_name(), "fetch rows");
    let rows = bind_all(statement)
        .fetch_all(conn)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    rows.iter()
        .map(|row| decode_row(descriptor, row).map_err(SqlxErrorExt::into_data_error))
        .collect()
}

#[async_trait]
impl Executor for SqliteExecutor {
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome, DataError> {
        run_execute(&self.pool, statement).await
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, DataError> {
        run_scalar(&self.pool, statement).await
    }

    async fn fetch_rows(
        &self,
        descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<Row>, DataError> {
        run_fetch(&self.pool, descriptor, statement).await
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DataError> {
        let tx = self.pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;
        tracing::trace!("transaction started");
        Ok(Box::new(SqliteTransaction { tx: Mutex::new(tx) }))
    }
}

#[async_trait]
impl Executor for SqliteTransaction {
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome, DataError> {
        let mut tx = self.tx.lock().await;
        run_execute(&mut **tx, statement).await
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, DataError> {
        let mut tx = self.tx.lock().await;
        run_scalar(&mut **tx, statement).await
    }

    async fn fetch_rows(
        &self,
        descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<Row>, DataError> {
        let mut tx = self.tx.lock().await;
        run_fetch(&mut **tx, descriptor, statement).await
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DataError> {
        Err(DataError::Other("nested transactions are not supported".into()))
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(self: Box<Self>) -> Result<(), DataError> {
        self.tx
            .into_inner()
            .commit()
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DataError> {
        self.tx
            .into_inner()
            .rollback()
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }
}
