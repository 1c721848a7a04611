#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use relmap_data::prelude::*;
use relmap_data::{ExecOutcome, Row, Statement};
use relmap_data_sqlx::SqliteExecutor;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

// ── Models ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct Sample {
    pub id: i32,
    pub doc_number: i32,
    pub name: Option<String>,
    pub active: bool,
    pub height: f64,
    pub birth_date: Option<NaiveDateTime>,
    pub birth_date_to: Option<NaiveDateTime>,
}

impl Fields for Sample {
    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "DocNumber" => Some(self.doc_number.into()),
            "Name" => Some(self.name.clone().into()),
            "Active" => Some(self.active.into()),
            "Height" => Some(self.height.into()),
            "BirthDate" => Some(self.birth_date.into()),
            "BirthDateTo" => Some(self.birth_date_to.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "Id" => self.id = value.take().unwrap_or_default(),
            "DocNumber" => self.doc_number = value.take().unwrap_or_default(),
            "Name" => self.name = value.take().unwrap_or_default(),
            "Active" => self.active = value.take().unwrap_or_default(),
            "Height" => self.height = value.take().unwrap_or_default(),
            "BirthDate" => self.birth_date = value.take().unwrap_or_default(),
            "BirthDateTo" => self.birth_date_to = value.take().unwrap_or_default(),
            _ => {}
        }
    }
}

impl Entity for Sample {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("sample_entity")
            .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
            .column(
                ColumnDescriptor::new("DocNumber", ValueType::Int)
                    .column("doc_number")
                    .filterable()
                    .listable(),
            )
            .column(
                ColumnDescriptor::new("Name", ValueType::String)
                    .column("name")
                    .filterable()
                    .listable(),
            )
            .column(ColumnDescriptor::new("Active", ValueType::Bool).column("active"))
            .column(ColumnDescriptor::new("Height", ValueType::Double).column("height"))
            .column(
                ColumnDescriptor::new("BirthDate", ValueType::DateTime)
                    .column("birth_date")
                    .range_to("BirthDateTo"),
            )
            .column(ColumnDescriptor::new("BirthDateTo", ValueType::DateTime).not_mapped())
            .cacheable()
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Child {
    pub id: i32,
    pub parent_id: i32,
    pub name: Option<String>,
}

impl Fields for Child {
    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "ParentId" => Some(self.parent_id.into()),
            "Name" => Some(self.name.clone().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "Id" => self.id = value.take().unwrap_or_default(),
            "ParentId" => self.parent_id = value.take().unwrap_or_default(),
            "Name" => self.name = value.take().unwrap_or_default(),
            _ => {}
        }
    }
}

impl Entity for Child {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("child")
            .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
            .column(ColumnDescriptor::new("ParentId", ValueType::Int).column("parent_id").foreign_key())
            .column(ColumnDescriptor::new("Name", ValueType::String).column("name"))
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Parent {
    pub id: i32,
    pub name: Option<String>,
    pub children: Vec<Child>,
}

impl Fields for Parent {
    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "Name" => Some(self.name.clone().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "Id" => self.id = value.take().unwrap_or_default(),
            "Name" => self.name = value.take().unwrap_or_default(),
            _ => {}
        }
    }

    fn related(&self, property: &str) -> Option<Related> {
        match property {
            "Children" => Some(Related::many(self.children.clone())),
            _ => None,
        }
    }

    fn assign_related(&mut self, property: &str, related: Related) {
        if property == "Children" {
            self.children = related.into_many();
        }
    }
}

impl Entity for Parent {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("parent")
            .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
            .column(ColumnDescriptor::new("Name", ValueType::String).column("name"))
            .relation(RelationDescriptor::one_to_many("Children", blank::<Child>, "ParentId"))
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Customer {
    pub id: i64,
    pub name: Option<String>,
}

impl Fields for Customer {
    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "Name" => Some(self.name.clone().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "Id" => self.id = value.take().unwrap_or_default(),
            "Name" => self.name = value.take().unwrap_or_default(),
            _ => {}
        }
    }
}

impl Entity for Customer {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("customer")
            .column(ColumnDescriptor::new("Id", ValueType::Long).column("id").key().auto_generated())
            .column(ColumnDescriptor::new("Name", ValueType::String).column("name"))
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub total: f64,
    pub customer: Option<Customer>,
}

impl Fields for Order {
    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "CustomerId" => Some(self.customer_id.into()),
            "Total" => Some(self.total.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "Id" => self.id = value.take().unwrap_or_default(),
            "CustomerId" => self.customer_id = value.take().unwrap_or_default(),
            "Total" => self.total = value.take().unwrap_or_default(),
            _ => {}
        }
    }

    fn related(&self, property: &str) -> Option<Related> {
        match (property, &self.customer) {
            ("Customer", Some(customer)) => Some(Related::one(customer.clone())),
            _ => None,
        }
    }

    fn assign_related(&mut self, property: &str, related: Related) {
        if property == "Customer" {
            self.customer = related.into_one();
        }
    }
}

impl Entity for Order {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("orders")
            .column(ColumnDescriptor::new("Id", ValueType::Long).column("id").key().auto_generated())
            .column(ColumnDescriptor::new("CustomerId", ValueType::Long).column("customer_id").foreign_key())
            .column(ColumnDescriptor::new("Total", ValueType::Double).column("total"))
            .relation(RelationDescriptor::many_to_one("Customer", blank::<Customer>, "CustomerId"))
            .build()
    }
}

// ── Recording executor ──────────────────────────────────────────────────

/// Answers reads from canned rows keyed by a SQL fragment and records every
/// statement plus `BEGIN`/`COMMIT`/`ROLLBACK` markers. Inserts report ids
/// counting up from 100; statements containing a `fail_on` fragment error.
#[derive(Default)]
pub struct FakeExecutor {
    responses: Mutex<Vec<(String, Vec<Row>)>>,
    failures: Vec<String>,
    scalar: i64,
    log: Mutex<Vec<String>>,
    next_id: Mutex<i64>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(100),
            ..Self::default()
        }
    }

    pub fn respond(self, fragment: &str, rows: Vec<Row>) -> Self {
        self.responses.lock().unwrap().push((fragment.to_string(), rows));
        self
    }

    pub fn fail_on(mut self, fragment: &str) -> Self {
        self.failures.push(fragment.to_string());
        self
    }

    pub fn scalar(mut self, value: i64) -> Self {
        self.scalar = value;
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.log().iter().filter(|s| s.starts_with("SELECT")).count()
    }

    fn record(&self, statement: &Statement) -> Result<(), DataError> {
        self.log.lock().unwrap().push(statement.sql.clone());
        if self.failures.iter().any(|f| statement.sql.contains(f.as_str())) {
            return Err(DataError::Other(format!("refused: {}", statement.sql)));
        }
        Ok(())
    }

    fn mark(&self, marker: &str) {
        self.log.lock().unwrap().push(marker.to_string());
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome, DataError> {
        self.record(statement)?;
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: statement.is_insert().then_some(id),
        })
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, DataError> {
        self.record(statement)?;
        Ok(self.scalar)
    }

    async fn fetch_rows(
        &self,
        _descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<Row>, DataError> {
        self.record(statement)?;
        Ok(self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| statement.sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DataError> {
        self.mark("BEGIN");
        Ok(Box::new(FakeTransaction { inner: self }))
    }
}

/// Transaction handle of [`FakeExecutor`]: forwards statements and records
/// the `COMMIT`/`ROLLBACK` marker.
pub struct FakeTransaction<'a> {
    inner: &'a FakeExecutor,
}

#[async_trait]
impl Executor for FakeTransaction<'_> {
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome, DataError> {
        self.inner.execute(statement).await
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, DataError> {
        self.inner.fetch_scalar(statement).await
    }

    async fn fetch_rows(
        &self,
        descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<Row>, DataError> {
        self.inner.fetch_rows(descriptor, statement).await
    }

    async fn begin<'b>(&'b self) -> Result<Box<dyn Transaction + 'b>, DataError> {
        Err(DataError::Other("nested transaction".into()))
    }
}

#[async_trait]
impl Transaction for FakeTransaction<'_> {
    async fn commit(self: Box<Self>) -> Result<(), DataError> {
        self.inner.mark("COMMIT");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DataError> {
        self.inner.mark("ROLLBACK");
        Ok(())
    }
}

// ── SQLite ──────────────────────────────────────────────────────────────

const SCHEMA: &[&str] = &[
    "CREATE TABLE sample_entity (id INTEGER PRIMARY KEY AUTOINCREMENT, doc_number INTEGER, name TEXT, active INTEGER, height REAL, birth_date TEXT)",
    "CREATE TABLE parent (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
    "CREATE TABLE child (id INTEGER PRIMARY KEY AUTOINCREMENT, parent_id INTEGER, name TEXT NOT NULL)",
    "CREATE TABLE customer (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
    "CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, customer_id INTEGER, total REAL)",
];

async fn with_schema(pool: SqlitePool) -> Arc<SqliteExecutor> {
    for ddl in SCHEMA {
        sqlx::query(ddl).execute(&pool).await.unwrap();
    }
    Arc::new(SqliteExecutor::new(pool))
}

/// In-memory database with the test schema. One connection, kept open, so
/// every statement sees the same database.
pub async fn sqlite_executor() -> Arc<SqliteExecutor> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    with_schema(pool).await
}

/// File database with the test schema behind several pooled connections.
pub async fn sqlite_file_executor(path: &Path, connections: u32) -> Arc<SqliteExecutor> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(connections)
        .connect_with(options)
        .await
        .unwrap();
    with_schema(pool).await
}

pub fn date(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn sample(doc_number: i32, name: &str) -> Sample {
    Sample {
        doc_number,
        name: Some(name.to_string()),
        active: true,
        ..Default::default()
    }
}
