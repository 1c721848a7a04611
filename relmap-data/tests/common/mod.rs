#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use relmap_data::prelude::*;
use relmap_data::{ExecOutcome, RelationalColumn, Row, Statement};
use serde::Serialize;

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

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeftRightLink {
    pub id: i32,
    pub left_id: i32,
    pub right_id: i32,
}

impl Fields for LeftRightLink {
    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "LeftId" => Some(self.left_id.into()),
            "RightId" => Some(self.right_id.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "Id" => self.id = value.take().unwrap_or_default(),
            "LeftId" => self.left_id = value.take().unwrap_or_default(),
            "RightId" => self.right_id = value.take().unwrap_or_default(),
            _ => {}
        }
    }
}

impl Entity for LeftRightLink {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("left_right")
            .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
            .column(ColumnDescriptor::new("LeftId", ValueType::Int).column("left_id").foreign_key())
            .column(ColumnDescriptor::new("RightId", ValueType::Int).column("right_id"))
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Left {
    pub id: i32,
    pub name: Option<String>,
    pub rights: Vec<Right>,
}

impl Fields for Left {
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
            "Rights" => Some(Related::many(self.rights.clone())),
            _ => None,
        }
    }

    fn assign_related(&mut self, property: &str, related: Related) {
        if property == "Rights" {
            self.rights = related.into_many();
        }
    }
}

impl Entity for Left {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("left_entity")
            .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
            .column(ColumnDescriptor::new("Name", ValueType::String).column("name"))
            .relation(RelationDescriptor::many_to_many(
                "Rights",
                blank::<Right>,
                blank::<LeftRightLink>,
                "LeftId",
                "RightId",
            ))
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Right {
    pub id: i32,
    pub name: Option<String>,
    pub lefts: Vec<Left>,
}

impl Fields for Right {
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
            "Lefts" => Some(Related::many(self.lefts.clone())),
            _ => None,
        }
    }

    fn assign_related(&mut self, property: &str, related: Related) {
        if property == "Lefts" {
            self.lefts = related.into_many();
        }
    }
}

impl Entity for Right {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("right_entity")
            .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
            .column(ColumnDescriptor::new("Name", ValueType::String).column("name"))
            .relation(RelationDescriptor::many_to_many(
                "Lefts",
                blank::<Left>,
                blank::<LeftRightLink>,
                "RightId",
                "LeftId",
            ))
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Product {
    pub id: i32,
    pub title: Option<String>,
    pub category_title: Option<String>,
    pub tag_label: Option<String>,
}

impl Fields for Product {
    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "Title" => Some(self.title.clone().into()),
            "CategoryTitle" => Some(self.category_title.clone().into()),
            "TagLabel" => Some(self.tag_label.clone().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "Id" => self.id = value.take().unwrap_or_default(),
            "Title" => self.title = value.take().unwrap_or_default(),
            "CategoryTitle" => self.category_title = value.take().unwrap_or_default(),
            "TagLabel" => self.tag_label = value.take().unwrap_or_default(),
            _ => {}
        }
    }
}

impl Entity for Product {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("product")
            .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
            .column(ColumnDescriptor::new("Title", ValueType::String).column("title"))
            .column(
                ColumnDescriptor::new("CategoryTitle", ValueType::String).joined(
                    RelationalColumn::new("Category", "title", "category_id", "id").filterable(),
                ),
            )
            .column(
                ColumnDescriptor::new("TagLabel", ValueType::String).joined(
                    RelationalColumn::new("tag", "label", "id", "id").through(
                        "product_tag",
                        "product_id",
                        "tag_id",
                    ),
                ),
            )
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Reading {
    pub id: i32,
    pub weight: i32,
    pub weight_to: i32,
}

impl Fields for Reading {
    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "Weight" => Some(self.weight.into()),
            "WeightTo" => Some(self.weight_to.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "Id" => self.id = value.take().unwrap_or_default(),
            "Weight" => self.weight = value.take().unwrap_or_default(),
            "WeightTo" => self.weight_to = value.take().unwrap_or_default(),
            _ => {}
        }
    }
}

impl Entity for Reading {
    fn describe() -> Result<EntityDescriptor, DataError> {
        EntityDescriptor::builder()
            .table("reading")
            .column(ColumnDescriptor::new("Id", ValueType::Int).column("id").key().auto_generated())
            .column(
                ColumnDescriptor::new("Weight", ValueType::Int)
                    .column("weight")
                    .range_to("WeightTo"),
            )
            .column(ColumnDescriptor::new("WeightTo", ValueType::Int).not_mapped())
            .build()
    }
}

// ── Recording executor ──────────────────────────────────────────────────

/// Answers reads from canned rows keyed by a SQL fragment and records every
/// statement it sees. Inserts report ids counting up from 100.
#[derive(Default)]
pub struct FakeExecutor {
    responses: Vec<(String, Vec<Row>)>,
    log: Mutex<Vec<Statement>>,
    next_id: Mutex<i64>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(100),
            ..Self::default()
        }
    }

    pub fn respond(mut self, fragment: &str, rows: Vec<Row>) -> Self {
        self.responses.push((fragment.to_string(), rows));
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|s| s.sql.clone()).collect()
    }

    fn record(&self, statement: &Statement) {
        self.log.lock().unwrap().push(statement.clone());
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome, DataError> {
        self.record(statement);
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: statement.is_insert().then_some(id),
        })
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, DataError> {
        self.record(statement);
        Ok(0)
    }

    async fn fetch_rows(
        &self,
        _descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<Row>, DataError> {
        self.record(statement);
        Ok(self
            .responses
            .iter()
            .find(|(fragment, _)| statement.sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DataError> {
        Err(DataError::Other("the recording executor does not open transactions".into()))
    }
}
