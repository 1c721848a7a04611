//! Statement composition.
//!
//! Turns a descriptor, an action and filter-by-example instances into SQL:
//!
//! ```ignore
//! let stmt = compose_statement::<Sample>(
//!     PersistenceAction::Query,
//!     None,
//!     Some(&Sample { name: Some("roberto".into()), ..Default::default() }),
//!     &ComposeOptions::new(DatabaseEngine::MySql).limit(10),
//! )?;
//! // SELECT sample_entity.id AS Id, ... FROM sample_entity
//! //   WHERE sample_entity.name LIKE '%roberto%' LIMIT 10
//! ```

use crate::descriptor::{ColumnDescriptor, EntityDescriptor, JunctionType, RelationalColumn};
use crate::entity::{Entity, Fields};
use crate::error::{DataError, ValidationError};
use crate::format::{format, Formatted};
use crate::options::{BindMode, ComposeOptions, DatabaseEngine, PersistenceAction};
use crate::registry;
use crate::statement::{Literal, Statement};
use crate::value::{Value, ValueType};

const AND: &str = " AND ";
const OR: &str = " OR ";
const MATCH_ALL: &str = "1 = 1";

/// Compose the statement for `action` on the model described by `descriptor`.
///
/// `payload` carries the values written by Add/Update; `filter` is the
/// filter-by-example instance for Update/Remove/Get/Query/Count. A missing
/// filter matches every row.
pub fn compose(
    descriptor: &EntityDescriptor,
    action: PersistenceAction,
    payload: Option<&dyn Fields>,
    filter: Option<&dyn Fields>,
    options: &ComposeOptions,
) -> Result<Statement, DataError> {
    let mut composer = Composer::new(descriptor, action, options);
    let sql = match action {
        PersistenceAction::Add => composer.build_insert(require_payload(payload, action)?)?,
        PersistenceAction::Update => {
            composer.build_update(require_payload(payload, action)?, filter)?
        }
        PersistenceAction::Remove => composer.build_delete(filter),
        PersistenceAction::Get | PersistenceAction::Query | PersistenceAction::Count => {
            composer.build_select(filter)?
        }
    };
    tracing::trace!(sql = %sql, params = composer.params.len(), "composed statement");
    Ok(Statement::with_params(sql, composer.params))
}

/// [`compose`] for a concrete model type, resolving its descriptor first.
pub fn compose_statement<T: Entity>(
    action: PersistenceAction,
    payload: Option<&T>,
    filter: Option<&T>,
    options: &ComposeOptions,
) -> Result<Statement, DataError> {
    let descriptor = registry::describe::<T>()?;
    compose(
        &descriptor,
        action,
        payload.map(|p| p as &dyn Fields),
        filter.map(|f| f as &dyn Fields),
        options,
    )
}

fn require_payload(
    payload: Option<&dyn Fields>,
    action: PersistenceAction,
) -> Result<&dyn Fields, DataError> {
    payload.ok_or_else(|| DataError::Other(format!("{action:?} requires a payload instance")))
}

/// Grouped columns followed by the non-grouped ("complementary") projected
/// columns, which must also appear in the GROUP BY list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupClause {
    pub grouped: Vec<String>,
    pub complementary: Vec<String>,
}

impl GroupClause {
    pub fn render(&self) -> String {
        if self.grouped.is_empty() {
            return String::new();
        }
        let mut out = format!(" GROUP BY {}", self.grouped.join(", "));
        if !self.complementary.is_empty() {
            out.push_str(", ");
            out.push_str(&self.complementary.join(", "));
        }
        out
    }
}

struct Composer<'a> {
    descriptor: &'a EntityDescriptor,
    action: PersistenceAction,
    options: &'a ComposeOptions,
    table: String,
    params: Vec<Literal>,
}

impl<'a> Composer<'a> {
    fn new(
        descriptor: &'a EntityDescriptor,
        action: PersistenceAction,
        options: &'a ComposeOptions,
    ) -> Self {
        Self {
            descriptor,
            action,
            options,
            table: descriptor.table_name(),
            params: Vec::new(),
        }
    }

    /// Inline the literal, or push it as a parameter and return its placeholder.
    fn bind(&mut self, literal: Literal) -> String {
        match (self.options.binding, &literal) {
            (BindMode::Inline, _) | (BindMode::Bound, Literal::Null) => literal.render(),
            (BindMode::Bound, _) => {
                self.params.push(literal);
                self.options.engine.placeholder(self.params.len())
            }
        }
    }

    fn qualified(&self, column: &ColumnDescriptor) -> String {
        format!("{}.{}", self.table, column.column)
    }

    fn build_insert(&mut self, payload: &dyn Fields) -> Result<String, DataError> {
        let descriptor = self.descriptor;
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for column in descriptor
            .columns()
            .iter()
            .filter(|c| c.is_physical() && !c.auto_generated)
        {
            let value = payload.get(column.property).unwrap_or(Value::Null);
            let formatted = format(column, &value, self.action);
            columns.push(column.column);
            values.push(self.bind(formatted.into_literal()));
        }
        if columns.is_empty() {
            return Err(DataError::configuration(format!(
                "table '{}' has no insertable column",
                self.table
            )));
        }
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            values.join(", ")
        ))
    }

    fn build_update(
        &mut self,
        payload: &dyn Fields,
        filter: Option<&dyn Fields>,
    ) -> Result<String, DataError> {
        let descriptor = self.descriptor;
        let mut assignments = Vec::new();
        for column in descriptor
            .columns()
            .iter()
            .filter(|c| c.is_physical() && !c.key)
        {
            let value = payload.get(column.property).unwrap_or(Value::Null);
            match format(column, &value, self.action) {
                Formatted::Unset => {}
                Formatted::Null => assignments.push(format!("{} = NULL", column.column)),
                Formatted::Literal(lit) => {
                    let bound = self.bind(lit);
                    assignments.push(format!("{} = {bound}", column.column));
                }
            }
        }
        if assignments.is_empty() {
            return Err(DataError::Other(format!(
                "update of '{}' has no assignment",
                self.table
            )));
        }
        let predicate = self.build_predicate(filter);
        if predicate == MATCH_ALL {
            tracing::warn!(table = %self.table, "composing unconstrained UPDATE");
        }
        Ok(format!(
            "UPDATE {} SET {} WHERE {predicate}",
            self.table,
            assignments.join(", ")
        ))
    }

    fn build_delete(&mut self, filter: Option<&dyn Fields>) -> String {
        let predicate = self.build_predicate(filter);
        if predicate == MATCH_ALL {
            tracing::warn!(table = %self.table, "composing unconstrained DELETE");
        }
        format!("DELETE FROM {} WHERE {predicate}", self.table)
    }

    fn build_select(&mut self, filter: Option<&dyn Fields>) -> Result<String, DataError> {
        let descriptor = self.descriptor;
        let display = self.display_attributes()?;
        let shown = |column: &ColumnDescriptor| {
            display
                .as_ref()
                .map_or(true, |d| d.iter().any(|a| a == column.property))
        };

        let mut columns = Vec::new();
        let mut joins = String::new();
        if self.action == PersistenceAction::Count {
            let key = descriptor.key_column();
            columns.push(format!("COUNT({}) AS {}", self.qualified(key), key.property));
        }
        for column in descriptor.columns().iter().filter(|c| !c.not_mapped) {
            if let Some(relational) = &column.joined {
                push_join(&mut joins, &self.table, relational);
                if self.action != PersistenceAction::Count && shown(column) {
                    columns.push(format!("{} AS {}", relational.qualified(), column.property));
                }
            } else if self.action == PersistenceAction::Count || !shown(column) {
                continue;
            } else if let Some(aggregate) = &column.aggregate {
                columns.push(format!(
                    "{}({}.{}) AS {}",
                    aggregate.kind.function(),
                    self.table,
                    aggregate.column,
                    column.property
                ));
            } else if column.is_aliased() {
                columns.push(format!("{} AS {}", self.qualified(column), column.property));
            } else {
                columns.push(self.qualified(column));
            }
        }
        if columns.is_empty() {
            return Err(ValidationError::NotListable(self.options.show_attributes.join(",")).into());
        }

        let server = self.options.engine == DatabaseEngine::SqlServer;
        let top = if server && self.options.limit > 0 {
            format!("TOP {} ", self.options.limit)
        } else {
            String::new()
        };
        let lock = if server && self.options.read_uncommitted {
            " WITH (NOLOCK)"
        } else {
            ""
        };

        let predicate = self.build_predicate(filter);
        let mut sql = format!(
            "SELECT {top}{} FROM {}{lock}{joins} WHERE {predicate}",
            columns.join(", "),
            self.table
        );

        if self.action != PersistenceAction::Count {
            let group = self.group_clause(display.as_deref())?;
            sql.push_str(&group.render());
            self.append_order(&mut sql)?;
        }
        if !server && self.options.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", self.options.limit));
        }
        Ok(sql)
    }

    /// Projected properties, or `None` for the full column list.
    fn display_attributes(&self) -> Result<Option<Vec<String>>, ValidationError> {
        let descriptor = self.descriptor;
        let requested: Vec<String> = self
            .options
            .show_attributes
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        if self.options.only_listable {
            if requested.is_empty() {
                return Ok(Some(
                    descriptor
                        .listable_columns()
                        .map(|c| c.property.to_string())
                        .collect(),
                ));
            }
            for attr in &requested {
                match descriptor.column(attr) {
                    Some(column) if column.listable => {}
                    _ => return Err(ValidationError::NotListable(attr.clone())),
                }
            }
            return Ok(Some(requested));
        }

        if requested.is_empty() {
            return Ok(None);
        }
        for attr in &requested {
            if descriptor.column(attr).is_none() {
                return Err(ValidationError::UnknownAttribute(attr.clone()));
            }
        }
        Ok(Some(requested))
    }

    fn group_clause(&self, display: Option<&[String]>) -> Result<GroupClause, ValidationError> {
        let mut clause = GroupClause::default();
        if self.options.group_attributes.is_empty() {
            return Ok(clause);
        }
        let requested: Vec<&str> = self
            .options
            .group_attributes
            .iter()
            .map(|a| a.trim())
            .collect();
        for attr in &requested {
            if self.descriptor.column(attr).is_none() {
                return Err(ValidationError::UnknownAttribute(attr.to_string()));
            }
        }
        for column in self.descriptor.columns() {
            if column.not_mapped || column.aggregate.is_some() {
                continue;
            }
            let name = self.order_name(column);
            if requested.contains(&column.property) {
                clause.grouped.push(name);
            } else if display.map_or(true, |d| d.iter().any(|a| a == column.property)) {
                clause.complementary.push(name);
            }
        }
        Ok(clause)
    }

    fn order_name(&self, column: &ColumnDescriptor) -> String {
        match (&column.joined, &column.aggregate) {
            (Some(relational), _) => relational.qualified(),
            (None, Some(_)) => column.property.to_string(),
            (None, None) => self.qualified(column),
        }
    }

    fn append_order(&self, sql: &mut String) -> Result<(), ValidationError> {
        if self.options.order_attributes.is_empty() {
            return Ok(());
        }
        let mut columns = Vec::with_capacity(self.options.order_attributes.len());
        for attr in &self.options.order_attributes {
            let attr = attr.trim();
            let column = self
                .descriptor
                .column(attr)
                .filter(|c| !c.not_mapped)
                .ok_or_else(|| ValidationError::UnknownAttribute(attr.to_string()))?;
            columns.push(self.order_name(column));
        }
        let direction = if self.options.order_descending {
            "DESC"
        } else {
            "ASC"
        };
        sql.push_str(&format!(" ORDER BY {} {direction}", columns.join(", ")));
        Ok(())
    }

    fn build_predicate(&mut self, filter: Option<&dyn Fields>) -> String {
        let Some(filter) = filter else {
            return MATCH_ALL.to_string();
        };
        let descriptor = self.descriptor;
        let joiner = if self.action.is_search() && !self.options.conjunction {
            OR
        } else {
            AND
        };

        let mut clause = String::new();
        for column in descriptor.columns() {
            if column.not_mapped || column.aggregate.is_some() {
                continue;
            }
            let name = match &column.joined {
                Some(relational) if self.action == PersistenceAction::Query && relational.filterable => {
                    relational.qualified()
                }
                Some(_) => continue,
                None => self.qualified(column),
            };
            let value = filter.get(column.property).unwrap_or(Value::Null);

            if let Some(partner) = column.range_partner {
                let upper = filter.get(partner).unwrap_or(Value::Null);
                if let Some(term) = self.range_term(&name, column, &value, &upper) {
                    clause.push_str(&term);
                    clause.push_str(joiner);
                }
                continue;
            }

            let Formatted::Literal(literal) = format(column, &value, self.action) else {
                continue;
            };
            let comparison = if column.value_type == ValueType::Bool {
                match (&literal, self.action) {
                    (Literal::Integer(1), _) => " = 1".to_string(),
                    (Literal::Integer(0), PersistenceAction::Update) => " = 0".to_string(),
                    _ => continue,
                }
            } else if literal.is_zero() {
                continue;
            } else if self.action.is_search() && is_partial_match(column, &literal) {
                let text = match &literal {
                    Literal::Text(s) => self.strip_groups(s),
                    _ => continue,
                };
                let pattern = self.bind(Literal::Text(format!("%{text}%")));
                format!(" LIKE {pattern}")
            } else {
                let literal = match literal {
                    Literal::Text(s) => Literal::Text(self.strip_groups(&s)),
                    other => other,
                };
                format!(" = {}", self.bind(literal))
            };
            clause.push_str(&name);
            clause.push_str(&comparison);
            clause.push_str(joiner);
        }
        finish_predicate(clause)
    }

    fn range_term(
        &mut self,
        name: &str,
        column: &ColumnDescriptor,
        lower: &Value,
        upper: &Value,
    ) -> Option<String> {
        let bound = |value: &Value| match format(column, value, self.action) {
            Formatted::Literal(lit) if !lit.is_zero() => Some(lit),
            _ => None,
        };
        match (bound(lower), bound(upper)) {
            (Some(from), Some(to)) => {
                let from = self.bind(from);
                let to = self.bind(to);
                Some(format!("{name} BETWEEN {from} AND {to}"))
            }
            (Some(from), None) => Some(format!("{name} >= {}", self.bind(from))),
            (None, Some(to)) => Some(format!("{name} <= {}", self.bind(to))),
            (None, None) => None,
        }
    }

    /// Inline filter values lose their parentheses so they cannot open groups.
    fn strip_groups(&self, text: &str) -> String {
        match self.options.binding {
            BindMode::Inline => text.replace(['(', ')'], ""),
            BindMode::Bound => text.to_string(),
        }
    }
}

/// Text comparisons on columns that are neither keys, dates nor hashes match
/// by containment instead of equality.
fn is_partial_match(column: &ColumnDescriptor, literal: &Literal) -> bool {
    let Literal::Text(text) = literal else {
        return false;
    };
    if column.value_type == ValueType::DateTime || text.trim().parse::<i64>().is_ok() {
        return false;
    }
    let name = column.column.to_lowercase();
    !(name.contains("date")
        || name.contains("hash")
        || name.starts_with("id")
        || name.ends_with("id")
        || name.contains(".id"))
}

/// Drop the trailing joiner and close any group left open.
fn finish_predicate(mut clause: String) -> String {
    for joiner in [AND, OR] {
        if clause.ends_with(joiner) {
            clause.truncate(clause.len() - joiner.len());
            break;
        }
    }
    if clause.trim().is_empty() {
        return MATCH_ALL.to_string();
    }
    let open = clause.matches('(').count();
    let closed = clause.matches(')').count();
    for _ in closed..open {
        clause.push(')');
    }
    clause
}

fn push_join(joins: &mut String, table: &str, relational: &RelationalColumn) {
    let joined = relational.table.to_lowercase();
    let clause = match (&relational.junction, &relational.intermediary) {
        (JunctionType::Mandatory, _) => format!(
            " INNER JOIN {joined} ON {table}.{} = {joined}.{}",
            relational.key_column, relational.foreign_key_column
        ),
        (JunctionType::Optional, Some(via)) => {
            let link = via.table.to_lowercase();
            format!(
                " LEFT JOIN {link} ON {table}.{} = {link}.{} LEFT JOIN {joined} ON {link}.{} = {joined}.{}",
                relational.key_column,
                via.local_column,
                via.foreign_column,
                relational.foreign_key_column
            )
        }
        (JunctionType::Optional, None) => format!(
            " LEFT JOIN {joined} ON {table}.{} = {joined}.{}",
            relational.key_column, relational.foreign_key_column
        ),
    };
    if joins.contains(&clause) {
        return;
    }
    if clause.contains(joins.as_str()) {
        *joins = clause;
    } else {
        joins.push_str(&clause);
    }
}
