//! Value formatting.
//!
//! One pipeline renders both payload values and filter values. The zero
//! sentinel convention lives here: a field left at its type's default
//! formats to NULL, which the composer reads as "no constraint".

use chrono::NaiveDateTime;

use crate::descriptor::ColumnDescriptor;
use crate::options::PersistenceAction;
use crate::statement::Literal;
use crate::value::Value;

pub const FULL_DATE_TIME: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_ONLY: &str = "%Y-%m-%d";

/// Outcome of formatting one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Formatted {
    /// No assignment and no predicate.
    Unset,
    Null,
    Literal(Literal),
}

impl Formatted {
    pub fn is_null_or_unset(&self) -> bool {
        matches!(self, Formatted::Unset | Formatted::Null)
    }

    pub fn literal(&self) -> Option<&Literal> {
        match self {
            Formatted::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn into_literal(self) -> Literal {
        match self {
            Formatted::Literal(lit) => lit,
            Formatted::Unset | Formatted::Null => Literal::Null,
        }
    }
}

/// Format `value` for `column` under `action`.
pub fn format(column: &ColumnDescriptor, value: &Value, action: PersistenceAction) -> Formatted {
    let required = column.required;
    match value {
        Value::Null => {
            if action == PersistenceAction::Add {
                Formatted::Null
            } else {
                Formatted::Unset
            }
        }
        Value::Short(v) => integer(i64::from(*v), *v == i16::MIN, required),
        Value::Int(v) => integer(i64::from(*v), *v == i32::MIN, required),
        Value::Long(v) => integer(*v, *v == i64::MIN, required),
        Value::Float(v) => real(f64::from(*v), required),
        Value::Double(v) | Value::Decimal(v) => real(*v, required),
        Value::Bool(v) => Formatted::Literal(Literal::Integer(i64::from(*v))),
        Value::Text(s) => {
            if s.trim().is_empty() {
                Formatted::Null
            } else {
                Formatted::Literal(Literal::Text(s.replace('\'', "\"")))
            }
        }
        Value::DateTime(dt) => match dt {
            Some(dt) if *dt != NaiveDateTime::MIN => {
                let pattern = if action == PersistenceAction::Add {
                    FULL_DATE_TIME
                } else {
                    DATE_ONLY
                };
                Formatted::Literal(Literal::Text(dt.format(pattern).to_string()))
            }
            _ => Formatted::Null,
        },
        Value::Binary(bytes) => {
            if bytes.is_empty() {
                Formatted::Null
            } else {
                Formatted::Literal(Literal::Blob(bytes.clone()))
            }
        }
    }
}

fn integer(v: i64, is_min: bool, required: bool) -> Formatted {
    if (is_min || v == 0) && !required {
        Formatted::Null
    } else {
        Formatted::Literal(Literal::Integer(v))
    }
}

fn real(v: f64, required: bool) -> Formatted {
    if v == 0.0 && !required {
        Formatted::Null
    } else {
        Formatted::Literal(Literal::Real(v))
    }
}
