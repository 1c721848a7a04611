use std::fmt::Write as _;

/// A formatted SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Literal {
    /// Inline SQL rendering.
    pub fn render(&self) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Integer(v) => v.to_string(),
            Literal::Real(v) => v.to_string().replace(',', "."),
            Literal::Text(s) => format!("'{s}'"),
            Literal::Blob(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2 + 3);
                out.push_str("X'");
                for b in bytes {
                    let _ = write!(out, "{b:02X}");
                }
                out.push('\'');
                out
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Literal::Integer(v) => *v == 0,
            Literal::Real(v) => *v == 0.0,
            _ => false,
        }
    }
}

/// A composed statement, ready for an [`crate::Executor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    /// Bound values in placeholder order; empty for inline statements.
    pub params: Vec<Literal>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Literal>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn is_insert(&self) -> bool {
        self.sql.trim_start().starts_with("INSERT")
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}
