//! Database seam
//!
//! The engine issues every statement through [`Database`]. Implementations
//! must report backend failures verbatim; the lifecycle manager decides how
//! to classify them.

use std::fmt;

use serde_json::Value;

use crate::dialect::Dialect;
use crate::error::VivResult;
use crate::rewrite::expand_table_prefixes;

/// A result row: `(column, value)` pairs in select-list order
pub type Row = Vec<(String, Value)>;

/// A statement the backend refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    pub message: String,
    pub sqlstate: Option<String>,
}

impl BackendFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sqlstate: None,
        }
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sqlstate {
            Some(state) => write!(f, "{} (SQLSTATE {state})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

pub trait Database {
    fn dialect(&self) -> Dialect;

    /// Expand `{table}` tokens to physical table names
    fn prefix_tables(&self, sql: &str, prefix: &str) -> VivResult<String> {
        expand_table_prefixes(sql, prefix, self.dialect())
    }

    /// Run a statement that returns no rows
    fn execute(&self, sql: &str) -> Result<(), BackendFailure>;

    /// Run a parameterized query; `params` bind to the dialect's markers
    fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, BackendFailure>;
}

impl<T: Database + ?Sized> Database for &T {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn prefix_tables(&self, sql: &str, prefix: &str) -> VivResult<String> {
        (**self).prefix_tables(sql, prefix)
    }

    fn execute(&self, sql: &str) -> Result<(), BackendFailure> {
        (**self).execute(sql)
    }

    fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, BackendFailure> {
        (**self).query(sql, params)
    }
}

/// Text of a column in a row, if present and a string
pub fn row_text<'r>(row: &'r Row, column: &str) -> Option<&'r str> {
    row.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .and_then(|(_, value)| value.as_str())
}
