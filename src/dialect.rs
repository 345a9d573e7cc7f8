//! Backend Dialects: identifier/literal quoting and DDL text
//!
//! Every statement the engine issues is produced here, so the lifecycle
//! manager never concatenates backend-specific SQL itself.
//!
//! | Operation      | MySQL                                   | PostgreSQL                                  |
//! |----------------|-----------------------------------------|---------------------------------------------|
//! | create         | `CREATE ALGORITHM=UNDEFINED SQL SECURITY INVOKER VIEW` | `CREATE VIEW .. WITH (security_invoker = true)` |
//! | rename         | `RENAME TABLE a TO b`                   | `ALTER VIEW a RENAME TO b`                  |
//! | show create    | `SHOW CREATE VIEW`                      | `pg_get_viewdef()`                          |
//! | advisory lock  | `GET_LOCK` / `RELEASE_LOCK`             | `pg_advisory_lock(hashtext(..))`            |

use serde::{Deserialize, Serialize};

use crate::config::LOCK_TIMEOUT_SECS;
use crate::naming::ViewName;
use crate::render::Literal;

/// Target backend of the generated DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql")]
    Postgres,
}

/// A catalog statement and its positional bind parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl Dialect {
    pub fn identifier_quote(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Postgres => '"',
        }
    }

    /// Whether `\` escapes the next character inside string literals
    pub fn backslash_escapes(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Quote an identifier, doubling embedded quote characters
    pub fn quote_identifier(self, ident: &str) -> String {
        let q = self.identifier_quote();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for c in ident.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    /// Quote a string literal
    pub fn quote_string(self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if self.backslash_escapes() => out.push_str("\\\\"),
                '\0' if self.backslash_escapes() => out.push_str("\\0"),
                _ => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    /// Textual literal for an inlined placeholder value
    pub fn quote_literal(self, literal: &Literal) -> String {
        match literal {
            Literal::Null => "NULL".to_string(),
            Literal::Bool(true) => "TRUE".to_string(),
            Literal::Bool(false) => "FALSE".to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => format!("{f:?}"),
            Literal::Text(s) => self.quote_string(s),
        }
    }

    /// Bind marker for the n-th (1-based) parameter
    pub fn param_marker(self, n: usize) -> String {
        match self {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
        }
    }

    pub fn drop_view(self, name: &ViewName) -> String {
        format!("DROP VIEW IF EXISTS {}", self.quote_identifier(name.as_str()))
    }

    /// CREATE VIEW whose privileges are checked against the querying user
    pub fn create_view(self, name: &ViewName, body: &str) -> String {
        let ident = self.quote_identifier(name.as_str());
        match self {
            Dialect::MySql => format!(
                "CREATE ALGORITHM=UNDEFINED SQL SECURITY INVOKER VIEW {ident} AS {body}"
            ),
            Dialect::Postgres => format!(
                "CREATE VIEW {ident} WITH (security_invoker = true) AS {body}"
            ),
        }
    }

    pub fn rename_view(self, from: &ViewName, to: &ViewName) -> String {
        let from = self.quote_identifier(from.as_str());
        let to = self.quote_identifier(to.as_str());
        match self {
            Dialect::MySql => format!("RENAME TABLE {from} TO {to}"),
            Dialect::Postgres => format!("ALTER VIEW {from} RENAME TO {to}"),
        }
    }

    /// Statement returning the canonical definition in a `Create View` column
    pub fn show_create(self, name: &ViewName) -> CatalogQuery {
        match self {
            Dialect::MySql => CatalogQuery {
                sql: format!("SHOW CREATE VIEW {}", self.quote_identifier(name.as_str())),
                params: Vec::new(),
            },
            Dialect::Postgres => CatalogQuery {
                sql: "SELECT 'CREATE VIEW ' || quote_ident(c.relname) || ' AS ' \
                      || pg_get_viewdef(c.oid, true) AS \"Create View\" \
                      FROM pg_class c \
                      JOIN pg_namespace n ON c.relnamespace = n.oid \
                      WHERE c.relname = $1 AND c.relkind = 'v' \
                        AND n.nspname = current_schema()"
                    .to_string(),
                params: vec![name.as_str().to_string()],
            },
        }
    }

    /// information_schema lookup of a relation's columns in ordinal order
    pub fn columns(self, name: &ViewName) -> CatalogQuery {
        let (select_list, schema_fn) = match self {
            Dialect::MySql => (
                "column_name AS column_name, data_type AS data_type, is_nullable AS is_nullable",
                "DATABASE()",
            ),
            // Cast to text to avoid sql_identifier domain type issues
            Dialect::Postgres => (
                "column_name::text AS column_name, data_type::text AS data_type, \
                 is_nullable::text AS is_nullable",
                "current_schema()",
            ),
        };
        CatalogQuery {
            sql: format!(
                "SELECT {select_list} \
                 FROM information_schema.columns \
                 WHERE table_schema = {schema_fn} AND table_name = {} \
                 ORDER BY ordinal_position",
                self.param_marker(1)
            ),
            params: vec![name.as_str().to_string()],
        }
    }

    pub fn preview(self, name: &ViewName, columns: &[String], limit: u32) -> String {
        let select_list = columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT {select_list} FROM {} LIMIT {limit}",
            self.quote_identifier(name.as_str())
        )
    }

    /// Session-level advisory lock acquire/release for a view name
    pub fn advisory_lock(self, name: &ViewName) -> (CatalogQuery, CatalogQuery) {
        let key = format!("pg_viv:{}", name.as_str());
        match self {
            Dialect::MySql => (
                CatalogQuery {
                    sql: format!("SELECT GET_LOCK(?, {LOCK_TIMEOUT_SECS}) AS acquired"),
                    params: vec![key.clone()],
                },
                CatalogQuery {
                    sql: "SELECT RELEASE_LOCK(?) AS released".to_string(),
                    params: vec![key],
                },
            ),
            Dialect::Postgres => (
                CatalogQuery {
                    sql: "SELECT pg_advisory_lock(hashtext($1)) IS NOT NULL AS acquired".to_string(),
                    params: vec![key.clone()],
                },
                CatalogQuery {
                    sql: "SELECT pg_advisory_unlock(hashtext($1)) AS released".to_string(),
                    params: vec![key],
                },
            ),
        }
    }

    /// SQLSTATEs the backend raises when a rename target already exists
    pub fn is_duplicate_object(self, sqlstate: &str) -> bool {
        match self {
            Dialect::MySql => matches!(sqlstate, "42S01"),
            Dialect::Postgres => matches!(sqlstate, "42P07" | "42710"),
        }
    }

    /// SQLSTATEs the backend raises when the named relation does not exist
    pub fn is_undefined_object(self, sqlstate: &str) -> bool {
        match self {
            Dialect::MySql => matches!(sqlstate, "42S02"),
            Dialect::Postgres => matches!(sqlstate, "42P01" | "42704"),
        }
    }
}
