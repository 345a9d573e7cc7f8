//! SQL Rewriter
//!
//! Turns a rendered SELECT into a self-contained view body:
//!
//! 1. identifier quotes are normalized to the target dialect
//! 2. top-level WHERE, ORDER BY, LIMIT/OFFSET/FETCH and locking clauses are removed
//! 3. trailing whitespace and `;` are trimmed
//! 4. placeholders are replaced by quoted literals
//!
//! Table-prefix expansion happens before this, through
//! [`crate::backend::Database::prefix_tables`] (see [`expand_table_prefixes`]).
//!
//! ## Example
//!
//! ```rust
//! use pg_viv::dialect::Dialect;
//! use pg_viv::render::RenderedQuery;
//! use pg_viv::rewrite::Rewriter;
//!
//! let query = RenderedQuery::new(
//!     r#"SELECT "id", "total" FROM "orders" WHERE "region" = :region ORDER BY "total" DESC LIMIT 10"#,
//! )
//! .with_argument(":region", "east");
//!
//! let sql = Rewriter::new(Dialect::MySql).rewrite(&query).unwrap();
//! assert_eq!(sql, "SELECT `id`, `total` FROM `orders`");
//! ```

pub mod clauses;
mod legacy;
pub mod lexer;
mod placeholders;
mod quotes;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VivConfig;
use crate::dialect::Dialect;
use crate::error::{VivError, VivResult};
use crate::render::RenderedQuery;

use clauses::{Clause, SelectParts};
use lexer::{tokenize, TokenKind};

/// Clause stripping strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteMode {
    /// Lexer-based; only top-level clauses are touched
    #[default]
    Structured,
    /// Regex-based, matching views created by earlier releases
    Legacy,
}

/// Rewritten SQL plus what was removed on the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    pub sql: String,
    pub removed_where: bool,
    pub removed_order_by: bool,
    pub removed_pagination: bool,
    /// Placeholder tokens that were replaced, in order of appearance
    pub inlined: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Rewriter {
    dialect: Dialect,
    source_quote: char,
    mode: RewriteMode,
}

impl Rewriter {
    /// Rewriter for renderer output quoted with `"`
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            source_quote: '"',
            mode: RewriteMode::default(),
        }
    }

    pub fn from_config(config: &VivConfig) -> Self {
        Self {
            dialect: config.dialect,
            source_quote: config.source_quote,
            mode: config.rewrite_mode,
        }
    }

    pub fn with_source_quote(mut self, quote: char) -> Self {
        self.source_quote = quote;
        self
    }

    pub fn with_mode(mut self, mode: RewriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Produce the view body for `query`
    pub fn rewrite(&self, query: &RenderedQuery) -> VivResult<String> {
        self.rewrite_with_report(query).map(|report| report.sql)
    }

    pub fn rewrite_with_report(&self, query: &RenderedQuery) -> VivResult<RewriteReport> {
        let report = match self.mode {
            RewriteMode::Structured => self.structured(query),
            RewriteMode::Legacy => legacy::rewrite(query, self.source_quote, self.dialect),
        }
        .map_err(|reason| VivError::RewriteError {
            sql: query.sql.clone(),
            reason,
        })?;

        debug!(
            mode = ?self.mode,
            removed_where = report.removed_where,
            inlined = report.inlined.len(),
            sql = %report.sql,
            "rewrote rendered query"
        );
        Ok(report)
    }

    fn structured(&self, query: &RenderedQuery) -> Result<RewriteReport, String> {
        let backslash = self.dialect.backslash_escapes();
        let normalized = quotes::normalize(
            &query.sql,
            self.source_quote,
            self.dialect.identifier_quote(),
            backslash,
        )?;

        let parts = SelectParts::split(tokenize(&normalized, backslash)?)?;
        let body = parts.to_view_body();
        let body = body.trim_end_matches(|c: char| c.is_whitespace() || c == ';');

        let (sql, inlined) = placeholders::inline(body, &query.arguments, self.dialect)?;

        Ok(RewriteReport {
            sql,
            removed_where: parts.has(Clause::Where),
            removed_order_by: parts.has(Clause::OrderBy),
            removed_pagination: parts.has(Clause::Pagination),
            inlined,
        })
    }
}

/// Expand `{table}` tokens to `{prefix}table`
///
/// Braces inside string literals, comments and quoted identifiers are left
/// alone.
pub fn expand_table_prefixes(sql: &str, prefix: &str, dialect: Dialect) -> VivResult<String> {
    let tokens = tokenize(sql, dialect.backslash_escapes()).map_err(|reason| {
        VivError::RewriteError {
            sql: sql.to_string(),
            reason,
        }
    })?;

    let is_symbol = |idx: usize, text: &str| {
        tokens
            .get(idx)
            .is_some_and(|t| t.kind == TokenKind::Symbol && t.text == text)
    };

    let mut out = String::with_capacity(sql.len() + prefix.len());
    let mut idx = 0;
    while idx < tokens.len() {
        let table = tokens.get(idx + 1).filter(|t| t.kind == TokenKind::Word);
        match table {
            Some(table) if is_symbol(idx, "{") && is_symbol(idx + 2, "}") => {
                out.push_str(prefix);
                out.push_str(table.text);
                idx += 3;
            }
            _ => {
                out.push_str(tokens[idx].text);
                idx += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::testing::assert_error_sqlstate;
    use crate::render::Literal;

    const SCENARIO: &str =
        r#"SELECT "id", "total" FROM "orders" WHERE "region" = :region ORDER BY "total" DESC LIMIT 10"#;

    fn mysql() -> Rewriter {
        Rewriter::new(Dialect::MySql)
    }

    #[test]
    fn test_reference_scenario() {
        let query = RenderedQuery::new(SCENARIO).with_argument(":region", "east");
        let report = mysql().rewrite_with_report(&query).unwrap();

        assert_eq!(report.sql, "SELECT `id`, `total` FROM `orders`");
        assert!(report.removed_where);
        assert!(report.removed_order_by);
        assert!(report.removed_pagination);
        // :region vanished with the WHERE clause
        assert!(report.inlined.is_empty());
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let once = mysql()
            .rewrite(&RenderedQuery::new(SCENARIO).with_argument(":region", "east"))
            .unwrap();
        let twice = mysql().rewrite(&RenderedQuery::new(once.clone())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_output_has_no_stripped_clauses_or_placeholders() {
        let query = RenderedQuery::new(
            "SELECT a, SUM(b) AS s FROM t GROUP BY a HAVING SUM(b) > :min ORDER BY s LIMIT 5;",
        )
        .with_argument(":min", 10i64);
        let report = mysql().rewrite_with_report(&query).unwrap();

        assert_eq!(report.sql, "SELECT a, SUM(b) AS s FROM t GROUP BY a HAVING SUM(b) > 10");
        assert_eq!(report.inlined, vec![":min".to_string()]);
        assert!(!report.removed_where);
    }

    #[test]
    fn test_identifier_placeholder_prefix() {
        let query = RenderedQuery::new("SELECT :identifier AS a, :id AS b FROM t")
            .with_argument(":id", 7i64)
            .with_argument(":identifier", "x");
        assert_eq!(mysql().rewrite(&query).unwrap(), "SELECT 'x' AS a, 7 AS b FROM t");
    }

    #[test]
    fn test_list_inlining() {
        let query = RenderedQuery::new("SELECT a FROM t GROUP BY a HAVING a IN (:vals)")
            .with_argument(":vals", vec![Literal::from("p"), Literal::from("q")]);
        assert_eq!(
            mysql().rewrite(&query).unwrap(),
            "SELECT a FROM t GROUP BY a HAVING a IN ('p', 'q')"
        );
    }

    #[test]
    fn test_literals_with_keywords_and_quotes() {
        let query = RenderedQuery::new(
            r#"SELECT 'x WHERE y' AS "w", 'O''Brien "q"' AS "n" FROM "t" WHERE "a" = 1"#,
        );
        assert_eq!(
            mysql().rewrite(&query).unwrap(),
            r#"SELECT 'x WHERE y' AS `w`, 'O''Brien "q"' AS `n` FROM `t`"#
        );
    }

    #[test]
    fn test_postgres_target_keeps_double_quotes() {
        let query = RenderedQuery::new(r#"SELECT "id" FROM "orders" WHERE "id" = $1"#)
            .with_argument("$1", 5i64);
        let sql = Rewriter::new(Dialect::Postgres).rewrite(&query).unwrap();
        assert_eq!(sql, r#"SELECT "id" FROM "orders""#);
    }

    #[test]
    fn test_qualified_reserved_word_columns_survive() {
        let sql = mysql()
            .rewrite(&RenderedQuery::new("SELECT t.limit, t.b FROM t WHERE t.c = 1"))
            .unwrap();
        assert_eq!(sql, "SELECT t.limit, t.b FROM t");

        let sql = mysql()
            .rewrite(&RenderedQuery::new("SELECT o.window AS w FROM o"))
            .unwrap();
        assert_eq!(sql, "SELECT o.window AS w FROM o");
    }

    #[test]
    fn test_negative_argument_after_minus() {
        let query = RenderedQuery::new("SELECT a -:x AS d, b FROM t GROUP BY a, b")
            .with_argument(":x", -7i64);
        let sql = Rewriter::new(Dialect::Postgres).rewrite(&query).unwrap();
        assert_eq!(sql, "SELECT a -(-7) AS d, b FROM t GROUP BY a, b");
    }

    #[test]
    fn test_missing_argument_fails_closed() {
        let query = RenderedQuery::new("SELECT a FROM t GROUP BY a HAVING COUNT(*) > :n");
        let err = mysql().rewrite(&query).unwrap_err();
        assert_error_sqlstate(Err::<(), _>(err.clone()), "42601");
        assert!(err.to_string().contains(":n"));
    }

    #[test]
    fn test_rejected_shapes() {
        for sql in [
            "SELECT a FROM t UNION SELECT a FROM u",
            "DELETE FROM t",
            "SELECT 'unterminated",
            "SELECT (a FROM t",
            "SELECT 1; SELECT 2",
        ] {
            let result = mysql().rewrite(&RenderedQuery::new(sql));
            assert!(
                matches!(result, Err(VivError::RewriteError { .. })),
                "{sql} should be rejected"
            );
        }
    }

    #[test]
    fn test_legacy_mode_matches_structured_on_simple_queries() {
        let query = RenderedQuery::new(SCENARIO).with_argument(":region", "east");
        let legacy = mysql().with_mode(RewriteMode::Legacy).rewrite(&query).unwrap();
        let structured = mysql().rewrite(&query).unwrap();
        assert_eq!(legacy, structured);
    }

    #[test]
    fn test_from_config() {
        let mut config = VivConfig::for_dialect(Dialect::Postgres);
        config.source_quote = '`';
        let rewriter = Rewriter::from_config(&config);
        let sql = rewriter.rewrite(&RenderedQuery::new("SELECT `a` FROM `t`")).unwrap();
        assert_eq!(sql, r#"SELECT "a" FROM "t""#);
    }

    #[test]
    fn test_expand_table_prefixes() {
        let sql = expand_table_prefixes(
            "SELECT n.title, '{not_a_table}' FROM {node} n JOIN {users} u ON u.id = n.uid",
            "site1_",
            Dialect::MySql,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT n.title, '{not_a_table}' FROM site1_node n JOIN site1_users u ON u.id = n.uid"
        );

        assert_eq!(
            expand_table_prefixes("SELECT 1 FROM {t}", "", Dialect::Postgres).unwrap(),
            "SELECT 1 FROM t"
        );
    }

    #[test]
    fn test_rewrite_mode_serde() {
        let mode: RewriteMode = serde_json::from_str("\"legacy\"").unwrap();
        assert_eq!(mode, RewriteMode::Legacy);
        assert_eq!(RewriteMode::default(), RewriteMode::Structured);
    }
}
