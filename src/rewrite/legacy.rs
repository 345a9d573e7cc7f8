//! Regex rewrite mode
//!
//! Kept for parity checks against views created by earlier releases. The
//! patterns strip the first ` WHERE ` up to ` ORDER BY ` and everything from
//! ` ORDER BY ` to the end, regardless of literals or nesting, and swap
//! quote characters without lexing. Placeholders are substituted as plain
//! text in argument order, so `:id` also matches the start of `:identifier`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::Dialect;
use crate::render::RenderedQuery;

use super::placeholders::value_sql;
use super::RewriteReport;

static WHERE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\sWHERE\s.+?(\sORDER\s+BY\s|$)").expect("static regex"));

static ORDER_BY_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\sORDER\s+BY\s.+$").expect("static regex"));

pub fn rewrite(
    query: &RenderedQuery,
    source_quote: char,
    dialect: Dialect,
) -> Result<RewriteReport, String> {
    let target_quote = dialect.identifier_quote();
    let mut sql = query.sql.clone();

    if source_quote != target_quote {
        let q = regex::escape(&source_quote.to_string());
        let quoted = Regex::new(&format!("{q}([^{q}]+){q}")).map_err(|e| e.to_string())?;
        sql = quoted
            .replace_all(&sql, format!("{target_quote}${{1}}{target_quote}").as_str())
            .into_owned();
    }

    let removed_where = WHERE_CLAUSE.is_match(&sql);
    sql = WHERE_CLAUSE.replace(&sql, "${1}").into_owned();

    let removed_order_by = ORDER_BY_CLAUSE.is_match(&sql);
    sql = ORDER_BY_CLAUSE.replace(&sql, "").into_owned();

    let mut sql = sql
        .trim_end_matches(|c: char| c.is_whitespace() || c == ';' || c == '\0')
        .to_string();

    let mut inlined = Vec::new();
    for (token, value) in query.arguments.iter() {
        if sql.contains(token) {
            sql = sql.replace(token, &value_sql(token, value, dialect)?);
            inlined.push(token.to_string());
        }
    }

    Ok(RewriteReport {
        sql,
        removed_where,
        removed_order_by,
        // LIMIT only survives here when it precedes ORDER BY
        removed_pagination: removed_order_by,
        inlined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_scenario() {
        let query = RenderedQuery::new(
            r#"SELECT "id", "total" FROM "orders" WHERE "region" = :region ORDER BY "total" DESC LIMIT 10"#,
        )
        .with_argument(":region", "east");
        let report = rewrite(&query, '"', Dialect::MySql).unwrap();
        assert_eq!(report.sql, "SELECT `id`, `total` FROM `orders`");
        assert!(report.removed_where);
        assert!(report.inlined.is_empty());
    }

    #[test]
    fn test_prefix_collision_is_reproduced() {
        let query = RenderedQuery::new("SELECT :identifier FROM t")
            .with_argument(":id", 7i64)
            .with_argument(":identifier", "x");
        let report = rewrite(&query, '"', Dialect::MySql).unwrap();
        assert_eq!(report.sql, "SELECT 7entifier FROM t");
    }

    #[test]
    fn test_literal_contents_are_rewritten() {
        let query = RenderedQuery::new(r#"SELECT 'say "hi"' AS a FROM t"#);
        let report = rewrite(&query, '"', Dialect::MySql).unwrap();
        assert_eq!(report.sql, "SELECT 'say `hi`' AS a FROM t");
    }

    #[test]
    fn test_where_inside_subquery_is_stripped() {
        let query = RenderedQuery::new("SELECT a FROM (SELECT a FROM t WHERE b = 1) s");
        let report = rewrite(&query, '"', Dialect::MySql).unwrap();
        assert_eq!(report.sql, "SELECT a FROM (SELECT a FROM t");
    }
}
