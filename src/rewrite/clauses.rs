//! Top-level clause splitting for SELECT statements
//!
//! Only tokens at parenthesis depth 0 can start a clause, so subqueries,
//! window specifications and function arguments are carried through intact.

use super::lexer::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    /// SELECT list and FROM/JOIN chain
    Head,
    Where,
    GroupBy,
    Having,
    Window,
    OrderBy,
    /// LIMIT, OFFSET or FETCH
    Pagination,
    /// FOR UPDATE / FOR SHARE / LOCK IN SHARE MODE
    Locking,
}

impl Clause {
    /// Whether the clause belongs in a view definition
    pub fn is_kept(self) -> bool {
        matches!(self, Clause::Head | Clause::GroupBy | Clause::Having | Clause::Window)
    }
}

/// A SELECT statement cut into its top-level clauses
#[derive(Debug)]
pub struct SelectParts<'a> {
    tokens: Vec<Token<'a>>,
    /// (clause, index of its first token), in statement order
    starts: Vec<(Clause, usize)>,
    /// Index of the terminating `;`, or the token count
    end: usize,
}

impl<'a> SelectParts<'a> {
    pub fn split(tokens: Vec<Token<'a>>) -> Result<Self, String> {
        let first = tokens
            .iter()
            .position(|t| !t.is_trivia())
            .ok_or_else(|| "statement is empty".to_string())?;
        if !tokens[first].is_keyword("select") {
            return Err(format!("expected SELECT, found '{}'", tokens[first].text));
        }

        let mut starts = vec![(Clause::Head, 0)];
        let mut end = tokens.len();
        let mut idx = first + 1;
        while idx < tokens.len() {
            let token = &tokens[idx];
            if token.depth != 0 {
                idx += 1;
                continue;
            }

            if token.kind == TokenKind::Symbol && token.text == ";" {
                if let Some(rest) = next_significant(&tokens, idx + 1) {
                    return Err(format!(
                        "multiple statements are not allowed (found '{}' after ';')",
                        tokens[rest].text
                    ));
                }
                end = idx;
                break;
            }

            // Reserved words are plain column names after a qualifier: `t.limit`
            if token.kind != TokenKind::Word || follows_dot(&tokens, idx) {
                idx += 1;
                continue;
            }

            let following = next_significant(&tokens, idx + 1).map(|i| &tokens[i]);
            let clause = match token.text.to_ascii_uppercase().as_str() {
                "UNION" | "INTERSECT" | "EXCEPT" => {
                    return Err(format!(
                        "set operation {} cannot be rewritten",
                        token.text.to_ascii_uppercase()
                    ));
                }
                "INTO" => return Err("SELECT ... INTO is not a read-only query".to_string()),
                "WHERE" => Some(Clause::Where),
                "GROUP" if following.is_some_and(|t| t.is_keyword("by")) => Some(Clause::GroupBy),
                "HAVING" => Some(Clause::Having),
                "WINDOW" => Some(Clause::Window),
                "ORDER" if following.is_some_and(|t| t.is_keyword("by")) => Some(Clause::OrderBy),
                "LIMIT" | "OFFSET" | "FETCH" => Some(Clause::Pagination),
                "FOR" if following.is_some_and(|t| {
                    ["update", "share", "no", "key"].iter().any(|k| t.is_keyword(k))
                }) =>
                {
                    Some(Clause::Locking)
                }
                "LOCK" if following.is_some_and(|t| t.is_keyword("in")) => Some(Clause::Locking),
                _ => None,
            };

            if let Some(clause) = clause {
                // OFFSET after LIMIT stays in the same pagination segment
                let continues = starts.last().is_some_and(|(c, _)| *c == clause);
                if !continues {
                    starts.push((clause, idx));
                }
            }
            idx += 1;
        }

        let parts = Self { tokens, starts, end };
        for (clause, tokens) in parts.segments() {
            if tokens.iter().rev().find(|t| !t.is_trivia()).is_some_and(is_dot) {
                return Err(format!("{clause:?} clause ends in a dangling '.'"));
            }
        }
        Ok(parts)
    }

    pub fn has(&self, clause: Clause) -> bool {
        self.starts.iter().any(|(c, _)| *c == clause)
    }

    /// Token range of each clause in statement order
    fn segments(&self) -> impl Iterator<Item = (Clause, &[Token<'a>])> + '_ {
        self.starts.iter().enumerate().map(move |(n, &(clause, start))| {
            let end = self
                .starts
                .get(n + 1)
                .map_or(self.end, |&(_, next)| next);
            (clause, &self.tokens[start..end])
        })
    }

    /// Reassemble the kept clauses; comments collapse to a single space
    pub fn to_view_body(&self) -> String {
        let mut out = String::new();
        for (clause, tokens) in self.segments() {
            if !clause.is_kept() {
                continue;
            }
            let text: String = tokens
                .iter()
                .map(|t| if t.kind == TokenKind::Comment { " " } else { t.text })
                .collect();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
        out
    }
}

fn is_dot(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Symbol && token.text == "."
}

fn follows_dot(tokens: &[Token<'_>], idx: usize) -> bool {
    tokens[..idx].iter().rev().find(|t| !t.is_trivia()).is_some_and(is_dot)
}

fn next_significant(tokens: &[Token<'_>], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn body(sql: &str) -> String {
        SelectParts::split(tokenize(sql, true).unwrap())
            .unwrap()
            .to_view_body()
    }

    fn split_err(sql: &str) -> String {
        SelectParts::split(tokenize(sql, true).unwrap()).unwrap_err()
    }

    #[test]
    fn test_strips_where_order_limit() {
        assert_eq!(
            body("SELECT a FROM t WHERE x = 1 ORDER BY a DESC LIMIT 10 OFFSET 5"),
            "SELECT a FROM t"
        );
    }

    #[test]
    fn test_keeps_grouping_clauses() {
        assert_eq!(
            body("SELECT a, COUNT(*) FROM t WHERE b > 0 GROUP BY a HAVING COUNT(*) > 1 ORDER BY a"),
            "SELECT a, COUNT(*) FROM t GROUP BY a HAVING COUNT(*) > 1"
        );
    }

    #[test]
    fn test_subquery_clauses_untouched() {
        let sql = "SELECT a, (SELECT MAX(b) FROM u WHERE u.a = t.a ORDER BY b LIMIT 1) AS m \
                   FROM t JOIN (SELECT * FROM v WHERE v.ok) w ON w.a = t.a WHERE t.z = 2";
        assert_eq!(
            body(sql),
            "SELECT a, (SELECT MAX(b) FROM u WHERE u.a = t.a ORDER BY b LIMIT 1) AS m \
             FROM t JOIN (SELECT * FROM v WHERE v.ok) w ON w.a = t.a"
        );
    }

    #[test]
    fn test_window_order_by_untouched() {
        assert_eq!(
            body("SELECT ROW_NUMBER() OVER (ORDER BY a) AS rn FROM t ORDER BY rn"),
            "SELECT ROW_NUMBER() OVER (ORDER BY a) AS rn FROM t"
        );
    }

    #[test]
    fn test_keywords_inside_literals_are_ignored() {
        assert_eq!(
            body("SELECT 'a WHERE b ORDER BY c' AS s FROM t WHERE d"),
            "SELECT 'a WHERE b ORDER BY c' AS s FROM t"
        );
    }

    #[test]
    fn test_locking_and_trailing_semicolon() {
        assert_eq!(body("SELECT a FROM t FOR UPDATE;"), "SELECT a FROM t");
        assert_eq!(body("SELECT a FROM t LOCK IN SHARE MODE"), "SELECT a FROM t");
        assert_eq!(body("SELECT a FROM t ;  "), "SELECT a FROM t");
        assert_eq!(body("SELECT a FROM t GROUP BY a;\n"), "SELECT a FROM t GROUP BY a");
    }

    #[test]
    fn test_trailing_comment_does_not_swallow_clauses() {
        assert_eq!(
            body("SELECT a FROM t -- note\nGROUP BY a"),
            "SELECT a FROM t GROUP BY a"
        );
    }

    #[test]
    fn test_rejections() {
        assert!(split_err("SELECT a FROM t UNION SELECT b FROM u").contains("UNION"));
        assert!(split_err("UPDATE t SET a = 1").contains("expected SELECT"));
        assert!(split_err("SELECT 1; DROP TABLE users").contains("multiple statements"));
        assert!(split_err("SELECT a INTO @x FROM t").contains("INTO"));
        assert!(split_err("   ").contains("empty"));
    }

    #[test]
    fn test_qualified_reserved_words_are_columns() {
        assert_eq!(
            body("SELECT t.limit, t.b FROM t WHERE t.c = 1"),
            "SELECT t.limit, t.b FROM t"
        );
        assert_eq!(body("SELECT o.window AS w FROM o"), "SELECT o.window AS w FROM o");
        assert_eq!(
            body("SELECT t.offset, t.fetch FROM t GROUP BY t.order ORDER BY t.where LIMIT 3"),
            "SELECT t.offset, t.fetch FROM t GROUP BY t.order"
        );
    }

    #[test]
    fn test_dangling_qualifier_rejected() {
        assert!(split_err("SELECT a FROM t.").contains("dangling"));
        assert!(split_err("SELECT a FROM t GROUP BY t.;").contains("dangling"));
    }

    #[test]
    fn test_has_reports_clauses() {
        let parts = SelectParts::split(tokenize("SELECT a FROM t WHERE b", true).unwrap()).unwrap();
        assert!(parts.has(Clause::Where));
        assert!(!parts.has(Clause::OrderBy));
    }
}
