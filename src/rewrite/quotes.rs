use super::lexer::{tokenize, TokenKind};

/// Rewrite identifiers quoted with `source` to use `target`
///
/// String literals and identifiers already using another quote character
/// are emitted unchanged.
pub fn normalize(sql: &str, source: char, target: char, backslash_escapes: bool) -> Result<String, String> {
    let tokens = tokenize(sql, backslash_escapes)?;
    if source == target {
        return Ok(sql.to_string());
    }

    let mut out = String::with_capacity(sql.len());
    for token in &tokens {
        match token.kind {
            TokenKind::QuotedIdent(q) if q == source => {
                let body = token.identifier_body().unwrap_or_default();
                if body.contains(target) {
                    return Err(format!(
                        "identifier {} contains the target quote character {target}",
                        token.text
                    ));
                }
                out.push(target);
                out.push_str(&body);
                out.push(target);
            }
            _ => out.push_str(token.text),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_swapped() {
        let sql = normalize(r#"SELECT "id", "total" FROM "orders""#, '"', '`', true).unwrap();
        assert_eq!(sql, "SELECT `id`, `total` FROM `orders`");
    }

    #[test]
    fn test_string_literals_untouched() {
        let sql = normalize(r#"SELECT 'say "hi"' AS "greeting""#, '"', '`', true).unwrap();
        assert_eq!(sql, r#"SELECT 'say "hi"' AS `greeting`"#);
    }

    #[test]
    fn test_doubled_source_quote_collapses() {
        let sql = normalize(r#"SELECT "we""ird" FROM t"#, '"', '`', true).unwrap();
        assert_eq!(sql, r#"SELECT `we"ird` FROM t"#);
    }

    #[test]
    fn test_target_quote_inside_identifier_fails() {
        let err = normalize(r#"SELECT "a`b" FROM t"#, '"', '`', true).unwrap_err();
        assert!(err.contains("target quote"));
    }

    #[test]
    fn test_same_quote_is_identity_but_still_lexed() {
        assert_eq!(normalize(r#"SELECT "a""#, '"', '"', false).unwrap(), r#"SELECT "a""#);
        assert!(normalize(r#"SELECT "a"#, '"', '"', false).is_err());
    }
}
