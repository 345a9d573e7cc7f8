use crate::dialect::Dialect;
use crate::render::{Arguments, Literal, PlaceholderValue};

use super::lexer::{tokenize, TokenKind};

/// SQL text for a placeholder value
pub fn value_sql(token: &str, value: &PlaceholderValue, dialect: Dialect) -> Result<String, String> {
    let literal = |lit: &Literal| match lit {
        Literal::Float(f) if !f.is_finite() => {
            Err(format!("placeholder {token} has a non-finite value {f}"))
        }
        // `a -:x` must not become the comment opener `a --7`
        Literal::Integer(i) if *i < 0 => Ok(format!("({})", dialect.quote_literal(lit))),
        Literal::Float(f) if f.is_sign_negative() => Ok(format!("({})", dialect.quote_literal(lit))),
        _ => Ok(dialect.quote_literal(lit)),
    };

    match value {
        PlaceholderValue::Scalar(lit) => literal(lit),
        PlaceholderValue::List(items) if items.is_empty() => {
            Err(format!("placeholder {token} is bound to an empty list"))
        }
        PlaceholderValue::List(items) => Ok(items
            .iter()
            .map(literal)
            .collect::<Result<Vec<_>, _>>()?
            .join(", ")),
    }
}

/// Replace every placeholder token with its quoted value
///
/// Returns the rewritten SQL and the distinct tokens that were inlined, in
/// order of first appearance.
pub fn inline(sql: &str, arguments: &Arguments, dialect: Dialect) -> Result<(String, Vec<String>), String> {
    let tokens = tokenize(sql, dialect.backslash_escapes())?;
    let mut out = String::with_capacity(sql.len());
    let mut inlined: Vec<String> = Vec::new();

    for token in &tokens {
        if token.kind != TokenKind::Placeholder {
            out.push_str(token.text);
            continue;
        }

        let value = arguments
            .get(token.text)
            .ok_or_else(|| format!("placeholder {} has no value", token.text))?;
        out.push_str(&value_sql(token.text, value, dialect)?);

        if !inlined.iter().any(|t| t == token.text) {
            inlined.push(token.text.to_string());
        }
    }

    Ok((out, inlined))
}
