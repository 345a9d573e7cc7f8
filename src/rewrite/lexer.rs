//! Minimal SQL lexer
//!
//! Splits rendered SQL into tokens precise enough for the rewrite passes:
//! string literals, quoted identifiers and comments are opaque, parentheses
//! carry their nesting depth, and placeholder tokens (`:name`, `$1`) are
//! recognised as whole units. This is not a parser; keywords are plain
//! `Word` tokens and the clause pass decides what they mean.
//!
//! ## Limitations
//!
//! - MySQL `#` comments are not recognised
//! - PostgreSQL `E'..'` strings use the dialect-wide backslash setting

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keyword, bare identifier or number
    Word,
    /// `"ident"` or `` `ident` ``, with the quote character
    QuotedIdent(char),
    StringLiteral,
    /// `:name` or `$n`
    Placeholder,
    Comment,
    Whitespace,
    OpenParen,
    CloseParen,
    /// Any other punctuation, including `::`
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Parenthesis nesting level; a paren pair shares its outer level
    pub depth: usize,
}

impl Token<'_> {
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Unquoted body of a quoted identifier, with doubled quotes collapsed
    pub fn identifier_body(&self) -> Option<String> {
        match self.kind {
            TokenKind::QuotedIdent(q) => {
                let inner = &self.text[1..self.text.len() - 1];
                let doubled: String = [q, q].iter().collect();
                Some(inner.replace(&doubled, &q.to_string()))
            }
            _ => None,
        }
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Tokenize `sql`; `backslash_escapes` selects MySQL string escaping
pub fn tokenize(sql: &str, backslash_escapes: bool) -> Result<Vec<Token<'_>>, String> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut depth: usize = 0;
    let mut i = 0;

    while i < len {
        let start = i;
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        let mut token_depth = depth;

        let kind = match c {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' => {
                while i < len && matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r' | b'\x0c') {
                    i += 1;
                }
                TokenKind::Whitespace
            }
            b'\'' => {
                i += 1;
                loop {
                    if i >= len {
                        return Err(format!("unterminated string literal at byte {start}"));
                    }
                    match bytes[i] {
                        b'\\' if backslash_escapes => i += 2,
                        b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
                        b'\'' => {
                            i += 1;
                            break;
                        }
                        _ => i += 1,
                    }
                }
                TokenKind::StringLiteral
            }
            b'"' | b'`' => {
                i += 1;
                loop {
                    if i >= len {
                        return Err(format!("unterminated quoted identifier at byte {start}"));
                    }
                    if bytes[i] == c {
                        if bytes.get(i + 1) == Some(&c) {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                TokenKind::QuotedIdent(c as char)
            }
            b'-' if next == Some(b'-') => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
                TokenKind::Comment
            }
            b'/' if next == Some(b'*') => {
                let end = sql[i + 2..]
                    .find("*/")
                    .ok_or_else(|| format!("unterminated block comment at byte {start}"))?;
                i += 2 + end + 2;
                TokenKind::Comment
            }
            b'(' => {
                depth += 1;
                i += 1;
                TokenKind::OpenParen
            }
            b')' => {
                if depth == 0 {
                    return Err(format!("unbalanced ')' at byte {start}"));
                }
                depth -= 1;
                token_depth = depth;
                i += 1;
                TokenKind::CloseParen
            }
            b':' if next == Some(b':') => {
                i += 2;
                TokenKind::Symbol
            }
            b':' if next.is_some_and(|n| n.is_ascii_alphabetic() || n == b'_') => {
                i += 1;
                while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                TokenKind::Placeholder
            }
            b'$' if next.is_some_and(|n| n.is_ascii_digit()) => {
                i += 1;
                while i < len && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                TokenKind::Placeholder
            }
            b'$' => match dollar_quote_end(sql, i) {
                Some(end) => {
                    i = end;
                    TokenKind::StringLiteral
                }
                None => {
                    i += 1;
                    TokenKind::Symbol
                }
            },
            b if is_word_byte(b) => {
                while i < len && is_word_byte(bytes[i]) {
                    i += 1;
                }
                TokenKind::Word
            }
            _ => {
                i += 1;
                TokenKind::Symbol
            }
        };

        // A backslash escape may step past the end of a truncated literal
        let end = i.min(len);
        tokens.push(Token {
            kind,
            text: &sql[start..end],
            depth: token_depth,
        });
    }

    if depth != 0 {
        return Err(format!("{depth} unclosed '(' in statement"));
    }

    Ok(tokens)
}

/// End offset of a PostgreSQL `$tag$ .. $tag$` string starting at `start`
fn dollar_quote_end(sql: &str, start: usize) -> Option<usize> {
    let rest = &sql[start + 1..];
    let tag_len = rest.find('$')?;
    let tag = &rest[..tag_len];
    if !tag.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        || tag.bytes().next().is_some_and(|b| b.is_ascii_digit())
    {
        return None;
    }
    let delimiter = format!("${tag}$");
    let body_start = start + delimiter.len();
    let close = sql[body_start..].find(&delimiter)?;
    Some(body_start + close + delimiter.len())
}

/// Concatenate token texts
pub fn render(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(|t| t.text).collect()
}
