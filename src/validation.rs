//! Input Validation Module
//!
//! Security-critical checks for every caller-supplied view name. Names reach
//! DDL and preview statements as identifiers, so they are validated against
//! the generated-name charset before any statement is built.
//!
//! ## Security Principles
//!
//! 1. **Whitelist, not blacklist**: only `[a-z0-9_]` is accepted
//! 2. **Validate early**: reject before a statement is assembled
//! 3. **Fail securely**: return `InvalidName`, never a best-effort cleanup
//!
//! ## Usage
//!
//! ```rust
//! use pg_viv::validation::validate_view_name;
//!
//! assert!(validate_view_name("viv__sales__summary", "name").is_ok());
//! assert!(validate_view_name("1;DROP TABLE users", "name").is_err());
//! ```

use crate::config::MAX_VIEW_NAME_LEN;
use crate::error::{VivError, VivResult};

/// Validate a view name against `^[a-z0-9_]{1,64}$`
///
/// # Security
///
/// Rejects quotes, semicolons, dashes, spaces, upper case and any non-ASCII
/// character, so a validated name can be quoted and embedded in DDL without
/// escaping concerns.
///
/// # Examples
///
/// ```rust
/// use pg_viv::validation::validate_view_name;
///
/// assert!(validate_view_name("viv__report__page_1", "name").is_ok());
/// assert!(validate_view_name("users; DROP TABLE", "name").is_err()); // injection
/// assert!(validate_view_name("Report", "name").is_err());            // upper case
/// assert!(validate_view_name("", "name").is_err());                  // empty
/// ```
pub fn validate_view_name(name: &str, param_name: &str) -> VivResult<()> {
    if name.is_empty() {
        return Err(VivError::InvalidName {
            name: String::new(),
            reason: format!("{param_name} cannot be empty"),
        });
    }

    if name.len() > MAX_VIEW_NAME_LEN {
        return Err(VivError::InvalidName {
            name: format!("{}... ({} chars)", sanitize_for_logging(&name[..name.floor_char_boundary_compat(20)]), name.len()),
            reason: format!("{param_name} is longer than {MAX_VIEW_NAME_LEN} characters"),
        });
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
    {
        return Err(VivError::InvalidName {
            name: sanitize_for_logging(name),
            reason: format!("{param_name} contains '{}' (allowed: a-z, 0-9, _)", bad.escape_default()),
        });
    }

    Ok(())
}

/// Sanitize string for logging (truncate, escape control chars)
pub(crate) fn sanitize_for_logging(s: &str) -> String {
    let max_len = 50;
    let truncated = if s.len() > max_len {
        format!("{}...", &s[..s.floor_char_boundary_compat(max_len)])
    } else {
        s.to_string()
    };

    truncated
        .replace('\0', "\\0")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// `str::floor_char_boundary` is still unstable
trait FloorCharBoundary {
    fn floor_char_boundary_compat(&self, index: usize) -> usize;
}

impl FloorCharBoundary for str {
    fn floor_char_boundary_compat(&self, index: usize) -> usize {
        if index >= self.len() {
            return self.len();
        }
        let mut i = index;
        while !self.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_view_name("viv__sales_report__summary", "test").is_ok());
        assert!(validate_view_name("a", "test").is_ok());
        assert!(validate_view_name("123", "test").is_ok());
        assert!(validate_view_name(&"x".repeat(64), "test").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_view_name("", "test").is_err());
        assert!(validate_view_name("1;DROP TABLE users", "test").is_err());
        assert!(validate_view_name("user-data", "test").is_err());
        assert!(validate_view_name("my view", "test").is_err());
        assert!(validate_view_name("`quoted`", "test").is_err());
        assert!(validate_view_name("Upper", "test").is_err());
        assert!(validate_view_name("vué", "test").is_err());
        assert!(validate_view_name(&"x".repeat(65), "test").is_err());
    }

    #[test]
    fn test_long_multibyte_name_does_not_panic() {
        let name = "é".repeat(40);
        let err = validate_view_name(&name, "test").unwrap_err();
        assert_eq!(err.sqlstate(), "42602");
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("a\nb"), "a\\nb");
        assert!(sanitize_for_logging(&"y".repeat(80)).ends_with("..."));
    }
}
