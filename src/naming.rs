//! Identifier Namer
//!
//! Derives the database object name for a (definition, variant) pair:
//! `viv__{definition}__{variant}`, lower-cased, every character outside
//! `[a-z0-9_]` replaced with `_`, truncated to 64 characters.
//!
//! Truncation means two long pairs can share a name. This is accepted;
//! [`collides`] lets callers detect it before materializing.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_VIEW_NAME_LEN, NAME_SEPARATOR, VIEW_NAME_PREFIX};
use crate::error::VivResult;
use crate::validation::validate_view_name;

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("static regex"));

/// A database view name satisfying `^[a-z0-9_]{1,64}$`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViewName(String);

impl ViewName {
    /// Validate caller-supplied text
    pub fn parse(name: &str) -> VivResult<Self> {
        validate_view_name(name, "view name")?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ViewName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ViewName {
    type Error = crate::VivError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_view_name(&value, "view name")?;
        Ok(Self(value))
    }
}

impl From<ViewName> for String {
    fn from(name: ViewName) -> Self {
        name.0
    }
}

/// Build the deterministic view name for a definition variant
pub fn view_name(definition_id: &str, variant_id: &str) -> ViewName {
    let raw = format!(
        "{VIEW_NAME_PREFIX}{NAME_SEPARATOR}{}{NAME_SEPARATOR}{}",
        definition_id.to_lowercase(),
        variant_id.to_lowercase()
    );
    let sanitized = DISALLOWED.replace_all(&raw, "_");

    // One `_` per disallowed char, not per byte; the result is pure ASCII
    let truncated: String = sanitized.chars().take(MAX_VIEW_NAME_LEN).collect();
    ViewName(truncated)
}

/// True when two distinct pairs map to the same (truncated) name
pub fn collides(a: (&str, &str), b: (&str, &str)) -> bool {
    a != b && view_name(a.0, a.1) == view_name(b.0, b.1)
}
