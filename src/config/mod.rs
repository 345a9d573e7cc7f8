use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{VivError, VivResult};
use crate::rewrite::RewriteMode;

/// Namespace prefix of every generated view name
pub const VIEW_NAME_PREFIX: &str = "viv";

/// Separator between prefix, definition id and variant id
pub const NAME_SEPARATOR: &str = "__";

/// Longest identifier accepted by both MySQL (64) and our own names
pub const MAX_VIEW_NAME_LEN: usize = 64;

/// Rows returned by a preview when the caller does not ask for a count
pub const DEFAULT_PREVIEW_LIMIT: u32 = 100;

/// Hard ceiling for preview sampling
pub const MAX_PREVIEW_LIMIT: u32 = 10_000;

/// Seconds to wait on MySQL `GET_LOCK` before giving up
pub const LOCK_TIMEOUT_SECS: u32 = 10;

/// Runtime configuration for the materialization engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VivConfig {
    /// Backend the generated DDL targets
    pub dialect: Dialect,
    /// Identifier quote character the renderer emits
    pub source_quote: char,
    /// Clause stripping strategy
    pub rewrite_mode: RewriteMode,
    /// Physical prefix applied when expanding `{table}` tokens
    pub table_prefix: String,
    /// Upper bound for `preview_rows`
    pub max_preview_limit: u32,
    /// Serialize drop+create of the same view behind a backend advisory lock
    pub use_advisory_lock: bool,
}

impl Default for VivConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::MySql,
            source_quote: '"',
            rewrite_mode: RewriteMode::Structured,
            table_prefix: String::new(),
            max_preview_limit: MAX_PREVIEW_LIMIT,
            use_advisory_lock: false,
        }
    }
}

impl VivConfig {
    /// Defaults for a given backend
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> VivResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VivResult<()> {
        if !matches!(self.source_quote, '"' | '`') {
            return Err(VivError::ConfigError {
                setting: "source_quote".to_string(),
                value: self.source_quote.to_string(),
                reason: "Identifier quote must be '\"' or '`'".to_string(),
            });
        }

        if self.max_preview_limit == 0 || self.max_preview_limit > MAX_PREVIEW_LIMIT {
            return Err(VivError::ConfigError {
                setting: "max_preview_limit".to_string(),
                value: self.max_preview_limit.to_string(),
                reason: format!("Must be between 1 and {MAX_PREVIEW_LIMIT}"),
            });
        }

        if !self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(VivError::ConfigError {
                setting: "table_prefix".to_string(),
                value: self.table_prefix.clone(),
                reason: "Table prefix may only contain [A-Za-z0-9_]".to_string(),
            });
        }

        Ok(())
    }
}
