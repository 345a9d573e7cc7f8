
use std::fmt;

pub mod testing;

/// Main error type for pg_viv
#[derive(Debug, Clone, PartialEq)]
pub enum VivError {
    // ============ Source Definition Errors (P0xxx) ============
    /// The source definition does not exist
    DefinitionNotFound {
        definition_id: String,
    },

    /// The definition exists but the requested variant does not
    VariantNotFound {
        definition_id: String,
        variant_id: String,
    },

    /// The renderer produced no executable query
    RenderError {
        definition_id: String,
        variant_id: String,
        reason: String,
    },

    // ============ Rewrite Errors (42xxx) ============
    /// The rendered SQL could not be safely rewritten into a view body
    RewriteError {
        sql: String,
        reason: String,
    },

    /// A caller-supplied view name violates the `^[a-z0-9_]{1,64}$` invariant
    InvalidName {
        name: String,
        reason: String,
    },

    // ============ Backend Errors ============
    /// Rename target already denotes another object
    NameConflict {
        from: String,
        to: String,
        error: String,
    },

    /// The named view does not exist
    ViewNotFound {
        name: String,
    },

    /// A statement was rejected by the backend
    BackendError {
        query: String,
        error: String,
    },

    // ============ I/O and System Errors (XX000) ============
    /// Serialization/deserialization failed
    SerializationError {
        message: String,
    },

    /// Configuration error
    ConfigError {
        setting: String,
        value: String,
        reason: String,
    },

    /// Internal error (bug in pg_viv)
    InternalError {
        message: String,
        file: &'static str,
        line: u32,
    },
}

impl VivError {
    /// Get SQLSTATE code for this error
    pub fn sqlstate(&self) -> &'static str {
        use VivError::*;
        match self {
            DefinitionNotFound { .. } => "P0002", // No data found
            VariantNotFound { .. } => "P0003",
            RenderError { .. } => "P0001", // Raise exception

            RewriteError { .. } => "42601", // Syntax error
            InvalidName { .. } => "42602", // Invalid name

            NameConflict { .. } => "42P07", // Duplicate table
            ViewNotFound { .. } => "42P01", // Undefined table
            BackendError { .. } => "58000", // System error

            SerializationError { .. } => "22P02", // Invalid text representation
            ConfigError { .. } => "22023", // Invalid parameter value
            InternalError { .. } => "XX000",
        }
    }

    /// Create internal error with file/line info
    pub fn internal(message: String, file: &'static str, line: u32) -> Self {
        VivError::InternalError { message, file, line }
    }

    /// True when no statement could have reached the backend
    pub fn is_pre_ddl(&self) -> bool {
        use VivError::*;
        matches!(
            self,
            DefinitionNotFound { .. }
                | VariantNotFound { .. }
                | RenderError { .. }
                | RewriteError { .. }
                | InvalidName { .. }
                | ConfigError { .. }
        )
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl fmt::Display for VivError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VivError::*;
        match self {
            DefinitionNotFound { definition_id } => {
                write!(f, "Source definition '{}' not found", definition_id)
            }
            VariantNotFound { definition_id, variant_id } => {
                write!(f, "Variant '{}' not found on definition '{}'", variant_id, definition_id)
            }
            RenderError { definition_id, variant_id, reason } => {
                write!(f, "Rendering {}:{} produced no executable query: {}",
                       definition_id, variant_id, reason)
            }
            RewriteError { sql, reason } => {
                write!(f, "Cannot rewrite query into a view body: {}\nSQL: {}",
                       reason, truncate(sql, 100))
            }
            InvalidName { name, reason } => {
                write!(f, "Invalid view name '{}': {}", name, reason)
            }
            NameConflict { from, to, error } => {
                write!(f, "Cannot rename '{}' to '{}': name already in use ({})", from, to, error)
            }
            ViewNotFound { name } => {
                write!(f, "View '{}' not found", name)
            }
            BackendError { query, error } => {
                write!(f, "Backend rejected statement: {}\nQuery: {}", error, truncate(query, 100))
            }
            SerializationError { message } => {
                write!(f, "Serialization error: {}", message)
            }
            ConfigError { setting, value, reason } => {
                write!(f, "Configuration error for '{}': {} (value: {})", setting, reason, value)
            }
            InternalError { message, file, line } => {
                write!(f, "Internal error at {}:{}: {}\nPlease report this bug.",
                       file, line, message)
            }
        }
    }
}

impl std::error::Error for VivError {}

/// Result type for pg_viv operations
pub type VivResult<T> = Result<T, VivError>;

/// Convert serde_json::Error to VivError
impl From<serde_json::Error> for VivError {
    fn from(e: serde_json::Error) -> Self {
        VivError::SerializationError {
            message: format!("JSON serialization error: {}", e),
        }
    }
}

/// Helper macro for creating internal errors with automatic file/line
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::VivError::internal($msg.to_string(), file!(), line!())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::VivError::internal(format!($fmt, $($arg)*), file!(), line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_not_found_message() {
        let err = VivError::VariantNotFound {
            definition_id: "sales_report".to_string(),
            variant_id: "missing".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("missing"));
        assert!(msg.contains("sales_report"));
        assert_eq!(err.sqlstate(), "P0003");
        assert!(err.is_pre_ddl());
    }

    #[test]
    fn test_backend_error_truncates_query() {
        let err = VivError::BackendError {
            query: "x".repeat(500),
            error: "permission denied".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("permission denied"));
        assert!(msg.len() < 200);
        assert!(!err.is_pre_ddl());
    }

    #[test]
    fn test_json_errors_become_serialization_errors() {
        let err: VivError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, VivError::SerializationError { .. }));
        assert_eq!(err.sqlstate(), "22P02");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "ééééé";
        assert_eq!(truncate(s, 3), "é");
    }

    #[test]
    fn test_internal_error_macro() {
        let err = internal_error!("Test error at {}", "location");

        match err {
            VivError::InternalError { message, file, line } => {
                assert!(message.contains("Test error"));
                assert!(file.ends_with("mod.rs"));
                assert!(line > 0);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_error_sqlstates_mostly_unique() {
        let errors = vec![
            VivError::DefinitionNotFound { definition_id: "d".to_string() },
            VivError::VariantNotFound { definition_id: "d".to_string(), variant_id: "v".to_string() },
            VivError::RenderError { definition_id: "d".to_string(), variant_id: "v".to_string(), reason: "r".to_string() },
            VivError::RewriteError { sql: "s".to_string(), reason: "r".to_string() },
            VivError::InvalidName { name: "n".to_string(), reason: "r".to_string() },
            VivError::NameConflict { from: "a".to_string(), to: "b".to_string(), error: "e".to_string() },
            VivError::ViewNotFound { name: "n".to_string() },
            VivError::BackendError { query: "q".to_string(), error: "e".to_string() },
            VivError::SerializationError { message: "m".to_string() },
            VivError::ConfigError { setting: "s".to_string(), value: "v".to_string(), reason: "r".to_string() },
            VivError::InternalError { message: "m".to_string(), file: "f", line: 1 },
        ];

        let unique: std::collections::HashSet<&str> = errors.iter().map(|e| e.sqlstate()).collect();
        assert_eq!(unique.len(), errors.len());
    }
}
