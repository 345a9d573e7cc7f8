use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::Database;
use crate::dialect::CatalogQuery;
use crate::error::{VivError, VivResult};
use crate::naming::ViewName;

use super::run_catalog;

/// Session advisory lock on a view name, released on drop
pub(crate) struct AdvisoryLock<'a, D: Database> {
    db: &'a D,
    name: ViewName,
    release: CatalogQuery,
}

impl<'a, D: Database> AdvisoryLock<'a, D> {
    pub(crate) fn acquire(db: &'a D, name: &ViewName) -> VivResult<Self> {
        let (acquire, release) = db.dialect().advisory_lock(name);
        let rows = run_catalog(db, &acquire)?;

        let granted = rows
            .first()
            .and_then(|row| row.first())
            .is_some_and(|(_, value)| is_truthy(value));
        if !granted {
            return Err(VivError::BackendError {
                query: acquire.sql,
                error: format!("could not acquire advisory lock for view '{name}'"),
            });
        }

        debug!(view = %name, "advisory lock acquired");
        Ok(Self {
            db,
            name: name.clone(),
            release,
        })
    }
}

impl<D: Database> Drop for AdvisoryLock<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = run_catalog(self.db, &self.release) {
            warn!(view = %self.name, error = %e, "advisory lock release failed");
        }
    }
}

/// GET_LOCK answers 1, pg_advisory_lock is wrapped in a boolean test
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("t") || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::testing::FakeDatabase;
    use serde_json::json;

    #[test]
    fn test_lock_released_on_drop() {
        let db = FakeDatabase::new(Dialect::MySql);
        let name = ViewName::parse("viv__a__b").unwrap();
        {
            let _guard = AdvisoryLock::acquire(&db, &name).unwrap();
            assert_eq!(db.locks_held(), vec!["pg_viv:viv__a__b".to_string()]);
        }
        assert!(db.locks_held().is_empty());
    }

    #[test]
    fn test_denied_lock_is_backend_error() {
        let db = FakeDatabase::new(Dialect::Postgres).deny_locks();
        let name = ViewName::parse("v").unwrap();
        let err = AdvisoryLock::acquire(&db, &name).err().unwrap();
        assert_eq!(err.sqlstate(), "58000");
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("t")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&Value::Null));
    }
}
