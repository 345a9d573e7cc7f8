//! In-memory collaborators for exercising the engine without a server
//!
//! [`FakeDatabase`] understands exactly the statements [`Dialect`] produces
//! and logs every statement it receives, so tests can assert both outcomes
//! and that nothing reached the backend.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::backend::{BackendFailure, Database, Row};
use crate::cache::DiscoveryCache;
use crate::clock::Clock;
use crate::dialect::Dialect;
use crate::error::{VivError, VivResult};

#[derive(Debug, Clone, Default)]
struct FakeView {
    create_statement: String,
    /// (column_name, data_type, is_nullable)
    columns: Vec<(String, String, bool)>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Default)]
struct FakeState {
    statements: Vec<String>,
    views: BTreeMap<String, FakeView>,
    failures: Vec<(String, BackendFailure)>,
    locks_held: Vec<String>,
    lock_denied: bool,
}

pub struct FakeDatabase {
    dialect: Dialect,
    state: RefCell<FakeState>,
}

impl FakeDatabase {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: RefCell::new(FakeState::default()),
        }
    }

    /// Register an existing view with catalog columns and preview data
    pub fn with_view(
        self,
        name: &str,
        columns: &[(&str, &str, bool)],
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.state.borrow_mut().views.insert(
            name.to_string(),
            FakeView {
                create_statement: format!("CREATE VIEW {name} AS SELECT 1"),
                columns: columns
                    .iter()
                    .map(|(c, t, n)| (c.to_string(), t.to_string(), *n))
                    .collect(),
                rows,
            },
        );
        self
    }

    /// Fail the first statement containing `fragment`
    pub fn fail_on(self, fragment: &str, failure: BackendFailure) -> Self {
        self.state
            .borrow_mut()
            .failures
            .push((fragment.to_string(), failure));
        self
    }

    /// Make advisory lock requests time out
    pub fn deny_locks(self) -> Self {
        self.state.borrow_mut().lock_denied = true;
        self
    }

    /// Every statement received, in order
    pub fn statements(&self) -> Vec<String> {
        self.state.borrow().statements.clone()
    }

    pub fn has_view(&self, name: &str) -> bool {
        self.state.borrow().views.contains_key(name)
    }

    pub fn create_statement(&self, name: &str) -> Option<String> {
        self.state
            .borrow()
            .views
            .get(name)
            .map(|v| v.create_statement.clone())
    }

    pub fn locks_held(&self) -> Vec<String> {
        self.state.borrow().locks_held.clone()
    }

    fn duplicate_state(&self) -> &'static str {
        match self.dialect {
            Dialect::MySql => "42S01",
            Dialect::Postgres => "42P07",
        }
    }

    fn undefined_state(&self) -> &'static str {
        match self.dialect {
            Dialect::MySql => "42S02",
            Dialect::Postgres => "42P01",
        }
    }

    /// Identifiers quoted with the dialect's quote character
    fn quoted_names(&self, sql: &str) -> Vec<String> {
        let q = self.dialect.identifier_quote();
        sql.split(q)
            .skip(1)
            .step_by(2)
            .map(str::to_string)
            .collect()
    }

    fn record(&self, sql: &str) -> Result<(), BackendFailure> {
        let mut state = self.state.borrow_mut();
        state.statements.push(sql.to_string());
        if let Some(pos) = state.failures.iter().position(|(f, _)| sql.contains(f.as_str())) {
            return Err(state.failures.remove(pos).1);
        }
        Ok(())
    }

    fn undefined(&self, name: &str) -> BackendFailure {
        BackendFailure::new(format!("relation \"{name}\" does not exist"))
            .with_sqlstate(self.undefined_state())
    }
}

impl Database for FakeDatabase {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&self, sql: &str) -> Result<(), BackendFailure> {
        self.record(sql)?;
        let names = self.quoted_names(sql);
        let mut state = self.state.borrow_mut();

        if sql.starts_with("DROP VIEW IF EXISTS") {
            if let Some(name) = names.first() {
                state.views.remove(name);
            }
        } else if sql.starts_with("CREATE") {
            let name = names
                .first()
                .ok_or_else(|| BackendFailure::new("CREATE without a view name"))?;
            if state.views.contains_key(name) {
                return Err(BackendFailure::new(format!("view {name} already exists"))
                    .with_sqlstate(self.duplicate_state()));
            }
            state.views.insert(
                name.clone(),
                FakeView {
                    create_statement: sql.to_string(),
                    ..FakeView::default()
                },
            );
        } else if sql.starts_with("RENAME TABLE") || sql.starts_with("ALTER VIEW") {
            let (from, to) = match names.as_slice() {
                [from, to] => (from.clone(), to.clone()),
                _ => return Err(BackendFailure::new("malformed rename")),
            };
            if state.views.contains_key(&to) {
                return Err(BackendFailure::new(format!("table {to} already exists"))
                    .with_sqlstate(self.duplicate_state()));
            }
            let view = state.views.remove(&from).ok_or_else(|| self.undefined(&from))?;
            state.views.insert(to, view);
        } else {
            return Err(BackendFailure::new(format!("unsupported statement: {sql}")));
        }
        Ok(())
    }

    fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, BackendFailure> {
        self.record(sql)?;
        let mut state = self.state.borrow_mut();
        let param = params.first().cloned().unwrap_or_default();
        let row = |pairs: Vec<(&str, Value)>| -> Row {
            pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
        };

        if sql.contains("GET_LOCK") || sql.contains("pg_advisory_lock") {
            if state.lock_denied {
                return Ok(vec![row(vec![("acquired", json!(0))])]);
            }
            state.locks_held.push(param);
            return Ok(vec![row(vec![("acquired", json!(1))])]);
        }

        if sql.contains("RELEASE_LOCK") || sql.contains("pg_advisory_unlock") {
            state.locks_held.retain(|held| *held != param);
            return Ok(vec![row(vec![("released", json!(1))])]);
        }

        if sql.starts_with("SHOW CREATE VIEW") || sql.contains("pg_get_viewdef") {
            let name = match self.dialect {
                Dialect::MySql => self.quoted_names(sql).into_iter().next().unwrap_or_default(),
                Dialect::Postgres => param,
            };
            return match state.views.get(&name) {
                Some(view) => Ok(vec![row(vec![
                    ("View", json!(name)),
                    ("Create View", json!(view.create_statement)),
                ])]),
                None if self.dialect == Dialect::MySql => Err(self.undefined(&name)),
                None => Ok(Vec::new()),
            };
        }

        if sql.contains("information_schema.columns") {
            let columns = state
                .views
                .get(&param)
                .map(|v| v.columns.clone())
                .unwrap_or_default();
            return Ok(columns
                .into_iter()
                .map(|(name, data_type, nullable)| {
                    row(vec![
                        ("column_name", json!(name)),
                        ("data_type", json!(data_type)),
                        ("is_nullable", json!(if nullable { "YES" } else { "NO" })),
                    ])
                })
                .collect());
        }

        if let Some((head, tail)) = sql.split_once(" FROM ") {
            let name = self.quoted_names(tail).into_iter().next().unwrap_or_default();
            let limit: usize = tail
                .rsplit_once("LIMIT ")
                .and_then(|(_, n)| n.trim().parse().ok())
                .unwrap_or(usize::MAX);
            let view = state.views.get(&name).ok_or_else(|| self.undefined(&name))?;
            let column_names = self.quoted_names(head);
            return Ok(view
                .rows
                .iter()
                .take(limit)
                .map(|values| column_names.iter().cloned().zip(values.iter().cloned()).collect())
                .collect());
        }

        Err(BackendFailure::new(format!("unsupported query: {sql}")))
    }
}

/// Counts invalidations; optionally fails every call
#[derive(Debug, Default)]
pub struct RecordingCache {
    invalidations: Cell<usize>,
    failing: bool,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            invalidations: Cell::new(0),
            failing: true,
        }
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.get()
    }
}

impl DiscoveryCache for RecordingCache {
    fn invalidate_all(&self) -> VivResult<()> {
        self.invalidations.set(self.invalidations.get() + 1);
        if self.failing {
            return Err(VivError::BackendError {
                query: "invalidate discovery cache".to_string(),
                error: "cache backend unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::ViewName;

    fn name(s: &str) -> ViewName {
        ViewName::parse(s).unwrap()
    }

    #[test]
    fn test_fake_understands_dialect_ddl() {
        let db = FakeDatabase::new(Dialect::MySql);
        let d = db.dialect();
        db.execute(&d.create_view(&name("v1"), "SELECT 1")).unwrap();
        assert!(db.has_view("v1"));

        db.execute(&d.rename_view(&name("v1"), &name("v2"))).unwrap();
        assert!(!db.has_view("v1") && db.has_view("v2"));

        db.execute(&d.drop_view(&name("v2"))).unwrap();
        assert!(!db.has_view("v2"));
        assert_eq!(db.statements().len(), 3);
    }

    #[test]
    fn test_fake_preview_uses_select_list() {
        let db = FakeDatabase::new(Dialect::Postgres).with_view(
            "v",
            &[("id", "integer", false)],
            vec![vec![json!(1)], vec![json!(2)]],
        );
        let sql = Dialect::Postgres.preview(&name("v"), &["id".to_string()], 1);
        let rows = db.query(&sql, &[]).unwrap();
        assert_eq!(rows, vec![vec![("id".to_string(), json!(1))]]);
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let db = FakeDatabase::new(Dialect::MySql).fail_on("DROP", BackendFailure::new("nope"));
        let drop = Dialect::MySql.drop_view(&name("v"));
        assert!(db.execute(&drop).is_err());
        assert!(db.execute(&drop).is_ok());
    }

    #[test]
    fn test_recording_cache() {
        let cache = RecordingCache::failing();
        assert!(cache.invalidate_all().is_err());
        assert_eq!(cache.invalidations(), 1);
    }
}
