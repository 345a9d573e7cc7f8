//! DDL Operations: View Lifecycle Management
//!
//! This module owns every statement that changes or describes a
//! materialized view:
//! - **materialize**: render, rewrite, then DROP + CREATE the view
//! - **rename / drop**: validated names, idempotent drop
//! - **show_create_statement / columns**: catalog introspection
//!
//! ## Architecture
//!
//! Materialization follows this sequence:
//! 1. Derive the view name from (definition, variant)
//! 2. Render the definition-only, unpaginated query
//! 3. Expand table prefixes and rewrite into a view body
//! 4. Assemble the CREATE statement
//! 5. Optionally take a per-name advisory lock
//! 6. `DROP VIEW IF EXISTS`, then `CREATE VIEW` with invoker security
//! 7. Invalidate the discovery cache (failure is logged, not returned)
//!
//! Steps 1-4 never touch the backend, so any failure there leaves the
//! existing view untouched.

pub mod create;
pub mod drop;
pub mod introspect;
mod lock;
pub mod rename;

pub use create::MaterializeRequest;
pub use introspect::ColumnInfo;

use tracing::{debug, warn};

use crate::backend::{BackendFailure, Database, Row};
use crate::cache::{DiscoveryCache, NoopDiscoveryCache};
use crate::clock::{Clock, SystemClock};
use crate::config::VivConfig;
use crate::dialect::CatalogQuery;
use crate::error::{VivError, VivResult};
use crate::inspect::ViewInspector;
use crate::render::QueryRenderer;
use crate::rewrite::Rewriter;

/// Materialization engine over injected collaborators
pub struct ViewManager<D, R, C = NoopDiscoveryCache, K = SystemClock> {
    db: D,
    renderer: R,
    cache: C,
    clock: K,
    config: VivConfig,
    rewriter: Rewriter,
}

impl<D: Database, R: QueryRenderer> ViewManager<D, R> {
    /// Manager with no discovery cache and the system clock
    pub fn with_defaults(db: D, renderer: R, config: VivConfig) -> VivResult<Self> {
        Self::new(db, renderer, NoopDiscoveryCache, SystemClock, config)
    }
}

impl<D, R, C, K> ViewManager<D, R, C, K>
where
    D: Database,
    R: QueryRenderer,
    C: DiscoveryCache,
    K: Clock,
{
    pub fn new(db: D, renderer: R, cache: C, clock: K, config: VivConfig) -> VivResult<Self> {
        config.validate()?;
        if config.dialect != db.dialect() {
            return Err(VivError::ConfigError {
                setting: "dialect".to_string(),
                value: format!("{:?}", config.dialect),
                reason: format!("Database connection speaks {:?}", db.dialect()),
            });
        }

        let rewriter = Rewriter::from_config(&config);
        Ok(Self {
            db,
            renderer,
            cache,
            clock,
            config,
            rewriter,
        })
    }

    pub fn config(&self) -> &VivConfig {
        &self.config
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// Preview facade sharing this manager's connection and limits
    pub fn inspector(&self) -> ViewInspector<&D> {
        ViewInspector::new(&self.db, &self.config)
    }

    fn execute(&self, sql: &str) -> VivResult<()> {
        debug!(sql, "executing");
        self.db
            .execute(sql)
            .map_err(|failure| backend_error(sql, failure))
    }

    fn catalog(&self, query: &CatalogQuery) -> VivResult<Vec<Row>> {
        run_catalog(&self.db, query)
    }

    /// Runs only after DDL succeeded; a stale cache is not fatal
    fn invalidate_cache(&self) {
        if let Err(e) = self.cache.invalidate_all() {
            warn!(error = %e, "discovery cache invalidation failed");
        }
    }
}

pub(crate) fn backend_error(sql: &str, failure: BackendFailure) -> VivError {
    VivError::BackendError {
        query: sql.to_string(),
        error: failure.to_string(),
    }
}

pub(crate) fn run_catalog<D: Database + ?Sized>(db: &D, query: &CatalogQuery) -> VivResult<Vec<Row>> {
    debug!(sql = %query.sql, params = ?query.params, "catalog query");
    db.query(&query.sql, &query.params)
        .map_err(|failure| backend_error(&query.sql, failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::error::testing::assert_error_sqlstate;
    use crate::render::StaticRenderer;
    use crate::testing::FakeDatabase;

    #[test]
    fn test_dialect_mismatch_is_config_error() {
        let result = ViewManager::with_defaults(
            FakeDatabase::new(Dialect::Postgres),
            StaticRenderer::new(),
            VivConfig::default(),
        );
        assert_error_sqlstate(result.map(|_| ()), "22023");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = VivConfig::default();
        config.max_preview_limit = 0;
        let result = ViewManager::with_defaults(FakeDatabase::new(Dialect::MySql), StaticRenderer::new(), config);
        assert!(matches!(result, Err(VivError::ConfigError { .. })));
    }
}
