use tracing::{info, warn};

use crate::backend::Database;
use crate::cache::DiscoveryCache;
use crate::clock::Clock;
use crate::error::VivResult;
use crate::naming::view_name;
use crate::record::Materialization;
use crate::render::{QueryRenderer, RenderOptions, RenderedQuery};

use super::lock::AdvisoryLock;
use super::ViewManager;

/// Which rendered query to materialize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeRequest {
    pub definition_id: String,
    pub variant_id: String,
}

impl MaterializeRequest {
    pub fn new(definition_id: impl Into<String>, variant_id: impl Into<String>) -> Self {
        Self {
            definition_id: definition_id.into(),
            variant_id: variant_id.into(),
        }
    }
}

impl<D, R, C, K> ViewManager<D, R, C, K>
where
    D: Database,
    R: QueryRenderer,
    C: DiscoveryCache,
    K: Clock,
{
    /// Build the view without touching the backend
    ///
    /// Returns the name, final body and CREATE statement that
    /// [`materialize`](Self::materialize) would issue.
    pub fn plan(&self, request: &MaterializeRequest) -> VivResult<Materialization> {
        let def = request.definition_id.as_str();
        let variant = request.variant_id.as_str();
        let name = view_name(def, variant);

        let rendered = self.renderer.render(def, variant, &RenderOptions::default())?;
        rendered.ensure_select(def, variant)?;

        let prefixed = RenderedQuery {
            sql: self.db.prefix_tables(&rendered.sql, &self.config.table_prefix)?,
            arguments: rendered.arguments,
        };
        let report = self.rewriter.rewrite_with_report(&prefixed)?;
        let create_statement = self.config.dialect.create_view(&name, &report.sql);

        Ok(Materialization {
            name,
            definition_id: def.to_string(),
            variant_id: variant.to_string(),
            sql: report.sql,
            create_statement,
            materialized_at: self.clock.now(),
            removed_where: report.removed_where,
        })
    }

    /// Create or replace the view for a definition variant
    ///
    /// Always drops and recreates; there is no change detection.
    pub fn materialize(&self, request: &MaterializeRequest) -> VivResult<Materialization> {
        let materialization = self.plan(request)?;
        let name = &materialization.name;

        if materialization.removed_where {
            warn!(
                view = %name,
                definition = %materialization.definition_id,
                variant = %materialization.variant_id,
                "top-level WHERE clause removed; the view exposes rows the rendered query filtered out"
            );
        }

        let _lock = if self.config.use_advisory_lock {
            Some(AdvisoryLock::acquire(&self.db, name)?)
        } else {
            None
        };

        self.execute(&self.config.dialect.drop_view(name))?;
        self.execute(&materialization.create_statement)?;
        self.invalidate_cache();

        info!(view = %name, sql = %materialization.sql, "materialized view");
        Ok(materialization)
    }
}
