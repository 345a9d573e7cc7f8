use tracing::{debug, info};

use crate::backend::Database;
use crate::cache::DiscoveryCache;
use crate::clock::Clock;
use crate::error::{VivError, VivResult};
use crate::naming::ViewName;
use crate::render::QueryRenderer;

use super::{backend_error, ViewManager};

impl<D, R, C, K> ViewManager<D, R, C, K>
where
    D: Database,
    R: QueryRenderer,
    C: DiscoveryCache,
    K: Clock,
{
    /// Rename a view; both names must satisfy `^[a-z0-9_]{1,64}$`
    pub fn rename(&self, old_name: &str, new_name: &str) -> VivResult<()> {
        let from = ViewName::parse(old_name)?;
        let to = ViewName::parse(new_name)?;

        if from == to {
            debug!(view = %from, "rename to same name skipped");
            return Ok(());
        }

        let dialect = self.config.dialect;
        let sql = dialect.rename_view(&from, &to);
        debug!(sql = %sql, "executing");

        if let Err(failure) = self.db.execute(&sql) {
            let state = failure.sqlstate.as_deref().unwrap_or_default();
            return Err(if dialect.is_duplicate_object(state) {
                VivError::NameConflict {
                    from: from.to_string(),
                    to: to.to_string(),
                    error: failure.message,
                }
            } else if dialect.is_undefined_object(state) {
                VivError::ViewNotFound {
                    name: from.to_string(),
                }
            } else {
                backend_error(&sql, failure)
            });
        }

        self.invalidate_cache();
        info!(from = %from, to = %to, "renamed view");
        Ok(())
    }
}
