use tracing::info;

use crate::backend::Database;
use crate::cache::DiscoveryCache;
use crate::clock::Clock;
use crate::error::VivResult;
use crate::naming::ViewName;
use crate::render::QueryRenderer;

use super::ViewManager;

impl<D, R, C, K> ViewManager<D, R, C, K>
where
    D: Database,
    R: QueryRenderer,
    C: DiscoveryCache,
    K: Clock,
{
    /// Drop a view. Dropping a view that does not exist succeeds.
    pub fn drop(&self, name: &str) -> VivResult<()> {
        let name = ViewName::parse(name)?;
        self.execute(&self.config.dialect.drop_view(&name))?;
        self.invalidate_cache();
        info!(view = %name, "dropped view");
        Ok(())
    }
}
