//! Discovery cache seam
//!
//! Whatever layer lists available tables (query builders, schema browsers)
//! is told to forget its view list after every successful DDL.

use crate::error::VivResult;

pub trait DiscoveryCache {
    fn invalidate_all(&self) -> VivResult<()>;
}

impl<T: DiscoveryCache + ?Sized> DiscoveryCache for &T {
    fn invalidate_all(&self) -> VivResult<()> {
        (**self).invalidate_all()
    }
}

/// For embedders without a discovery layer
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiscoveryCache;

impl DiscoveryCache for NoopDiscoveryCache {
    fn invalidate_all(&self) -> VivResult<()> {
        Ok(())
    }
}
