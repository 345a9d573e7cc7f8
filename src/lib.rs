//! pg_viv: materialize rendered SELECT queries into named database views
//!
//! A query definition is rendered by a [`QueryRenderer`], stripped of its
//! row filtering, ordering and pagination by the [`Rewriter`], and created as
//! an invoker-secured view under a deterministic [`view_name`]. The
//! [`ViewManager`] owns the lifecycle (materialize, rename, drop) and the
//! [`ViewInspector`] samples what was created.
//!
//! The core only talks to the backend through the [`Database`] trait, so it
//! runs against MySQL/MariaDB or PostgreSQL drivers alike. With the `pg`
//! feature the crate also builds as a PostgreSQL extension exposing the same
//! operations as SQL functions through SPI.
//!
//! ```
//! use pg_viv::{view_name, Dialect, Rewriter, RenderedQuery};
//!
//! let query = RenderedQuery::new(r#"SELECT "id" FROM "orders" WHERE "total" > :min ORDER BY "id" LIMIT 10"#)
//!     .with_argument(":min", 5_i64);
//! let body = Rewriter::new(Dialect::MySql).rewrite(&query).unwrap();
//!
//! assert_eq!(body, "SELECT `id` FROM `orders`");
//! assert_eq!(view_name("orders", "recent").as_str(), "viv__orders__recent");
//! ```

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod inspect;
pub mod naming;
pub mod record;
pub mod render;
pub mod rewrite;
#[cfg(any(test, feature = "pg_test"))]
pub mod testing;
pub mod validation;

#[cfg(feature = "pg")]
pub mod pg;

pub use backend::{BackendFailure, Database, Row};
pub use cache::{DiscoveryCache, NoopDiscoveryCache};
pub use clock::{Clock, SystemClock};
pub use config::VivConfig;
pub use ddl::{ColumnInfo, MaterializeRequest, ViewManager};
pub use dialect::Dialect;
pub use error::{VivError, VivResult};
pub use inspect::{PreviewRow, ViewInspector};
pub use naming::{view_name, ViewName};
pub use record::{Materialization, MaterializedViewRecord};
pub use render::{Arguments, Literal, PlaceholderValue, QueryRenderer, RenderOptions, RenderedQuery};
pub use rewrite::{RewriteMode, RewriteReport, Rewriter};

#[cfg(feature = "pg")]
pgrx::pg_module_magic!();

/// Hooks required by `cargo pgrx test`
#[cfg(all(test, feature = "pg_test"))]
pub mod pg_test {
    pub fn setup(_options: Vec<&str>) {}

    pub fn postgresql_conf_options() -> Vec<&'static str> {
        vec![]
    }
}
