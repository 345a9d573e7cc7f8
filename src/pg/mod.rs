//! PostgreSQL surface: SQL functions over the engine
//!
//! Every function runs the engine against the calling session through SPI,
//! with rendered queries taken from `pg_viv_definition`.
//!
//! Usage:
//! ```sql
//! SELECT pg_viv_register('sales_report', 'summary',
//!     'SELECT "id", "total" FROM "orders" WHERE "region" = :region',
//!     '{":region": "east"}');
//! SELECT pg_viv_materialize('sales_report', 'summary');
//! SELECT pg_viv_preview('viv__sales_report__summary', 10);
//! ```

pub mod catalog;
pub mod spi;

use pgrx::prelude::*;
use pgrx::JsonB;

use crate::clock::SystemClock;
use crate::config::VivConfig;
use crate::ddl::{MaterializeRequest, ViewManager};
use crate::dialect::Dialect;
use crate::error::{VivError, VivResult};
use crate::inspect::ViewInspector;
use crate::record::MaterializedViewRecord;
use crate::render::{Arguments, RenderedQuery};
use crate::rewrite::Rewriter;

pub use catalog::CatalogRenderer;
pub use spi::{NotifyDiscoveryCache, SpiDatabase};

type SpiManager = ViewManager<SpiDatabase, CatalogRenderer, NotifyDiscoveryCache, SystemClock>;

fn manager() -> VivResult<SpiManager> {
    ViewManager::new(
        SpiDatabase,
        CatalogRenderer,
        NotifyDiscoveryCache,
        SystemClock,
        VivConfig::for_dialect(Dialect::Postgres),
    )
}

/// Surface engine errors with their SQLSTATE in the message
fn report<T>(result: VivResult<T>) -> Result<T, String> {
    result.map_err(|e| format!("pg_viv [{}]: {}", e.sqlstate(), e))
}

fn to_jsonb<T: serde::Serialize>(value: &T) -> VivResult<JsonB> {
    Ok(JsonB(serde_json::to_value(value)?))
}

fn parse_arguments(arguments: JsonB) -> VivResult<Arguments> {
    if arguments.0.is_null() {
        return Ok(Arguments::new());
    }
    Ok(serde_json::from_value(arguments.0)?)
}

/// Get the version of the pg_viv extension
#[pg_extern]
fn pg_viv_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Deterministic view name for a definition variant
#[pg_extern(immutable, parallel_safe)]
fn pg_viv_view_name(definition_id: &str, variant_id: &str) -> String {
    crate::naming::view_name(definition_id, variant_id).into()
}

/// Rewrite a query into a view body without creating anything
///
/// Usage: SELECT pg_viv_rewrite('SELECT a FROM t WHERE b = $1', '{"$1": 5}');
#[pg_extern]
fn pg_viv_rewrite(sql: &str, arguments: default!(JsonB, "'{}'")) -> Result<String, String> {
    report(parse_arguments(arguments).and_then(|arguments| {
        Rewriter::new(Dialect::Postgres).rewrite(&RenderedQuery {
            sql: sql.to_string(),
            arguments,
        })
    }))
}

/// Store a rendered query for later materialization
#[pg_extern]
fn pg_viv_register(
    definition_id: &str,
    variant_id: &str,
    sql: &str,
    arguments: default!(JsonB, "'{}'"),
) -> Result<String, String> {
    report(
        parse_arguments(arguments)
            .and_then(|arguments| catalog::register_definition(definition_id, variant_id, sql, &arguments)),
    )?;
    Ok(crate::naming::view_name(definition_id, variant_id).into())
}

/// Dry run: the name, body and CREATE statement materialize would use
#[pg_extern]
fn pg_viv_plan(definition_id: &str, variant_id: &str) -> Result<JsonB, String> {
    report(manager().and_then(|vm| {
        let materialization = vm.plan(&MaterializeRequest::new(definition_id, variant_id))?;
        to_jsonb(&materialization)
    }))
}

/// Create or replace a view; returns the record to persist
///
/// Usage: SELECT pg_viv_materialize('sales_report', 'summary');
#[pg_extern]
fn pg_viv_materialize(
    definition_id: &str,
    variant_id: &str,
    created_by: default!(Option<String>, "NULL"),
) -> Result<JsonB, String> {
    report(manager().and_then(|vm| {
        let materialization = vm.materialize(&MaterializeRequest::new(definition_id, variant_id))?;
        if materialization.removed_where {
            warning!(
                "pg_viv: WHERE clause removed while materializing {}",
                materialization.name
            );
        }
        info!("pg_viv: materialized {}", materialization.name);
        to_jsonb(&MaterializedViewRecord::new(&materialization, created_by))
    }))
}

#[pg_extern]
fn pg_viv_rename(old_name: &str, new_name: &str) -> Result<String, String> {
    report(manager().and_then(|vm| vm.rename(old_name, new_name)))?;
    Ok(format!("View '{old_name}' renamed to '{new_name}'"))
}

#[pg_extern]
fn pg_viv_drop(name: &str) -> Result<String, String> {
    report(manager().and_then(|vm| vm.drop(name)))?;
    Ok(format!("View '{name}' dropped"))
}

#[pg_extern]
fn pg_viv_show_create(name: &str) -> Result<String, String> {
    report(manager().and_then(|vm| vm.show_create_statement(name)))
}

/// Column metadata as a JSON array
#[pg_extern]
fn pg_viv_columns(name: &str) -> Result<JsonB, String> {
    report(manager().and_then(|vm| to_jsonb(&vm.columns(name)?)))
}

/// Sample rows as a JSON array of objects in column order
#[pg_extern]
fn pg_viv_preview(name: &str, limit: default!(i32, 100)) -> Result<JsonB, String> {
    report((|| {
        let limit = u32::try_from(limit).map_err(|_| VivError::ConfigError {
            setting: "limit".to_string(),
            value: limit.to_string(),
            reason: "Preview limit cannot be negative".to_string(),
        })?;
        let inspector = ViewInspector::new(SpiDatabase, &VivConfig::for_dialect(Dialect::Postgres));
        to_jsonb(&inspector.preview_rows(name, limit)?)
    })())
}

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;

    fn setup_orders() {
        Spi::run("DROP TABLE IF EXISTS orders CASCADE").unwrap();
        Spi::run("CREATE TABLE orders (id INT PRIMARY KEY, total NUMERIC, region TEXT)").unwrap();
        Spi::run("INSERT INTO orders VALUES (1, 10, 'east'), (2, 20, 'west'), (3, 30, 'east')").unwrap();
        Spi::run(
            r#"SELECT pg_viv_register('sales_report', 'summary',
                'SELECT "id", "total" FROM "orders" WHERE "region" = :region ORDER BY "total" DESC LIMIT 10',
                '{":region": "east"}')"#,
        )
        .unwrap();
    }

    #[pg_test]
    fn test_version_callable_from_sql() {
        let version = Spi::get_one::<String>("SELECT pg_viv_version()");
        assert!(version.unwrap().unwrap().starts_with("0.1.0"));
    }

    #[pg_test]
    fn test_view_name_function() {
        let name = Spi::get_one::<String>("SELECT pg_viv_view_name('Sales Report', 'summary')");
        assert_eq!(name, Ok(Some("viv__sales_report__summary".to_string())));
    }

    #[pg_test]
    fn test_materialize_creates_unfiltered_view() {
        setup_orders();
        Spi::run("SELECT pg_viv_materialize('sales_report', 'summary')").unwrap();

        let count = Spi::get_one::<i64>("SELECT COUNT(*) FROM viv__sales_report__summary");
        assert_eq!(count, Ok(Some(3)), "WHERE clause must not be part of the view");

        let invoker = Spi::get_one::<bool>(
            "SELECT 'security_invoker=true' = ANY(reloptions) FROM pg_class \
             WHERE relname = 'viv__sales_report__summary'",
        );
        assert_eq!(invoker, Ok(Some(true)));
    }

    #[pg_test]
    fn test_materialize_twice_replaces() {
        setup_orders();
        Spi::run("SELECT pg_viv_materialize('sales_report', 'summary')").unwrap();
        Spi::run("SELECT pg_viv_materialize('sales_report', 'summary')").unwrap();

        let views = Spi::get_one::<i64>(
            "SELECT COUNT(*) FROM pg_class WHERE relname = 'viv__sales_report__summary' AND relkind = 'v'",
        );
        assert_eq!(views, Ok(Some(1)));
    }

    #[pg_test]
    fn test_columns_and_preview() {
        setup_orders();
        Spi::run("SELECT pg_viv_materialize('sales_report', 'summary')").unwrap();

        let columns = Spi::get_one::<pgrx::JsonB>("SELECT pg_viv_columns('viv__sales_report__summary')")
            .unwrap()
            .unwrap();
        assert_eq!(columns.0[0]["column_name"], "id");
        assert_eq!(columns.0[1]["column_name"], "total");

        let rows = Spi::get_one::<pgrx::JsonB>("SELECT pg_viv_preview('viv__sales_report__summary', 2)")
            .unwrap()
            .unwrap();
        assert_eq!(rows.0.as_array().map(Vec::len), Some(2));
    }

    #[pg_test]
    fn test_rename_and_drop() {
        setup_orders();
        Spi::run("SELECT pg_viv_materialize('sales_report', 'summary')").unwrap();
        Spi::run("SELECT pg_viv_rename('viv__sales_report__summary', 'sales_latest')").unwrap();

        let statement = Spi::get_one::<String>("SELECT pg_viv_show_create('sales_latest')")
            .unwrap()
            .unwrap();
        assert!(statement.starts_with("CREATE VIEW sales_latest AS"));

        Spi::run("SELECT pg_viv_drop('sales_latest')").unwrap();
        Spi::run("SELECT pg_viv_drop('sales_latest')").unwrap();
    }

    #[pg_test]
    fn test_rewrite_function() {
        let sql = Spi::get_one::<String>(
            r#"SELECT pg_viv_rewrite('SELECT "a" FROM "t" GROUP BY "a" HAVING COUNT(*) > $1 LIMIT 5', '{"$1": 2}')"#,
        );
        assert_eq!(sql, Ok(Some(r#"SELECT "a" FROM "t" GROUP BY "a" HAVING COUNT(*) > 2"#.to_string())));
    }

    #[pg_test]
    #[should_panic(expected = "already exists")]
    fn test_rename_conflict_raises_server_error() {
        setup_orders();
        Spi::run("SELECT pg_viv_materialize('sales_report', 'summary')").unwrap();
        Spi::run("CREATE VIEW sales_latest AS SELECT 1 AS x").unwrap();
        Spi::run("SELECT pg_viv_rename('viv__sales_report__summary', 'sales_latest')").unwrap();
    }

    #[pg_test]
    #[should_panic(expected = "42602")]
    fn test_preview_rejects_injection() {
        Spi::run("SELECT pg_viv_preview('1;DROP TABLE users', 10)").unwrap();
    }

    #[pg_test]
    #[should_panic(expected = "P0003")]
    fn test_unknown_variant() {
        setup_orders();
        Spi::run("SELECT pg_viv_materialize('sales_report', 'missing')").unwrap();
    }
}
