use pgrx::prelude::*;
use pgrx::{PgBuiltInOids, PgOid};
use serde_json::Value;

use crate::backend::row_text;
use crate::ddl::run_catalog;
use crate::dialect::CatalogQuery;
use crate::error::{VivError, VivResult};
use crate::render::{Arguments, QueryRenderer, RenderOptions, RenderedQuery};

use super::spi::SpiDatabase;

extension_sql!(
    r"
    CREATE TABLE IF NOT EXISTS pg_viv_definition (
        definition_id TEXT NOT NULL,
        variant_id TEXT NOT NULL,
        sql TEXT NOT NULL,
        arguments JSONB NOT NULL DEFAULT '{}',
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (definition_id, variant_id)
    );

    COMMENT ON TABLE pg_viv_definition IS 'Rendered queries available for materialization';
    ",
    name = "create_definition_table",
);

/// Renderer reading pre-rendered queries from `pg_viv_definition`
///
/// Rows there are stored definition-only and unpaginated.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogRenderer;

impl QueryRenderer for CatalogRenderer {
    fn render(
        &self,
        definition_id: &str,
        variant_id: &str,
        _options: &RenderOptions,
    ) -> VivResult<RenderedQuery> {
        let db = SpiDatabase;
        let rows = run_catalog(
            &db,
            &CatalogQuery {
                sql: "SELECT sql, arguments FROM pg_viv_definition \
                      WHERE definition_id = $1 AND variant_id = $2"
                    .to_string(),
                params: vec![definition_id.to_string(), variant_id.to_string()],
            },
        )?;

        let Some(row) = rows.first() else {
            let known = run_catalog(
                &db,
                &CatalogQuery {
                    sql: "SELECT 1 AS found FROM pg_viv_definition WHERE definition_id = $1 LIMIT 1"
                        .to_string(),
                    params: vec![definition_id.to_string()],
                },
            )?;
            return Err(if known.is_empty() {
                VivError::DefinitionNotFound {
                    definition_id: definition_id.to_string(),
                }
            } else {
                VivError::VariantNotFound {
                    definition_id: definition_id.to_string(),
                    variant_id: variant_id.to_string(),
                }
            });
        };

        let sql = row_text(row, "sql").unwrap_or_default().to_string();
        let arguments = row
            .iter()
            .find(|(column, _)| column == "arguments")
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null);
        let arguments: Arguments = if arguments.is_null() {
            Arguments::new()
        } else {
            serde_json::from_value(arguments)?
        };

        Ok(RenderedQuery { sql, arguments })
    }
}

/// Insert or replace a rendered query
pub fn register_definition(
    definition_id: &str,
    variant_id: &str,
    sql: &str,
    arguments: &Arguments,
) -> VivResult<()> {
    // Reject unusable rows early instead of at materialization time
    RenderedQuery {
        sql: sql.to_string(),
        arguments: arguments.clone(),
    }
    .ensure_select(definition_id, variant_id)?;

    let arguments_json = serde_json::to_string(arguments)?;
    let query = "INSERT INTO pg_viv_definition (definition_id, variant_id, sql, arguments) \
                 VALUES ($1, $2, $3, $4::jsonb) \
                 ON CONFLICT (definition_id, variant_id) \
                 DO UPDATE SET sql = EXCLUDED.sql, arguments = EXCLUDED.arguments, updated_at = NOW()";
    let args = [definition_id, variant_id, sql, arguments_json.as_str()]
        .into_iter()
        .map(|value| (PgOid::BuiltIn(PgBuiltInOids::TEXTOID), value.into_datum()))
        .collect();

    Spi::run_with_args(query, Some(args)).map_err(|e| VivError::BackendError {
        query: query.to_string(),
        error: e.to_string(),
    })
}
