//! Preview/Inspection Facade
//!
//! Samples rows from a materialized view. The column set comes from the
//! catalog once per call and every returned row is keyed by it, in
//! ordinal order.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::backend::Database;
use crate::config::{VivConfig, DEFAULT_PREVIEW_LIMIT};
use crate::ddl::introspect::{columns, show_create_statement};
use crate::ddl::{run_catalog, ColumnInfo};
use crate::dialect::CatalogQuery;
use crate::error::{VivError, VivResult};
use crate::naming::ViewName;

/// One sampled row as ordered `(column, value)` pairs
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow(Vec<(String, Value)>);

impl PreviewRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.0
    }
}

/// Serializes as a JSON object in column order
impl Serialize for PreviewRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

pub struct ViewInspector<D> {
    db: D,
    max_preview_limit: u32,
}

impl<D: Database> ViewInspector<D> {
    pub fn new(db: D, config: &VivConfig) -> Self {
        Self {
            db,
            max_preview_limit: config.max_preview_limit,
        }
    }

    pub fn columns(&self, name: &str) -> VivResult<Vec<ColumnInfo>> {
        columns(&self.db, &ViewName::parse(name)?)
    }

    pub fn show_create_statement(&self, name: &str) -> VivResult<String> {
        show_create_statement(&self.db, &ViewName::parse(name)?)
    }

    /// Up to `limit` rows (clamped to the configured maximum)
    ///
    /// The name is validated before any statement is issued; `limit == 0`
    /// returns nothing without querying.
    pub fn preview_rows(&self, name: &str, limit: u32) -> VivResult<Vec<PreviewRow>> {
        let name = ViewName::parse(name)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = limit.min(self.max_preview_limit);

        let column_names: Vec<String> = columns(&self.db, &name)?
            .into_iter()
            .map(|c| c.column_name)
            .collect();

        let sql = self.db.dialect().preview(&name, &column_names, limit);
        let rows = run_catalog(
            &self.db,
            &CatalogQuery {
                sql: sql.clone(),
                params: Vec::new(),
            },
        )?;
        debug!(view = %name, rows = rows.len(), limit, "previewed view");

        rows.into_iter()
            .map(|row| {
                if row.len() != column_names.len() {
                    return Err(VivError::BackendError {
                        query: sql.clone(),
                        error: format!(
                            "row has {} columns, catalog lists {}",
                            row.len(),
                            column_names.len()
                        ),
                    });
                }
                Ok(PreviewRow(
                    column_names
                        .iter()
                        .cloned()
                        .zip(row.into_iter().map(|(_, value)| value))
                        .collect(),
                ))
            })
            .collect()
    }

    /// [`preview_rows`](Self::preview_rows) with the default sample size
    pub fn preview(&self, name: &str) -> VivResult<Vec<PreviewRow>> {
        self.preview_rows(name, DEFAULT_PREVIEW_LIMIT)
    }
}
