//! Catalog introspection of materialized views
//!
//! Both lookups are parameterized on the view name and fail with
//! `ViewNotFound` rather than returning an empty result.

use serde::{Deserialize, Serialize};

use crate::backend::{row_text, Database};
use crate::cache::DiscoveryCache;
use crate::clock::Clock;
use crate::error::{VivError, VivResult};
use crate::internal_error;
use crate::naming::ViewName;
use crate::render::QueryRenderer;

use super::{run_catalog, ViewManager};

/// One column of a view, in ordinal order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// Canonical CREATE statement as reported by the backend
pub fn show_create_statement<D: Database + ?Sized>(db: &D, name: &ViewName) -> VivResult<String> {
    let dialect = db.dialect();
    let query = dialect.show_create(name);

    let rows = match db.query(&query.sql, &query.params) {
        Ok(rows) => rows,
        Err(failure)
            if failure
                .sqlstate
                .as_deref()
                .is_some_and(|s| dialect.is_undefined_object(s)) =>
        {
            return Err(VivError::ViewNotFound {
                name: name.to_string(),
            });
        }
        Err(failure) => return Err(super::backend_error(&query.sql, failure)),
    };

    rows.first()
        .and_then(|row| row_text(row, "Create View"))
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .ok_or_else(|| VivError::ViewNotFound {
            name: name.to_string(),
        })
}

/// Column metadata from `information_schema.columns`
pub fn columns<D: Database + ?Sized>(db: &D, name: &ViewName) -> VivResult<Vec<ColumnInfo>> {
    let rows = run_catalog(db, &db.dialect().columns(name))?;
    if rows.is_empty() {
        return Err(VivError::ViewNotFound {
            name: name.to_string(),
        });
    }

    rows.iter()
        .map(|row| {
            let field = |column: &str| {
                row_text(row, column)
                    .map(str::to_string)
                    .ok_or_else(|| internal_error!("catalog row for '{}' has no text column {}", name, column))
            };
            Ok(ColumnInfo {
                column_name: field("column_name")?,
                data_type: field("data_type")?,
                is_nullable: field("is_nullable")?.eq_ignore_ascii_case("YES"),
            })
        })
        .collect()
}

impl<D, R, C, K> ViewManager<D, R, C, K>
where
    D: Database,
    R: QueryRenderer,
    C: DiscoveryCache,
    K: Clock,
{
    pub fn show_create_statement(&self, name: &str) -> VivResult<String> {
        show_create_statement(&self.db, &ViewName::parse(name)?)
    }

    pub fn columns(&self, name: &str) -> VivResult<Vec<ColumnInfo>> {
        columns(&self.db, &ViewName::parse(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::error::testing::assert_error_sqlstate;
    use crate::testing::FakeDatabase;

    fn orders_db(dialect: Dialect) -> FakeDatabase {
        FakeDatabase::new(dialect).with_view(
            "viv__orders__all",
            &[("id", "int", false), ("total", "decimal", true)],
            Vec::new(),
        )
    }

    fn name(s: &str) -> ViewName {
        ViewName::parse(s).unwrap()
    }

    #[test]
    fn test_columns_in_catalog_order() {
        let db = orders_db(Dialect::MySql);
        let cols = columns(&db, &name("viv__orders__all")).unwrap();
        assert_eq!(
            cols,
            vec![
                ColumnInfo {
                    column_name: "id".to_string(),
                    data_type: "int".to_string(),
                    is_nullable: false,
                },
                ColumnInfo {
                    column_name: "total".to_string(),
                    data_type: "decimal".to_string(),
                    is_nullable: true,
                },
            ]
        );
        assert_eq!(db.statements().len(), 1);
    }

    #[test]
    fn test_missing_view_is_not_found() {
        for dialect in [Dialect::MySql, Dialect::Postgres] {
            let db = FakeDatabase::new(dialect);
            assert_error_sqlstate(columns(&db, &name("ghost")), "42P01");
            assert_error_sqlstate(show_create_statement(&db, &name("ghost")), "42P01");
        }
    }

    #[test]
    fn test_show_create_statement() {
        let db = orders_db(Dialect::Postgres);
        let statement = show_create_statement(&db, &name("viv__orders__all")).unwrap();
        assert!(statement.starts_with("CREATE VIEW viv__orders__all"));
    }
}
