//! Materialization results and the persisted record shape
//!
//! The engine never stores these. A [`Materialization`] carries everything an
//! external metadata store needs, and [`MaterializedViewRecord`] is the row
//! that store keeps per view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VivResult;
use crate::internal_error;
use crate::naming::ViewName;

/// Outcome of one materialization (or of a dry run)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Materialization {
    pub name: ViewName,
    pub definition_id: String,
    pub variant_id: String,
    /// Final, literal-inlined view body
    pub sql: String,
    pub create_statement: String,
    pub materialized_at: DateTime<Utc>,
    /// A top-level WHERE clause, possibly an access predicate, was dropped
    #[serde(default)]
    pub removed_where: bool,
}

/// One row of the external view registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedViewRecord {
    pub name: ViewName,
    pub definition_id: String,
    pub variant_id: String,
    pub sql: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_refreshed: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl MaterializedViewRecord {
    pub fn new(materialization: &Materialization, created_by: Option<String>) -> Self {
        let at = materialization.materialized_at;
        Self {
            name: materialization.name.clone(),
            definition_id: materialization.definition_id.clone(),
            variant_id: materialization.variant_id.clone(),
            sql: materialization.sql.clone(),
            created_at: at,
            updated_at: at,
            last_refreshed: at,
            created_by,
        }
    }

    /// Overwrite in place after re-materializing the same pair
    pub fn refresh(&mut self, materialization: &Materialization) -> VivResult<()> {
        if materialization.definition_id != self.definition_id
            || materialization.variant_id != self.variant_id
        {
            return Err(internal_error!(
                "record {} belongs to {}:{}, not {}:{}",
                self.name,
                self.definition_id,
                self.variant_id,
                materialization.definition_id,
                materialization.variant_id
            ));
        }

        self.name = materialization.name.clone();
        self.sql = materialization.sql.clone();
        self.updated_at = materialization.materialized_at;
        self.last_refreshed = materialization.materialized_at;
        Ok(())
    }

    /// Identity changes, content does not
    pub fn rename(&mut self, new_name: ViewName, at: DateTime<Utc>) {
        self.name = new_name;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn materialization(sql: &str, hour: u32) -> Materialization {
        Materialization {
            name: crate::naming::view_name("sales_report", "summary"),
            definition_id: "sales_report".to_string(),
            variant_id: "summary".to_string(),
            sql: sql.to_string(),
            create_statement: format!("CREATE VIEW x AS {sql}"),
            materialized_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            removed_where: false,
        }
    }

    #[test]
    fn test_new_record() {
        let m = materialization("SELECT 1", 9);
        let record = MaterializedViewRecord::new(&m, Some("admin".to_string()));
        assert_eq!(record.name.as_str(), "viv__sales_report__summary");
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.created_by.as_deref(), Some("admin"));
    }

    #[test]
    fn test_refresh_keeps_creation_fields() {
        let mut record = MaterializedViewRecord::new(&materialization("SELECT 1", 9), None);
        record.refresh(&materialization("SELECT 2", 11)).unwrap();

        assert_eq!(record.sql, "SELECT 2");
        assert_eq!(record.created_at.to_rfc3339(), "2024-03-01T09:00:00+00:00");
        assert_eq!(record.last_refreshed.to_rfc3339(), "2024-03-01T11:00:00+00:00");
    }

    #[test]
    fn test_refresh_rejects_other_pair() {
        let mut record = MaterializedViewRecord::new(&materialization("SELECT 1", 9), None);
        let mut other = materialization("SELECT 2", 10);
        other.variant_id = "detail".to_string();
        assert_eq!(record.refresh(&other).unwrap_err().sqlstate(), "XX000");
    }

    #[test]
    fn test_rename_keeps_content() {
        let mut record = MaterializedViewRecord::new(&materialization("SELECT 1", 9), None);
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        record.rename(ViewName::parse("sales_latest").unwrap(), at);
        assert_eq!(record.name.as_str(), "sales_latest");
        assert_eq!(record.sql, "SELECT 1");
        assert_eq!(record.updated_at, at);
    }

    #[test]
    fn test_record_serde() {
        let record = MaterializedViewRecord::new(&materialization("SELECT 1", 9), None);
        let json = serde_json::to_string(&record).unwrap();
        let back: MaterializedViewRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
