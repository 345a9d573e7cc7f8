//! SPI-backed collaborators for running the engine inside PostgreSQL
//!
//! Statement errors raised by the server abort the surrounding transaction,
//! so a failed materialization never leaves a dropped-but-not-recreated
//! view behind. Those errors propagate as the server's own ERROR (with its
//! SQLSTATE) and never come back as a [`BackendFailure`], so the engine's
//! `NameConflict`/`ViewNotFound` mapping does not apply on this surface.
//!
//! No `tracing` subscriber is installed in a backend process; client-facing
//! messages go through pgrx `info!`/`warning!` in [`super`].

use pgrx::prelude::*;
use pgrx::{PgBuiltInOids, PgOid};
use serde_json::Value;

use crate::backend::{BackendFailure, Database, Row};
use crate::cache::DiscoveryCache;
use crate::dialect::Dialect;
use crate::error::{VivError, VivResult};

/// Channel notified after every successful DDL
pub const DISCOVERY_CHANNEL: &str = "pg_viv_discovery";

#[derive(Debug, Clone, Copy, Default)]
pub struct SpiDatabase;

impl Database for SpiDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    /// Only pgrx-level failures return `Err`, without a SQLSTATE
    fn execute(&self, sql: &str) -> Result<(), BackendFailure> {
        Spi::run(sql).map_err(|e| BackendFailure::new(e.to_string()))
    }

    /// Rows come back through `row_to_json` so column order and JSON typing
    /// are decided by the server
    fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, BackendFailure> {
        let wrapped = format!("SELECT row_to_json(q)::text FROM ({sql}) q");
        let args: Vec<(PgOid, Option<pg_sys::Datum>)> = params
            .iter()
            .map(|p| (PgOid::BuiltIn(PgBuiltInOids::TEXTOID), p.as_str().into_datum()))
            .collect();

        let texts = Spi::connect(|client| {
            let table = client.select(&wrapped, None, Some(args))?;
            let mut texts = Vec::new();
            for row in table {
                if let Some(text) = row.get::<String>(1)? {
                    texts.push(text);
                }
            }
            Ok::<_, pgrx::spi::Error>(texts)
        })
        .map_err(|e| BackendFailure::new(e.to_string()))?;

        texts
            .iter()
            .map(|text| match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
                Ok(other) => Err(BackendFailure::new(format!("expected a row object, got {other}"))),
                Err(e) => Err(BackendFailure::new(e.to_string())),
            })
            .collect()
    }
}

/// Discovery invalidation through `NOTIFY pg_viv_discovery`
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyDiscoveryCache;

impl DiscoveryCache for NotifyDiscoveryCache {
    fn invalidate_all(&self) -> VivResult<()> {
        let sql = format!("NOTIFY {DISCOVERY_CHANNEL}");
        Spi::run(&sql).map_err(|e| VivError::BackendError {
            query: sql,
            error: e.to_string(),
        })
    }
}
