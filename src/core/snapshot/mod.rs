//! SQLite snapshot of the ERP tables
//!
//! [`SqliteExecutor`] answers the hierarchy queries from a local SQLite file
//! holding a copy of the relevant ERP tables. It is opened read-only for
//! lookups; [`SqliteExecutor::create`] builds an empty snapshot for fixtures
//! and exports.
//!
//! Quantities may be stored as INTEGER, REAL or TEXT and are read into
//! [`Decimal`]; dates are ISO `YYYY-MM-DD` text, optionally followed by a time.

mod queries;
mod schema;

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use rust_decimal::Decimal;
use tracing::debug;

use crate::core::executor::{Domain, LevelKind, ParentKey, QueryError, QueryExecutor};
use crate::core::identity::RootKey;
use crate::entities::{ChildRow, RootSummary};

/// Snapshot layout version - older files must be re-exported
const SCHEMA_VERSION: i32 = 1;

/// Read-only query executor over a SQLite snapshot
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Open an existing snapshot read-only
    pub fn open(path: &Path) -> Result<Self, QueryError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let executor = Self {
            conn: Mutex::new(conn),
        };
        executor.check_version()?;
        debug!(path = %path.display(), "opened snapshot");
        Ok(executor)
    }

    /// Create (or reuse) a writable snapshot file with the current schema
    pub fn create(path: &Path) -> Result<Self, QueryError> {
        let conn = Connection::open(path)?;
        let executor = Self {
            conn: Mutex::new(conn),
        };
        executor.init_schema()?;
        Ok(executor)
    }

    /// Empty in-memory snapshot, for tests
    pub fn open_in_memory() -> Result<Self, QueryError> {
        let executor = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        executor.init_schema()?;
        Ok(executor)
    }

    /// Run a batch of SQL against a writable snapshot (fixture loading)
    pub fn seed(&self, sql: &str) -> Result<(), QueryError> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, QueryError> {
        self.conn.lock().map_err(|_| QueryError::Failed {
            message: "snapshot connection poisoned by a panicked query".to_string(),
        })
    }
}

impl QueryExecutor for SqliteExecutor {
    fn search_roots(
        &self,
        domain: Domain,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<RootSummary>, QueryError> {
        let conn = self.conn()?;
        match domain {
            Domain::Bom => Ok(queries::search_jobs(&conn, pattern, limit)?
                .into_iter()
                .map(RootSummary::Job)
                .collect()),
            Domain::WorkOrder => Ok(queries::search_work_orders(&conn, pattern, limit)?
                .into_iter()
                .map(RootSummary::WorkOrder)
                .collect()),
        }
    }

    fn fetch_root(&self, root: &RootKey) -> Result<Option<RootSummary>, QueryError> {
        let conn = self.conn()?;
        match root {
            RootKey::Job { job_number } => {
                Ok(queries::job_summary(&conn, job_number)?.map(RootSummary::Job))
            }
            RootKey::WorkOrder(key) => {
                Ok(queries::work_order_summary(&conn, key)?.map(RootSummary::WorkOrder))
            }
        }
    }

    fn fetch_children(
        &self,
        parent: &ParentKey,
        level: LevelKind,
    ) -> Result<Vec<ChildRow>, QueryError> {
        let conn = self.conn()?;
        let unsupported = || QueryError::Unsupported {
            level,
            parent: parent.to_string(),
        };
        let rows = match (level, parent) {
            (LevelKind::AssembliesOfJob, ParentKey::Job { job_number }) => {
                queries::assemblies_of_job(&conn, job_number)?
                    .into_iter()
                    .map(ChildRow::Bom)
                    .collect()
            }
            (LevelKind::PartsOfAssembly, ParentKey::Assembly { job_number, lot_id }) => {
                queries::parts_of_assembly(&conn, job_number, lot_id)?
                    .into_iter()
                    .map(ChildRow::Bom)
                    .collect()
            }
            (LevelKind::OperationsOfWorkOrder, ParentKey::WorkOrder(key)) => {
                queries::operations_of_work_order(&conn, key)?
                    .into_iter()
                    .map(ChildRow::Operation)
                    .collect()
            }
            (LevelKind::RequirementsBySubId, ParentKey::WorkOrder(key)) => {
                queries::requirements_of_work_order(&conn, key)?
                    .into_iter()
                    .map(ChildRow::Requirement)
                    .collect()
            }
            (
                LevelKind::RequirementsOfOperation,
                ParentKey::Operation {
                    work_order,
                    sequence,
                },
            ) => queries::requirements_of_operation(&conn, work_order, *sequence)?
                .into_iter()
                .map(ChildRow::Requirement)
                .collect(),
            (
                LevelKind::ChildOperationsOfOperation,
                ParentKey::Operation {
                    work_order,
                    sequence,
                },
            ) => queries::child_operations_of_operation(&conn, work_order, *sequence)?
                .into_iter()
                .map(ChildRow::Operation)
                .collect(),
            _ => return Err(unsupported()),
        };
        Ok(rows)
    }
}

/// Optional trimmed text column; blank values read as `None`
fn text_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    let value: Option<String> = match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    };
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Numeric column as a decimal; NULL and unparsable text read as zero
fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => Decimal::from(i),
        ValueRef::Real(f) => Decimal::try_from(f).unwrap_or_default(),
        ValueRef::Text(bytes) => Decimal::from_str(String::from_utf8_lossy(bytes).trim())
            .unwrap_or_default(),
        ValueRef::Null | ValueRef::Blob(_) => Decimal::ZERO,
    })
}

/// Date column: the leading `YYYY-MM-DD` of the stored text
fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    Ok(text_at(row, idx)?.and_then(|s| {
        s.get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }))
}

fn datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    Ok(text_at(row, idx)?.and_then(|s| {
        NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S"))
            .ok()
            .or_else(|| {
                s.get(..10)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }))
}

/// ERP flag column: `Y`/`N` text or 0/1
fn flag_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => i != 0,
        ValueRef::Text(bytes) => matches!(
            String::from_utf8_lossy(bytes).trim().to_ascii_uppercase().as_str(),
            "Y" | "1" | "TRUE"
        ),
        _ => false,
    })
}
