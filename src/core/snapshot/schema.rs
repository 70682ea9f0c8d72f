//! Snapshot schema initialization

use rusqlite::{params, OptionalExtension};

use super::{SqliteExecutor, SCHEMA_VERSION};
use crate::core::executor::QueryError;

impl SqliteExecutor {
    /// Create the snapshot tables if they are missing
    pub(super) fn init_schema(&self) -> Result<(), QueryError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS customer (
                id TEXT PRIMARY KEY,
                name TEXT
            );

            -- Customer orders; the order id is the job number
            CREATE TABLE IF NOT EXISTS customer_order (
                id TEXT PRIMARY KEY,
                customer_id TEXT,
                order_date TEXT
            );

            CREATE TABLE IF NOT EXISTS part (
                id TEXT PRIMARY KEY,
                description TEXT,
                fabricated TEXT,
                purchased TEXT,
                stock_um TEXT
            );

            -- Work orders. For a job, base_id is the job number and lot "00"
            -- holds the top-level assemblies; base_lot_id links a lot to the
            -- assembly lot it belongs to.
            CREATE TABLE IF NOT EXISTS work_order (
                base_id TEXT NOT NULL,
                lot_id TEXT NOT NULL,
                sub_id TEXT NOT NULL DEFAULT '0',
                base_lot_id TEXT,
                part_id TEXT,
                status TEXT,
                desired_qty TEXT,
                sched_start_date TEXT,
                sched_finish_date TEXT,
                desired_want_date TEXT,
                create_date TEXT,
                notes TEXT,
                PRIMARY KEY (base_id, lot_id, sub_id)
            );
            CREATE INDEX IF NOT EXISTS idx_work_order_base_lot
                ON work_order(base_id, base_lot_id);

            CREATE TABLE IF NOT EXISTS operation (
                workorder_base_id TEXT NOT NULL,
                workorder_lot_id TEXT NOT NULL,
                workorder_sub_id TEXT NOT NULL,
                sequence_no INTEGER NOT NULL,
                operation_type TEXT,
                resource_id TEXT,
                setup_hrs TEXT,
                run_hrs TEXT,
                status TEXT,
                notes TEXT,
                PRIMARY KEY (workorder_base_id, workorder_lot_id, workorder_sub_id, sequence_no)
            );

            -- Material requirements. subord_wo_sub_id names the sub work order
            -- (same base and lot) that produces the required part.
            CREATE TABLE IF NOT EXISTS requirement (
                workorder_base_id TEXT NOT NULL,
                workorder_lot_id TEXT NOT NULL,
                workorder_sub_id TEXT NOT NULL,
                operation_seq_no INTEGER NOT NULL,
                piece_no INTEGER,
                part_id TEXT,
                qty_per TEXT,
                subord_wo_sub_id TEXT,
                notes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_requirement_wo
                ON requirement(workorder_base_id, workorder_lot_id, workorder_sub_id, operation_seq_no);
            "#,
        )?;

        let existing: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        if existing.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }

    /// Reject snapshots written with a different layout
    pub(super) fn check_version(&self) -> Result<(), QueryError> {
        let conn = self.conn()?;
        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        match version {
            Some(SCHEMA_VERSION) => Ok(()),
            Some(other) => Err(QueryError::Failed {
                message: format!(
                    "snapshot schema version {} is not supported (expected {})",
                    other, SCHEMA_VERSION
                ),
            }),
            None => Err(QueryError::Failed {
                message: "snapshot has no schema version".to_string(),
            }),
        }
    }
}
