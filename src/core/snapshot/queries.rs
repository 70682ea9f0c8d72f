//! Snapshot queries, one per root search and child level

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{date_at, datetime_at, decimal_at, flag_at, text_at};
use crate::core::executor::QueryError;
use crate::core::identity::{WorkOrderKey, TOP_LEVEL_LOT};
use crate::entities::{BomRow, JobSummary, OperationRow, RequirementRow, WorkOrderSummary};

const JOB_COLUMNS: &str = r#"
    SELECT co.id, co.customer_id, c.name,
           (SELECT COUNT(*) FROM work_order wo
             WHERE wo.base_id = co.id AND wo.lot_id = ?1) AS assembly_count
    FROM customer_order co
    LEFT JOIN customer c ON c.id = co.customer_id
"#;

const WORK_ORDER_COLUMNS: &str = r#"
    SELECT wo.base_id, wo.lot_id, wo.sub_id, wo.part_id, p.description, wo.status,
           wo.desired_qty, wo.sched_start_date, wo.sched_finish_date,
           wo.desired_want_date, wo.create_date, wo.notes
    FROM work_order wo
    LEFT JOIN part p ON p.id = wo.part_id
"#;

/// BOM rows with the "has children" flag computed from base lot references
const BOM_COLUMNS: &str = r#"
    SELECT wo.base_id, wo.lot_id, wo.sub_id, wo.base_lot_id, wo.part_id,
           p.description, p.fabricated, p.purchased,
           EXISTS (SELECT 1 FROM work_order c
                    WHERE c.base_id = wo.base_id AND c.base_lot_id = wo.lot_id) AS has_children
    FROM work_order wo
    LEFT JOIN part p ON p.id = wo.part_id
"#;

/// Requirements joined with their part and their subordinate work order
const REQUIREMENT_COLUMNS: &str = r#"
    SELECT r.operation_seq_no, r.piece_no, r.part_id, p.description, p.stock_um,
           r.qty_per, r.subord_wo_sub_id, sw.status, sw.desired_qty,
           sw.sched_start_date, sw.sched_finish_date, r.notes
    FROM requirement r
    LEFT JOIN part p ON p.id = r.part_id
    LEFT JOIN work_order sw
           ON sw.base_id = r.workorder_base_id
          AND sw.lot_id = r.workorder_lot_id
          AND sw.sub_id = r.subord_wo_sub_id
    WHERE r.workorder_base_id = ?1
      AND r.workorder_lot_id = ?2
      AND r.workorder_sub_id = ?3
"#;

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobSummary> {
    Ok(JobSummary {
        job_number: text_at(row, 0)?.unwrap_or_default(),
        customer_id: text_at(row, 1)?,
        customer_name: text_at(row, 2)?,
        assembly_count: row.get::<_, i64>(3)?.max(0) as u32,
    })
}

fn work_order_from_row(row: &Row<'_>) -> rusqlite::Result<WorkOrderSummary> {
    Ok(WorkOrderSummary {
        key: WorkOrderKey::new(
            &text_at(row, 0)?.unwrap_or_default(),
            &text_at(row, 1)?.unwrap_or_default(),
            &text_at(row, 2)?.unwrap_or_default(),
        ),
        part_id: text_at(row, 3)?,
        part_description: text_at(row, 4)?,
        status: text_at(row, 5)?,
        order_qty: decimal_at(row, 6)?,
        start_date: date_at(row, 7)?,
        sched_finish_date: date_at(row, 8)?,
        desired_want_date: date_at(row, 9)?,
        create_date: datetime_at(row, 10)?,
        notes: text_at(row, 11)?,
    })
}

fn bom_from_row(row: &Row<'_>) -> rusqlite::Result<BomRow> {
    Ok(BomRow {
        job_number: text_at(row, 0)?.unwrap_or_default(),
        lot_id: text_at(row, 1)?,
        sub_id: text_at(row, 2)?,
        base_lot_id: text_at(row, 3)?,
        part_id: text_at(row, 4)?,
        part_description: text_at(row, 5)?,
        fabricated: flag_at(row, 6)?,
        purchased: flag_at(row, 7)?,
        has_children: flag_at(row, 8)?,
    })
}

fn requirement_from_row(work_order: &WorkOrderKey, row: &Row<'_>) -> rusqlite::Result<RequirementRow> {
    Ok(RequirementRow {
        work_order: work_order.clone(),
        operation_seq: row.get(0)?,
        piece_no: row.get(1)?,
        part_id: text_at(row, 2)?,
        part_description: text_at(row, 3)?,
        unit_of_measure: text_at(row, 4)?,
        qty_per: decimal_at(row, 5)?,
        subord_wo_sub_id: text_at(row, 6)?,
        subord_wo_status: text_at(row, 7)?,
        subord_wo_qty: decimal_at(row, 8)?,
        subord_wo_start_date: date_at(row, 9)?,
        subord_wo_finish_date: date_at(row, 10)?,
        notes: text_at(row, 11)?,
    })
}

/// Jobs whose number matches a `LIKE` pattern
pub(super) fn search_jobs(
    conn: &Connection,
    pattern: &str,
    limit: usize,
) -> Result<Vec<JobSummary>, QueryError> {
    let sql = format!("{} WHERE co.id LIKE ?2 ORDER BY co.id LIMIT ?3", JOB_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![TOP_LEVEL_LOT, pattern, limit as i64], job_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(super) fn job_summary(conn: &Connection, job_number: &str) -> Result<Option<JobSummary>, QueryError> {
    let sql = format!("{} WHERE co.id = ?2", JOB_COLUMNS);
    Ok(conn
        .query_row(&sql, params![TOP_LEVEL_LOT, job_number], job_from_row)
        .optional()?)
}

/// Main work orders (sub id "0") whose base id matches, newest first
pub(super) fn search_work_orders(
    conn: &Connection,
    pattern: &str,
    limit: usize,
) -> Result<Vec<WorkOrderSummary>, QueryError> {
    let sql = format!(
        "{} WHERE wo.base_id LIKE ?1 AND wo.sub_id = '0' ORDER BY wo.create_date DESC LIMIT ?2",
        WORK_ORDER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![pattern, limit as i64], work_order_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(super) fn work_order_summary(
    conn: &Connection,
    key: &WorkOrderKey,
) -> Result<Option<WorkOrderSummary>, QueryError> {
    let sql = format!(
        "{} WHERE wo.base_id = ?1 AND wo.lot_id = ?2 AND wo.sub_id = ?3",
        WORK_ORDER_COLUMNS
    );
    Ok(conn
        .query_row(
            &sql,
            params![key.base_id, key.lot_id, key.sub_id],
            work_order_from_row,
        )
        .optional()?)
}

/// Top-level assemblies of a job, by sub id
pub(super) fn assemblies_of_job(conn: &Connection, job_number: &str) -> Result<Vec<BomRow>, QueryError> {
    let sql = format!(
        "{} WHERE wo.base_id = ?1 AND wo.lot_id = ?2 ORDER BY wo.sub_id",
        BOM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![job_number, TOP_LEVEL_LOT], bom_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Lots whose base lot is `lot_id`, by sub id
pub(super) fn parts_of_assembly(
    conn: &Connection,
    job_number: &str,
    lot_id: &str,
) -> Result<Vec<BomRow>, QueryError> {
    let sql = format!(
        "{} WHERE wo.base_id = ?1 AND wo.base_lot_id = ?2 ORDER BY wo.sub_id",
        BOM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![job_number, lot_id], bom_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(super) fn operations_of_work_order(
    conn: &Connection,
    key: &WorkOrderKey,
) -> Result<Vec<OperationRow>, QueryError> {
    let mut stmt = conn.prepare(
        r#"SELECT op.sequence_no, op.operation_type, op.resource_id, op.setup_hrs,
                  op.run_hrs, op.status, op.notes,
                  (SELECT COUNT(*) FROM requirement r
                    WHERE r.workorder_base_id = op.workorder_base_id
                      AND r.workorder_lot_id = op.workorder_lot_id
                      AND r.workorder_sub_id = op.workorder_sub_id
                      AND r.operation_seq_no = op.sequence_no) AS requirement_count
           FROM operation op
           WHERE op.workorder_base_id = ?1
             AND op.workorder_lot_id = ?2
             AND op.workorder_sub_id = ?3
           ORDER BY op.sequence_no"#,
    )?;
    let rows = stmt
        .query_map(params![key.base_id, key.lot_id, key.sub_id], |row| {
            Ok(OperationRow {
                work_order: key.clone(),
                sequence: row.get(0)?,
                operation_type: text_at(row, 1)?,
                resource_id: text_at(row, 2)?,
                setup_hrs: decimal_at(row, 3)?,
                run_hrs: decimal_at(row, 4)?,
                status: text_at(row, 5)?,
                notes: text_at(row, 6)?,
                requirement_count: row.get::<_, i64>(7)?.max(0) as u32,
                via_piece_no: None,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every requirement of a work order, by operation, piece and part
pub(super) fn requirements_of_work_order(
    conn: &Connection,
    key: &WorkOrderKey,
) -> Result<Vec<RequirementRow>, QueryError> {
    let sql = format!(
        "{} ORDER BY r.operation_seq_no, r.piece_no, r.part_id",
        REQUIREMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![key.base_id, key.lot_id, key.sub_id], |row| {
            requirement_from_row(key, row)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(super) fn requirements_of_operation(
    conn: &Connection,
    key: &WorkOrderKey,
    sequence: i32,
) -> Result<Vec<RequirementRow>, QueryError> {
    let sql = format!(
        "{} AND r.operation_seq_no = ?4 ORDER BY r.operation_seq_no, r.part_id",
        REQUIREMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![key.base_id, key.lot_id, key.sub_id, sequence],
            |row| requirement_from_row(key, row),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Operations of the sub work orders referenced by one operation's
/// requirements, by requirement piece number then operation sequence
pub(super) fn child_operations_of_operation(
    conn: &Connection,
    key: &WorkOrderKey,
    sequence: i32,
) -> Result<Vec<OperationRow>, QueryError> {
    let mut stmt = conn.prepare(
        r#"SELECT r.piece_no, op.workorder_sub_id, op.sequence_no, op.operation_type,
                  op.resource_id, op.setup_hrs, op.run_hrs, op.status, op.notes,
                  (SELECT COUNT(*) FROM requirement r2
                    WHERE r2.workorder_base_id = op.workorder_base_id
                      AND r2.workorder_lot_id = op.workorder_lot_id
                      AND r2.workorder_sub_id = op.workorder_sub_id
                      AND r2.operation_seq_no = op.sequence_no) AS requirement_count
           FROM requirement r
           JOIN operation op
             ON op.workorder_base_id = r.workorder_base_id
            AND op.workorder_lot_id = r.workorder_lot_id
            AND op.workorder_sub_id = r.subord_wo_sub_id
           WHERE r.workorder_base_id = ?1
             AND r.workorder_lot_id = ?2
             AND r.workorder_sub_id = ?3
             AND r.operation_seq_no = ?4
             AND TRIM(COALESCE(r.subord_wo_sub_id, '')) <> ''
           ORDER BY r.piece_no, op.sequence_no"#,
    )?;
    let rows = stmt
        .query_map(
            params![key.base_id, key.lot_id, key.sub_id, sequence],
            |row| {
                let piece: Option<i32> = row.get(0)?;
                let sub_id = text_at(row, 1)?.unwrap_or_default();
                Ok(OperationRow {
                    work_order: key.with_sub(&sub_id),
                    sequence: row.get(2)?,
                    operation_type: text_at(row, 3)?,
                    resource_id: text_at(row, 4)?,
                    setup_hrs: decimal_at(row, 5)?,
                    run_hrs: decimal_at(row, 6)?,
                    status: text_at(row, 7)?,
                    notes: text_at(row, 8)?,
                    requirement_count: row.get::<_, i64>(9)?.max(0) as u32,
                    // Reached through a requirement even when it has no piece
                    via_piece_no: Some(piece.unwrap_or_default()),
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
