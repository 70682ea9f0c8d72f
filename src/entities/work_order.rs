//! Work order rows - headers, routing operations and material requirements

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::identity::WorkOrderKey;

use super::bom::UNKNOWN_DESCRIPTION;

/// `(MM/DD/YYYY) - (MM/DD/YYYY)`, with `0` standing in for a missing date
pub fn format_date_range(start: Option<NaiveDate>, finish: Option<NaiveDate>) -> String {
    let side = |d: Option<NaiveDate>| {
        d.map(|d| d.format("(%m/%d/%Y)").to_string())
            .unwrap_or_else(|| "0".to_string())
    };
    format!("{} - {}", side(start), side(finish))
}

/// `[C]` for closed, otherwise the bracketed first letter of the status
pub fn format_status(status: Option<&str>) -> String {
    match status.map(str::trim) {
        Some(s) if s.eq_ignore_ascii_case("closed") => "[C]".to_string(),
        Some(s) if !s.is_empty() => {
            let first = s.chars().next().map(|c| c.to_ascii_uppercase()).unwrap_or('?');
            format!("[{}]", first)
        }
        _ => "[?]".to_string(),
    }
}

/// Quantities are always shown with four decimals
pub fn format_qty(qty: Decimal) -> String {
    format!("{:.4}", qty)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Work order header, root of a work-order hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderSummary {
    pub key: WorkOrderKey,

    #[serde(default)]
    pub part_id: Option<String>,

    #[serde(default)]
    pub part_description: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    /// Desired quantity to produce
    pub order_qty: Decimal,

    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub sched_finish_date: Option<NaiveDate>,

    #[serde(default)]
    pub desired_want_date: Option<NaiveDate>,

    #[serde(default)]
    pub create_date: Option<NaiveDateTime>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl WorkOrderSummary {
    pub fn formatted_id(&self) -> String {
        self.key.formatted_id()
    }

    pub fn formatted_status(&self) -> String {
        format_status(self.status.as_deref())
    }

    pub fn formatted_qty(&self) -> String {
        format_qty(self.order_qty)
    }

    /// Quantity followed by header notes when present
    pub fn formatted_qty_with_notes(&self) -> String {
        match non_empty(self.notes.as_deref()) {
            Some(notes) => format!("{} - {}", self.formatted_qty(), notes),
            None => self.formatted_qty(),
        }
    }

    pub fn formatted_dates(&self) -> String {
        format_date_range(self.start_date, self.sched_finish_date)
    }

    pub fn description(&self) -> String {
        non_empty(self.part_description.as_deref())
            .or_else(|| non_empty(self.part_id.as_deref()))
            .unwrap_or(UNKNOWN_DESCRIPTION)
            .to_string()
    }

    /// `[O] 8113/26 - 1.0000 - GEARBOX`
    pub fn formatted_display(&self) -> String {
        format!(
            "{} {} - {} - {}",
            self.formatted_status(),
            self.formatted_id(),
            self.formatted_qty(),
            self.description()
        )
    }
}

/// Routing step of a work order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRow {
    /// Work order owning the operation
    pub work_order: WorkOrderKey,

    pub sequence: i32,

    #[serde(default)]
    pub operation_type: Option<String>,

    #[serde(default)]
    pub resource_id: Option<String>,

    #[serde(default)]
    pub setup_hrs: Decimal,

    #[serde(default)]
    pub run_hrs: Decimal,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub requirement_count: u32,

    /// Piece number of the parent requirement, set when this operation was
    /// reached through a requirement's subordinate work order
    #[serde(default)]
    pub via_piece_no: Option<i32>,
}

impl OperationRow {
    pub fn formatted_sequence(&self) -> String {
        format!("[{}]", self.sequence)
    }

    /// `[10] - GEAR CUTTING`, falling back to the resource id
    pub fn formatted_description(&self) -> String {
        let text = non_empty(self.operation_type.as_deref())
            .or_else(|| non_empty(self.resource_id.as_deref()))
            .unwrap_or(UNKNOWN_DESCRIPTION);
        format!("{} - {}", self.formatted_sequence(), text)
    }

    pub fn formatted_hours(&self) -> String {
        format!(
            "Setup: {:.2} Hrs, Run: {:.2} Hrs/unit",
            self.setup_hrs, self.run_hrs
        )
    }
}

/// Material requirement of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementRow {
    /// Work order owning the requirement
    pub work_order: WorkOrderKey,

    pub operation_seq: i32,

    #[serde(default)]
    pub piece_no: Option<i32>,

    #[serde(default)]
    pub part_id: Option<String>,

    #[serde(default)]
    pub part_description: Option<String>,

    #[serde(default)]
    pub unit_of_measure: Option<String>,

    #[serde(default)]
    pub qty_per: Decimal,

    /// Sub id of the work order that fulfils this requirement, if any
    #[serde(default)]
    pub subord_wo_sub_id: Option<String>,

    #[serde(default)]
    pub subord_wo_status: Option<String>,

    #[serde(default)]
    pub subord_wo_qty: Decimal,

    #[serde(default)]
    pub subord_wo_start_date: Option<NaiveDate>,

    #[serde(default)]
    pub subord_wo_finish_date: Option<NaiveDate>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl RequirementRow {
    pub fn part_id(&self) -> &str {
        self.part_id.as_deref().map(str::trim).unwrap_or("")
    }

    /// Subordinate sub id, if non-empty
    pub fn subordinate_sub_id(&self) -> Option<&str> {
        non_empty(self.subord_wo_sub_id.as_deref())
    }

    pub fn has_child_work_order(&self) -> bool {
        self.subordinate_sub_id().is_some()
    }

    /// Key of the fulfilling work order
    pub fn subordinate_key(&self) -> Option<WorkOrderKey> {
        self.subordinate_sub_id()
            .map(|sub| self.work_order.with_sub(sub))
    }

    /// `M28803 - TOP BEARING COVER`
    pub fn formatted_part(&self) -> String {
        let part = if self.part_id().is_empty() {
            UNKNOWN_DESCRIPTION
        } else {
            self.part_id()
        };
        let desc = non_empty(self.part_description.as_deref()).unwrap_or("Unknown");
        format!("{} - {}", part, desc)
    }

    /// Requirement quantity, or the sub-work-order's desired quantity, with
    /// notes appended
    pub fn formatted_qty(&self) -> String {
        let qty = if self.has_child_work_order() {
            format_qty(self.subord_wo_qty)
        } else {
            format_qty(self.qty_per)
        };
        match non_empty(self.notes.as_deref()) {
            Some(notes) => format!("{} - {}", qty, notes),
            None => qty,
        }
    }

    /// Plain requirement: `PART - DESC - QTY`.
    /// Sub-work-order: `[S] BASE-SUB/LOT - PART - DESC` (part omitted when
    /// the row carries none).
    pub fn formatted_display(&self) -> String {
        match self.subordinate_key() {
            Some(key) => {
                let status = format_status(self.subord_wo_status.as_deref());
                if self.part_id().is_empty() {
                    format!("{} {}", status, key.formatted_id())
                } else {
                    format!("{} {} - {}", status, key.formatted_id(), self.formatted_part())
                }
            }
            None => format!("{} - {}", self.formatted_part(), self.formatted_qty()),
        }
    }

    pub fn formatted_dates(&self) -> String {
        format_date_range(self.subord_wo_start_date, self.subord_wo_finish_date)
    }
}
