//! Typed rows returned by the query layer
//!
//! **Bill of materials:**
//! - [`JobSummary`] - customer order header, root of a BOM
//! - [`BomRow`] - one lot/sub work-order line of a job
//!
//! **Work orders:**
//! - [`WorkOrderSummary`] - work order header, root of a routing hierarchy
//! - [`OperationRow`] - routing step
//! - [`RequirementRow`] - material requirement, possibly fulfilled by a
//!   subordinate work order

pub mod bom;
pub mod work_order;

use serde::{Deserialize, Serialize};

pub use bom::{BomRow, JobSummary};
pub use work_order::{OperationRow, RequirementRow, WorkOrderSummary};

use crate::core::identity::RootKey;

/// Result row of a root search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum RootSummary {
    Job(JobSummary),
    WorkOrder(WorkOrderSummary),
}

impl RootSummary {
    pub fn root_key(&self) -> RootKey {
        match self {
            RootSummary::Job(job) => RootKey::Job {
                job_number: job.job_number.clone(),
            },
            RootSummary::WorkOrder(wo) => RootKey::WorkOrder(wo.key.clone()),
        }
    }

    pub fn formatted_display(&self) -> String {
        match self {
            RootSummary::Job(job) => job.formatted_display(),
            RootSummary::WorkOrder(wo) => wo.formatted_display(),
        }
    }
}

/// One child row; the variant is fixed by the level that was queried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum ChildRow {
    Bom(BomRow),
    Operation(OperationRow),
    Requirement(RequirementRow),
}

impl ChildRow {
    pub fn row_name(&self) -> &'static str {
        match self {
            ChildRow::Bom(_) => "bom",
            ChildRow::Operation(_) => "operation",
            ChildRow::Requirement(_) => "requirement",
        }
    }
}
