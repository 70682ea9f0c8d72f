//! Query layer abstraction
//!
//! The hierarchy engine never sees SQL. It asks a [`QueryExecutor`] for root
//! summaries or for the children of one parent at one level, and gets typed
//! rows back. Implementations must be read-only.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::identity::{require_field, RootKey, ValidationError, WorkOrderKey};
use crate::entities::{ChildRow, RootSummary};

/// Which kind of root a search targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Bom,
    WorkOrder,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Bom => write!(f, "bom"),
            Domain::WorkOrder => write!(f, "work order"),
        }
    }
}

/// Shape of a child query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    /// Top-level assemblies (lot "00") of a job, by sub id
    AssembliesOfJob,
    /// Rows whose base lot is the given assembly lot, by sub id
    PartsOfAssembly,
    /// Routing of a work order, by sequence
    OperationsOfWorkOrder,
    /// Requirements of one operation, by operation sequence then part id
    RequirementsOfOperation,
    /// All requirements of a work order, by operation sequence, piece, part
    RequirementsBySubId,
    /// Operations of the child work orders referenced by one operation's
    /// requirements, by piece number then sequence
    ChildOperationsOfOperation,
}

impl LevelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelKind::AssembliesOfJob => "assemblies-of-job",
            LevelKind::PartsOfAssembly => "parts-of-assembly",
            LevelKind::OperationsOfWorkOrder => "operations-of-work-order",
            LevelKind::RequirementsOfOperation => "requirements-of-operation",
            LevelKind::RequirementsBySubId => "requirements-by-sub-id",
            LevelKind::ChildOperationsOfOperation => "child-operations-of-operation",
        }
    }

    /// Row variant every result of this level must have
    pub fn row_name(&self) -> &'static str {
        match self {
            LevelKind::AssembliesOfJob | LevelKind::PartsOfAssembly => "bom",
            LevelKind::OperationsOfWorkOrder | LevelKind::ChildOperationsOfOperation => {
                "operation"
            }
            LevelKind::RequirementsOfOperation | LevelKind::RequirementsBySubId => "requirement",
        }
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of a child query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "parent", rename_all = "snake_case")]
pub enum ParentKey {
    Job { job_number: String },
    Assembly { job_number: String, lot_id: String },
    WorkOrder(WorkOrderKey),
    Operation { work_order: WorkOrderKey, sequence: i32 },
}

impl ParentKey {
    /// Reject empty or oversized key fields
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ParentKey::Job { job_number } => {
                require_field("job number", job_number)?;
            }
            ParentKey::Assembly { job_number, lot_id } => {
                require_field("job number", job_number)?;
                require_field("lot_id", lot_id)?;
            }
            ParentKey::WorkOrder(key) => key.validate()?,
            ParentKey::Operation { work_order, .. } => work_order.validate()?,
        }
        Ok(())
    }

    /// Whether this parent can be queried at the given level
    pub fn supports(&self, level: LevelKind) -> bool {
        matches!(
            (self, level),
            (ParentKey::Job { .. }, LevelKind::AssembliesOfJob)
                | (ParentKey::Assembly { .. }, LevelKind::PartsOfAssembly)
                | (ParentKey::WorkOrder(_), LevelKind::OperationsOfWorkOrder)
                | (ParentKey::WorkOrder(_), LevelKind::RequirementsBySubId)
                | (ParentKey::Operation { .. }, LevelKind::RequirementsOfOperation)
                | (ParentKey::Operation { .. }, LevelKind::ChildOperationsOfOperation)
        )
    }
}

impl fmt::Display for ParentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentKey::Job { job_number } => write!(f, "job {}", job_number),
            ParentKey::Assembly { job_number, lot_id } => {
                write!(f, "job {} lot {}", job_number, lot_id)
            }
            ParentKey::WorkOrder(key) => write!(f, "work order {}", key),
            ParentKey::Operation {
                work_order,
                sequence,
            } => write!(f, "work order {} operation {}", work_order, sequence),
        }
    }
}

/// Failures of the query layer
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("query failed: {message}")]
    Failed { message: String },

    #[error("{level} cannot be queried for {parent}")]
    Unsupported { level: LevelKind, parent: String },

    #[error("{level} returned a {found} row, expected {expected}")]
    Shape {
        level: LevelKind,
        expected: &'static str,
        found: &'static str,
    },
}

/// Read-only query capability over the ERP store.
///
/// Implementations are shared across worker threads, so they must be
/// `Send + Sync`; connection pooling or serialization is their concern.
pub trait QueryExecutor: Send + Sync {
    /// Root summaries matching a normalized `LIKE` pattern, at most `limit`
    fn search_roots(
        &self,
        domain: Domain,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<RootSummary>, QueryError>;

    /// Summary of one root, `None` when it does not exist
    fn fetch_root(&self, root: &RootKey) -> Result<Option<RootSummary>, QueryError>;

    /// Children of `parent` at `level`, in the level's documented order
    fn fetch_children(&self, parent: &ParentKey, level: LevelKind)
        -> Result<Vec<ChildRow>, QueryError>;
}
