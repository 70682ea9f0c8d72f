//! Node classification: raw row flags to semantic kind and display category
//!
//! Everything here is pure. The "has children" flag of a BOM row is computed
//! by the query that fetched it; the classifier never walks data itself.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::{BomRow, ChildRow, OperationRow, RequirementRow};

/// Closed set of node kinds across both hierarchy domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Root of a BOM traversal
    Job,
    Assembly,
    Manufactured,
    Purchased,
    /// Root of a work-order traversal
    WorkOrderRoot,
    Operation,
    /// Consumed material (leaf)
    Requirement,
    /// Requirement fulfilled by a nested work order
    SubWorkOrder,
    /// Operation of a child work order, shown beside its parent requirement
    ChildOperation,
    /// Synthetic node standing in for a failed load
    Error,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Job => "job",
            NodeKind::Assembly => "assembly",
            NodeKind::Manufactured => "manufactured",
            NodeKind::Purchased => "purchased",
            NodeKind::WorkOrderRoot => "work_order",
            NodeKind::Operation => "operation",
            NodeKind::Requirement => "requirement",
            NodeKind::SubWorkOrder => "sub_work_order",
            NodeKind::ChildOperation => "child_operation",
            NodeKind::Error => "error",
        }
    }

    /// Fixed kind → category table
    pub fn category(&self) -> DisplayCategory {
        match self {
            NodeKind::Job | NodeKind::Assembly => DisplayCategory::Blue,
            NodeKind::Purchased => DisplayCategory::Red,
            NodeKind::Manufactured => DisplayCategory::Black,
            NodeKind::WorkOrderRoot | NodeKind::SubWorkOrder => DisplayCategory::Blue,
            NodeKind::Operation | NodeKind::ChildOperation | NodeKind::Requirement => {
                DisplayCategory::Black
            }
            NodeKind::Error => DisplayCategory::Gray,
        }
    }

    pub fn is_bom(&self) -> bool {
        matches!(
            self,
            NodeKind::Job | NodeKind::Assembly | NodeKind::Manufactured | NodeKind::Purchased
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Styling hint for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayCategory {
    Blue,
    Red,
    Black,
    Gray,
}

impl DisplayCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayCategory::Blue => "blue",
            DisplayCategory::Red => "red",
            DisplayCategory::Black => "black",
            DisplayCategory::Gray => "gray",
        }
    }
}

impl fmt::Display for DisplayCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a row was returned from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyContext {
    /// Row came from the flattened requirements + child operations view
    pub flattened: bool,
}

/// BOM rule: top-level lot or has children → assembly; else purchased flag
/// decides between purchased and manufactured
pub fn classify_bom(row: &BomRow) -> NodeKind {
    if row.is_top_level() || row.has_children {
        NodeKind::Assembly
    } else if row.purchased {
        NodeKind::Purchased
    } else {
        NodeKind::Manufactured
    }
}

pub fn classify_requirement(row: &RequirementRow) -> NodeKind {
    if row.has_child_work_order() {
        NodeKind::SubWorkOrder
    } else {
        NodeKind::Requirement
    }
}

/// Every operation in the flattened view comes from a child work order,
/// whether or not the linking requirement carries a piece number
pub fn classify_operation(_row: &OperationRow, ctx: ClassifyContext) -> NodeKind {
    if ctx.flattened {
        NodeKind::ChildOperation
    } else {
        NodeKind::Operation
    }
}

pub fn classify(row: &ChildRow, ctx: ClassifyContext) -> NodeKind {
    match row {
        ChildRow::Bom(bom) => classify_bom(bom),
        ChildRow::Operation(op) => classify_operation(op, ctx),
        ChildRow::Requirement(req) => classify_requirement(req),
    }
}
