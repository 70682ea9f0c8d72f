//! Display-side node data: formatted fields, view modes and the serializable
//! tree snapshot handed to presentation code

use serde::{Deserialize, Serialize};

use crate::core::classify::{DisplayCategory, NodeKind};
use crate::core::error::ErrorInfo;
use crate::core::tree::{LoadState, Truncation};
use crate::entities::work_order::format_status;
use crate::entities::{ChildRow, RequirementRow, RootSummary};

/// How a work-order hierarchy is presented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeMode {
    /// Work order → sub work orders, recursively
    #[default]
    Simplified,
    /// Work order → operations → requirements with child operations inlined
    Detailed,
}

/// Which requirement rows are shown in simplified mode.
///
/// Rows fulfilled by a sub work order always pass. Plain requirements pass
/// only when their part id starts with one of `part_prefixes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFilter {
    #[serde(default)]
    pub part_prefixes: Vec<String>,
}

impl ViewFilter {
    /// Sub work orders only
    pub fn sub_work_orders_only() -> Self {
        Self::default()
    }

    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            part_prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_uppercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn admits(&self, row: &RequirementRow) -> bool {
        if row.has_child_work_order() {
            return true;
        }
        let part = row.part_id().to_uppercase();
        !part.is_empty() && self.part_prefixes.iter().any(|p| part.starts_with(p.as_str()))
    }
}

/// Preformatted text of a node, replaced only as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFields {
    pub label: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl DisplayFields {
    pub fn for_root(summary: &RootSummary) -> Self {
        match summary {
            RootSummary::Job(job) => Self {
                label: job.job_number.clone(),
                description: job.customer_display().to_string(),
                notes: Some(format!("{} assemblies", job.assembly_count)),
                ..Self::default()
            },
            RootSummary::WorkOrder(wo) => Self {
                label: wo.formatted_id(),
                description: wo.description(),
                quantity: Some(wo.formatted_qty_with_notes()),
                dates: Some(wo.formatted_dates()),
                status: Some(wo.formatted_status()),
                notes: trimmed(wo.notes.as_deref()),
            },
        }
    }

    pub fn for_row(row: &ChildRow, kind: NodeKind) -> Self {
        match row {
            ChildRow::Bom(bom) => Self {
                label: bom.formatted_label(),
                description: bom.description(),
                ..Self::default()
            },
            ChildRow::Operation(op) => Self {
                label: op.formatted_description(),
                description: op.formatted_hours(),
                status: Some(format_status(op.status.as_deref())),
                notes: trimmed(op.notes.as_deref()),
                ..Self::default()
            },
            ChildRow::Requirement(req) if kind == NodeKind::SubWorkOrder => Self {
                label: req.formatted_display(),
                description: req.formatted_part(),
                quantity: Some(req.formatted_qty()),
                dates: Some(req.formatted_dates()),
                status: Some(format_status(req.subord_wo_status.as_deref())),
                notes: trimmed(req.notes.as_deref()),
            },
            ChildRow::Requirement(req) => Self {
                label: req.formatted_part(),
                description: req.formatted_display(),
                quantity: Some(req.formatted_qty()),
                notes: trimmed(req.notes.as_deref()),
                ..Self::default()
            },
        }
    }

    pub fn for_error(info: &ErrorInfo) -> Self {
        Self {
            label: "Error loading children".to_string(),
            description: info.message.clone(),
            ..Self::default()
        }
    }
}

/// Read-only snapshot of a node and its loaded subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub kind: NodeKind,
    pub category: DisplayCategory,
    /// Formatted business key of the node's own level
    pub key: String,
    pub label: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub depth: u32,
    pub state: LoadState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeView>,
}

impl NodeView {
    /// Number of nodes in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NodeView::count).sum::<usize>()
    }

    /// Nodes of one kind in this subtree
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        let own = usize::from(self.kind == kind);
        own + self
            .children
            .iter()
            .map(|c| c.count_kind(kind))
            .sum::<usize>()
    }

    /// Whether any node in this subtree was cut at the depth bound
    pub fn any_truncated(&self) -> bool {
        self.truncation.is_some() || self.children.iter().any(NodeView::any_truncated)
    }
}
