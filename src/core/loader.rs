//! One level of hierarchy expansion
//!
//! The loader picks the query shape for a parent node, runs it through the
//! [`QueryExecutor`], classifies the rows and returns child seeds ready to be
//! attached. It holds no tree state and is cheap to clone into worker threads.

use std::sync::Arc;

use tracing::debug;

use crate::core::classify::{classify, ClassifyContext, NodeKind};
use crate::core::error::TreeError;
use crate::core::executor::{Domain, LevelKind, ParentKey, QueryError, QueryExecutor};
use crate::core::identity::{
    normalize_pattern, validate_limit, LevelKey, NodeIdentity, RootKey, ValidationError,
};
use crate::core::view::{DisplayFields, TreeMode, ViewFilter};
use crate::entities::{ChildRow, OperationRow, RequirementRow, RootSummary};

/// A child node before it is attached to a tree
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSeed {
    pub kind: NodeKind,
    pub key: LevelKey,
    pub fields: DisplayFields,
}

impl ChildSeed {
    fn from_row(row: &ChildRow, ctx: ClassifyContext) -> Self {
        let kind = classify(row, ctx);
        Self {
            kind,
            key: level_key(row),
            fields: DisplayFields::for_row(row, kind),
        }
    }
}

/// Business key of the level a row was returned for
fn level_key(row: &ChildRow) -> LevelKey {
    match row {
        ChildRow::Bom(bom) => LevelKey::Lot {
            job_number: bom.job_number.trim().to_string(),
            lot_id: bom.lot_id().to_string(),
            sub_id: bom.sub_id().to_string(),
            part_id: bom.part_id().to_string(),
        },
        ChildRow::Operation(op) => LevelKey::Operation {
            work_order: op.work_order.clone(),
            sequence: op.sequence,
        },
        ChildRow::Requirement(req) => LevelKey::Requirement {
            work_order: req.work_order.clone(),
            operation_seq: req.operation_seq,
            piece_no: req.piece_no,
            part_id: req.part_id().to_string(),
            subordinate_sub_id: req.subordinate_sub_id().map(String::from),
        },
    }
}

/// Whether nodes of this kind never have children in the given mode
pub fn is_leaf(kind: NodeKind, mode: TreeMode) -> bool {
    match kind {
        NodeKind::Manufactured
        | NodeKind::Purchased
        | NodeKind::Requirement
        | NodeKind::Error => true,
        // Detailed mode shows a sub work order's operations beside it
        NodeKind::SubWorkOrder => mode == TreeMode::Detailed,
        NodeKind::Job
        | NodeKind::Assembly
        | NodeKind::WorkOrderRoot
        | NodeKind::Operation
        | NodeKind::ChildOperation => false,
    }
}

/// Merge an operation's requirements with the operations of the child work
/// orders those requirements reference.
///
/// Ordered by requirement piece number, then 0 for the requirement itself or
/// the operation sequence for a child operation. A missing piece number sorts
/// as 0. The sort is stable, so rows with equal keys keep their query order.
pub fn merge_flattened(
    requirements: Vec<RequirementRow>,
    operations: Vec<OperationRow>,
) -> Vec<ChildRow> {
    let mut merged: Vec<((i32, i32), ChildRow)> = requirements
        .into_iter()
        .map(|r| ((r.piece_no.unwrap_or(0), 0), ChildRow::Requirement(r)))
        .chain(operations.into_iter().map(|o| {
            (
                (o.via_piece_no.unwrap_or(0), o.sequence),
                ChildRow::Operation(o),
            )
        }))
        .collect();
    merged.sort_by_key(|(key, _)| *key);
    merged.into_iter().map(|(_, row)| row).collect()
}

/// Loads one level of a hierarchy
#[derive(Clone)]
pub struct HierarchyLoader {
    executor: Arc<dyn QueryExecutor>,
    mode: TreeMode,
    filter: ViewFilter,
}

impl HierarchyLoader {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            mode: TreeMode::default(),
            filter: ViewFilter::default(),
        }
    }

    pub fn with_mode(mut self, mode: TreeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_filter(mut self, filter: ViewFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn mode(&self) -> TreeMode {
        self.mode
    }

    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    /// Root summaries matching `pattern`; no match is an empty list
    pub fn search_roots(
        &self,
        domain: Domain,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<RootSummary>, TreeError> {
        let pattern = normalize_pattern(pattern)?;
        let limit = validate_limit(limit)?;
        debug!(%domain, %pattern, limit, "searching roots");
        self.executor
            .search_roots(domain, &pattern, limit)
            .map_err(|source| TreeError::Search { domain, source })
    }

    /// Summary of a root, or [`TreeError::NotFound`] when it does not exist
    pub fn load_root(&self, root: &RootKey) -> Result<RootSummary, TreeError> {
        root.validate()?;
        match self.executor.fetch_root(root) {
            Ok(Some(summary)) => Ok(summary),
            Ok(None) => Err(TreeError::NotFound { root: root.clone() }),
            Err(source) => Err(TreeError::Load {
                identity: NodeIdentity::root(root.clone()),
                source,
            }),
        }
    }

    /// Child seeds of the node at `identity`, in display order
    pub fn load_children(
        &self,
        identity: &NodeIdentity,
        kind: NodeKind,
    ) -> Result<Vec<ChildSeed>, TreeError> {
        if is_leaf(kind, self.mode) {
            return Ok(Vec::new());
        }

        let leaf = identity.leaf();
        let fetch = |parent: &ParentKey, level: LevelKind| {
            self.fetch(parent, level).map_err(|source| TreeError::Load {
                identity: identity.clone(),
                source,
            })
        };

        let seeds = match kind {
            NodeKind::Job => {
                let parent = parent_of_job(&leaf)?;
                parent.validate()?;
                let rows = fetch(&parent, LevelKind::AssembliesOfJob)?;
                seed_all(&rows, ClassifyContext::default())
            }
            NodeKind::Assembly => {
                let parent = parent_of_assembly(&leaf)?;
                parent.validate()?;
                let rows = fetch(&parent, LevelKind::PartsOfAssembly)?;
                seed_all(&rows, ClassifyContext::default())
            }
            NodeKind::WorkOrderRoot if self.mode == TreeMode::Detailed => {
                let parent = parent_of_work_order(kind, &leaf)?;
                parent.validate()?;
                let rows = fetch(&parent, LevelKind::OperationsOfWorkOrder)?;
                seed_all(&rows, ClassifyContext::default())
            }
            NodeKind::WorkOrderRoot | NodeKind::SubWorkOrder => {
                let parent = parent_of_work_order(kind, &leaf)?;
                parent.validate()?;
                let rows: Vec<ChildRow> = fetch(&parent, LevelKind::RequirementsBySubId)?
                    .into_iter()
                    .filter(|row| match row {
                        ChildRow::Requirement(req) => self.filter.admits(req),
                        _ => false,
                    })
                    .collect();
                seed_all(&rows, ClassifyContext::default())
            }
            NodeKind::Operation | NodeKind::ChildOperation => {
                let parent = parent_of_operation(kind, &leaf)?;
                parent.validate()?;
                let requirements = fetch(&parent, LevelKind::RequirementsOfOperation)?
                    .into_iter()
                    .filter_map(|row| match row {
                        ChildRow::Requirement(req) => Some(req),
                        _ => None,
                    })
                    .collect();
                let operations = fetch(&parent, LevelKind::ChildOperationsOfOperation)?
                    .into_iter()
                    .filter_map(|row| match row {
                        ChildRow::Operation(op) => Some(op),
                        _ => None,
                    })
                    .collect();
                let rows = merge_flattened(requirements, operations);
                seed_all(&rows, ClassifyContext { flattened: true })
            }
            NodeKind::Manufactured
            | NodeKind::Purchased
            | NodeKind::Requirement
            | NodeKind::Error => Vec::new(),
        };

        debug!(%identity, %kind, count = seeds.len(), "loaded children");
        Ok(seeds)
    }

    /// Run one child query and check every row has the level's shape
    fn fetch(&self, parent: &ParentKey, level: LevelKind) -> Result<Vec<ChildRow>, QueryError> {
        if !parent.supports(level) {
            return Err(QueryError::Unsupported {
                level,
                parent: parent.to_string(),
            });
        }
        let rows = self.executor.fetch_children(parent, level)?;
        if let Some(bad) = rows.iter().find(|r| r.row_name() != level.row_name()) {
            return Err(QueryError::Shape {
                level,
                expected: level.row_name(),
                found: bad.row_name(),
            });
        }
        Ok(rows)
    }
}

fn seed_all(rows: &[ChildRow], ctx: ClassifyContext) -> Vec<ChildSeed> {
    rows.iter().map(|row| ChildSeed::from_row(row, ctx)).collect()
}

fn mismatch(kind: NodeKind, key: &LevelKey) -> ValidationError {
    ValidationError::KindMismatch {
        kind: kind.as_str(),
        level: key.level_name(),
    }
}

fn parent_of_job(key: &LevelKey) -> Result<ParentKey, ValidationError> {
    match key {
        LevelKey::Job { job_number } => Ok(ParentKey::Job {
            job_number: job_number.clone(),
        }),
        other => Err(mismatch(NodeKind::Job, other)),
    }
}

fn parent_of_assembly(key: &LevelKey) -> Result<ParentKey, ValidationError> {
    match key {
        LevelKey::Lot {
            job_number, lot_id, ..
        } => Ok(ParentKey::Assembly {
            job_number: job_number.clone(),
            lot_id: lot_id.clone(),
        }),
        other => Err(mismatch(NodeKind::Assembly, other)),
    }
}

fn parent_of_work_order(kind: NodeKind, key: &LevelKey) -> Result<ParentKey, ValidationError> {
    match (kind, key) {
        (NodeKind::WorkOrderRoot, LevelKey::WorkOrder(wo)) => Ok(ParentKey::WorkOrder(wo.clone())),
        (
            NodeKind::SubWorkOrder,
            LevelKey::Requirement {
                work_order,
                subordinate_sub_id: Some(sub),
                ..
            },
        ) => Ok(ParentKey::WorkOrder(work_order.with_sub(sub))),
        (kind, other) => Err(mismatch(kind, other)),
    }
}

fn parent_of_operation(kind: NodeKind, key: &LevelKey) -> Result<ParentKey, ValidationError> {
    match key {
        LevelKey::Operation {
            work_order,
            sequence,
        } => Ok(ParentKey::Operation {
            work_order: work_order.clone(),
            sequence: *sequence,
        }),
        other => Err(mismatch(kind, other)),
    }
}
