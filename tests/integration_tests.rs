//! Integration tests for olt
//!
//! The first half drives the hierarchy engine through in-memory executors and
//! the SQLite snapshot; the second half runs the binary with assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use olt::core::{
    spawn_build, CancelToken, Domain, EagerHierarchyBuilder, HierarchyLoader, LazyTree,
    LevelKind, LoadState, NodeKind, NodeView, ParentKey, QueryError, QueryExecutor, RootKey,
    SqliteExecutor, TreeError, TreeMode, Truncation, ViewFilter, WorkOrderKey,
};
use olt::entities::{
    BomRow, ChildRow, JobSummary, OperationRow, RequirementRow, RootSummary, WorkOrderSummary,
};

// ============================================================================
// In-memory executor
// ============================================================================

/// Rows per (parent, level), with switches for failures and cancellation
#[derive(Default)]
struct Store {
    roots: Vec<RootSummary>,
    levels: HashMap<String, Vec<ChildRow>>,
    calls: AtomicUsize,
    /// Number of upcoming child queries that fail
    failures: AtomicUsize,
    /// Cancel the token once this many child queries have run
    cancel_on_call: Option<(usize, CancelToken)>,
}

fn level_key(parent: &ParentKey, level: LevelKind) -> String {
    format!("{}|{}", parent, level.as_str())
}

impl Store {
    fn root(mut self, root: RootSummary) -> Self {
        self.roots.push(root);
        self
    }

    fn with(mut self, parent: ParentKey, level: LevelKind, rows: Vec<ChildRow>) -> Self {
        self.levels.insert(level_key(&parent, level), rows);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QueryExecutor for Store {
    fn search_roots(
        &self,
        domain: Domain,
        _pattern: &str,
        limit: usize,
    ) -> Result<Vec<RootSummary>, QueryError> {
        Ok(self
            .roots
            .iter()
            .filter(|r| match domain {
                Domain::Bom => matches!(r, RootSummary::Job(_)),
                Domain::WorkOrder => matches!(r, RootSummary::WorkOrder(_)),
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn fetch_root(&self, root: &RootKey) -> Result<Option<RootSummary>, QueryError> {
        Ok(self.roots.iter().find(|r| r.root_key() == *root).cloned())
    }

    fn fetch_children(
        &self,
        parent: &ParentKey,
        level: LevelKind,
    ) -> Result<Vec<ChildRow>, QueryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_on_call {
            if call >= *at {
                token.cancel();
            }
        }
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(QueryError::Failed {
                message: "connection reset".to_string(),
            });
        }
        Ok(self
            .levels
            .get(&level_key(parent, level))
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Row builders
// ============================================================================

fn job_summary() -> RootSummary {
    RootSummary::Job(JobSummary {
        job_number: "J1".to_string(),
        customer_id: Some("C1".to_string()),
        customer_name: Some("ACME".to_string()),
        assembly_count: 1,
    })
}

fn part(lot: &str, sub: &str, part: &str, has_children: bool, purchased: bool) -> ChildRow {
    ChildRow::Bom(BomRow {
        job_number: "J1".to_string(),
        lot_id: Some(lot.to_string()),
        sub_id: Some(sub.to_string()),
        base_lot_id: None,
        part_id: Some(part.to_string()),
        part_description: None,
        fabricated: !purchased,
        purchased,
        has_children,
    })
}

fn job_parent() -> ParentKey {
    ParentKey::Job {
        job_number: "J1".to_string(),
    }
}

fn lot_parent(lot: &str) -> ParentKey {
    ParentKey::Assembly {
        job_number: "J1".to_string(),
        lot_id: lot.to_string(),
    }
}

fn job_root() -> RootKey {
    RootKey::job("J1").unwrap()
}

fn wo() -> WorkOrderKey {
    WorkOrderKey::new("8113", "26", "0")
}

fn wo_summary(key: WorkOrderKey) -> RootSummary {
    RootSummary::WorkOrder(WorkOrderSummary {
        key,
        part_id: Some("GB-1".to_string()),
        part_description: Some("GEARBOX".to_string()),
        status: Some("Released".to_string()),
        order_qty: Decimal::ONE,
        start_date: None,
        sched_finish_date: None,
        desired_want_date: None,
        create_date: None,
        notes: None,
    })
}

fn requirement(owner: &WorkOrderKey, seq: i32, piece: i32, part: &str, sub: Option<&str>) -> ChildRow {
    ChildRow::Requirement(RequirementRow {
        work_order: owner.clone(),
        operation_seq: seq,
        piece_no: Some(piece),
        part_id: Some(part.to_string()),
        part_description: None,
        unit_of_measure: None,
        qty_per: Decimal::ONE,
        subord_wo_sub_id: sub.map(String::from),
        subord_wo_status: sub.map(|_| "Released".to_string()),
        subord_wo_qty: Decimal::ONE,
        subord_wo_start_date: None,
        subord_wo_finish_date: None,
        notes: None,
    })
}

fn operation(owner: &WorkOrderKey, seq: i32, via_piece_no: Option<i32>) -> ChildRow {
    ChildRow::Operation(OperationRow {
        work_order: owner.clone(),
        sequence: seq,
        operation_type: Some(format!("OP-{}", seq)),
        resource_id: None,
        setup_hrs: Decimal::ZERO,
        run_hrs: Decimal::ZERO,
        status: None,
        notes: None,
        requirement_count: 0,
        via_piece_no,
    })
}

/// Job J1 with one top assembly, 14 sub-assemblies and 50 leaves each
fn fan_out_store() -> Store {
    let mut store = Store::default().root(job_summary()).with(
        job_parent(),
        LevelKind::AssembliesOfJob,
        vec![part("00", "0", "TOP", false, false)],
    );
    let subs = (1..=14)
        .map(|i| part(&format!("{:02}", i), "1", &format!("SUB-{:02}", i), true, false))
        .collect();
    store = store.with(lot_parent("00"), LevelKind::PartsOfAssembly, subs);
    for i in 1..=14 {
        let leaves = (1..=50)
            .map(|j| {
                part(
                    &format!("L{:02}", i),
                    &format!("{:03}", j),
                    &format!("P-{:02}-{:03}", i, j),
                    false,
                    j % 2 == 0,
                )
            })
            .collect();
        store = store.with(
            lot_parent(&format!("{:02}", i)),
            LevelKind::PartsOfAssembly,
            leaves,
        );
    }
    store
}

/// J1 > 00 > 01 > 02 > 01 again
fn cyclic_store() -> Store {
    Store::default()
        .root(job_summary())
        .with(
            job_parent(),
            LevelKind::AssembliesOfJob,
            vec![part("00", "0", "TOP", false, false)],
        )
        .with(
            lot_parent("00"),
            LevelKind::PartsOfAssembly,
            vec![part("01", "1", "A", true, false), part("05", "1", "BRG", false, true)],
        )
        .with(
            lot_parent("01"),
            LevelKind::PartsOfAssembly,
            vec![part("02", "1", "B", true, false)],
        )
        .with(
            lot_parent("02"),
            LevelKind::PartsOfAssembly,
            vec![part("01", "2", "A", true, false)],
        )
}

fn loader(store: &Arc<Store>) -> HierarchyLoader {
    HierarchyLoader::new(store.clone())
}

fn expand_all(tree: &mut LazyTree) {
    let mut stack = vec![tree.root_id()];
    while let Some(id) = stack.pop() {
        tree.expand(id).unwrap();
        stack.extend(tree.children(id).unwrap().iter().copied());
    }
}

// ============================================================================
// Lazy and eager traversal
// ============================================================================

#[test]
fn test_lazy_and_eager_materialize_the_same_fan_out() {
    let lazy_store = Arc::new(fan_out_store());
    let mut tree = LazyTree::open(loader(&lazy_store), &job_root(), 10).unwrap();
    expand_all(&mut tree);

    // job + top assembly + 14 sub-assemblies; leaves never query
    assert_eq!(lazy_store.calls(), 16);
    assert_eq!(tree.len(), 1 + 15 + 700);

    let eager_store = Arc::new(fan_out_store());
    let build = EagerHierarchyBuilder::new(loader(&eager_store))
        .build_full(&job_root(), 10, &CancelToken::new())
        .unwrap();
    assert!(!build.truncated);
    assert_eq!(build.node_count(), tree.len());

    let view = build.view().unwrap();
    assert_eq!(view, tree.view().unwrap());
    assert_eq!(view.count_kind(NodeKind::Assembly), 15);
    assert_eq!(view.count_kind(NodeKind::Purchased), 350);
    assert_eq!(view.count_kind(NodeKind::Manufactured), 350);
}

#[test]
fn test_expansion_is_idempotent() {
    let store = Arc::new(fan_out_store());
    let mut tree = LazyTree::open(loader(&store), &job_root(), 10).unwrap();
    expand_all(&mut tree);
    let before = tree.view().unwrap();
    let calls = store.calls();

    expand_all(&mut tree);
    assert_eq!(store.calls(), calls);
    assert_eq!(tree.view().unwrap(), before);
}

#[test]
fn test_children_keep_store_order() {
    let store = Arc::new(
        Store::default()
            .root(job_summary())
            .with(
                job_parent(),
                LevelKind::AssembliesOfJob,
                vec![part("00", "9", "Z", false, false), part("00", "2", "A", false, false)],
            )
            .with(
                lot_parent("00"),
                LevelKind::PartsOfAssembly,
                vec![
                    part("09", "1", "NINE", false, false),
                    part("02", "1", "TWO", false, true),
                    part("05", "1", "FIVE", false, false),
                ],
            ),
    );
    let mut tree = LazyTree::open(loader(&store), &job_root(), 10).unwrap();
    let top = tree.expand(tree.root_id()).unwrap();
    let keys: Vec<&str> = top.children.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["00/9", "00/2"]);

    let first = tree.children(tree.root_id()).unwrap()[0];
    let parts = tree.expand(first).unwrap();
    let labels: Vec<&str> = parts.children.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["09/1 NINE", "02/1 TWO", "05/1 FIVE"]);
    assert_eq!(parts.children[1].kind, NodeKind::Purchased);
}

#[test]
fn test_identical_rows_stay_distinct_siblings() {
    let store = Arc::new(
        Store::default()
            .root(job_summary())
            .with(
                job_parent(),
                LevelKind::AssembliesOfJob,
                vec![part("00", "0", "TOP", false, false)],
            )
            .with(
                lot_parent("00"),
                LevelKind::PartsOfAssembly,
                vec![part("02", "1", "BOLT", false, true), part("02", "1", "BOLT", false, true)],
            ),
    );
    let build = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&job_root(), 10, &CancelToken::new())
        .unwrap();
    assert_eq!(build.node_count(), 4);
    assert_eq!(build.view().unwrap().count_kind(NodeKind::Purchased), 2);
}

#[test]
fn test_cycle_is_cut_at_the_repeated_assembly() {
    let store = Arc::new(cyclic_store());
    let build = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&job_root(), 10, &CancelToken::new())
        .unwrap();

    let tree = &build.tree;
    let repeated = tree.find(&["00/0", "01/1", "02/1", "01/2"]).unwrap();
    let node = tree.node(repeated).unwrap();
    assert_eq!(node.truncation, Some(Truncation::Cycle));
    assert_eq!(node.state, LoadState::LoadedEmpty);
    assert!(node.children.is_empty());

    // job, 00, 01, 02; the repeated 01 is never queried
    assert_eq!(store.calls(), 4);
    assert!(build.view().unwrap().any_truncated());
}

#[test]
fn test_depth_bound_marks_truncated_branches() {
    let store = Arc::new(cyclic_store());
    let build = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&job_root(), 2, &CancelToken::new())
        .unwrap();
    assert!(build.truncated);

    let tree = &build.tree;
    let bounded = tree.node(tree.find(&["00/0", "01/1"]).unwrap()).unwrap();
    assert_eq!(bounded.depth, 2);
    assert_eq!(bounded.truncation, Some(Truncation::Depth));
    assert!(bounded.children.is_empty());

    // a leaf at the bound is just a leaf
    let leaf = tree.node(tree.find(&["00/0", "05/1"]).unwrap()).unwrap();
    assert_eq!(leaf.kind, NodeKind::Purchased);
    assert_eq!(leaf.truncation, None);
}

#[test]
fn test_max_depth_is_validated() {
    let store = Arc::new(cyclic_store());
    for depth in [0, 51] {
        let err = LazyTree::open(loader(&store), &job_root(), depth).err().unwrap();
        assert!(matches!(err, TreeError::Validation(_)), "{:?}", err);
    }
}

#[test]
fn test_missing_root_is_not_found() {
    let store = Arc::new(cyclic_store());
    let err = LazyTree::open(loader(&store), &RootKey::job("NOPE").unwrap(), 10)
        .err()
        .unwrap();
    assert!(matches!(err, TreeError::NotFound { .. }));
}

#[test]
fn test_row_budget_stops_full_build() {
    let store = Arc::new(fan_out_store());
    let build = EagerHierarchyBuilder::new(loader(&store))
        .with_row_budget(100)
        .build_full(&job_root(), 10, &CancelToken::new())
        .unwrap();
    assert!(build.truncated);
    assert!(build.node_count() >= 100);
    assert!(build.node_count() < 716);
}

// ============================================================================
// Work-order views
// ============================================================================

fn detailed_store() -> Store {
    let child = wo().with_sub("4");
    Store::default()
        .root(wo_summary(wo()))
        .with(
            ParentKey::WorkOrder(wo()),
            LevelKind::OperationsOfWorkOrder,
            vec![operation(&wo(), 10, None)],
        )
        .with(
            ParentKey::Operation {
                work_order: wo(),
                sequence: 10,
            },
            LevelKind::RequirementsOfOperation,
            vec![
                requirement(&wo(), 10, 3, "C", None),
                requirement(&wo(), 10, 1, "A", None),
                requirement(&wo(), 10, 2, "B", Some("4")),
            ],
        )
        .with(
            ParentKey::Operation {
                work_order: wo(),
                sequence: 10,
            },
            LevelKind::ChildOperationsOfOperation,
            vec![operation(&child, 10, Some(2)), operation(&child, 20, Some(2))],
        )
}

#[test]
fn test_detailed_view_interleaves_child_operations() {
    let store = Arc::new(detailed_store());
    let loader = loader(&store).with_mode(TreeMode::Detailed);
    let mut tree = LazyTree::open(loader, &RootKey::WorkOrder(wo()), 10).unwrap();

    let ops = tree.expand(tree.root_id()).unwrap();
    assert_eq!(ops.children.len(), 1);
    assert_eq!(ops.children[0].kind, NodeKind::Operation);

    let op = tree.children(tree.root_id()).unwrap()[0];
    let merged = tree.expand(op).unwrap();
    let kinds: Vec<NodeKind> = merged.children.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Requirement,
            NodeKind::SubWorkOrder,
            NodeKind::ChildOperation,
            NodeKind::ChildOperation,
            NodeKind::Requirement,
        ]
    );
    assert!(merged.children[0].label.starts_with("A - "));
    assert!(merged.children[4].label.starts_with("C - "));

    // sub work orders are leaves here; their operations are already siblings
    let sub = tree.children(op).unwrap()[1];
    let calls = store.calls();
    assert!(tree.expand(sub).unwrap().children.is_empty());
    assert_eq!(store.calls(), calls);
}

fn simplified_store() -> Store {
    let child = wo().with_sub("4");
    Store::default()
        .root(wo_summary(wo()))
        .with(
            ParentKey::WorkOrder(wo()),
            LevelKind::RequirementsBySubId,
            vec![
                requirement(&wo(), 10, 1, "A", None),
                requirement(&wo(), 10, 2, "B", Some("4")),
                requirement(&wo(), 20, 1, "CAST-1", None),
            ],
        )
        .with(
            ParentKey::WorkOrder(child.clone()),
            LevelKind::RequirementsBySubId,
            vec![requirement(&child, 10, 1, "LOOP", Some("4"))],
        )
}

#[test]
fn test_simplified_view_shows_sub_work_orders() {
    let store = Arc::new(simplified_store());
    let mut tree = LazyTree::open(loader(&store), &RootKey::WorkOrder(wo()), 10).unwrap();
    let top = tree.expand(tree.root_id()).unwrap();
    assert_eq!(top.children.len(), 1);
    assert_eq!(top.children[0].kind, NodeKind::SubWorkOrder);
    assert!(top.children[0].label.contains("8113-4/26"));

    let filtered = loader(&store).with_filter(ViewFilter::with_prefixes(["cast"]));
    let mut tree = LazyTree::open(filtered, &RootKey::WorkOrder(wo()), 10).unwrap();
    let top = tree.expand(tree.root_id()).unwrap();
    let kinds: Vec<NodeKind> = top.children.iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![NodeKind::SubWorkOrder, NodeKind::Requirement]);
}

#[test]
fn test_self_referencing_sub_work_order_is_a_cycle() {
    let store = Arc::new(simplified_store());
    let build = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&RootKey::WorkOrder(wo()), 10, &CancelToken::new())
        .unwrap();
    let view = build.view().unwrap();
    assert_eq!(view.count(), 3);
    let looped = &view.children[0].children[0];
    assert_eq!(looped.truncation, Some(Truncation::Cycle));
    assert!(!build.truncated);
}

#[test]
fn test_cycle_at_the_depth_bound_is_not_probed() {
    let store = Arc::new(cyclic_store());
    let build = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&job_root(), 4, &CancelToken::new())
        .unwrap();

    let tree = &build.tree;
    let repeated = tree.find(&["00/0", "01/1", "02/1", "01/2"]).unwrap();
    let node = tree.node(repeated).unwrap();
    assert_eq!(node.depth, 4);
    assert_eq!(node.truncation, Some(Truncation::Cycle));
    assert!(node.children.is_empty());
    assert_eq!(store.calls(), 4);
    assert!(!build.truncated);
}

/// 8113/26 needs sub 4 and sub 4 needs sub 0 again
fn mutual_sub_work_order_store() -> Store {
    let b = wo().with_sub("4");
    Store::default()
        .root(wo_summary(wo()))
        .with(
            ParentKey::WorkOrder(wo()),
            LevelKind::RequirementsBySubId,
            vec![requirement(&wo(), 10, 1, "B-SHAFT", Some("4"))],
        )
        .with(
            ParentKey::WorkOrder(b.clone()),
            LevelKind::RequirementsBySubId,
            vec![requirement(&b, 10, 1, "A-GEAR", Some("0"))],
        )
}

#[test]
fn test_mutual_sub_work_orders_stop_at_the_second_visit() {
    let store = Arc::new(mutual_sub_work_order_store());
    let build = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&RootKey::WorkOrder(wo()), 10, &CancelToken::new())
        .unwrap();
    let view = build.view().unwrap();

    assert_eq!(view.kind, NodeKind::WorkOrderRoot);
    let b = &view.children[0];
    assert_eq!(b.kind, NodeKind::SubWorkOrder);
    assert!(b.truncation.is_none());
    let a_again = &b.children[0];
    assert_eq!(a_again.kind, NodeKind::SubWorkOrder);
    assert_eq!(a_again.truncation, Some(Truncation::Cycle));
    assert!(a_again.children.is_empty());

    // root A, B, and the cut A; sub 0 is never queried a second time
    assert_eq!(view.count(), 3);
    assert_eq!(store.calls(), 2);
    assert!(!build.truncated);
}

/// Detailed shape of the same loop: A op 10 consumes B, B op 10 consumes A
fn mutual_child_operation_store(via_piece_no: Option<i32>) -> Store {
    let a = wo();
    let b = wo().with_sub("4");
    let a_op = ParentKey::Operation {
        work_order: a.clone(),
        sequence: 10,
    };
    let b_op = ParentKey::Operation {
        work_order: b.clone(),
        sequence: 10,
    };
    Store::default()
        .root(wo_summary(a.clone()))
        .with(
            ParentKey::WorkOrder(a.clone()),
            LevelKind::OperationsOfWorkOrder,
            vec![operation(&a, 10, None)],
        )
        .with(
            a_op.clone(),
            LevelKind::RequirementsOfOperation,
            vec![requirement(&a, 10, 1, "B-SHAFT", Some("4"))],
        )
        .with(
            a_op,
            LevelKind::ChildOperationsOfOperation,
            vec![operation(&b, 10, via_piece_no)],
        )
        .with(
            b_op.clone(),
            LevelKind::RequirementsOfOperation,
            vec![requirement(&b, 10, 1, "A-GEAR", Some("0"))],
        )
        .with(
            b_op,
            LevelKind::ChildOperationsOfOperation,
            vec![operation(&a, 10, via_piece_no)],
        )
}

#[test]
fn test_mutual_child_operations_stop_at_the_second_visit() {
    for via_piece_no in [Some(1), None] {
        let store = Arc::new(mutual_child_operation_store(via_piece_no));
        let loader = loader(&store).with_mode(TreeMode::Detailed);
        let build = EagerHierarchyBuilder::new(loader)
            .build_full(&RootKey::WorkOrder(wo()), 10, &CancelToken::new())
            .unwrap();
        let view = build.view().unwrap();

        let child_op = |node: &NodeView| {
            node.children
                .iter()
                .find(|c| c.kind == NodeKind::ChildOperation)
                .cloned()
                .unwrap()
        };

        let op = &view.children[0];
        assert_eq!(op.kind, NodeKind::Operation);
        assert_eq!(op.children.len(), 2);
        assert_eq!(op.count_kind(NodeKind::SubWorkOrder), 2);

        let b_op = child_op(op);
        assert!(b_op.truncation.is_none());
        let a_op = child_op(&b_op);
        assert_eq!(a_op.truncation, Some(Truncation::Cycle), "{:?}", via_piece_no);
        assert!(a_op.children.is_empty());

        assert_eq!(view.count(), 6, "{:?}", via_piece_no);
        assert_eq!(store.calls(), 5);
        assert!(!build.truncated);
    }
}

// ============================================================================
// Failures, retries and cancellation
// ============================================================================

#[test]
fn test_failed_load_shows_error_child_and_retries() {
    let store = Arc::new(fan_out_store());
    store.failures.store(1, Ordering::SeqCst);
    let mut tree = LazyTree::open(loader(&store), &job_root(), 10).unwrap();
    let root = tree.root_id();

    let failed = tree.expand(root).unwrap();
    let info = failed.error.unwrap();
    assert!(info.retryable);
    assert!(info.message.contains("connection reset"));
    assert_eq!(failed.children.len(), 1);
    assert_eq!(failed.children[0].kind, NodeKind::Error);
    assert_eq!(tree.node(root).unwrap().state, LoadState::NotAttempted);

    let retried = tree.expand(root).unwrap();
    assert!(retried.error.is_none());
    assert_eq!(retried.children.len(), 1);
    assert_eq!(retried.children[0].kind, NodeKind::Assembly);
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.node(root).unwrap().state, LoadState::LoadedNonEmpty);
    assert!(tree.view().unwrap().error.is_none());
}

#[test]
fn test_full_build_propagates_load_failure() {
    let store = Arc::new(fan_out_store());
    store.failures.store(1, Ordering::SeqCst);
    let err = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&job_root(), 10, &CancelToken::new())
        .err()
        .unwrap();
    assert!(matches!(err, TreeError::Load { .. }));
    assert!(err.is_retryable());
}

#[test]
fn test_cancelled_build_returns_cancelled() {
    let store = Arc::new(fan_out_store());
    let token = CancelToken::new();
    token.cancel();
    let err = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&job_root(), 10, &token)
        .err()
        .unwrap();
    assert!(matches!(err, TreeError::Cancelled));
    assert_eq!(store.calls(), 0);
}

#[test]
fn test_build_cancelled_midway() {
    let token = CancelToken::new();
    let store = Arc::new(Store {
        cancel_on_call: Some((2, token.clone())),
        ..fan_out_store()
    });
    let err = EagerHierarchyBuilder::new(loader(&store))
        .build_full(&job_root(), 10, &token)
        .err()
        .unwrap();
    assert!(matches!(err, TreeError::Cancelled));
    assert_eq!(store.calls(), 2);
}

#[test]
fn test_background_expansion_commits_once() {
    let store = Arc::new(fan_out_store());
    let mut tree = LazyTree::open(loader(&store), &job_root(), 10).unwrap();
    let root = tree.root_id();

    let task = tree.begin_expand(root).unwrap().unwrap();
    assert!(tree.is_in_flight(root));
    assert!(tree.begin_expand(root).unwrap().is_none());

    // while in flight, expand reports what is there without querying
    let pending = tree.expand(root).unwrap();
    assert!(pending.children.is_empty());
    assert_eq!(store.calls(), 0);

    let outcome = task.spawn().join().unwrap();
    let done = tree.complete(outcome).unwrap();
    assert_eq!(done.children.len(), 1);
    assert!(!tree.is_in_flight(root));
    assert_eq!(store.calls(), 1);
    assert!(tree.begin_expand(root).unwrap().is_none());
}

#[test]
fn test_spawned_full_build() {
    let store = Arc::new(fan_out_store());
    let build = spawn_build(
        EagerHierarchyBuilder::new(loader(&store)),
        job_root(),
        10,
        CancelToken::new(),
    )
    .join()
    .unwrap()
    .unwrap();
    assert_eq!(build.node_count(), 716);
}

#[test]
fn test_search_validation() {
    let store = Arc::new(fan_out_store());
    let loader = loader(&store);
    assert_eq!(loader.search_roots(Domain::Bom, "J", 10).unwrap().len(), 1);
    assert!(loader.search_roots(Domain::WorkOrder, "J", 10).unwrap().is_empty());

    let too_long = "X".repeat(31);
    for (pattern, limit) in [("", 10), ("  ", 10), (too_long.as_str(), 10), ("J", 0), ("J", 1001)] {
        let err = loader.search_roots(Domain::Bom, pattern, limit).err().unwrap();
        assert!(matches!(err, TreeError::Validation(_)), "{:?}", err);
    }
}

// ============================================================================
// SQLite snapshot
// ============================================================================

const FIXTURE: &str = r#"
    INSERT INTO customer (id, name) VALUES ('C1', 'ACME CORP');
    INSERT INTO customer_order (id, customer_id) VALUES ('8113', 'C1');

    INSERT INTO part (id, description, fabricated, purchased) VALUES
        ('GB-1', 'GEARBOX', 'Y', 'N'),
        ('SH-1', 'SHAFT', 'Y', 'N'),
        ('BRG', 'BEARING', 'N', 'Y');

    INSERT INTO work_order (base_id, lot_id, sub_id, base_lot_id, part_id, status, desired_qty,
                            sched_start_date, sched_finish_date, create_date) VALUES
        ('8113', '00', '0', NULL, 'GB-1', 'Released', '1', '2011-08-15', '2011-10-16', '2011-08-01 09:30:00'),
        ('8113', '01', '1', '00', 'SH-1', 'Released', 2, NULL, NULL, NULL),
        ('8113', '02', '2', '00', 'BRG', 'Closed', 4.5, NULL, NULL, NULL),
        ('8113', '03', '1', '01', 'SH-1', 'Released', '1', NULL, NULL, NULL),
        ('8113', '00', '7', NULL, 'GB-1', 'Released', '1', NULL, NULL, NULL);

    INSERT INTO operation (workorder_base_id, workorder_lot_id, workorder_sub_id, sequence_no,
                           operation_type, resource_id, setup_hrs, run_hrs) VALUES
        ('8113', '00', '0', 20, 'ASSEMBLE', 'BENCH', '0.5', '1'),
        ('8113', '00', '0', 10, 'CUT', 'SAW', '0.25', '0.1'),
        ('8113', '00', '7', 10, 'WELD', 'WELD-1', '1', '2');

    INSERT INTO requirement (workorder_base_id, workorder_lot_id, workorder_sub_id, operation_seq_no,
                             piece_no, part_id, qty_per, subord_wo_sub_id) VALUES
        ('8113', '00', '0', 10, 3, 'BOLT', '8', NULL),
        ('8113', '00', '0', 10, 1, 'SH-1', '1', NULL),
        ('8113', '00', '0', 10, 2, 'GB-1', '1', '7'),
        ('8113', '00', '0', 20, 1, 'BRG', '2', '  ');
"#;

/// Write the fixture snapshot to a temp file
fn snapshot() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("snapshot.db");
    let exec = SqliteExecutor::create(&path).unwrap();
    exec.seed(FIXTURE).unwrap();
    (tmp, path)
}

fn sqlite_loader(path: &PathBuf, mode: TreeMode) -> HierarchyLoader {
    HierarchyLoader::new(Arc::new(SqliteExecutor::open(path).unwrap())).with_mode(mode)
}

#[test]
fn test_sqlite_search_without_match_is_empty() {
    let (_tmp, path) = snapshot();
    let loader = sqlite_loader(&path, TreeMode::Simplified);
    assert!(loader.search_roots(Domain::Bom, "NOPE%", 10).unwrap().is_empty());
    assert_eq!(loader.search_roots(Domain::Bom, "81", 10).unwrap().len(), 1);
}

#[test]
fn test_sqlite_full_bom() {
    let (_tmp, path) = snapshot();
    let build = EagerHierarchyBuilder::new(sqlite_loader(&path, TreeMode::Simplified))
        .build_full(&RootKey::job("8113").unwrap(), 10, &CancelToken::new())
        .unwrap();
    let view = build.view().unwrap();

    // two top-level lots, each with 01/1 > 03/1 and 02/2
    assert_eq!(view.count(), 9);
    assert_eq!(view.count_kind(NodeKind::Assembly), 4);
    assert_eq!(view.count_kind(NodeKind::Purchased), 2);
    assert_eq!(view.count_kind(NodeKind::Manufactured), 2);
    assert!(!view.any_truncated());
}

#[test]
fn test_sqlite_detailed_operation_children() {
    let (_tmp, path) = snapshot();
    let root = RootKey::WorkOrder(WorkOrderKey::new("8113", "00", "0"));
    let mut tree = LazyTree::open(sqlite_loader(&path, TreeMode::Detailed), &root, 10).unwrap();
    tree.expand(tree.root_id()).unwrap();

    let op = tree.find(&["8113/00 [10]"]).unwrap();
    let merged = tree.expand(op).unwrap();
    let kinds: Vec<NodeKind> = merged.children.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Requirement,
            NodeKind::SubWorkOrder,
            NodeKind::ChildOperation,
            NodeKind::Requirement,
        ]
    );
    assert_eq!(merged.children[0].label, "SH-1 - SHAFT");
    assert_eq!(merged.children[2].label, "[10] - WELD");
}

// ============================================================================
// CLI
// ============================================================================

fn olt() -> Command {
    let mut cmd = Command::cargo_bin("olt").unwrap();
    cmd.env_remove("OLT_DATABASE").env_remove("OLT_MAX_DEPTH");
    cmd
}

fn olt_with(path: &PathBuf, tmp: &TempDir) -> Command {
    let mut cmd = olt();
    cmd.current_dir(tmp.path()).arg("--database").arg(path);
    cmd
}

#[test]
fn test_help() {
    olt()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: olt"))
        .stdout(predicate::str::contains("bom"));
}

#[test]
fn test_search_jobs() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["search", "8113", "--bom"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ACME CORP"));
}

#[test]
fn test_search_work_orders() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["search", "81"])
        .assert()
        .success()
        .stdout(predicate::str::contains("8113/00"))
        .stdout(predicate::str::contains("(08/15/2011) - (10/16/2011)"));
}

#[test]
fn test_search_no_results() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["search", "NOPE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found"));
}

#[test]
fn test_bom_first_level() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["bom", "8113"])
        .assert()
        .success()
        .stdout(predicate::str::contains("8113 - ACME CORP"))
        .stdout(predicate::str::contains("00/0 GB-1"))
        .stdout(predicate::str::contains("00/7 GB-1"))
        .stdout(predicate::str::contains("01/1 SH-1").not());
}

#[test]
fn test_bom_expand_path() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["bom", "8113", "--expand", "00/0>01/1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("01/1 SH-1"))
        .stdout(predicate::str::contains("02/2 BRG"))
        .stdout(predicate::str::contains("03/1 SH-1"));
}

#[test]
fn test_bom_expand_unknown_path() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["bom", "8113", "--expand", "99/9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("99/9"));
}

#[test]
fn test_bom_all_as_json() {
    let (tmp, path) = snapshot();
    let output = olt_with(&path, &tmp)
        .args(["bom", "8113", "--all", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    fn count(node: &serde_json::Value) -> usize {
        1 + node["children"]
            .as_array()
            .map(|c| c.iter().map(count).sum())
            .unwrap_or(0)
    }
    assert_eq!(json["kind"], "job");
    assert_eq!(json["category"], "blue");
    assert_eq!(count(&json), 9);
}

#[test]
fn test_bom_depth_limit() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["bom", "8113", "--all", "--max-depth", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[depth limit]"))
        .stdout(predicate::str::contains("03/1 SH-1").not());
}

#[test]
fn test_bom_missing_job() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["bom", "9999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_wo_simplified() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["wo", "8113/00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[R] 8113/00 - GEARBOX"))
        .stdout(predicate::str::contains("8113-7/00"))
        .stdout(predicate::str::contains("BOLT").not());
}

#[test]
fn test_wo_detailed_expand() {
    let (tmp, path) = snapshot();
    let output = olt_with(&path, &tmp)
        .args(["wo", "8113/00", "--detailed", "--expand", "8113/00 [10]"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let position = |needle: &str| stdout.find(needle).unwrap();
    assert!(stdout.contains("[20] - ASSEMBLE"));
    assert!(position("SH-1 - SHAFT") < position("8113-7/00"));
    assert!(position("8113-7/00") < position("[10] - WELD"));
    assert!(position("[10] - WELD") < position("BOLT - Unknown"));
}

#[test]
fn test_wo_malformed_key() {
    let (tmp, path) = snapshot();
    olt_with(&path, &tmp)
        .args(["wo", "8113"])
        .assert()
        .failure();
}

#[test]
fn test_missing_database() {
    let tmp = TempDir::new().unwrap();
    olt()
        .current_dir(tmp.path())
        .args(["bom", "8113"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--database"));
}

#[test]
fn test_database_from_local_config() {
    let (tmp, path) = snapshot();
    std::fs::write(
        tmp.path().join(".olt.yaml"),
        format!("database: {}\n", path.display()),
    )
    .unwrap();
    olt()
        .current_dir(tmp.path())
        .args(["bom", "8113"])
        .assert()
        .success()
        .stdout(predicate::str::contains("00/0 GB-1"));
}

#[test]
fn test_completions() {
    olt()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("olt"));
}
