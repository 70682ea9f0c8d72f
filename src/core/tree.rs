//! Lazily materialized hierarchy
//!
//! A [`LazyTree`] is an arena of nodes addressed by [`NodeId`]. Children of a
//! node are fetched the first time it is expanded and never again; the load
//! state moves forward only. Cycles are cut by comparing a node's entry key
//! against those of its ancestors, and the depth bound stops a branch without
//! attaching anything below it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::classify::NodeKind;
use crate::core::error::{ErrorInfo, TreeError};
use crate::core::identity::{validate_max_depth, LevelKey, NodeIdentity, RootKey, ScopeKey};
use crate::core::loader::{is_leaf, ChildSeed, HierarchyLoader};
use crate::core::view::{DisplayFields, NodeView};
use crate::entities::RootSummary;

/// Index of a node within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    NotAttempted,
    LoadedEmpty,
    LoadedNonEmpty,
}

impl LoadState {
    pub fn is_loaded(&self) -> bool {
        !matches!(self, LoadState::NotAttempted)
    }
}

/// Why a branch stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    /// The node re-enters a scope one of its ancestors entered
    Cycle,
    /// The node sits at the depth bound and has children in the store
    Depth,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub identity: NodeIdentity,
    pub fields: DisplayFields,
    pub state: LoadState,
    pub children: Vec<NodeId>,
    pub depth: u32,
    pub truncation: Option<Truncation>,
    pub error: Option<ErrorInfo>,
}

impl Node {
    pub fn key(&self) -> LevelKey {
        self.identity.leaf()
    }

    /// Scope this node enters, if any
    pub fn entry_key(&self) -> Option<ScopeKey> {
        entry_key(self.kind, &self.identity.leaf())
    }
}

/// Key whose repetition along one root-to-node path forms a cycle
pub fn entry_key(kind: NodeKind, key: &LevelKey) -> Option<ScopeKey> {
    match (kind, key) {
        (
            NodeKind::Assembly,
            LevelKey::Lot {
                job_number, lot_id, ..
            },
        ) => Some(ScopeKey::Lot {
            job_number: job_number.clone(),
            lot_id: lot_id.clone(),
        }),
        (NodeKind::WorkOrderRoot, LevelKey::WorkOrder(wo)) => Some(ScopeKey::WorkOrder(wo.clone())),
        (
            NodeKind::SubWorkOrder,
            LevelKey::Requirement {
                work_order,
                subordinate_sub_id: Some(sub),
                ..
            },
        ) => Some(ScopeKey::WorkOrder(work_order.with_sub(sub))),
        (NodeKind::ChildOperation, LevelKey::Operation { work_order, .. }) => {
            Some(ScopeKey::WorkOrder(work_order.clone()))
        }
        _ => None,
    }
}

/// Children handed back by one expansion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandResult {
    pub children: Vec<NodeView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// What an expansion still has to do after the cheap checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Nothing left to query
    Settled,
    /// At the depth bound: query only to learn whether children exist
    Probe,
    Load,
}

pub struct LazyTree {
    loader: HierarchyLoader,
    max_depth: u32,
    nodes: Vec<Node>,
    /// Error placeholders replaced by a retry after other nodes were allocated
    detached: HashSet<NodeId>,
    in_flight: HashSet<NodeId>,
}

impl LazyTree {
    /// Look up `root` and create a tree holding only the root node
    pub fn open(loader: HierarchyLoader, root: &RootKey, max_depth: u32) -> Result<Self, TreeError> {
        let max_depth = validate_max_depth(max_depth)?;
        let summary = loader.load_root(root)?;
        Ok(Self::from_summary(loader, &summary, max_depth))
    }

    /// Create a tree from a root already fetched by a search
    pub fn with_root(
        loader: HierarchyLoader,
        summary: &RootSummary,
        max_depth: u32,
    ) -> Result<Self, TreeError> {
        let max_depth = validate_max_depth(max_depth)?;
        Ok(Self::from_summary(loader, summary, max_depth))
    }

    fn from_summary(loader: HierarchyLoader, summary: &RootSummary, max_depth: u32) -> Self {
        let root_key = summary.root_key();
        let kind = match root_key {
            RootKey::Job { .. } => NodeKind::Job,
            RootKey::WorkOrder(_) => NodeKind::WorkOrderRoot,
        };
        let root = Node {
            id: NodeId(0),
            parent: None,
            kind,
            identity: NodeIdentity::root(root_key),
            fields: DisplayFields::for_root(summary),
            state: LoadState::NotAttempted,
            children: Vec::new(),
            depth: 0,
            truncation: None,
            error: None,
        };
        Self {
            loader,
            max_depth,
            nodes: vec![root],
            detached: HashSet::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn loader(&self) -> &HierarchyLoader {
        &self.loader
    }

    /// Number of nodes materialized so far
    pub fn len(&self) -> usize {
        self.nodes.len() - self.detached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        if self.detached.contains(&id) {
            return Err(TreeError::UnknownNode(id.0));
        }
        self.nodes.get(id.0).ok_or(TreeError::UnknownNode(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        if self.detached.contains(&id) {
            return Err(TreeError::UnknownNode(id.0));
        }
        self.nodes.get_mut(id.0).ok_or(TreeError::UnknownNode(id.0))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(|node| !self.detached.contains(&node.id))
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], TreeError> {
        Ok(&self.node(id)?.children)
    }

    /// Whether an asynchronous expansion of `id` is pending
    pub fn is_in_flight(&self, id: NodeId) -> bool {
        self.in_flight.contains(&id)
    }

    /// Expand a node and return its children.
    ///
    /// Only an unknown node id is an `Err`; load failures are reported in
    /// [`ExpandResult::error`] and leave the node retryable.
    pub fn expand(&mut self, id: NodeId) -> Result<ExpandResult, TreeError> {
        if self.in_flight.contains(&id) {
            return self.result_for(id, None);
        }
        match self.expand_node(id) {
            Ok(()) => self.result_for(id, None),
            Err(TreeError::UnknownNode(n)) => Err(TreeError::UnknownNode(n)),
            Err(err) => {
                let info = self.node(id)?.error.clone();
                debug!(error = %err, "expansion failed");
                self.result_for(id, info)
            }
        }
    }

    /// Expand a node, propagating load failures
    pub(crate) fn expand_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        match self.step(id)? {
            Step::Settled => Ok(()),
            step => {
                let node = self.node(id)?;
                let result = self.loader.load_children(&node.identity, node.kind);
                self.settle(id, step, result)
            }
        }
    }

    /// Checks that never query: loaded, leaf, cycle, then the depth bound.
    /// Settles the node when one applies.
    pub(crate) fn step(&mut self, id: NodeId) -> Result<Step, TreeError> {
        let mode = self.loader.mode();
        let max_depth = self.max_depth;
        let cyclic = self.re_enters_ancestor_scope(id)?;
        let node = self.node_mut(id)?;

        if node.state.is_loaded() {
            return Ok(Step::Settled);
        }
        if is_leaf(node.kind, mode) {
            node.state = LoadState::LoadedEmpty;
            return Ok(Step::Settled);
        }
        if cyclic {
            warn!(identity = %node.identity, "cycle detected, branch not expanded");
            node.state = LoadState::LoadedEmpty;
            node.truncation = Some(Truncation::Cycle);
            return Ok(Step::Settled);
        }
        if node.depth >= max_depth {
            return Ok(Step::Probe);
        }
        Ok(Step::Load)
    }

    /// Commit the outcome of a query in one step
    pub(crate) fn settle(
        &mut self,
        id: NodeId,
        step: Step,
        result: Result<Vec<ChildSeed>, TreeError>,
    ) -> Result<(), TreeError> {
        if self.node(id)?.state.is_loaded() {
            return Ok(());
        }
        match (step, result) {
            (Step::Settled, _) => Ok(()),
            (Step::Probe, Ok(seeds)) => {
                let node = self.node_mut(id)?;
                node.state = LoadState::LoadedEmpty;
                node.error = None;
                if !seeds.is_empty() {
                    debug!(identity = %node.identity, "depth bound reached");
                    node.truncation = Some(Truncation::Depth);
                }
                Ok(())
            }
            (Step::Probe, Err(err)) => {
                let node = self.node_mut(id)?;
                node.error = Some(ErrorInfo::from_error(&node.identity, &err));
                Err(err)
            }
            (Step::Load, Ok(seeds)) => {
                self.attach(id, seeds)?;
                Ok(())
            }
            (Step::Load, Err(err)) => {
                warn!(error = %err, "failed to load children");
                self.attach_error(id, &err)?;
                Err(err)
            }
        }
    }

    /// Replace a node's children with `seeds` and mark it loaded
    fn attach(&mut self, id: NodeId, seeds: Vec<ChildSeed>) -> Result<(), TreeError> {
        self.drop_placeholder(id)?;
        let (identity, depth) = {
            let node = self.node(id)?;
            (node.identity.clone(), node.depth + 1)
        };
        let first = self.nodes.len();
        let mut children = Vec::with_capacity(seeds.len());
        for (offset, seed) in seeds.into_iter().enumerate() {
            let child = NodeId(first + offset);
            self.nodes.push(Node {
                id: child,
                parent: Some(id),
                kind: seed.kind,
                identity: identity.child(seed.key),
                fields: seed.fields,
                state: LoadState::NotAttempted,
                children: Vec::new(),
                depth,
                truncation: None,
                error: None,
            });
            children.push(child);
        }

        let node = self.node_mut(id)?;
        node.state = if children.is_empty() {
            LoadState::LoadedEmpty
        } else {
            LoadState::LoadedNonEmpty
        };
        node.children = children;
        node.error = None;
        Ok(())
    }

    /// Remove the error placeholder of a previous attempt. The slot is
    /// reclaimed when it is the last one, otherwise it is detached.
    fn drop_placeholder(&mut self, id: NodeId) -> Result<(), TreeError> {
        let current = self.node(id)?.children.clone();
        if let [placeholder] = current[..] {
            if self.node(placeholder)?.kind != NodeKind::Error {
                return Ok(());
            }
            if placeholder.0 + 1 == self.nodes.len() {
                self.nodes.pop();
            } else {
                self.detached.insert(placeholder);
            }
            self.node_mut(id)?.children.clear();
        }
        Ok(())
    }

    /// Show a failed load as a single synthetic child; the node stays
    /// unloaded so the next expansion retries
    fn attach_error(&mut self, id: NodeId, err: &TreeError) -> Result<(), TreeError> {
        self.drop_placeholder(id)?;
        let (identity, depth) = {
            let node = self.node(id)?;
            (node.identity.clone(), node.depth + 1)
        };
        let info = ErrorInfo::from_error(&identity, err);
        let child = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id: child,
            parent: Some(id),
            kind: NodeKind::Error,
            identity: identity.clone(),
            fields: DisplayFields::for_error(&info),
            state: LoadState::LoadedEmpty,
            children: Vec::new(),
            depth,
            truncation: None,
            error: Some(info.clone()),
        });
        let node = self.node_mut(id)?;
        node.children = vec![child];
        node.error = Some(info);
        Ok(())
    }

    /// Whether this node's entry key was already entered by an ancestor
    fn re_enters_ancestor_scope(&self, id: NodeId) -> Result<bool, TreeError> {
        let node = self.node(id)?;
        let Some(key) = node.entry_key() else {
            return Ok(false);
        };
        let mut cursor = node.parent;
        while let Some(parent) = cursor {
            let ancestor = self.node(parent)?;
            if ancestor.entry_key().as_ref() == Some(&key) {
                return Ok(true);
            }
            cursor = ancestor.parent;
        }
        Ok(false)
    }

    /// Re-read the root summary and replace its display fields.
    ///
    /// Fails with [`TreeError::NotFound`] when the root no longer exists.
    pub fn reload_root(&mut self) -> Result<(), TreeError> {
        let root_key = self.node(self.root_id())?.identity.root.clone();
        let summary = self.loader.load_root(&root_key)?;
        let fields = DisplayFields::for_root(&summary);
        self.node_mut(self.root_id())?.fields = fields;
        Ok(())
    }

    pub(crate) fn mark_in_flight(&mut self, id: NodeId) -> bool {
        self.in_flight.insert(id)
    }

    pub(crate) fn clear_in_flight(&mut self, id: NodeId) {
        self.in_flight.remove(&id);
    }

    pub(crate) fn result_for(
        &self,
        id: NodeId,
        error: Option<ErrorInfo>,
    ) -> Result<ExpandResult, TreeError> {
        let children = self
            .children(id)?
            .iter()
            .map(|c| self.view_node(*c, false))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExpandResult { children, error })
    }

    /// Snapshot of the whole materialized tree
    pub fn view(&self) -> Result<NodeView, TreeError> {
        self.view_node(self.root_id(), true)
    }

    /// Snapshot of one node, with its loaded subtree when `deep`
    pub fn view_node(&self, id: NodeId, deep: bool) -> Result<NodeView, TreeError> {
        let node = self.node(id)?;
        let children = if deep {
            node.children
                .iter()
                .map(|c| self.view_node(*c, true))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        Ok(NodeView {
            kind: node.kind,
            category: node.kind.category(),
            key: node.key().formatted(),
            label: node.fields.label.clone(),
            description: node.fields.description.clone(),
            quantity: node.fields.quantity.clone(),
            dates: node.fields.dates.clone(),
            status: node.fields.status.clone(),
            notes: node.fields.notes.clone(),
            depth: node.depth,
            state: node.state,
            truncation: node.truncation,
            error: node.error.clone(),
            children,
        })
    }

    /// Find the node at `path` below the root by matching formatted keys
    pub fn find(&self, path: &[&str]) -> Option<NodeId> {
        let mut current = self.root_id();
        for segment in path {
            let node = self.node(current).ok()?;
            current = node.children.iter().copied().find(|c| {
                self.node(*c)
                    .map(|n| n.key().formatted() == *segment)
                    .unwrap_or(false)
            })?;
        }
        Some(current)
    }
}
