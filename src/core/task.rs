//! Expansions and full builds run off the owning thread
//!
//! A worker only ever sees the loader (and through it the shared executor)
//! plus the identity of the node being expanded. It hands an
//! [`ExpansionOutcome`] back to the tree's owner, which commits it with
//! [`LazyTree::complete`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::core::builder::{EagerHierarchyBuilder, FullBuild};
use crate::core::classify::NodeKind;
use crate::core::error::TreeError;
use crate::core::identity::{NodeIdentity, RootKey};
use crate::core::loader::{ChildSeed, HierarchyLoader};
use crate::core::tree::{ExpandResult, LazyTree, NodeId, Step};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One pending expansion, ready to run on any thread
pub struct ExpansionTask {
    node: NodeId,
    identity: NodeIdentity,
    kind: NodeKind,
    step: Step,
    loader: HierarchyLoader,
}

impl ExpansionTask {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Run the query on the current thread
    pub fn run(self) -> ExpansionOutcome {
        debug!(identity = %self.identity, "running expansion task");
        let result = self.loader.load_children(&self.identity, self.kind);
        ExpansionOutcome {
            node: self.node,
            step: self.step,
            result,
        }
    }

    /// Run the query on a new worker thread
    pub fn spawn(self) -> JoinHandle<ExpansionOutcome> {
        thread::spawn(move || self.run())
    }
}

/// Result of an [`ExpansionTask`], committed by [`LazyTree::complete`]
pub struct ExpansionOutcome {
    node: NodeId,
    step: Step,
    result: Result<Vec<ChildSeed>, TreeError>,
}

impl ExpansionOutcome {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl LazyTree {
    /// Start an expansion that needs a query.
    ///
    /// Returns `None` when nothing has to run: the node is already loaded, is
    /// a leaf, closes a cycle, or already has an expansion in flight.
    pub fn begin_expand(&mut self, id: NodeId) -> Result<Option<ExpansionTask>, TreeError> {
        if self.is_in_flight(id) {
            return Ok(None);
        }
        let step = self.step(id)?;
        if step == Step::Settled {
            return Ok(None);
        }
        let node = self.node(id)?;
        let task = ExpansionTask {
            node: id,
            identity: node.identity.clone(),
            kind: node.kind,
            step,
            loader: self.loader().clone(),
        };
        self.mark_in_flight(id);
        Ok(Some(task))
    }

    /// Commit a finished expansion in one step
    pub fn complete(&mut self, outcome: ExpansionOutcome) -> Result<ExpandResult, TreeError> {
        self.clear_in_flight(outcome.node);
        match self.settle(outcome.node, outcome.step, outcome.result) {
            Ok(()) => self.result_for(outcome.node, None),
            Err(TreeError::UnknownNode(n)) => Err(TreeError::UnknownNode(n)),
            Err(_) => {
                let info = self.node(outcome.node)?.error.clone();
                self.result_for(outcome.node, info)
            }
        }
    }
}

/// Run a full build on a worker thread
pub fn spawn_build(
    builder: EagerHierarchyBuilder,
    root: RootKey,
    max_depth: u32,
    cancel: CancelToken,
) -> JoinHandle<Result<FullBuild, TreeError>> {
    thread::spawn(move || builder.build_full(&root, max_depth, &cancel))
}
