//! Full materialization of a hierarchy
//!
//! The eager builder drives a [`LazyTree`] to completion, so leaf, cycle and
//! depth handling are exactly those of interactive expansion.

use tracing::{debug, info};

use crate::core::error::TreeError;
use crate::core::identity::RootKey;
use crate::core::loader::HierarchyLoader;
use crate::core::task::CancelToken;
use crate::core::tree::{LazyTree, Truncation};
use crate::core::view::NodeView;

/// Default cap on materialized nodes per build
pub const DEFAULT_ROW_BUDGET: usize = 50_000;

/// A completely expanded tree
pub struct FullBuild {
    pub tree: LazyTree,
    /// Some branch stopped at the depth bound, or the row budget ran out
    pub truncated: bool,
}

impl FullBuild {
    pub fn view(&self) -> Result<NodeView, TreeError> {
        self.tree.view()
    }

    pub fn node_count(&self) -> usize {
        self.tree.len()
    }
}

pub struct EagerHierarchyBuilder {
    loader: HierarchyLoader,
    row_budget: usize,
}

impl EagerHierarchyBuilder {
    pub fn new(loader: HierarchyLoader) -> Self {
        Self {
            loader,
            row_budget: DEFAULT_ROW_BUDGET,
        }
    }

    pub fn with_row_budget(mut self, row_budget: usize) -> Self {
        self.row_budget = row_budget.max(1);
        self
    }

    /// Expand every node below `root`, depth first.
    ///
    /// Load failures abort the build. Cancellation is checked before every
    /// expansion; a cancelled build discards what it had built so far.
    pub fn build_full(
        &self,
        root: &RootKey,
        max_depth: u32,
        cancel: &CancelToken,
    ) -> Result<FullBuild, TreeError> {
        let mut tree = LazyTree::open(self.loader.clone(), root, max_depth)?;
        let mut truncated = false;
        let mut stack = vec![tree.root_id()];

        while let Some(id) = stack.pop() {
            if cancel.is_cancelled() {
                debug!(%root, "build cancelled");
                return Err(TreeError::Cancelled);
            }
            if tree.len() >= self.row_budget {
                info!(%root, budget = self.row_budget, "row budget exhausted");
                truncated = true;
                break;
            }

            tree.expand_node(id)?;
            let node = tree.node(id)?;
            if node.truncation == Some(Truncation::Depth) {
                truncated = true;
            }
            stack.extend(node.children.iter().rev().copied());
        }

        info!(%root, nodes = tree.len(), truncated, "full build complete");
        Ok(FullBuild { tree, truncated })
    }
}
