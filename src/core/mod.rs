//! Core module - hierarchy engine and its collaborators

pub mod builder;
pub mod classify;
pub mod config;
pub mod error;
pub mod executor;
pub mod identity;
pub mod loader;
pub mod logging;
pub mod snapshot;
pub mod task;
pub mod tree;
pub mod view;

pub use builder::{EagerHierarchyBuilder, FullBuild, DEFAULT_ROW_BUDGET};
pub use classify::{classify, ClassifyContext, DisplayCategory, NodeKind};
pub use config::Config;
pub use error::{ErrorInfo, TreeError};
pub use executor::{Domain, LevelKind, ParentKey, QueryError, QueryExecutor};
pub use identity::{LevelKey, NodeIdentity, RootKey, ScopeKey, ValidationError, WorkOrderKey};
pub use loader::{merge_flattened, ChildSeed, HierarchyLoader};
pub use snapshot::SqliteExecutor;
pub use task::{spawn_build, CancelToken, ExpansionOutcome, ExpansionTask};
pub use tree::{ExpandResult, LazyTree, LoadState, Node, NodeId, Truncation};
pub use view::{DisplayFields, NodeView, TreeMode, ViewFilter};
