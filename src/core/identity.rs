//! Node identity: composite business keys and their validation
//!
//! Every node in a hierarchy is addressed by the root it was reached from plus
//! the ordered list of level keys walked to get there. Identities are stable
//! across reloads of the same logical entity, but the same business key may
//! occur more than once in one tree (duplicate siblings, or the same
//! sub-work-order reached from two parents).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest key field accepted by the ERP schema (varchar 30)
pub const MAX_KEY_LEN: usize = 30;

/// Lot id marking a top-level assembly in a job
pub const TOP_LEVEL_LOT: &str = "00";

/// Sub id of the main work order (as opposed to a sub-work-order)
pub const MAIN_SUB_ID: &str = "0";

/// Default recursion limit for hierarchy traversal
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Hard ceiling for any caller-supplied recursion limit
pub const MAX_DEPTH_CEILING: u32 = 50;

/// Largest root search page
pub const MAX_SEARCH_LIMIT: usize = 1000;

/// Errors raised for caller-supplied keys, before any query is issued
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("{field} cannot exceed {max} characters (got {len})", max = MAX_KEY_LEN)]
    TooLong { field: &'static str, len: usize },

    #[error("limit must be between 1 and {max} (got {0})", max = MAX_SEARCH_LIMIT)]
    Limit(usize),

    #[error("max depth must be between 1 and {max} (got {0})", max = MAX_DEPTH_CEILING)]
    MaxDepth(u32),

    #[error("invalid work order key '{0}': expected BASE/LOT or BASE/LOT/SUB")]
    MalformedWorkOrder(String),

    #[error("{kind} node cannot be addressed by a {level} key")]
    KindMismatch { kind: &'static str, level: &'static str },
}

/// Trim and upper-case a key field, then check its length
pub fn normalize_field(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim().to_uppercase();
    if value.len() > MAX_KEY_LEN {
        return Err(ValidationError::TooLong {
            field,
            len: value.len(),
        });
    }
    Ok(value)
}

/// Like [`normalize_field`] but also rejects empty values
pub fn require_field(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = normalize_field(field, value)?;
    if value.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(value)
}

/// Normalize a root search pattern.
///
/// The pattern is trimmed and upper-cased; a trailing `%` wildcard is added
/// when the caller supplied none.
pub fn normalize_pattern(pattern: &str) -> Result<String, ValidationError> {
    let pattern = require_field("search pattern", pattern)?;
    if pattern.contains('%') {
        Ok(pattern)
    } else {
        Ok(format!("{}%", pattern))
    }
}

/// Check a search limit against the accepted range
pub fn validate_limit(limit: usize) -> Result<usize, ValidationError> {
    if limit == 0 || limit > MAX_SEARCH_LIMIT {
        return Err(ValidationError::Limit(limit));
    }
    Ok(limit)
}

/// Check a recursion limit against the hard ceiling
pub fn validate_max_depth(max_depth: u32) -> Result<u32, ValidationError> {
    if max_depth == 0 || max_depth > MAX_DEPTH_CEILING {
        return Err(ValidationError::MaxDepth(max_depth));
    }
    Ok(max_depth)
}

/// Composite key of a work order: (base, lot, sub)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkOrderKey {
    pub base_id: String,
    pub lot_id: String,
    pub sub_id: String,
}

impl WorkOrderKey {
    /// Build a key without validation (values are trimmed and upper-cased)
    pub fn new(base_id: &str, lot_id: &str, sub_id: &str) -> Self {
        Self {
            base_id: base_id.trim().to_uppercase(),
            lot_id: lot_id.trim().to_uppercase(),
            sub_id: sub_id.trim().to_uppercase(),
        }
    }

    /// Build a key, rejecting empty base/lot ids and oversized fields
    pub fn parse_parts(base_id: &str, lot_id: &str, sub_id: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            base_id: require_field("base_id", base_id)?,
            lot_id: require_field("lot_id", lot_id)?,
            sub_id: normalize_field("sub_id", sub_id)?,
        })
    }

    /// Same base and lot, different sub id
    pub fn with_sub(&self, sub_id: &str) -> Self {
        Self {
            base_id: self.base_id.clone(),
            lot_id: self.lot_id.clone(),
            sub_id: sub_id.trim().to_uppercase(),
        }
    }

    /// Re-check the key fields
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_field("base_id", &self.base_id)?;
        require_field("lot_id", &self.lot_id)?;
        normalize_field("sub_id", &self.sub_id)?;
        Ok(())
    }

    /// True for the main work order of a lot
    pub fn is_main(&self) -> bool {
        self.sub_id.is_empty() || self.sub_id == MAIN_SUB_ID
    }

    /// Display form used throughout the ERP: `BASE-SUB/LOT`, or `BASE/LOT`
    /// for the main work order
    pub fn formatted_id(&self) -> String {
        if self.is_main() {
            format!("{}/{}", self.base_id, self.lot_id)
        } else {
            format!("{}-{}/{}", self.base_id, self.sub_id, self.lot_id)
        }
    }
}

impl fmt::Display for WorkOrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted_id())
    }
}

impl FromStr for WorkOrderKey {
    type Err = ValidationError;

    /// Parse `BASE/LOT` (main work order) or `BASE/LOT/SUB`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [base, lot] => Self::parse_parts(base, lot, MAIN_SUB_ID),
            [base, lot, sub] => Self::parse_parts(base, lot, sub),
            _ => Err(ValidationError::MalformedWorkOrder(s.to_string())),
        }
    }
}

/// The entity a traversal starts from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum RootKey {
    /// Customer order / job, root of a bill of materials
    Job { job_number: String },
    /// Work order, root of an operation/requirement hierarchy
    WorkOrder(WorkOrderKey),
}

impl RootKey {
    /// Validated job root
    pub fn job(job_number: &str) -> Result<Self, ValidationError> {
        Ok(RootKey::Job {
            job_number: require_field("job number", job_number)?,
        })
    }

    /// Validated work-order root
    pub fn work_order(key: WorkOrderKey) -> Result<Self, ValidationError> {
        key.validate()?;
        Ok(RootKey::WorkOrder(key))
    }

    /// The level key of the root node itself
    pub fn level_key(&self) -> LevelKey {
        match self {
            RootKey::Job { job_number } => LevelKey::Job {
                job_number: job_number.clone(),
            },
            RootKey::WorkOrder(key) => LevelKey::WorkOrder(key.clone()),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RootKey::Job { job_number } => require_field("job number", job_number).map(|_| ()),
            RootKey::WorkOrder(key) => key.validate(),
        }
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootKey::Job { job_number } => write!(f, "job {}", job_number),
            RootKey::WorkOrder(key) => write!(f, "work order {}", key),
        }
    }
}

/// Business key of one level of a hierarchy.
///
/// Immutable once a node is created. Missing fields from malformed rows are
/// carried as empty strings, never as absent values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum LevelKey {
    Job {
        job_number: String,
    },
    /// A work-order row of a job's BOM, addressed by lot and sub id
    Lot {
        job_number: String,
        lot_id: String,
        sub_id: String,
        part_id: String,
    },
    WorkOrder(WorkOrderKey),
    Operation {
        work_order: WorkOrderKey,
        sequence: i32,
    },
    Requirement {
        work_order: WorkOrderKey,
        operation_seq: i32,
        piece_no: Option<i32>,
        part_id: String,
        subordinate_sub_id: Option<String>,
    },
}

impl LevelKey {
    pub fn level_name(&self) -> &'static str {
        match self {
            LevelKey::Job { .. } => "job",
            LevelKey::Lot { .. } => "lot",
            LevelKey::WorkOrder(_) => "work order",
            LevelKey::Operation { .. } => "operation",
            LevelKey::Requirement { .. } => "requirement",
        }
    }

    /// Short display form of this level alone
    pub fn formatted(&self) -> String {
        match self {
            LevelKey::Job { job_number } => job_number.clone(),
            LevelKey::Lot { lot_id, sub_id, .. } => format!("{}/{}", lot_id, sub_id),
            LevelKey::WorkOrder(key) => key.formatted_id(),
            LevelKey::Operation {
                work_order,
                sequence,
            } => format!("{} [{}]", work_order.formatted_id(), sequence),
            LevelKey::Requirement {
                work_order,
                operation_seq,
                piece_no,
                ..
            } => match piece_no {
                Some(piece) => format!("{} [{}] #{}", work_order.formatted_id(), operation_seq, piece),
                None => format!("{} [{}]", work_order.formatted_id(), operation_seq),
            },
        }
    }
}

impl fmt::Display for LevelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

/// Key whose re-appearance on one root-to-node path is a cycle.
///
/// Only nodes that *enter* a new scope (an assembly lot, a work order) carry
/// one; operations and plain requirements stay inside their parent's scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKey {
    Lot { job_number: String, lot_id: String },
    WorkOrder(WorkOrderKey),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Lot { job_number, lot_id } => write!(f, "{} lot {}", job_number, lot_id),
            ScopeKey::WorkOrder(key) => write!(f, "{}", key),
        }
    }
}

/// Composite identity of a node within one root traversal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub root: RootKey,
    /// Level keys below the root, outermost first (empty for the root itself)
    pub path: Vec<LevelKey>,
}

impl NodeIdentity {
    pub fn root(root: RootKey) -> Self {
        Self {
            root,
            path: Vec::new(),
        }
    }

    /// Identity of a child one level below this one
    pub fn child(&self, key: LevelKey) -> Self {
        let mut path = self.path.clone();
        path.push(key);
        Self {
            root: self.root.clone(),
            path,
        }
    }

    /// Key of the addressed level (the root's own key for a root identity)
    pub fn leaf(&self) -> LevelKey {
        self.path
            .last()
            .cloned()
            .unwrap_or_else(|| self.root.level_key())
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for key in &self.path {
            write!(f, " > {}", key)?;
        }
        Ok(())
    }
}
