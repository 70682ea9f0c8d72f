//! CLI command implementations

pub mod bom;
pub mod completions;
pub mod search;
pub mod wo;
