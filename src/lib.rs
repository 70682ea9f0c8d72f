//! OLT: Order Lookup Toolkit
//!
//! Read-only lookups over an ERP snapshot, reconstructing bills of materials
//! and work-order hierarchies lazily from flat relational rows.

pub mod cli;
pub mod core;
pub mod entities;
