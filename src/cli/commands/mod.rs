//! Command implementations.

pub mod delete;
pub mod import;
pub mod reconcile;
