//! Post-migration reconciliation utilities.
//!
//! The import is a one-shot forward pass; some cross-entity structure can
//! only be repaired afterwards, once every entity has a target ID. Each
//! utility here rebuilds the source-to-target correspondence from a
//! [`WorkspaceSnapshot`](crate::workspace::WorkspaceSnapshot) and then
//! writes only the difference between desired and current state, so every
//! utility is safe to re-run.
//!
//! Mismatches (ambiguous epic, missing target ID) are warned about and
//! skipped, never guessed.

pub mod blockers;
pub mod epics;
pub mod rewrite;
