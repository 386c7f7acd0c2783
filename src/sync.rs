//! Deciding what to do with remote snapshots and when to save local ones.
//!
//! There is no logical clock here. Staleness and echo detection rest on wall-clock windows
//! and content fingerprints, which holds up only while one editor is active per document.

pub mod pending;
pub mod reconciler;
pub mod scheduler;

pub use pending::PendingEdits;
pub use reconciler::{Reconciler, Rejection, Verdict};
pub use scheduler::{SaveMode, SaveScheduler, SaveStatus};

#[cfg(test)]
mod test;
