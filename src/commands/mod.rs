// ABOUTME: Command implementations for the replicator CLI
// ABOUTME: Exports the incremental responses sync and the questions export

pub mod questions;
pub mod sync;
