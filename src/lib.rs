// ABOUTME: Library root for fairing-replicator
// ABOUTME: Exposes the API client, replication engine, output sinks and CLI commands

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod replication;

pub use error::ReplicationError;
