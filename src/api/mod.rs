// ABOUTME: Fairing API access - HTTP client, wire models and the paging seam
// ABOUTME: ResponsesApi is the only thing the replication core needs from the network

pub mod client;
pub mod models;

pub use client::{FairingClient, DEFAULT_API_URL};
pub use models::{compare_ids, Cursor, Page, PageRequest, Record, PROBE_LIMIT};

use crate::error::ReplicationError;

/// Source of `GET /responses` pages.
///
/// Implemented by [`FairingClient`] over HTTP and by in-memory fakes in tests.
/// Calls are issued strictly one at a time.
#[allow(async_fn_in_trait)]
pub trait ResponsesApi {
    async fn fetch_responses(&self, request: &PageRequest) -> Result<Page, ReplicationError>;
}
