// ABOUTME: Incremental paginator - walks /responses pages with before-id cursors
// ABOUTME: Continues until the upstream returns an empty page

use crate::api::{Page, PageRequest, ResponsesApi};
use crate::error::ReplicationError;

/// Request that continues the walk after `page`, or `None` once the page is empty.
///
/// Pages arrive newest-first, so the cursor is the first record as delivered,
/// which is also the last record emitted for the page.
pub fn next_request(page: &Page, page_size: u32) -> Result<Option<PageRequest>, ReplicationError> {
    match page.first() {
        Some(newest) => Ok(Some(PageRequest::before(newest.id()?, page_size))),
        None => Ok(None),
    }
}

/// Pull-based page iterator over `GET /responses`.
///
/// Each request is an immutable [`PageRequest`]; the next one is derived only
/// from the page just fetched. Short pages do not end the walk because the API
/// never signals a last page, so one more request is always made until a page
/// comes back empty.
pub struct Paginator<'a, A> {
    api: &'a A,
    page_size: u32,
    next: Option<PageRequest>,
    pages_fetched: u64,
}

impl<'a, A: ResponsesApi> Paginator<'a, A> {
    /// Start from an explicit request (the cold-start locator's result).
    pub fn new(api: &'a A, first_request: PageRequest, page_size: u32) -> Self {
        Self {
            api,
            page_size,
            next: Some(first_request),
            pages_fetched: 0,
        }
    }

    /// Start right after a previously checkpointed record id.
    pub fn resume(api: &'a A, checkpoint: &str, page_size: u32) -> Self {
        Self::new(api, PageRequest::before(checkpoint, page_size), page_size)
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Fetch the next non-empty page. Returns `Ok(None)` once exhausted.
    ///
    /// Errors are not retried; the paginator is left exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Page>, ReplicationError> {
        let Some(request) = self.next.take() else {
            return Ok(None);
        };

        let page = self.api.fetch_responses(&request).await?;
        self.pages_fetched += 1;

        self.next = next_request(&page, self.page_size)?;
        if page.is_empty() {
            tracing::debug!(
                "Empty page after {} requests, upstream exhausted for this run",
                self.pages_fetched
            );
            return Ok(None);
        }
        Ok(Some(page))
    }
}
