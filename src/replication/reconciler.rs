// ABOUTME: Page reconciler - turns newest-first API pages into oldest-first order
// ABOUTME: Checkpoints may only advance in ascending id order, so emission must be ascending

use crate::api::Page;

/// Reverse a page's record order.
///
/// The API always delivers newest-first; emitting oldest-first lets the
/// checkpoint advance one record at a time without ever moving backwards.
/// Nothing but the order changes.
pub fn reconcile(mut page: Page) -> Page {
    page.records.reverse();
    page
}
