// ABOUTME: Incremental replication engine for the responses stream
// ABOUTME: Cold-start search, cursor paging, page reordering, normalization and checkpointing

pub mod driver;
pub mod locator;
pub mod normalizer;
pub mod paginator;
pub mod reconciler;
pub mod state;

pub use driver::{DriverConfig, ReplicationDriver, SyncMode, SyncPhase, SyncStats, RESPONSES_STREAM};
pub use locator::{Clock, ColdStartLocator, LocatedStart, SystemClock};
pub use normalizer::{normalize_question, normalize_response};
pub use paginator::Paginator;
pub use reconciler::reconcile;
pub use state::{Checkpoint, ReplicationState, StreamState};
