// ABOUTME: Error taxonomy for the incremental replication core
// ABOUTME: Every variant is fatal to the current sync; none are retried

use thiserror::Error;

/// Failures surfaced by a sync invocation.
///
/// The CLI layer wraps these in `anyhow` with extra context; the core keeps them
/// typed so callers (and tests) can tell a misconfigured start date apart from a
/// broken upstream.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// Binary search over time never found a partial page.
    #[error(
        "Couldn't find any responses after start_date {start_date}: {reason}. \
         Are you sure you've configured everything correctly?"
    )]
    ColdStartExhaustion { start_date: String, reason: String },

    /// Upstream answered with a non-success HTTP status.
    #[error("Request to {url} failed with status {status}: {body}")]
    TransportFailure {
        status: u16,
        url: String,
        body: String,
    },

    /// The request never produced a response (connect error, timeout, ...).
    #[error("Failed to send request to {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response body was not the expected `{ "data": [...] }` envelope.
    #[error("Failed to parse response body from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed timestamp in field {field}: {value:?}")]
    MalformedTimestamp { field: &'static str, value: String },

    #[error("Record is missing required field {0}")]
    MissingField(&'static str),

    #[error("Field {field} is not numeric: {value}")]
    InvalidNumber { field: &'static str, value: String },

    /// Writing records or state to the output stream failed.
    #[error("Failed to write replication output")]
    Output(#[from] std::io::Error),
}

impl ReplicationError {
    /// True for errors caused by the upstream service rather than local state.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ReplicationError::TransportFailure { .. }
                | ReplicationError::Request { .. }
                | ReplicationError::Decode { .. }
        )
    }
}
