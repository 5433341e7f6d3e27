// ABOUTME: Wire types for the Fairing REST API: page requests, pages and records
// ABOUTME: Also owns the timestamp wire format and the record id ordering

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::ReplicationError;

/// Format the upstream accepts for the `until` query parameter.
pub const UNTIL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Every search probe asks for this many records, whatever the configured page size.
pub const PROBE_LIMIT: u32 = 100;

/// Position a page request continues from. Exactly one cursor is ever set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Continue the walk after this record id.
    BeforeId(String),
    /// Newest records inserted at or before this instant.
    Until(DateTime<Utc>),
}

/// An immutable description of one `GET /responses` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Cursor,
    pub limit: u32,
}

impl PageRequest {
    pub fn before(id: impl Into<String>, limit: u32) -> Self {
        Self {
            cursor: Cursor::BeforeId(id.into()),
            limit,
        }
    }

    pub fn until(at: DateTime<Utc>, limit: u32) -> Self {
        Self {
            cursor: Cursor::Until(at),
            limit,
        }
    }

    /// Search probes always use the fixed probe limit.
    pub fn probe(at: DateTime<Utc>) -> Self {
        Self::until(at, PROBE_LIMIT)
    }

    /// Query parameters in the shape the upstream expects.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let cursor = match &self.cursor {
            Cursor::BeforeId(id) => ("before", id.clone()),
            Cursor::Until(at) => ("until", format_until(at)),
        };
        vec![cursor, ("limit", self.limit.to_string())]
    }
}

/// A single upstream record. Fields beyond `id` and `inserted_at` are passed
/// through untouched apart from normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The record id as a string; numeric ids are rendered in decimal.
    pub fn id(&self) -> Result<String, ReplicationError> {
        match self.fields.get("id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(ReplicationError::MissingField("id")),
        }
    }

    pub fn inserted_at(&self) -> Result<DateTime<Utc>, ReplicationError> {
        match self.fields.get("inserted_at") {
            Some(Value::String(raw)) => parse_timestamp("inserted_at", raw),
            Some(other) => Err(ReplicationError::MalformedTimestamp {
                field: "inserted_at",
                value: other.to_string(),
            }),
            None => Err(ReplicationError::MissingField("inserted_at")),
        }
    }
}

/// One page of records exactly as the upstream delivered it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Page {
    pub records: Vec<Record>,
}

impl Page {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }
}

/// Envelope wrapping every Fairing API response body.
#[derive(Debug, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Render a timestamp in the only format `until` accepts.
pub fn format_until(at: &DateTime<Utc>) -> String {
    at.format(UNTIL_FORMAT).to_string()
}

/// Parse an upstream timestamp.
///
/// The API emits RFC 3339 with an offset on some fields and a bare naive
/// timestamp on others; naive values are taken as UTC.
pub fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, ReplicationError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| ReplicationError::MalformedTimestamp {
            field,
            value: raw.to_string(),
        })
}

/// RFC 3339 rendering used in emitted messages.
pub fn to_rfc3339(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Total order over record ids.
///
/// Fairing ids are decimal strings, so two all-digit ids compare numerically
/// without parsing (which could overflow); anything else falls back to plain
/// string order.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}
