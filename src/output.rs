// ABOUTME: Output sinks for replicated records and checkpoint state
// ABOUTME: SingerWriter emits newline-delimited RECORD/STATE messages

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::io::{self, Write};

use crate::api::models::to_rfc3339;
use crate::api::Record;
use crate::replication::StreamState;

/// Destination for emitted records.
///
/// Records arrive in ascending order; `write_state` is called whenever the
/// checkpoint it carries is safe to persist.
pub trait RecordSink {
    fn write_record(&mut self, stream: &str, record: &Record) -> io::Result<()>;

    fn write_state(&mut self, stream: &str, state: &StreamState) -> io::Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum Message<'a> {
    Record {
        stream: &'a str,
        record: &'a Record,
        time_extracted: String,
    },
    State {
        value: serde_json::Value,
    },
}

/// Writes Singer-style JSON lines to any writer (stdout in the CLI).
pub struct SingerWriter<W: Write> {
    out: W,
    time_extracted: DateTime<Utc>,
}

impl<W: Write> SingerWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            time_extracted: Utc::now(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_message(&mut self, message: &Message<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write> RecordSink for SingerWriter<W> {
    fn write_record(&mut self, stream: &str, record: &Record) -> io::Result<()> {
        let time_extracted = to_rfc3339(&self.time_extracted);
        self.write_message(&Message::Record {
            stream,
            record,
            time_extracted,
        })
    }

    fn write_state(&mut self, stream: &str, state: &StreamState) -> io::Result<()> {
        let value = json!({ "bookmarks": { stream: state } });
        self.write_message(&Message::State { value })?;
        self.out.flush()
    }
}
