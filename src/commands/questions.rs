// ABOUTME: `questions` command - full export of survey questions
// ABOUTME: Not incremental; every run re-emits all questions with stringified ids

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

use crate::api::FairingClient;
use crate::config::TapConfig;
use crate::output::{RecordSink, SingerWriter};
use crate::replication::normalize_question;

pub const QUESTIONS_STREAM: &str = "questions";

pub struct QuestionsOptions {
    pub config_path: PathBuf,
    pub secret_token: Option<String>,
}

pub async fn run<W: Write>(opts: QuestionsOptions, out: W) -> Result<u64> {
    let config = TapConfig::load(&opts.config_path, opts.secret_token)?;
    let client =
        FairingClient::new(&config.api_url, &config.secret_token, config.request_timeout())?;

    let questions = client
        .fetch_questions()
        .await
        .context("Failed to fetch questions")?;

    let mut sink = SingerWriter::new(out);
    let mut emitted = 0u64;
    for question in questions {
        let question = normalize_question(question)?;
        sink.write_record(QUESTIONS_STREAM, &question)
            .context("Failed to write question record")?;
        emitted += 1;
    }
    sink.into_inner().flush().context("Failed to flush output")?;

    tracing::info!("Exported {} questions", emitted);
    Ok(emitted)
}
