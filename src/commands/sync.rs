// ABOUTME: `sync` command - one incremental run of the responses stream
// ABOUTME: Loads config and state, drives replication to stdout, persists the checkpoint

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

use crate::api::FairingClient;
use crate::config::TapConfig;
use crate::output::SingerWriter;
use crate::replication::{
    ReplicationDriver, ReplicationState, StreamState, SyncMode, SyncStats, SystemClock,
    RESPONSES_STREAM,
};

pub struct SyncOptions {
    pub config_path: PathBuf,
    pub state_path: PathBuf,
    pub secret_token: Option<String>,
}

/// Run one sync, writing records to `out`.
///
/// The state file is saved whether or not the sync succeeds, so a failed run
/// keeps every checkpoint advance it made before the failure.
pub async fn run<W: Write>(opts: SyncOptions, out: W) -> Result<SyncStats> {
    let config = TapConfig::load(&opts.config_path, opts.secret_token)?;
    tracing::debug!("Loaded {:?}", config);

    let client =
        FairingClient::new(&config.api_url, &config.secret_token, config.request_timeout())?;
    let driver_config = config.driver_config()?;

    let mut state = ReplicationState::load_or_create(&opts.state_path).await?;
    let stream_state = state.stream_mut(RESPONSES_STREAM);

    let clock = SystemClock;
    let mut driver = ReplicationDriver::new(&client, &clock, driver_config);
    let mut sink = SingerWriter::new(out);
    let result = driver.run(stream_state, &mut sink).await;

    state
        .save(&opts.state_path)
        .await
        .context("Failed to persist replication checkpoint")?;

    let stats = result.map_err(|err| {
        let checkpoint = state
            .stream(RESPONSES_STREAM)
            .and_then(StreamState::checkpoint)
            .unwrap_or("<none>");
        let hint = if err.is_transport() {
            "; the Fairing API request failed, rerun to continue from the checkpoint"
        } else {
            ""
        };
        anyhow::Error::new(err).context(format!(
            "Sync of {} stopped during {:?}; checkpoint kept at {}{}",
            RESPONSES_STREAM,
            driver.phase(),
            checkpoint,
            hint
        ))
    })?;

    let mode = match stats.mode {
        SyncMode::ColdStart => "cold start",
        SyncMode::Resume => "resume",
    };
    tracing::info!(
        "Sync finished ({}): {} records, {} pages, {} probes in {}ms",
        mode,
        stats.records_emitted,
        stats.pages_fetched,
        stats.probes,
        stats.duration_ms
    );
    Ok(stats)
}
