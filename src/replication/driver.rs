// ABOUTME: ReplicationDriver - orchestrates one incremental sync of the responses stream
// ABOUTME: Chooses cold start vs resume, pages, reorders, normalizes, emits and checkpoints

use chrono::{DateTime, Utc};
use std::time::Instant;

use super::locator::{Clock, ColdStartLocator};
use super::normalizer::normalize_response;
use super::paginator::Paginator;
use super::reconciler::reconcile;
use super::state::{Checkpoint, StreamState};
use crate::api::ResponsesApi;
use crate::error::ReplicationError;
use crate::output::RecordSink;

/// Stream name used in emitted messages and persisted state.
pub const RESPONSES_STREAM: &str = "responses";

/// Phases of a single sync invocation.
///
/// `ColdStart -> Search -> Paging -> Done` without a checkpoint,
/// `Resume -> Paging -> Done` with one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    ColdStart,
    Search,
    Resume,
    Paging,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    ColdStart,
    Resume,
}

/// Settings the driver needs from the tap configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub start_date: DateTime<Utc>,
    pub page_size: u32,
}

/// Statistics from a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub mode: SyncMode,
    pub probes: u32,
    pub records_before_start: bool,
    pub pages_fetched: u64,
    pub records_emitted: u64,
    pub duration_ms: u64,
}

pub struct ReplicationDriver<'a, A, C> {
    api: &'a A,
    clock: &'a C,
    config: DriverConfig,
    phases: Vec<SyncPhase>,
}

impl<'a, A: ResponsesApi, C: Clock> ReplicationDriver<'a, A, C> {
    pub fn new(api: &'a A, clock: &'a C, config: DriverConfig) -> Self {
        Self {
            api,
            clock,
            config,
            phases: Vec::new(),
        }
    }

    /// Phases visited by the most recent run, in order.
    pub fn phases(&self) -> &[SyncPhase] {
        &self.phases
    }

    pub fn phase(&self) -> Option<SyncPhase> {
        self.phases.last().copied()
    }

    fn transition(&mut self, next: SyncPhase) {
        match self.phases.last() {
            Some(previous) => tracing::debug!("Sync phase {:?} -> {:?}", previous, next),
            None => tracing::debug!("Sync phase {:?}", next),
        }
        self.phases.push(next);
    }

    /// Run one sync to exhaustion.
    ///
    /// `state` is updated after every emitted record, so when this returns an
    /// error it still holds the last checkpoint that was safely advanced.
    pub async fn run<S: RecordSink>(
        &mut self,
        state: &mut StreamState,
        sink: &mut S,
    ) -> Result<SyncStats, ReplicationError> {
        let started = Instant::now();
        let mut stats = SyncStats::default();
        self.phases.clear();

        let mut checkpoint = Checkpoint::from_state(state);
        let mut paginator = match checkpoint.cursor() {
            None => {
                self.transition(SyncPhase::ColdStart);
                tracing::info!(
                    "No state found, looking for oldest results after start_date: {}",
                    self.config.start_date
                );
                self.transition(SyncPhase::Search);
                let located = ColdStartLocator::new(
                    self.api,
                    self.clock,
                    self.config.start_date,
                    self.config.page_size,
                )
                .locate()
                .await?;
                stats.mode = SyncMode::ColdStart;
                stats.probes = located.probes;
                stats.records_before_start = located.records_before_start;
                tracing::info!(
                    "Starting replication with params {:?}",
                    located.request.query_params()
                );
                Paginator::new(self.api, located.request, self.config.page_size)
            }
            Some(cursor) => {
                self.transition(SyncPhase::Resume);
                stats.mode = SyncMode::Resume;
                tracing::info!("Resuming replication after response {}", cursor);
                Paginator::resume(self.api, cursor, self.config.page_size)
            }
        };
        self.transition(SyncPhase::Paging);

        while let Some(page) = paginator.next_page().await? {
            for record in reconcile(page).records {
                let record = normalize_response(record)?;
                let id = record.id()?;
                sink.write_record(RESPONSES_STREAM, &record)?;
                stats.records_emitted += 1;

                if checkpoint.advance(&id) {
                    state.starting_replication_value = Some(id);
                } else {
                    tracing::warn!(
                        "Record {} does not sort after checkpoint {:?}; checkpoint not advanced",
                        id,
                        checkpoint.cursor()
                    );
                }
            }
            sink.write_state(RESPONSES_STREAM, state)?;

            let pages = paginator.pages_fetched();
            if pages % 10 == 0 {
                tracing::info!(
                    "Progress: {} - {} records emitted ({} pages), checkpoint: {:?}",
                    RESPONSES_STREAM,
                    stats.records_emitted,
                    pages,
                    state.checkpoint()
                );
            }
        }

        stats.pages_fetched = paginator.pages_fetched();
        state.finish(stats.records_emitted);
        sink.write_state(RESPONSES_STREAM, state)?;
        self.transition(SyncPhase::Done);

        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Completed sync for {}: {} records in {} pages, checkpoint: {:?}",
            RESPONSES_STREAM,
            stats.records_emitted,
            stats.pages_fetched,
            state.checkpoint()
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Cursor, Page, PageRequest, Record};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::cell::RefCell;
    use std::io;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Ten records an hour apart; ids 101..=110.
    struct HourlyApi {
        first: DateTime<Utc>,
        requests: RefCell<Vec<PageRequest>>,
    }

    impl HourlyApi {
        fn records(&self) -> Vec<(u64, DateTime<Utc>)> {
            (0..10)
                .map(|i| (101 + i as u64, self.first + Duration::hours(i)))
                .collect()
        }
    }

    impl ResponsesApi for HourlyApi {
        async fn fetch_responses(&self, request: &PageRequest) -> Result<Page, ReplicationError> {
            self.requests.borrow_mut().push(request.clone());
            let all = self.records();
            let mut selected: Vec<_> = match &request.cursor {
                Cursor::Until(until) => {
                    let older: Vec<_> = all.into_iter().filter(|(_, at)| at <= until).collect();
                    let skip = older.len().saturating_sub(request.limit as usize);
                    older.into_iter().skip(skip).collect()
                }
                Cursor::BeforeId(id) => {
                    let after: u64 = id.parse().unwrap();
                    all.into_iter()
                        .filter(|(rid, _)| *rid > after)
                        .take(request.limit as usize)
                        .collect()
                }
            };
            selected.reverse();
            Ok(Page::new(
                selected
                    .into_iter()
                    .map(|(id, at)| {
                        serde_json::from_value::<Record>(json!({
                            "id": id.to_string(),
                            "inserted_at": crate::api::models::to_rfc3339(&at),
                            "order_total": "10.50",
                        }))
                        .unwrap()
                    })
                    .collect(),
            ))
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        ids: Vec<String>,
        states: Vec<String>,
    }

    impl RecordSink for CollectingSink {
        fn write_record(&mut self, _stream: &str, record: &Record) -> io::Result<()> {
            assert_eq!(record.get("order_total"), Some(&json!(10.5)));
            self.ids.push(record.id().unwrap());
            Ok(())
        }

        fn write_state(&mut self, _stream: &str, state: &StreamState) -> io::Result<()> {
            self.states.push(state.checkpoint().unwrap_or_default().to_string());
            Ok(())
        }
    }

    fn config(page_size: u32) -> DriverConfig {
        DriverConfig {
            start_date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            page_size,
        }
    }

    fn api() -> HourlyApi {
        HourlyApi {
            first: Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap(),
            requests: RefCell::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_cold_start_emits_everything_in_order() {
        let api = api();
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut driver = ReplicationDriver::new(&api, &clock, config(4));
        let mut state = StreamState::new();
        let mut sink = CollectingSink::default();

        let stats = driver.run(&mut state, &mut sink).await.unwrap();

        let expected: Vec<String> = (101..=110).map(|id: u64| id.to_string()).collect();
        assert_eq!(sink.ids, expected);
        assert_eq!(state.checkpoint(), Some("110"));
        assert_eq!(stats.mode, SyncMode::ColdStart);
        assert_eq!(stats.records_emitted, 10);
        assert_eq!(
            driver.phases(),
            &[
                SyncPhase::ColdStart,
                SyncPhase::Search,
                SyncPhase::Paging,
                SyncPhase::Done
            ]
        );
        // one STATE per page plus the final one
        assert_eq!(sink.states.first().map(String::as_str), Some("104"));
        assert_eq!(sink.states.last().map(String::as_str), Some("110"));
    }

    #[tokio::test]
    async fn test_resume_skips_search() {
        let api = api();
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut driver = ReplicationDriver::new(&api, &clock, config(100));
        let mut state = StreamState::new();
        state.starting_replication_value = Some("107".to_string());
        let mut sink = CollectingSink::default();

        let stats = driver.run(&mut state, &mut sink).await.unwrap();

        assert_eq!(sink.ids, vec!["108", "109", "110"]);
        assert_eq!(stats.mode, SyncMode::Resume);
        assert_eq!(stats.probes, 0);
        assert_eq!(
            driver.phases(),
            &[SyncPhase::Resume, SyncPhase::Paging, SyncPhase::Done]
        );
        assert_eq!(
            api.requests.borrow()[0],
            PageRequest::before("107", 100)
        );
    }

    #[tokio::test]
    async fn test_resume_with_nothing_new_keeps_checkpoint() {
        let api = api();
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut driver = ReplicationDriver::new(&api, &clock, config(100));
        let mut state = StreamState::new();
        state.starting_replication_value = Some("110".to_string());
        let mut sink = CollectingSink::default();

        let stats = driver.run(&mut state, &mut sink).await.unwrap();

        assert!(sink.ids.is_empty());
        assert_eq!(stats.pages_fetched, 1);
        assert_eq!(state.checkpoint(), Some("110"));
        assert_eq!(state.last_record_count, 0);
        assert!(state.last_sync_at.is_some());
    }
}
