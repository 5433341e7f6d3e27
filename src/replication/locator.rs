// ABOUTME: Cold-start locator - binary search over time for the first page at or after start_date
// ABOUTME: Only runs when no checkpoint exists; hands the paginator its first PageRequest

use chrono::{DateTime, Duration, Utc};

use crate::api::{Page, PageRequest, ResponsesApi, PROBE_LIMIT};
use crate::error::ReplicationError;

/// Source of the current wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Result of a cold-start search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedStart {
    /// First request the paginator should issue.
    pub request: PageRequest,
    /// Records exist at or before the configured start date.
    pub records_before_start: bool,
    /// Number of probe requests spent finding the boundary.
    pub probes: u32,
}

/// How a probe page relates to the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeResult {
    /// Nothing at or before the probe time; the boundary is later.
    Empty,
    /// The page straddles the boundary.
    Partial,
    /// At least a full probe page of older records; the boundary is earlier.
    Full,
}

impl ProbeResult {
    fn classify(page: &Page) -> Self {
        match page.len() {
            0 => ProbeResult::Empty,
            n if n >= PROBE_LIMIT as usize => ProbeResult::Full,
            _ => ProbeResult::Partial,
        }
    }
}

/// Candidate upper bound plus the remaining uncertainty around it.
#[derive(Debug, Clone, Copy)]
struct SearchWindow {
    window_end: DateTime<Utc>,
    half_width: Duration,
}

impl SearchWindow {
    fn later(self) -> Self {
        let step = self.half_width / 2;
        Self {
            window_end: self.window_end + step,
            half_width: step,
        }
    }

    fn earlier(self) -> Self {
        let step = self.half_width / 2;
        Self {
            window_end: self.window_end - step,
            half_width: step,
        }
    }
}

/// Upper bound on bisection steps for a window of `width`.
///
/// `until` is expressed in microseconds on the wire, so once the window has
/// been halved down to a single microsecond further steps cannot change the
/// probe.
pub fn max_iterations(width: Duration) -> u32 {
    let micros = width.num_microseconds().unwrap_or(i64::MAX).max(1);
    (i64::BITS - micros.leading_zeros()) + 2
}

pub struct ColdStartLocator<'a, A, C> {
    api: &'a A,
    clock: &'a C,
    start_date: DateTime<Utc>,
    page_size: u32,
}

impl<'a, A: ResponsesApi, C: Clock> ColdStartLocator<'a, A, C> {
    pub fn new(api: &'a A, clock: &'a C, start_date: DateTime<Utc>, page_size: u32) -> Self {
        Self {
            api,
            clock,
            start_date,
            page_size,
        }
    }

    /// Find the request whose page begins at the first record at or after `start_date`.
    pub async fn locate(&self) -> Result<LocatedStart, ReplicationError> {
        let mut probes = 0u32;
        let now = self.clock.now();
        if self.start_date > now {
            return Err(self.exhausted(format!(
                "start_date is later than the current time {}",
                now
            )));
        }

        // A non-empty page at start_date means older data exists; continue right after it.
        let at_start = self.probe(self.start_date, &mut probes).await?;
        if let Some(newest) = at_start.first() {
            tracing::warn!(
                "There are records available before start_date {}. \
                 Consider removing that config if you wish to replicate all data.",
                self.start_date
            );
            return Ok(LocatedStart {
                request: PageRequest::before(newest.id()?, self.page_size),
                records_before_start: true,
                probes,
            });
        }

        let mut window = SearchWindow {
            window_end: now,
            half_width: now - self.start_date,
        };
        let limit = max_iterations(window.half_width);

        for _ in 0..limit {
            if window.window_end > self.clock.now() {
                return Err(
                    self.exhausted("search window moved past the current time".to_string())
                );
            }

            let page = self.probe(window.window_end, &mut probes).await?;
            match ProbeResult::classify(&page) {
                ProbeResult::Empty => {
                    tracing::debug!(
                        "No records at {}, searching more recent timestamp",
                        window.window_end
                    );
                    window = window.later();
                }
                ProbeResult::Partial => {
                    tracing::debug!(
                        "Found a partial page of records at {}, returning first page",
                        window.window_end
                    );
                    return self.boundary_request(window.window_end, &page, probes);
                }
                ProbeResult::Full => {
                    // The full page may already reach back to the very first record.
                    // Re-probe at its oldest instant: if that returns only the page's
                    // own records at that instant, nothing older exists.
                    let oldest = page
                        .last()
                        .ok_or(ReplicationError::MissingField("data"))?
                        .inserted_at()?;
                    let mut at_oldest = 0usize;
                    for record in &page.records {
                        if record.inserted_at()? == oldest {
                            at_oldest += 1;
                        }
                    }

                    let edge = self.probe(oldest, &mut probes).await?;
                    match ProbeResult::classify(&edge) {
                        ProbeResult::Full => {
                            tracing::debug!(
                                "Full page of records at {}, searching older timestamp",
                                window.window_end
                            );
                            window = window.earlier();
                        }
                        _ if edge.len() == at_oldest => {
                            tracing::debug!(
                                "Full page at {} holds the oldest records",
                                window.window_end
                            );
                            return self.boundary_request(window.window_end, &page, probes);
                        }
                        _ => {
                            tracing::debug!("Found a partial page of records at {}", oldest);
                            return self.boundary_request(oldest, &edge, probes);
                        }
                    }
                }
            }
        }

        Err(self.exhausted(format!(
            "no partial page found after {} search iterations",
            limit
        )))
    }

    /// Turn a page that straddles the boundary into the paginator's first request.
    fn boundary_request(
        &self,
        probed_at: DateTime<Utc>,
        page: &Page,
        probes: u32,
    ) -> Result<LocatedStart, ReplicationError> {
        let count = page.len();
        let page_size = self.page_size as usize;

        let until = if count < page_size {
            probed_at
        } else {
            // page_size-th record counted from the oldest end; reformatted on the wire
            page.records[count - page_size].inserted_at()?
        };

        Ok(LocatedStart {
            request: PageRequest::until(until, self.page_size),
            records_before_start: false,
            probes,
        })
    }

    async fn probe(&self, at: DateTime<Utc>, probes: &mut u32) -> Result<Page, ReplicationError> {
        *probes += 1;
        let page = self.api.fetch_responses(&PageRequest::probe(at)).await?;
        tracing::trace!("Probe {} at {} returned {} records", probes, at, page.len());
        Ok(page)
    }

    fn exhausted(&self, reason: String) -> ReplicationError {
        ReplicationError::ColdStartExhaustion {
            start_date: self.start_date.to_rfc3339(),
            reason,
        }
    }
}
