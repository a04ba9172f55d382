//! Periodic valuation refresh for a watched set of codes.
//!
//! A [`ValuationPoller`] runs one *session* per (codes, interval) pair. A
//! session fetches immediately, then on every tick of its interval. Each tick
//! runs its cycle as a separate task, so cycles may overlap; every cycle takes
//! a sequence number and only a completion newer than the last applied one is
//! written. Tearing a session down aborts its timer and bumps the session id,
//! which turns the completion of any cycle still in flight into a no-op.

use crate::core::code::unique_codes;
use crate::core::{Fund, InstrumentCode, ValuationError};
use crate::valuation::ValuationSource;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(10);

/// What a consumer of the poller gets to see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValuationSnapshot {
    pub funds: Vec<Fund>,
    /// A cycle of the current session is in flight
    pub loading: bool,
    /// Set by a failed cycle, cleared by the next successful one
    pub error: Option<String>,
    /// Sequence number of the last applied cycle, 0 before any. Changes
    /// exactly when `funds` or `error` were written by a cycle.
    pub revision: u64,
}

impl ValuationSnapshot {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Default)]
struct PollState {
    session: u64,
    next_seq: u64,
    applied_seq: u64,
    in_flight: usize,
    funds: Vec<Fund>,
    error: Option<String>,
}

impl PollState {
    fn snapshot(&self) -> ValuationSnapshot {
        ValuationSnapshot {
            funds: self.funds.clone(),
            loading: self.in_flight > 0,
            error: self.error.clone(),
            revision: self.applied_seq,
        }
    }
}

struct Shared {
    state: Mutex<PollState>,
    updates: watch::Sender<ValuationSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PollState> {
        // State is only ever mutated in small synchronous steps
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &PollState) {
        self.updates.send_replace(state.snapshot());
    }

    fn current_session(&self) -> u64 {
        self.lock().session
    }

    /// Invalidates every cycle of the previous session and returns the new id.
    fn next_session(&self, clear: bool) -> u64 {
        let mut state = self.lock();
        state.session += 1;
        state.in_flight = 0;
        if clear {
            state.funds.clear();
            state.error = None;
        }
        self.publish(&state);
        state.session
    }

    fn begin(&self, session: u64) -> Option<u64> {
        let mut state = self.lock();
        if state.session != session {
            return None;
        }
        state.next_seq += 1;
        state.in_flight += 1;
        self.publish(&state);
        Some(state.next_seq)
    }

    fn complete(&self, session: u64, seq: u64, result: Result<Vec<Fund>, ValuationError>) {
        let mut state = self.lock();
        if state.session != session {
            debug!(session, seq, "Discarding result of a torn down session");
            return;
        }
        state.in_flight = state.in_flight.saturating_sub(1);

        if seq <= state.applied_seq {
            debug!(seq, applied = state.applied_seq, "Discarding stale result");
        } else {
            state.applied_seq = seq;
            match result {
                Ok(funds) => {
                    debug!(seq, count = funds.len(), "Applying valuations");
                    state.funds = funds;
                    state.error = None;
                }
                Err(e) => {
                    warn!(seq, error = %e, "Valuation refresh failed, keeping previous results");
                    state.error = Some(e.to_string());
                }
            }
        }
        self.publish(&state);
    }
}

async fn run_cycle<V>(
    shared: Arc<Shared>,
    source: Arc<V>,
    codes: Arc<[InstrumentCode]>,
    session: u64,
) where
    V: ValuationSource + ?Sized,
{
    let Some(seq) = shared.begin(session) else {
        return;
    };
    let result = source.fetch_valuations(&codes).await;
    shared.complete(session, seq, result);
}

/// Keeps the valuations of a watched set of codes fresh.
///
/// Must be driven from within a tokio runtime. Dropping the poller detaches
/// it.
pub struct ValuationPoller<V: ValuationSource + 'static> {
    source: Arc<V>,
    shared: Arc<Shared>,
    codes: Arc<[InstrumentCode]>,
    interval: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl<V: ValuationSource + 'static> ValuationPoller<V> {
    pub fn new(source: Arc<V>) -> Self {
        let (updates, _) = watch::channel(ValuationSnapshot::default());
        Self {
            source,
            shared: Arc::new(Shared {
                state: Mutex::new(PollState::default()),
                updates,
            }),
            codes: Arc::from(Vec::new()),
            interval: DEFAULT_REFRESH_INTERVAL,
            ticker: None,
        }
    }

    /// Sets the watched codes and refresh interval.
    ///
    /// Unchanged inputs keep the running schedule. Otherwise the schedule is
    /// restarted with an immediate fetch, or stopped when `codes` is empty.
    pub fn watch(&mut self, codes: Vec<InstrumentCode>, interval: Duration) {
        let codes = unique_codes(&codes);
        let interval = interval.max(MIN_REFRESH_INTERVAL);
        if self.ticker.is_some() && *self.codes == codes[..] && self.interval == interval {
            return;
        }

        self.abort_ticker();
        self.codes = Arc::from(codes);
        self.interval = interval;

        if self.codes.is_empty() {
            self.shared.next_session(true);
            info!("Watched set is empty, polling stopped");
            return;
        }

        let session = self.shared.next_session(false);
        info!(
            session,
            count = self.codes.len(),
            interval_ms = interval.as_millis() as u64,
            "Polling valuations"
        );

        let shared = Arc::clone(&self.shared);
        let source = Arc::clone(&self.source);
        let codes = Arc::clone(&self.codes);
        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // The first tick completes immediately
                ticks.tick().await;
                tokio::spawn(run_cycle(
                    Arc::clone(&shared),
                    Arc::clone(&source),
                    Arc::clone(&codes),
                    session,
                ));
            }
        }));
    }

    /// Changes the watched codes, keeping the current interval.
    pub fn set_codes(&mut self, codes: Vec<InstrumentCode>) {
        self.watch(codes, self.interval);
    }

    /// Changes the interval, keeping the current codes.
    pub fn set_interval(&mut self, interval: Duration) {
        self.watch(self.codes.to_vec(), interval);
    }

    /// Runs one cycle now, leaving the schedule alone. Does nothing while idle.
    pub async fn refresh(&self) {
        if self.ticker.is_none() {
            debug!("Manual refresh ignored, nothing is watched");
            return;
        }
        let session = self.shared.current_session();
        run_cycle(
            Arc::clone(&self.shared),
            Arc::clone(&self.source),
            Arc::clone(&self.codes),
            session,
        )
        .await;
    }

    /// Starts one cycle now in the background, leaving the schedule alone.
    /// Returns `false` while idle.
    pub fn spawn_refresh(&self) -> bool {
        if self.ticker.is_none() {
            debug!("Manual refresh ignored, nothing is watched");
            return false;
        }
        let session = self.shared.current_session();
        tokio::spawn(run_cycle(
            Arc::clone(&self.shared),
            Arc::clone(&self.source),
            Arc::clone(&self.codes),
            session,
        ));
        true
    }

    /// Stops polling and drops the results. Cycles still in flight are ignored
    /// when they complete.
    pub fn detach(&mut self) {
        if self.abort_ticker() {
            info!("Valuation poller detached");
        }
        self.codes = Arc::from(Vec::new());
        self.shared.next_session(true);
    }

    pub fn is_polling(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn codes(&self) -> &[InstrumentCode] {
        &self.codes
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn snapshot(&self) -> ValuationSnapshot {
        self.shared.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ValuationSnapshot> {
        self.shared.updates.subscribe()
    }

    fn abort_ticker(&mut self) -> bool {
        match self.ticker.take() {
            Some(ticker) => {
                ticker.abort();
                true
            }
            None => false,
        }
    }
}

impl<V: ValuationSource + 'static> Drop for ValuationPoller<V> {
    fn drop(&mut self) {
        self.abort_ticker();
        self.shared.next_session(true);
    }
}
