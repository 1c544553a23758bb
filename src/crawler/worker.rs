// src/crawler/worker.rs
use super::state::{NextCandidate, SharedState};
use super::stats::CrawlStats;
use crate::config::Cadence;
use crate::error::{FetchError, StoreError};
use crate::fetcher::QuoteSource;
use crate::mode::Mode;
use crate::store::TickerStore;
use crate::symbols::TickerSymbol;
use crate::types::PriceSnapshot;
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;

/// One crawler worker. Runs on its own OS thread and drives fetches on the
/// crawler's shared runtime.
pub struct Worker {
    id: usize,
    state: Arc<SharedState>,
    store: Arc<TickerStore>,
    source: Arc<dyn QuoteSource>,
    stats: Arc<CrawlStats>,
    cadence: Cadence,
    runtime: Handle,
}

/// What to do with a monitored ticker after one fetch attempt (plus retry).
enum MonitorOutcome {
    Stored,
    Retired,
    Skipped,
}

impl Worker {
    pub fn new(
        id: usize,
        state: Arc<SharedState>,
        store: Arc<TickerStore>,
        source: Arc<dyn QuoteSource>,
        stats: Arc<CrawlStats>,
        cadence: Cadence,
        runtime: Handle,
    ) -> Self {
        Self {
            id,
            state,
            store,
            source,
            stats,
            cadence,
            runtime,
        }
    }

    pub fn run(&self) {
        info!("👷 Worker {} started", self.id);

        let mut observed = Mode::Invalid;
        let mut monitored: Vec<TickerSymbol> = Vec::new();

        loop {
            if self.state.mode() != observed {
                let (mode, tickers) = self.state.pick_up(self.id);
                debug!("Worker {} switching {} -> {}", self.id, observed, mode);
                observed = mode;
                monitored = tickers;
                if mode == Mode::RetrieveData {
                    info!("Worker {} monitoring {} tickers", self.id, monitored.len());
                }
            }

            match observed {
                Mode::ShutDown => break,
                Mode::Invalid => {
                    self.state.sleep_for(Mode::Invalid, self.cadence.idle_backoff);
                }
                Mode::SurveyMarket => self.survey_step(),
                Mode::RetrieveData => self.monitor_cycle(&mut monitored),
            }
        }

        info!("👷 Worker {} stopped", self.id);
    }

    /// Probes a single candidate, or backs off when there is none to take.
    fn survey_step(&self) {
        let candidate = match self.state.try_next_candidate(self.id) {
            NextCandidate::Next(candidate) => candidate,
            NextCandidate::Busy | NextCandidate::Drained => {
                self.state.sleep_for(Mode::SurveyMarket, self.cadence.idle_backoff);
                return;
            }
        };

        self.stats.record_probe();
        match self.fetch(&candidate) {
            Ok(_) => match self.store.append_to_bucket(&candidate) {
                Ok(()) => {
                    self.stats.record_validated();
                    info!("✅ Worker {} found ticker {}", self.id, candidate);
                }
                Err(StoreError::DuplicateSymbol(_)) => {
                    debug!("Ticker {} already recorded", candidate);
                }
                Err(e) => {
                    self.stats.record_unexpected();
                    error!("Worker {} could not record {}: {}", self.id, candidate, e);
                }
            },
            Err(e) => trace!("Candidate {} rejected: {}", candidate, e),
        }
    }

    /// Polls every monitored ticker once, then waits out the rest of the
    /// interval. Returns early as soon as the mode moves on.
    fn monitor_cycle(&self, monitored: &mut Vec<TickerSymbol>) {
        let started = Instant::now();
        let mut retired = Vec::new();

        for symbol in monitored.iter() {
            if self.state.mode() != Mode::RetrieveData {
                break;
            }
            match self.monitor_one(symbol) {
                MonitorOutcome::Retired => retired.push(symbol.clone()),
                MonitorOutcome::Stored | MonitorOutcome::Skipped => {}
            }
        }

        if !retired.is_empty() {
            monitored.retain(|symbol| !retired.contains(symbol));
        }

        if self.state.mode() == Mode::RetrieveData {
            debug!(
                "Worker {} finished a monitor pass in {:?}",
                self.id,
                started.elapsed()
            );
            self.state
                .sleep_until(Mode::RetrieveData, started + self.cadence.monitor_interval);
        }
    }

    fn monitor_one(&self, symbol: &TickerSymbol) -> MonitorOutcome {
        match self.fetch_with_retry(symbol) {
            Ok(snapshot) => match self.store.append_snapshot(symbol, &snapshot) {
                Ok(()) => {
                    self.stats.record_snapshot();
                    trace!("{} @ {}", symbol, snapshot.price);
                    MonitorOutcome::Stored
                }
                Err(e) => {
                    self.stats.record_unexpected();
                    error!("Worker {} could not store snapshot for {}: {}", self.id, symbol, e);
                    MonitorOutcome::Skipped
                }
            },
            Err(FetchError::Parse(reason)) => {
                warn!("🗑️ {} no longer has a quote ({}). Removing it.", symbol, reason);
                match self.store.remove_from_bucket(symbol) {
                    Ok(_) => self.stats.record_removed(),
                    Err(e) => {
                        self.stats.record_unexpected();
                        error!("Could not remove {} from its bucket: {}", symbol, e);
                    }
                }
                MonitorOutcome::Retired
            }
            Err(FetchError::Network(reason)) => {
                warn!("Skipping {} this cycle after retry: {}", symbol, reason);
                MonitorOutcome::Skipped
            }
        }
    }

    /// A transient failure earns exactly one retry after `retry_delay`.
    fn fetch_with_retry(&self, symbol: &TickerSymbol) -> Result<PriceSnapshot, FetchError> {
        match self.fetch(symbol) {
            Err(e) if e.is_transient() => {
                self.stats.record_network_failure();
                debug!("Worker {} retrying {} after: {}", self.id, symbol, e);
                if self.state.sleep_for(Mode::RetrieveData, self.cadence.retry_delay) != Mode::RetrieveData {
                    return Err(e);
                }
                let retried = self.fetch(symbol);
                match &retried {
                    Ok(_) => self.stats.record_retry_recovered(),
                    Err(e) if e.is_transient() => self.stats.record_network_failure(),
                    Err(_) => {}
                }
                retried
            }
            other => other,
        }
    }

    fn fetch(&self, symbol: &TickerSymbol) -> Result<PriceSnapshot, FetchError> {
        self.runtime.block_on(self.source.fetch(symbol))
    }
}
