// src/crawler/mod.rs
pub mod dispatcher;
pub mod partition;
pub mod state;
pub mod stats;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use partition::partition_evenly;
pub use state::{Assignment, NextCandidate, SharedState};
pub use stats::{CrawlStats, StatsSummary};
pub use worker::Worker;

use crate::config::{Cadence, CrawlerConfig};
use crate::error::{CrawlerError, Result};
use crate::fetcher::{HttpQuoteFetcher, QuoteSource};
use crate::mode::{MarketClock, Mode, ModeSource};
use crate::store::TickerStore;
use log::{error, info};
use std::future::Future;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::{Builder, Runtime};
use uuid::Uuid;

/// Threads used by the shared runtime that drives quote requests.
const IO_THREADS: usize = 2;

/// A configured but not yet running crawler.
pub struct Crawler {
    workers: usize,
    cadence: Cadence,
    store: Arc<TickerStore>,
    source: Arc<dyn QuoteSource>,
    clock: Arc<dyn ModeSource>,
}

impl Crawler {
    pub fn new(
        workers: usize,
        cadence: Cadence,
        store: Arc<TickerStore>,
        source: Arc<dyn QuoteSource>,
        clock: Arc<dyn ModeSource>,
    ) -> Self {
        Self {
            workers: workers.max(1),
            cadence,
            store,
            source,
            clock,
        }
    }

    /// Wires the real clock, the on-disk store and the HTTP fetcher.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        let store = TickerStore::open(&config.data_dir)?;
        let fetcher = HttpQuoteFetcher::new(&config.fetcher)?;
        let clock = MarketClock::new(config.market_hours);

        Ok(Self::new(
            config.workers,
            config.cadence.clone(),
            Arc::new(store),
            Arc::new(fetcher),
            Arc::new(clock),
        ))
    }

    /// Spawns the dispatcher and every worker. The crawler starts in
    /// `Invalid` and follows the clock from the dispatcher's first poll.
    pub fn start(self) -> Result<RunningCrawler> {
        let run_id = Uuid::new_v4();
        let runtime = Builder::new_multi_thread()
            .worker_threads(IO_THREADS)
            .thread_name("quote-io")
            .enable_all()
            .build()
            .map_err(|e| CrawlerError::Thread(format!("failed to build runtime: {}", e)))?;

        let state = Arc::new(SharedState::new(self.workers));
        let stats = Arc::new(CrawlStats::default());
        let mut running = RunningCrawler {
            run_id,
            runtime,
            state: Arc::clone(&state),
            stats: Arc::clone(&stats),
            threads: Vec::with_capacity(self.workers + 1),
        };

        info!("🚀 Starting crawler run {} with {} workers", run_id, self.workers);

        let dispatcher = Dispatcher::new(
            Arc::clone(&state),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&stats),
            self.cadence.poll_interval,
        );
        running.spawn("dispatcher".to_string(), move || dispatcher.run())?;

        for id in 0..self.workers {
            let worker = Worker::new(
                id,
                Arc::clone(&state),
                Arc::clone(&self.store),
                Arc::clone(&self.source),
                Arc::clone(&stats),
                self.cadence.clone(),
                running.runtime.handle().clone(),
            );
            running.spawn(format!("worker-{}", id), move || worker.run())?;
        }

        Ok(running)
    }

    /// Starts the crawler, runs until `stop` resolves, then shuts down
    /// cleanly and joins every thread.
    pub fn run<F: Future>(self, stop: F) -> Result<StatsSummary> {
        let running = self.start()?;
        running.block_on(stop);
        running.shut_down();
        running.join()
    }
}

/// Stops a running crawler from anywhere, e.g. a signal handler.
#[derive(Clone)]
pub struct ShutdownHandle {
    state: Arc<SharedState>,
}

impl ShutdownHandle {
    pub fn shut_down(&self) {
        info!("🛑 Shutdown requested");
        self.state.shut_down();
    }
}

pub struct RunningCrawler {
    run_id: Uuid,
    runtime: Runtime,
    state: Arc<SharedState>,
    stats: Arc<CrawlStats>,
    threads: Vec<(String, JoinHandle<()>)>,
}

impl RunningCrawler {
    fn spawn<F>(&mut self, name: String, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match thread::Builder::new().name(name.clone()).spawn(body) {
            Ok(handle) => {
                self.threads.push((name, handle));
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn {}: {}", name, e);
                self.state.shut_down();
                for (_, handle) in self.threads.drain(..) {
                    let _ = handle.join();
                }
                Err(CrawlerError::Thread(format!("failed to spawn {}: {}", name, e)))
            }
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn stats(&self) -> StatsSummary {
        self.stats.summary()
    }

    /// Runs a future on the crawler's runtime from a thread outside it.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn shut_down(&self) {
        self.shutdown_handle().shut_down();
    }

    /// Waits for every thread to exit. Call after a shutdown has been
    /// requested, otherwise this blocks for as long as the crawler runs.
    pub fn join(self) -> Result<StatsSummary> {
        let mut panicked = Vec::new();
        for (name, handle) in self.threads {
            if handle.join().is_err() {
                error!("Thread {} panicked", name);
                panicked.push(name);
            }
        }

        let summary = self.stats.summary();
        info!("🏁 Crawler run {} finished: {}", self.run_id, summary);

        if panicked.is_empty() {
            Ok(summary)
        } else {
            Err(CrawlerError::Thread(format!(
                "threads panicked: {}",
                panicked.join(", ")
            )))
        }
    }
}
