// src/crawler/dispatcher.rs
use super::partition::partition_evenly;
use super::state::{Assignment, ModeGuard, SharedState};
use super::stats::CrawlStats;
use crate::error::StoreError;
use crate::mode::{Mode, ModeSource};
use crate::store::TickerStore;
use crate::symbols::{SurveyCandidates, ALPHABET};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Owns the authoritative mode and hands work to the workers.
pub struct Dispatcher {
    state: Arc<SharedState>,
    store: Arc<TickerStore>,
    clock: Arc<dyn ModeSource>,
    stats: Arc<CrawlStats>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        state: Arc<SharedState>,
        store: Arc<TickerStore>,
        clock: Arc<dyn ModeSource>,
        stats: Arc<CrawlStats>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state,
            store,
            clock,
            stats,
            poll_interval,
        }
    }

    pub fn run(&self) {
        info!("🧭 Dispatcher started ({} workers)", self.state.workers());

        loop {
            let current = match self.poll() {
                Some(mode) => mode,
                None => break,
            };
            if self.state.sleep_for(current, self.poll_interval) == Mode::ShutDown {
                break;
            }
        }

        info!("🧭 Dispatcher stopped. {}", self.stats.summary());
    }

    /// One pass of the dispatch loop. Returns the mode in force afterwards, or
    /// `None` once the crawler is shutting down.
    pub fn poll(&self) -> Option<Mode> {
        let desired = self.clock.desired_mode();
        let mut guard = self.state.lock_mode();
        let current = guard.mode;

        if current == Mode::ShutDown {
            return None;
        }

        if desired != current {
            let applied = match desired {
                Mode::SurveyMarket => {
                    self.enter_survey(&mut guard);
                    true
                }
                Mode::RetrieveData => self.enter_retrieve(&guard),
                Mode::ShutDown => {
                    drop(guard);
                    self.state.shut_down();
                    return None;
                }
                Mode::Invalid => false,
            };

            if applied {
                self.state.set_mode(&mut guard, desired);
                info!(
                    "🔄 Mode changed {} -> {} at {} ({})",
                    current,
                    desired,
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    self.stats.summary()
                );
                return Some(desired);
            }
            return Some(current);
        }

        drop(guard);
        if current == Mode::SurveyMarket {
            self.top_up_survey();
        }
        Some(current)
    }

    /// Fresh survey session: every letter is back in the pool and each worker
    /// claims the next one.
    fn enter_survey(&self, guard: &mut ModeGuard<'_>) {
        guard.letters_to_survey = ALPHABET.iter().copied().collect();

        let workers = self.state.workers();
        let mut assignments = Vec::with_capacity(workers);
        for worker in 0..workers {
            let assignment = match guard.letters_to_survey.pop_front() {
                Some(letter) => match self.survey_queue(worker, letter) {
                    Ok(candidates) => Assignment::Survey(candidates),
                    Err(e) => {
                        error!("Could not read bucket {}: {}. Will retry later.", letter, e);
                        guard.letters_to_survey.push_back(letter);
                        Assignment::Idle
                    }
                },
                None => Assignment::Idle,
            };
            assignments.push(assignment);
        }

        self.state.install_all(guard, assignments);
    }

    /// Partitions the whole index across workers. On a store failure the
    /// transition is not applied and the next poll tries again.
    fn enter_retrieve(&self, guard: &ModeGuard<'_>) -> bool {
        let tickers = match self.store.load_all() {
            Ok(tickers) => tickers,
            Err(e) => {
                error!("Could not load ticker index: {}. Postponing market-open switch.", e);
                return false;
            }
        };

        let workers = self.state.workers();
        let slices = partition_evenly(&tickers, workers);
        for (worker, slice) in slices.iter().enumerate() {
            info!("Worker {} will monitor {} tickers", worker, slice.len());
            debug!("Worker {} monitor list: {:?}", worker, slice);
        }

        let assignments = slices.into_iter().map(Assignment::Monitor).collect();
        self.state.install_all(guard, assignments);
        true
    }

    /// Gives each drained worker the next unclaimed letter. Bucket reads happen
    /// with no lock held; the session counter discards plans that raced a
    /// mode change.
    fn top_up_survey(&self) {
        let (session, plan) = {
            let mut guard = self.state.lock_mode();
            if guard.mode != Mode::SurveyMarket {
                return;
            }
            let mut plan = Vec::new();
            for worker in self.state.drained_workers(&guard) {
                match guard.letters_to_survey.pop_front() {
                    Some(letter) => plan.push((worker, letter)),
                    None => break,
                }
            }
            (guard.session, plan)
        };

        if plan.is_empty() {
            return;
        }

        let prepared: Vec<_> = plan
            .into_iter()
            .map(|(worker, letter)| (worker, letter, self.survey_queue(worker, letter)))
            .collect();

        let mut guard = self.state.lock_mode();
        if guard.session != session {
            debug!("Discarding survey top-up planned for an earlier session");
            return;
        }

        let mut updates = Vec::new();
        for (worker, letter, queue) in prepared {
            match queue {
                Ok(candidates) => updates.push((worker, Assignment::Survey(candidates))),
                Err(e) => {
                    warn!("Could not read bucket {}: {}. Returning it to the pool.", letter, e);
                    guard.letters_to_survey.push_back(letter);
                }
            }
        }
        self.state.install(&guard, updates);
    }

    fn survey_queue(&self, worker: usize, letter: char) -> Result<SurveyCandidates, StoreError> {
        let cursor = self.store.survey_cursor(letter)?;
        let candidates = SurveyCandidates::resume_after(letter, cursor.as_ref());

        match &cursor {
            Some(cursor) => info!(
                "Worker {} surveys letter {} after {} ({} candidates left)",
                worker,
                letter,
                cursor,
                candidates.remaining()
            ),
            None => info!(
                "Worker {} surveys letter {} from the start ({} candidates)",
                worker,
                letter,
                candidates.remaining()
            ),
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::TickerSymbol;
    use parking_lot::Mutex;

    struct FixedMode(Mutex<Mode>);

    impl ModeSource for FixedMode {
        fn desired_mode(&self) -> Mode {
            *self.0.lock()
        }
    }

    fn symbol(raw: &str) -> TickerSymbol {
        TickerSymbol::parse(raw).unwrap()
    }

    fn setup(workers: usize, mode: Mode) -> (tempfile::TempDir, Arc<SharedState>, Arc<TickerStore>, Arc<FixedMode>, Dispatcher) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TickerStore::open(dir.path()).unwrap());
        let state = Arc::new(SharedState::new(workers));
        let clock = Arc::new(FixedMode(Mutex::new(mode)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&state),
            Arc::clone(&store),
            clock.clone(),
            Arc::new(CrawlStats::default()),
            Duration::from_millis(10),
        );
        (dir, state, store, clock, dispatcher)
    }

    #[test]
    fn survey_transition_assigns_distinct_letters_with_cursors() {
        let (_dir, state, store, _clock, dispatcher) = setup(3, Mode::SurveyMarket);
        store.append_to_bucket(&symbol("BAC")).unwrap();

        assert_eq!(dispatcher.poll(), Some(Mode::SurveyMarket));
        assert_eq!(state.mode(), Mode::SurveyMarket);

        assert_eq!(
            state.assignment(0),
            Some(Assignment::Survey(SurveyCandidates::for_letter('A')))
        );
        assert_eq!(
            state.assignment(1),
            Some(Assignment::Survey(SurveyCandidates::resume_after('B', Some(&symbol("BAC")))))
        );
        assert_eq!(
            state.assignment(2),
            Some(Assignment::Survey(SurveyCandidates::for_letter('C')))
        );
        assert_eq!(state.lock_mode().letters_to_survey.len(), 23);
    }

    #[test]
    fn survey_resumes_past_a_removed_ticker() {
        let (_dir, state, store, _clock, dispatcher) = setup(1, Mode::SurveyMarket);
        store.append_to_bucket(&symbol("AAC")).unwrap();
        store.append_to_bucket(&symbol("AKX")).unwrap();
        store.remove_from_bucket(&symbol("AKX")).unwrap();

        dispatcher.poll();
        assert_eq!(
            state.assignment(0),
            Some(Assignment::Survey(SurveyCandidates::resume_after('A', Some(&symbol("AKX")))))
        );
    }

    #[test]
    fn drained_worker_gets_next_letter() {
        let (_dir, state, store, _clock, dispatcher) = setup(1, Mode::SurveyMarket);
        // Letter A is fully surveyed already.
        store.append_to_bucket(&symbol("AZZZZ")).unwrap();

        dispatcher.poll();
        assert!(state.assignment(0).unwrap().is_drained());

        dispatcher.poll();
        assert_eq!(
            state.assignment(0),
            Some(Assignment::Survey(SurveyCandidates::for_letter('B')))
        );
    }

    #[test]
    fn retrieve_transition_partitions_whole_index() {
        let (_dir, state, store, _clock, dispatcher) = setup(2, Mode::RetrieveData);
        for raw in ["AAPL", "AMD", "IBM", "MSFT", "NVDA"] {
            store.append_to_bucket(&symbol(raw)).unwrap();
        }

        assert_eq!(dispatcher.poll(), Some(Mode::RetrieveData));

        let (_, first) = state.pick_up(0);
        let (_, second) = state.pick_up(1);
        assert_eq!(first, vec![symbol("AAPL"), symbol("AMD"), symbol("IBM")]);
        assert_eq!(second, vec![symbol("MSFT"), symbol("NVDA")]);
    }

    #[test]
    fn follows_clock_between_modes() {
        let (_dir, state, _store, clock, dispatcher) = setup(2, Mode::SurveyMarket);
        dispatcher.poll();
        let survey_session = state.lock_mode().session;

        *clock.0.lock() = Mode::RetrieveData;
        assert_eq!(dispatcher.poll(), Some(Mode::RetrieveData));
        assert!(state.lock_mode().session > survey_session);
        assert_eq!(state.assignment(0), Some(Assignment::Monitor(vec![])));

        *clock.0.lock() = Mode::SurveyMarket;
        assert_eq!(dispatcher.poll(), Some(Mode::SurveyMarket));
        assert_eq!(state.lock_mode().letters_to_survey.len(), 24);
    }

    #[test]
    fn stops_after_shutdown() {
        let (_dir, state, _store, _clock, dispatcher) = setup(1, Mode::SurveyMarket);
        state.shut_down();
        assert_eq!(dispatcher.poll(), None);
        assert_eq!(state.mode(), Mode::ShutDown);
        // run() returns immediately too.
        dispatcher.run();
    }
}
