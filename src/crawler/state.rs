// src/crawler/state.rs
use crate::mode::Mode;
use crate::symbols::{SurveyCandidates, TickerSymbol};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Work currently owned by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Idle,
    /// Candidates for one starting letter, consumed in place.
    Survey(SurveyCandidates),
    /// This session's tickers. Handed over whole on pickup.
    Monitor(Vec<TickerSymbol>),
}

impl Assignment {
    /// True when a survey top-up is due.
    pub fn is_drained(&self) -> bool {
        match self {
            Assignment::Idle => true,
            Assignment::Survey(candidates) => candidates.is_exhausted(),
            Assignment::Monitor(_) => false,
        }
    }
}

/// Everything guarded by the mode lock.
#[derive(Debug)]
pub struct ModeState {
    pub mode: Mode,
    /// Bumped on every transition so work planned for an earlier session is
    /// never installed into a later one.
    pub session: u64,
    /// Letters not yet claimed during the current survey session.
    pub letters_to_survey: VecDeque<char>,
}

pub type ModeGuard<'a> = MutexGuard<'a, ModeState>;

/// Outcome of a worker's non-blocking attempt to take its next candidate.
#[derive(Debug, PartialEq, Eq)]
pub enum NextCandidate {
    /// The work-queue lock was held by someone else.
    Busy,
    /// Nothing left in this worker's survey queue.
    Drained,
    Next(TickerSymbol),
}

/// Shared coordination state of one crawler run.
///
/// Two locks: the mode lock (`ModeState`) and the work-queue lock (one
/// `Assignment` per worker). When both are needed the mode lock is always
/// taken first; methods that touch the queues on the dispatcher's behalf take
/// a `ModeGuard` to make that ordering explicit. No lock is ever held across
/// a network call.
pub struct SharedState {
    mode: Mutex<ModeState>,
    mode_changed: Condvar,
    queues: Mutex<Vec<Assignment>>,
}

impl SharedState {
    pub fn new(workers: usize) -> Self {
        Self {
            mode: Mutex::new(ModeState {
                mode: Mode::Invalid,
                session: 0,
                letters_to_survey: VecDeque::new(),
            }),
            mode_changed: Condvar::new(),
            queues: Mutex::new(vec![Assignment::Idle; workers]),
        }
    }

    pub fn workers(&self) -> usize {
        self.queues.lock().len()
    }

    pub fn mode(&self) -> Mode {
        self.mode.lock().mode
    }

    pub fn is_shut_down(&self) -> bool {
        self.mode() == Mode::ShutDown
    }

    pub fn lock_mode(&self) -> ModeGuard<'_> {
        self.mode.lock()
    }

    /// Records a new mode and wakes every sleeper. ShutDown is terminal and
    /// is never overwritten.
    pub fn set_mode(&self, guard: &mut ModeGuard<'_>, mode: Mode) {
        if guard.mode == Mode::ShutDown {
            return;
        }
        guard.mode = mode;
        guard.session += 1;
        self.mode_changed.notify_all();
    }

    /// Clean stop requested from outside. Queues are emptied so nothing new is
    /// started; in-flight fetches finish on their own.
    pub fn shut_down(&self) {
        let mut guard = self.mode.lock();
        if guard.mode == Mode::ShutDown {
            return;
        }
        guard.mode = Mode::ShutDown;
        guard.session += 1;
        guard.letters_to_survey.clear();
        self.queues.lock().iter_mut().for_each(|slot| *slot = Assignment::Idle);
        self.mode_changed.notify_all();
    }

    /// Replaces every worker's assignment in one critical section.
    pub fn install_all(&self, _guard: &ModeGuard<'_>, assignments: Vec<Assignment>) {
        let mut queues = self.queues.lock();
        for (slot, assignment) in queues.iter_mut().zip(assignments) {
            *slot = assignment;
        }
    }

    /// Replaces the assignments of selected workers.
    pub fn install(&self, _guard: &ModeGuard<'_>, updates: Vec<(usize, Assignment)>) {
        let mut queues = self.queues.lock();
        for (worker, assignment) in updates {
            if let Some(slot) = queues.get_mut(worker) {
                *slot = assignment;
            }
        }
    }

    /// Workers whose survey queue has run dry. Blocking; dispatcher only.
    pub fn drained_workers(&self, _guard: &ModeGuard<'_>) -> Vec<usize> {
        self.queues
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_drained())
            .map(|(worker, _)| worker)
            .collect()
    }

    /// Reads the current mode and, in RetrieveData, takes the worker's monitor
    /// list, both in one critical section so a worker never sees a mode
    /// without its matching assignment.
    pub fn pick_up(&self, worker: usize) -> (Mode, Vec<TickerSymbol>) {
        let guard = self.mode.lock();
        let mut queues = self.queues.lock();

        let tickers = match queues.get_mut(worker) {
            Some(slot)
                if guard.mode == Mode::RetrieveData && matches!(slot, Assignment::Monitor(_)) =>
            {
                match std::mem::replace(slot, Assignment::Idle) {
                    Assignment::Monitor(tickers) => tickers,
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        };
        (guard.mode, tickers)
    }

    /// Pops the worker's next survey candidate without waiting on the lock.
    pub fn try_next_candidate(&self, worker: usize) -> NextCandidate {
        let Some(mut queues) = self.queues.try_lock() else {
            return NextCandidate::Busy;
        };
        match queues.get_mut(worker) {
            Some(Assignment::Survey(candidates)) => match candidates.next() {
                Some(candidate) => NextCandidate::Next(candidate),
                None => NextCandidate::Drained,
            },
            _ => NextCandidate::Drained,
        }
    }

    /// Blocks until the mode differs from `observed` or `deadline` passes.
    /// Returns the mode at wake-up.
    pub fn sleep_until(&self, observed: Mode, deadline: Instant) -> Mode {
        let mut guard = self.mode.lock();
        while guard.mode == observed {
            if self.mode_changed.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        guard.mode
    }

    pub fn sleep_for(&self, observed: Mode, timeout: Duration) -> Mode {
        self.sleep_until(observed, Instant::now() + timeout)
    }

    #[cfg(test)]
    pub(crate) fn assignment(&self, worker: usize) -> Option<Assignment> {
        self.queues.lock().get(worker).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn symbol(raw: &str) -> TickerSymbol {
        TickerSymbol::parse(raw).unwrap()
    }

    #[test]
    fn starts_invalid_and_idle() {
        let state = SharedState::new(3);
        assert_eq!(state.mode(), Mode::Invalid);
        assert_eq!(state.workers(), 3);
        assert_eq!(state.try_next_candidate(0), NextCandidate::Drained);
    }

    #[test]
    fn survey_candidates_are_popped_in_order() {
        let state = SharedState::new(1);
        {
            let mut guard = state.lock_mode();
            state.set_mode(&mut guard, Mode::SurveyMarket);
            state.install_all(&guard, vec![Assignment::Survey(SurveyCandidates::for_letter('K'))]);
        }

        assert_eq!(state.try_next_candidate(0), NextCandidate::Next(symbol("KAA")));
        assert_eq!(state.try_next_candidate(0), NextCandidate::Next(symbol("KAB")));
    }

    #[test]
    fn busy_queue_lock_is_reported_not_waited_on() {
        let state = SharedState::new(1);
        let _held = state.queues.lock();
        assert_eq!(state.try_next_candidate(0), NextCandidate::Busy);
    }

    #[test]
    fn exhausted_survey_counts_as_drained() {
        let state = SharedState::new(2);
        let cursor = symbol("ZZZZZ");
        {
            let guard = state.lock_mode();
            state.install_all(
                &guard,
                vec![
                    Assignment::Survey(SurveyCandidates::resume_after('Z', Some(&cursor))),
                    Assignment::Survey(SurveyCandidates::for_letter('Y')),
                ],
            );
            assert_eq!(state.drained_workers(&guard), vec![0]);
        }
    }

    #[test]
    fn pick_up_hands_over_monitor_list_once() {
        let state = SharedState::new(2);
        {
            let mut guard = state.lock_mode();
            state.set_mode(&mut guard, Mode::RetrieveData);
            state.install_all(
                &guard,
                vec![
                    Assignment::Monitor(vec![symbol("AAPL")]),
                    Assignment::Monitor(vec![symbol("MSFT")]),
                ],
            );
        }

        assert_eq!(state.pick_up(1), (Mode::RetrieveData, vec![symbol("MSFT")]));
        assert_eq!(state.pick_up(1), (Mode::RetrieveData, vec![]));
        assert_eq!(state.assignment(0), Some(Assignment::Monitor(vec![symbol("AAPL")])));
    }

    #[test]
    fn shut_down_is_terminal() {
        let state = SharedState::new(1);
        state.shut_down();
        {
            let mut guard = state.lock_mode();
            state.set_mode(&mut guard, Mode::SurveyMarket);
        }
        assert!(state.is_shut_down());
        assert_eq!(state.assignment(0), Some(Assignment::Idle));
    }

    #[test]
    fn sleepers_wake_on_shutdown() {
        let state = Arc::new(SharedState::new(1));
        let sleeper = {
            let state = Arc::clone(&state);
            thread::spawn(move || state.sleep_for(Mode::Invalid, Duration::from_secs(30)))
        };

        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        state.shut_down();

        assert_eq!(sleeper.join().unwrap(), Mode::ShutDown);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn sleep_times_out_without_change() {
        let state = SharedState::new(1);
        let mode = state.sleep_for(Mode::Invalid, Duration::from_millis(20));
        assert_eq!(mode, Mode::Invalid);
    }
}
