use std::sync::Arc;

use rand::Rng;
use reflex_core::{
    LeaderboardClient, LeaderboardEntry, LeaderboardResult, ResultStore, StoredResult,
    SubmitError, UsernameValidator,
};
use reflex_timing::{Clock, Scheduler, TriggerToken};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::state::{PressOutcome, ReactionTimer, SubmissionTicket, TriggerOutcome};

/// Leaderboard answer to a submission started by [`Session::submit`]
#[derive(Debug)]
pub struct SubmissionDone {
    pub ticket: SubmissionTicket,
    pub result: LeaderboardResult<LeaderboardEntry>,
}

pub type SubmissionReceiver = mpsc::UnboundedReceiver<SubmissionDone>;

/// Wires a [`ReactionTimer`] to its persistence and leaderboard collaborators
///
/// All methods run on the caller's task. Persistence of a measurement and
/// leaderboard submissions are spawned, so a slow store or network never
/// delays the next transition. Submission answers come back on the
/// [`SubmissionReceiver`] returned by [`Session::new`].
pub struct Session<C, S, R, St, L, V>
where
    C: Clock,
    S: Scheduler,
    R: Rng,
{
    timer: ReactionTimer<C, S, R>,
    store: Arc<St>,
    leaderboard: Arc<L>,
    validator: V,
    persisting: Vec<JoinHandle<()>>,
    submissions: mpsc::UnboundedSender<SubmissionDone>,
}

impl<C, S, R, St, L, V> Session<C, S, R, St, L, V>
where
    C: Clock,
    S: Scheduler,
    R: Rng,
    St: ResultStore + 'static,
    L: LeaderboardClient + 'static,
    V: UsernameValidator,
{
    pub fn new(
        timer: ReactionTimer<C, S, R>,
        store: Arc<St>,
        leaderboard: Arc<L>,
        validator: V,
    ) -> (Self, SubmissionReceiver) {
        let (submissions, rx) = mpsc::unbounded_channel();
        let session = Self {
            timer,
            store,
            leaderboard,
            validator,
            persisting: Vec::new(),
            submissions,
        };
        (session, rx)
    }

    pub fn timer(&self) -> &ReactionTimer<C, S, R> {
        &self.timer
    }

    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    pub fn start(&mut self) {
        self.timer.start();
    }

    pub fn reset(&mut self) {
        self.timer.reset();
    }

    /// Press-down. A valid measurement is handed to the store in the
    /// background. Must be called within a tokio runtime.
    pub fn press(&mut self) -> PressOutcome {
        let outcome = self.timer.press();
        if let PressOutcome::Measured(record) = &outcome {
            self.persist(record.clone());
        }
        outcome
    }

    pub fn release(&mut self) {
        self.timer.release();
    }

    fn persist(&mut self, record: StoredResult) {
        self.persisting.retain(|h| !h.is_finished());

        let store = Arc::clone(&self.store);
        self.persisting.push(tokio::spawn(async move {
            let ms = record.reaction_time_ms;
            match store.append(record).await {
                Ok(()) => info!(reaction_ms = ms, "result saved"),
                Err(e) => warn!(reaction_ms = ms, error = %e, "failed to save result"),
            }
        }));
    }

    /// Applies a delivered trigger without taking the baseline. Front-ends
    /// show the armed control, then call [`Session::settle`].
    pub fn arm(&mut self, token: TriggerToken) -> TriggerOutcome {
        self.timer.on_trigger(token)
    }

    /// Yields one scheduling turn, then captures the baseline so the
    /// transition's own latency is excluded from the measurement.
    pub async fn settle(&mut self) -> bool {
        tokio::task::yield_now().await;
        self.timer.capture_baseline()
    }

    pub async fn on_trigger(&mut self, token: TriggerToken) -> TriggerOutcome {
        let outcome = self.arm(token);
        if outcome == TriggerOutcome::Armed {
            self.settle().await;
        }
        outcome
    }

    /// Sends the measured trial to the leaderboard under `display_name`.
    ///
    /// Validation and duplicate checks happen before any network call; the
    /// call itself runs on its own task and its answer arrives on the
    /// [`SubmissionReceiver`]. Until then the trial is in flight and a
    /// second submit is a duplicate. Must be called within a tokio runtime.
    pub fn submit(&mut self, display_name: &str) -> Result<(), SubmitError> {
        let ticket = self.timer.begin_submission(display_name, &self.validator)?;
        let board = Arc::clone(&self.leaderboard);
        let tx = self.submissions.clone();
        tokio::spawn(async move {
            let result = board.create(ticket.entry.clone()).await;
            // Receiver gone means the front-end is shutting down
            let _ = tx.send(SubmissionDone { ticket, result });
        });
        Ok(())
    }

    /// Applies a submission answer. A failed call leaves the trial eligible
    /// for another attempt; an answer for a trial reset meanwhile only
    /// reports what the server did.
    pub fn complete_submission(
        &mut self,
        done: SubmissionDone,
    ) -> Result<LeaderboardEntry, SubmitError> {
        self.timer.finish_submission(&done.ticket, &done.result);
        if let Err(e) = &done.result {
            warn!(error = %e, "leaderboard submission failed");
        }
        done.result.map_err(SubmitError::from)
    }

    /// Stored results, newest first. A read failure is logged and shows as
    /// an empty history.
    pub async fn history(&self) -> Vec<StoredResult> {
        match self.store.list_all().await {
            Ok(mut records) => {
                records.reverse();
                records
            }
            Err(e) => {
                warn!(error = %e, "failed to load results");
                Vec::new()
            }
        }
    }

    pub async fn ranking(&self) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        self.leaderboard.list_ranked().await
    }

    /// Waits for background saves started so far.
    pub async fn flush(&mut self) {
        for handle in self.persisting.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "result save task did not complete");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimerConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use reflex_core::{
        LeaderboardError, NewEntry, StoreError, StoreResult, TrialState, ValidationError,
    };
    use reflex_timing::{ManualClock, ManualScheduler, TokioScheduler};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MemStore {
        records: Mutex<Vec<StoredResult>>,
        broken: AtomicBool,
    }

    impl ResultStore for MemStore {
        async fn append(&self, record: StoredResult) -> StoreResult<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn list_all(&self) -> StoreResult<Vec<StoredResult>> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            Ok(self.records.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct CountingBoard {
        calls: AtomicUsize,
        offline: AtomicBool,
    }

    impl LeaderboardClient for CountingBoard {
        async fn create(&self, entry: NewEntry) -> LeaderboardResult<LeaderboardEntry> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(LeaderboardError::Network("connection refused".into()));
            }
            Ok(LeaderboardEntry {
                display_name: entry.display_name,
                reaction_time_ms: entry.reaction_time_ms,
                created_at: chrono::Utc::now(),
            })
        }

        async fn list_ranked(&self) -> LeaderboardResult<Vec<LeaderboardEntry>> {
            Ok(Vec::new())
        }
    }

    /// Answers only once `respond` is notified
    #[derive(Default)]
    struct SlowBoard {
        inner: CountingBoard,
        respond: Notify,
    }

    impl LeaderboardClient for SlowBoard {
        async fn create(&self, entry: NewEntry) -> LeaderboardResult<LeaderboardEntry> {
            self.respond.notified().await;
            self.inner.create(entry).await
        }

        async fn list_ranked(&self) -> LeaderboardResult<Vec<LeaderboardEntry>> {
            self.inner.list_ranked().await
        }
    }

    fn no_badword(name: &str) -> bool {
        !name.to_lowercase().contains("badword")
    }

    type TestSession<B> =
        Session<ManualClock, ManualScheduler, StdRng, MemStore, B, fn(&str) -> bool>;

    struct Harness<B> {
        session: TestSession<B>,
        answers: SubmissionReceiver,
        sched: ManualScheduler,
        board: Arc<B>,
    }

    fn harness<B: LeaderboardClient + Default + 'static>() -> Harness<B> {
        let config = TimerConfig {
            delay_range_ms: (3000, 3000),
            ..TimerConfig::default()
        };
        let clock = ManualClock::new();
        let sched = ManualScheduler::new(clock.clone());
        let timer = ReactionTimer::new(config, clock, sched.clone(), StdRng::seed_from_u64(1));
        let board = Arc::new(B::default());
        let (session, answers) = Session::new(
            timer,
            Arc::new(MemStore::default()),
            Arc::clone(&board),
            no_badword as fn(&str) -> bool,
        );
        Harness {
            session,
            answers,
            sched,
            board,
        }
    }

    impl<B: LeaderboardClient + 'static> Harness<B> {
        async fn measure(&mut self, reaction_ms: u64) {
            self.session.start();
            for token in self.sched.advance_ms(3000) {
                self.session.on_trigger(token).await;
            }
            self.sched.clock().advance_ms(reaction_ms);
            assert!(matches!(self.session.press(), PressOutcome::Measured(_)));
            self.session.release();
        }

        async fn submit_and_wait(&mut self, name: &str) -> Result<LeaderboardEntry, SubmitError> {
            self.session.submit(name)?;
            let done = self.answers.recv().await.unwrap();
            self.session.complete_submission(done)
        }
    }

    #[tokio::test]
    async fn measurement_is_persisted() {
        let mut h = harness::<CountingBoard>();
        h.measure(250).await;
        h.measure(300).await;
        h.session.flush().await;

        let history = h.session.history().await;
        let times: Vec<u32> = history.iter().map(|r| r.reaction_time_ms).collect();
        assert_eq!(times, vec![240, 190]);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_measurement() {
        let mut h = harness::<CountingBoard>();
        h.session.store().broken.store(true, Ordering::SeqCst);

        h.measure(250).await;
        h.session.flush().await;

        assert_eq!(h.session.timer().state(), TrialState::Measured);
        assert_eq!(h.session.timer().reaction_time_ms(), Some(190));
        assert!(h.session.history().await.is_empty());
    }

    #[tokio::test]
    async fn second_submit_is_duplicate() {
        let mut h = harness::<CountingBoard>();
        h.measure(250).await;

        let entry = h.submit_and_wait("neo").await.unwrap();
        assert_eq!(entry.reaction_time_ms, 190);
        assert!(matches!(
            h.submit_and_wait("neo").await,
            Err(SubmitError::Duplicate)
        ));
        assert_eq!(h.board.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disallowed_name_makes_no_call() {
        let mut h = harness::<CountingBoard>();
        h.measure(250).await;

        assert!(matches!(
            h.session.submit("BadWord99"),
            Err(SubmitError::Validation(ValidationError::Disallowed))
        ));
        assert!(matches!(
            h.session.submit(""),
            Err(SubmitError::Validation(ValidationError::Empty))
        ));
        tokio::task::yield_now().await;
        assert_eq!(h.board.calls.load(Ordering::SeqCst), 0);
        assert!(h.answers.try_recv().is_err());
    }

    #[tokio::test]
    async fn network_failure_allows_retry() {
        let mut h = harness::<CountingBoard>();
        h.measure(250).await;

        h.board.offline.store(true, Ordering::SeqCst);
        assert!(matches!(
            h.submit_and_wait("neo").await,
            Err(SubmitError::Failed(LeaderboardError::Network(_)))
        ));
        assert!(!h.session.timer().is_submitted());

        h.board.offline.store(false, Ordering::SeqCst);
        assert!(h.submit_and_wait("neo").await.is_ok());
        assert!(h.session.timer().is_submitted());
        assert_eq!(h.board.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn submit_without_measurement_is_rejected() {
        let mut h = harness::<CountingBoard>();
        assert!(matches!(
            h.session.submit("neo"),
            Err(SubmitError::NotMeasured)
        ));
        tokio::task::yield_now().await;
        assert_eq!(h.board.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pending_submission_does_not_hold_up_the_trial() {
        let mut h = harness::<SlowBoard>();
        h.measure(250).await;

        h.session.submit("neo").unwrap();
        assert!(matches!(
            h.session.submit("neo"),
            Err(SubmitError::Duplicate)
        ));

        // The user moves on while the server is still thinking
        h.session.reset();
        h.session.start();
        assert_eq!(h.session.timer().state(), TrialState::Waiting);

        h.board.respond.notify_one();
        let done = h.answers.recv().await.unwrap();
        let entry = h.session.complete_submission(done).unwrap();
        assert_eq!(entry.reaction_time_ms, 190);

        assert_eq!(h.session.timer().state(), TrialState::Waiting);
        assert!(!h.session.timer().is_submitted());
        assert_eq!(h.board.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pending_submission_answer_marks_trial_submitted() {
        let mut h = harness::<SlowBoard>();
        h.measure(250).await;

        h.session.submit("neo").unwrap();
        assert!(!h.session.timer().is_submitted());

        h.board.respond.notify_one();
        let done = h.answers.recv().await.unwrap();
        assert!(h.session.complete_submission(done).is_ok());
        assert!(h.session.timer().is_submitted());
        assert!(matches!(
            h.session.submit("neo"),
            Err(SubmitError::Duplicate)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_drives_a_trial() {
        let (sched, mut triggers) = TokioScheduler::new();
        let config = TimerConfig {
            delay_range_ms: (2000, 2000),
            ..TimerConfig::default()
        };
        let timer = ReactionTimer::new(config, ManualClock::new(), sched, StdRng::seed_from_u64(3));
        let (mut session, _answers) = Session::new(
            timer,
            Arc::new(MemStore::default()),
            Arc::new(CountingBoard::default()),
            no_badword,
        );

        session.start();
        let token = triggers.recv().await.unwrap();
        assert_eq!(session.on_trigger(token).await, TriggerOutcome::Armed);
        assert!(session.timer().current_trial().unwrap().started_at.is_some());

        // A reset trial never sees its trigger
        session.reset();
        session.start();
        session.reset();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(triggers.try_recv().is_err());
        assert_eq!(session.timer().state(), TrialState::Ready);
    }
}
