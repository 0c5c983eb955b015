use super::config::TimerConfig;
use super::trial::{Trial, calibrated_reaction_ms};
use rand::Rng;
use reflex_core::{
    LeaderboardEntry, LeaderboardResult, NewEntry, StoredResult, SubmitError, TrialState,
    UsernameValidator, ValidationError,
};
use reflex_timing::{Clock, Scheduler, TriggerToken};
use std::time::Duration;
use tracing::{debug, info};

/// Result of a press as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressOutcome {
    /// Nothing to resolve in the current state
    Ignored,
    TooEarly,
    Failed,
    /// Valid measurement; the record is ready to persist
    Measured(StoredResult),
}

/// Result of a delivered trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Trial already left `Waiting` or was superseded
    Stale,
    /// Control is interactable; the baseline is captured next turn
    Armed,
    /// Control was held through the delay window
    Failed,
}

/// A validated submission waiting on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    trial_id: u64,
    pub entry: NewEntry,
}

/// Drives a single reaction-time trial at a time
pub struct ReactionTimer<C, S, R>
where
    C: Clock,
    S: Scheduler,
    R: Rng,
{
    config: TimerConfig,
    clock: C,
    scheduler: S,
    rng: R,
    state: TrialState,
    current: Option<Trial>,
    pending: Option<S::Handle>,
    held: bool,
    next_id: u64,
}

impl<C, S, R> ReactionTimer<C, S, R>
where
    C: Clock,
    S: Scheduler,
    R: Rng,
{
    pub fn new(config: TimerConfig, clock: C, scheduler: S, rng: R) -> Self {
        Self {
            config,
            clock,
            scheduler,
            rng,
            state: TrialState::Ready,
            current: None,
            pending: None,
            held: false,
            next_id: 1,
        }
    }

    /// Begins a new trial. Any trial in progress or finished is reset first.
    pub fn start(&mut self) {
        if self.state != TrialState::Ready {
            self.reset();
        }

        let id = self.next_id;
        self.next_id += 1;

        let (lo, hi) = self.config.delay_range_ms;
        let delay_ms = self.rng.random_range(lo..=hi);
        let handle = self
            .scheduler
            .after(Duration::from_millis(delay_ms), TriggerToken(id));

        self.pending = Some(handle);
        self.current = Some(Trial::new(id, delay_ms));
        self.state = TrialState::Waiting;
        info!(trial = id, delay_ms, "trial started");
    }

    /// Press-down on the reaction control.
    pub fn press(&mut self) -> PressOutcome {
        self.held = true;

        match self.state {
            TrialState::Waiting => {
                self.cancel_pending();
                if let Some(trial) = &mut self.current {
                    trial.interacted_while_waiting = true;
                    info!(trial = trial.id, "pressed before trigger");
                }
                self.state = TrialState::TooEarly;
                PressOutcome::TooEarly
            }
            TrialState::Armed => self.resolve(),
            _ => PressOutcome::Ignored,
        }
    }

    /// Release of the reaction control. Only clears the held bit.
    pub fn release(&mut self) {
        self.held = false;
    }

    fn resolve(&mut self) -> PressOutcome {
        let now_ns = self.clock.now();
        let Some(trial) = &mut self.current else {
            return PressOutcome::Ignored;
        };

        let Some(started_at) = trial.started_at else {
            // Press landed in the same turn the trigger fired
            info!(trial = trial.id, "press coincided with trigger");
            self.state = TrialState::Failed;
            return PressOutcome::Failed;
        };

        let elapsed_ns = now_ns.saturating_sub(started_at);
        match calibrated_reaction_ms(elapsed_ns, &self.config) {
            Some(ms) => {
                trial.reaction_time_ms = Some(ms);
                self.state = TrialState::Measured;
                info!(
                    trial = trial.id,
                    reaction_ms = ms,
                    raw_ms = elapsed_ns as f64 / 1_000_000.0,
                    "reaction measured"
                );
                PressOutcome::Measured(StoredResult::now(ms))
            }
            None => {
                self.state = TrialState::Failed;
                info!(
                    trial = trial.id,
                    raw_ms = elapsed_ns as f64 / 1_000_000.0,
                    "implausible reaction time"
                );
                PressOutcome::Failed
            }
        }
    }

    /// Applies a trigger delivered by the scheduler.
    pub fn on_trigger(&mut self, token: TriggerToken) -> TriggerOutcome {
        let current_id = self.current.as_ref().map(|t| t.id);
        if self.state != TrialState::Waiting || current_id != Some(token.0) {
            debug!(
                token = token.0,
                state = %self.state,
                "ignoring stale trigger"
            );
            return TriggerOutcome::Stale;
        }

        // The handle has fired; nothing left to cancel.
        self.pending = None;

        let interacted = self
            .current
            .as_ref()
            .is_some_and(|t| t.interacted_while_waiting);
        if interacted || self.held {
            info!(trial = token.0, "control held through trigger");
            self.state = TrialState::Failed;
            return TriggerOutcome::Failed;
        }

        self.state = TrialState::Armed;
        debug!(trial = token.0, "armed");
        TriggerOutcome::Armed
    }

    /// Records the baseline. Callers yield at least one scheduling turn
    /// after the `Armed` transition so the baseline excludes its latency.
    pub fn capture_baseline(&mut self) -> bool {
        if self.state != TrialState::Armed {
            return false;
        }
        let now_ns = self.clock.now();
        match &mut self.current {
            Some(trial) if trial.started_at.is_none() => {
                trial.started_at = Some(now_ns);
                debug!(trial = trial.id, baseline_ns = now_ns, "baseline captured");
                true
            }
            _ => false,
        }
    }

    /// Returns to `Ready` from any state. Idempotent.
    pub fn reset(&mut self) {
        self.cancel_pending();
        if let Some(trial) = self.current.take() {
            debug!(trial = trial.id, state = %self.state, "trial reset");
        }
        self.state = TrialState::Ready;
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }

    /// Checks every submission precondition and marks the trial in flight.
    pub fn begin_submission<V>(
        &mut self,
        display_name: &str,
        validator: &V,
    ) -> Result<SubmissionTicket, SubmitError>
    where
        V: UsernameValidator + ?Sized,
    {
        if self.state != TrialState::Measured {
            return Err(SubmitError::NotMeasured);
        }
        let Some(trial) = &mut self.current else {
            return Err(SubmitError::NotMeasured);
        };
        let Some(reaction_time_ms) = trial.reaction_time_ms else {
            return Err(SubmitError::NotMeasured);
        };
        if trial.submitted || trial.submission_in_flight {
            return Err(SubmitError::Duplicate);
        }

        let name = display_name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty.into());
        }
        if !validator.is_allowed(name) {
            return Err(ValidationError::Disallowed.into());
        }

        trial.submission_in_flight = true;
        Ok(SubmissionTicket {
            trial_id: trial.id,
            entry: NewEntry {
                display_name: name.to_string(),
                reaction_time_ms,
            },
        })
    }

    /// Applies the leaderboard's answer. A ticket for a trial that has since
    /// been reset is discarded.
    pub fn finish_submission(
        &mut self,
        ticket: &SubmissionTicket,
        result: &LeaderboardResult<LeaderboardEntry>,
    ) {
        match &mut self.current {
            Some(trial) if trial.id == ticket.trial_id => {
                trial.submission_in_flight = false;
                if result.is_ok() {
                    trial.submitted = true;
                    info!(trial = trial.id, "submitted to leaderboard");
                }
            }
            _ => debug!(trial = ticket.trial_id, "submission finished after reset"),
        }
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.current.as_ref()
    }

    /// Set only while the state is `Measured`.
    pub fn reaction_time_ms(&self) -> Option<u32> {
        if self.state != TrialState::Measured {
            return None;
        }
        self.current.as_ref().and_then(|t| t.reaction_time_ms)
    }

    pub fn is_submitted(&self) -> bool {
        self.current.as_ref().is_some_and(|t| t.submitted)
    }

    pub fn has_pending_trigger(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use reflex_core::LeaderboardError;
    use reflex_timing::{ManualClock, ManualScheduler};

    type TestTimer = ReactionTimer<ManualClock, ManualScheduler, StdRng>;

    fn fixed_delay(ms: u64) -> (TestTimer, ManualScheduler) {
        let config = TimerConfig {
            delay_range_ms: (ms, ms),
            ..TimerConfig::default()
        };
        let clock = ManualClock::starting_at(1_000_000_000);
        let sched = ManualScheduler::new(clock.clone());
        let timer = ReactionTimer::new(config, clock, sched.clone(), StdRng::seed_from_u64(7));
        (timer, sched)
    }

    /// Advances simulated time and delivers due triggers, capturing the
    /// baseline right after arming like the session driver does.
    fn advance(timer: &mut TestTimer, sched: &ManualScheduler, ms: u64) {
        for token in sched.advance_ms(ms) {
            if timer.on_trigger(token) == TriggerOutcome::Armed {
                timer.capture_baseline();
            }
        }
    }

    fn tap(timer: &mut TestTimer) -> PressOutcome {
        let outcome = timer.press();
        timer.release();
        outcome
    }

    fn measured(timer: &mut TestTimer, sched: &ManualScheduler, reaction_ms: u64) {
        timer.start();
        advance(timer, sched, 3000);
        sched.clock().advance_ms(reaction_ms);
        assert!(matches!(tap(timer), PressOutcome::Measured(_)));
    }

    #[test]
    fn scenario_valid_reaction() {
        let (mut timer, sched) = fixed_delay(3000);
        timer.start();
        assert_eq!(timer.state(), TrialState::Waiting);
        assert!(timer.has_pending_trigger());

        advance(&mut timer, &sched, 3000);
        assert_eq!(timer.state(), TrialState::Armed);
        assert!(!timer.has_pending_trigger());

        sched.clock().advance_ms(250);
        let PressOutcome::Measured(record) = tap(&mut timer) else {
            panic!("expected a measurement");
        };
        assert_eq!(record.reaction_time_ms, 190);
        assert_eq!(timer.state(), TrialState::Measured);
        assert_eq!(timer.reaction_time_ms(), Some(190));
    }

    #[test]
    fn scenario_too_early() {
        let (mut timer, sched) = fixed_delay(3000);
        timer.start();
        sched.clock().advance_ms(500);

        assert_eq!(tap(&mut timer), PressOutcome::TooEarly);
        assert_eq!(timer.state(), TrialState::TooEarly);
        assert_eq!(sched.pending_count(), 0);
        assert!(!timer.has_pending_trigger());
        assert_eq!(timer.reaction_time_ms(), None);

        advance(&mut timer, &sched, 10_000);
        assert_eq!(timer.state(), TrialState::TooEarly);
    }

    #[test]
    fn scenario_reaction_below_offset_fails() {
        let (mut timer, sched) = fixed_delay(3000);
        timer.start();
        advance(&mut timer, &sched, 3000);
        sched.clock().advance_ms(10);

        assert_eq!(tap(&mut timer), PressOutcome::Failed);
        assert_eq!(timer.state(), TrialState::Failed);
        assert_eq!(timer.reaction_time_ms(), None);
    }

    #[test]
    fn below_plausibility_floor_fails() {
        let (mut timer, sched) = fixed_delay(3000);
        timer.start();
        advance(&mut timer, &sched, 3000);
        // 130 - 60 = 70 < 80
        sched.clock().advance_ms(130);
        assert_eq!(tap(&mut timer), PressOutcome::Failed);
    }

    #[test]
    fn holding_through_delay_fails() {
        let (mut timer, sched) = fixed_delay(2000);
        // The press that starts the trial is never released
        timer.press();
        timer.start();
        advance(&mut timer, &sched, 2000);

        assert_eq!(timer.state(), TrialState::Failed);
        assert_eq!(timer.reaction_time_ms(), None);

        // Releasing and pressing again cannot rescue the trial
        timer.release();
        assert_eq!(tap(&mut timer), PressOutcome::Ignored);
        assert_eq!(timer.state(), TrialState::Failed);
    }

    #[test]
    fn press_before_baseline_fails() {
        let (mut timer, sched) = fixed_delay(1000);
        timer.start();
        let tokens = sched.advance_ms(1000);
        assert_eq!(timer.on_trigger(tokens[0]), TriggerOutcome::Armed);

        assert_eq!(tap(&mut timer), PressOutcome::Failed);
        assert!(!timer.capture_baseline());
    }

    #[test]
    fn duplicate_press_is_not_double_counted() {
        let (mut timer, sched) = fixed_delay(3000);
        measured(&mut timer, &sched, 300);
        sched.clock().advance_ms(50);

        assert_eq!(tap(&mut timer), PressOutcome::Ignored);
        assert_eq!(timer.reaction_time_ms(), Some(240));
    }

    #[test]
    fn reset_cancels_trigger() {
        let (mut timer, sched) = fixed_delay(3000);
        timer.start();
        sched.clock().advance_ms(1000);
        timer.reset();

        assert_eq!(sched.pending_count(), 0);
        advance(&mut timer, &sched, 60_000);
        assert_eq!(timer.state(), TrialState::Ready);
        assert!(timer.current_trial().is_none());
    }

    #[test]
    fn reset_is_idempotent() {
        let (mut timer, sched) = fixed_delay(3000);
        measured(&mut timer, &sched, 300);

        timer.reset();
        let once = (timer.state(), timer.current_trial().cloned(), sched.pending_count());
        timer.reset();
        let twice = (timer.state(), timer.current_trial().cloned(), sched.pending_count());
        assert_eq!(once, twice);
        assert_eq!(once.0, TrialState::Ready);
    }

    #[test]
    fn stale_trigger_is_ignored() {
        let (mut timer, sched) = fixed_delay(3000);
        timer.start();
        let old = timer.current_trial().map(|t| t.id).unwrap();
        timer.start();

        assert_eq!(sched.pending_count(), 1);
        assert_eq!(timer.on_trigger(TriggerToken(old)), TriggerOutcome::Stale);
        assert_eq!(timer.state(), TrialState::Waiting);
    }

    #[test]
    fn start_from_terminal_state_resets_first() {
        let (mut timer, sched) = fixed_delay(3000);
        measured(&mut timer, &sched, 300);

        timer.start();
        assert_eq!(timer.state(), TrialState::Waiting);
        assert_eq!(timer.reaction_time_ms(), None);
        assert_eq!(sched.pending_count(), 1);
        assert_eq!(sched.scheduled_total(), 2);
    }

    #[test]
    fn delay_is_drawn_from_range() {
        let clock = ManualClock::new();
        let sched = ManualScheduler::new(clock.clone());
        let mut timer = ReactionTimer::new(
            TimerConfig::default(),
            clock,
            sched.clone(),
            StdRng::seed_from_u64(42),
        );
        for _ in 0..200 {
            timer.start();
            let delay = sched.next_delay().unwrap();
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(4000));
            assert_eq!(sched.pending_count(), 1);
        }
    }

    #[test]
    fn reaction_time_only_in_measured() {
        let (mut timer, sched) = fixed_delay(1500);
        let check = |t: &TestTimer| {
            assert_eq!(
                t.reaction_time_ms().is_some(),
                t.state() == TrialState::Measured
            );
        };
        check(&timer);
        timer.start();
        check(&timer);
        advance(&mut timer, &sched, 1500);
        check(&timer);
        sched.clock().advance_ms(400);
        tap(&mut timer);
        check(&timer);
        timer.reset();
        check(&timer);
    }

    fn allow_all(_: &str) -> bool {
        true
    }

    fn fake_entry(ticket: &SubmissionTicket) -> LeaderboardResult<LeaderboardEntry> {
        Ok(LeaderboardEntry {
            display_name: ticket.entry.display_name.clone(),
            reaction_time_ms: ticket.entry.reaction_time_ms,
            created_at: chrono::Utc::now(),
        })
    }

    #[test]
    fn submission_requires_measurement() {
        let (mut timer, _sched) = fixed_delay(3000);
        assert!(matches!(
            timer.begin_submission("neo", &allow_all),
            Err(SubmitError::NotMeasured)
        ));
        timer.start();
        assert!(matches!(
            timer.begin_submission("neo", &allow_all),
            Err(SubmitError::NotMeasured)
        ));
    }

    #[test]
    fn submission_validates_name() {
        let (mut timer, sched) = fixed_delay(3000);
        measured(&mut timer, &sched, 300);

        assert!(matches!(
            timer.begin_submission("   ", &allow_all),
            Err(SubmitError::Validation(ValidationError::Empty))
        ));
        let deny = |name: &str| !name.contains("badword");
        assert!(matches!(
            timer.begin_submission("badword", &deny),
            Err(SubmitError::Validation(ValidationError::Disallowed))
        ));
        // Rejected names do not consume the submission
        let ticket = timer.begin_submission("  neo ", &deny).unwrap();
        assert_eq!(ticket.entry.display_name, "neo");
        assert_eq!(ticket.entry.reaction_time_ms, 240);
    }

    #[test]
    fn successful_submission_blocks_duplicates() {
        let (mut timer, sched) = fixed_delay(3000);
        measured(&mut timer, &sched, 300);

        let ticket = timer.begin_submission("neo", &allow_all).unwrap();
        assert!(matches!(
            timer.begin_submission("neo", &allow_all),
            Err(SubmitError::Duplicate)
        ));
        timer.finish_submission(&ticket, &fake_entry(&ticket));
        assert!(timer.is_submitted());
        assert!(matches!(
            timer.begin_submission("neo", &allow_all),
            Err(SubmitError::Duplicate)
        ));

        // A new trial clears the flag
        measured(&mut timer, &sched, 300);
        assert!(!timer.is_submitted());
        assert!(timer.begin_submission("neo", &allow_all).is_ok());
    }

    #[test]
    fn failed_submission_can_retry() {
        let (mut timer, sched) = fixed_delay(3000);
        measured(&mut timer, &sched, 300);

        let ticket = timer.begin_submission("neo", &allow_all).unwrap();
        let failure = Err(LeaderboardError::Network("offline".into()));
        timer.finish_submission(&ticket, &failure);

        assert!(!timer.is_submitted());
        assert!(timer.begin_submission("neo", &allow_all).is_ok());
    }

    #[test]
    fn submission_after_reset_is_discarded() {
        let (mut timer, sched) = fixed_delay(3000);
        measured(&mut timer, &sched, 300);
        let ticket = timer.begin_submission("neo", &allow_all).unwrap();

        measured(&mut timer, &sched, 400);
        timer.finish_submission(&ticket, &fake_entry(&ticket));
        assert!(!timer.is_submitted());
    }
}
