use anyhow::{Context, Result};
use chrono::Local;
use rand::rngs::ThreadRng;
use reflex_core::{
    LeaderboardClient, LeaderboardEntry, LeaderboardResult, NewEntry, SubmitError, TrialState,
};
use reflex_experiment::{
    PressOutcome, ReactionTimer, Session, SubmissionDone, SubmissionReceiver, TriggerOutcome,
};
use reflex_leaderboard::{BannedWords, MemoryLeaderboard, PocketBaseClient};
use reflex_store::{FileKv, LocalResults, ProfileError, ProfileStore, summarize};
use reflex_timing::{MonotonicClock, TokioScheduler, TriggerReceiver};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::config::AppConfig;

/// Remote leaderboard when configured, in-process otherwise
pub enum Board {
    Remote(PocketBaseClient),
    Local(MemoryLeaderboard),
}

impl Board {
    pub fn from_config(config: &AppConfig, offline: bool) -> Result<Self> {
        match (&config.leaderboard_url, offline) {
            (Some(url), false) => {
                let client = PocketBaseClient::new(url.as_str(), config.request_timeout())
                    .context("failed to build leaderboard client")?
                    .with_page_size(config.ranking_size);
                info!(url = %url, "using remote leaderboard");
                Ok(Self::Remote(client))
            }
            _ => Ok(Self::Local(MemoryLeaderboard::new())),
        }
    }
}

impl LeaderboardClient for Board {
    async fn create(&self, entry: NewEntry) -> LeaderboardResult<LeaderboardEntry> {
        match self {
            Self::Remote(c) => c.create(entry).await,
            Self::Local(m) => m.create(entry).await,
        }
    }

    async fn list_ranked(&self) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        match self {
            Self::Remote(c) => c.list_ranked().await,
            Self::Local(m) => m.list_ranked().await,
        }
    }
}

type AppSession =
    Session<MonotonicClock, TokioScheduler, ThreadRng, LocalResults<FileKv>, Board, BannedWords>;

/// What a line typed at the play prompt means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tap,
    Reset,
    Submit(Option<String>),
    History,
    Ranking,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((h, r)) => (h, Some(r.trim()).filter(|r| !r.is_empty())),
            None => (line, None),
        };
        match head.to_lowercase().as_str() {
            "" => Self::Tap,
            "r" | "reset" => Self::Reset,
            "s" | "submit" => Self::Submit(rest.map(str::to_string)),
            "h" | "history" => Self::History,
            "k" | "ranking" => Self::Ranking,
            "?" | "help" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

pub struct App {
    session: AppSession,
    triggers: TriggerReceiver,
    submissions: SubmissionReceiver,
    profile: ProfileStore<FileKv>,
    should_exit: bool,
}

impl App {
    pub fn new(config: &AppConfig, offline: bool) -> Result<Self> {
        let (scheduler, triggers) = TokioScheduler::new();
        let timer = ReactionTimer::new(
            config.timer.clone(),
            MonotonicClock::new(),
            scheduler,
            rand::rng(),
        );
        let kv = FileKv::new(&config.data_dir);
        let store = Arc::new(LocalResults::new(kv.clone()));
        let board = Arc::new(Board::from_config(config, offline)?);
        let validator = BannedWords::with_extra(&config.banned_words);

        debug!(data_dir = %config.data_dir.display(), "storage ready");

        let (session, submissions) = Session::new(timer, store, board, validator);

        Ok(Self {
            session,
            triggers,
            submissions,
            profile: ProfileStore::new(kv),
            should_exit: false,
        })
    }

    /// Interactive trial loop on stdin. Enter is the reaction control.
    pub async fn play(&mut self) -> Result<()> {
        println!("=== REFLEX ===");
        println!("Press ENTER to start, then ENTER again the moment you see TAP NOW.");
        println!("Type `help` for commands.\n");
        self.show_state();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while !self.should_exit {
            tokio::select! {
                Some(token) = self.triggers.recv() => {
                    let outcome = self.session.arm(token);
                    self.show_trigger(outcome);
                    if outcome == TriggerOutcome::Armed {
                        self.session.settle().await;
                    }
                }
                Some(done) = self.submissions.recv() => self.show_submission(done),
                line = lines.next_line() => {
                    match line.context("failed to read stdin")? {
                        Some(line) => self.handle_input(Command::parse(&line)).await,
                        None => self.should_exit = true,
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    async fn handle_input(&mut self, command: Command) {
        match command {
            Command::Tap => self.tap(),
            Command::Reset => {
                self.session.reset();
                self.show_state();
            }
            Command::Submit(name) => self.submit(name).await,
            Command::History => self.print_history().await,
            Command::Ranking => self.print_ranking().await,
            Command::Help => print_help(),
            Command::Quit => self.should_exit = true,
            Command::Unknown(other) => println!("Unknown command {other:?}. Type `help`."),
        }
    }

    /// One press-and-release of the control, dispatched by state.
    fn tap(&mut self) {
        let state = self.session.timer().state();
        if state.is_terminal() {
            self.session.reset();
            self.show_state();
            return;
        }
        if state == TrialState::Ready {
            self.session.start();
            self.show_state();
            return;
        }

        let outcome = self.session.press();
        self.session.release();
        match outcome {
            PressOutcome::Measured(record) => {
                println!("Reaction time: {} ms", record.reaction_time_ms);
                println!("ENTER to go again, `submit` to post it to the ranking.");
            }
            PressOutcome::TooEarly => println!("Too early! ENTER to retry."),
            PressOutcome::Failed => println!("Invalid trial (held or too fast). ENTER to retry."),
            PressOutcome::Ignored => {}
        }
    }

    fn show_state(&self) {
        match self.session.timer().state() {
            TrialState::Ready => println!("[ready] Press ENTER to start the test."),
            TrialState::Waiting => println!("[waiting] Wait for it... tap the moment it turns green."),
            _ => {}
        }
    }

    fn show_trigger(&self, outcome: TriggerOutcome) {
        match outcome {
            TriggerOutcome::Armed => println!(">>> TAP NOW! <<<"),
            TriggerOutcome::Failed => {
                println!("Invalid trial: the control was held through the wait. ENTER to retry.")
            }
            TriggerOutcome::Stale => {}
        }
    }

    /// Reads the remembered name at submit time unless one is given.
    async fn submit(&mut self, name: Option<String>) {
        let name = match name {
            Some(name) => name,
            None => match self.profile.display_name().await {
                Ok(Some(name)) => name,
                Ok(None) => {
                    println!("No display name set. Use `submit <name>` or `reflex name <name>`.");
                    return;
                }
                Err(e) => {
                    println!("Could not read the saved display name: {e}");
                    return;
                }
            },
        };

        match self.session.submit(&name) {
            Ok(()) => println!("Submitting as {}...", name.trim()),
            Err(e) => print_submit_error(&e),
        }
    }

    fn show_submission(&mut self, done: SubmissionDone) {
        match self.session.complete_submission(done) {
            Ok(entry) => println!(
                "Submitted {} ms as {}.",
                entry.reaction_time_ms, entry.display_name
            ),
            Err(e) => print_submit_error(&e),
        }
    }

    pub async fn print_history(&self) {
        let history = self.session.history().await;
        if history.is_empty() {
            println!("No records yet.");
            return;
        }
        println!("My records (newest first):");
        for record in &history {
            println!(
                "  {:>5} ms   {}",
                record.reaction_time_ms,
                record
                    .recorded_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    pub async fn print_summary(&self) {
        let mut history = self.session.history().await;
        history.reverse();
        match summarize(&history) {
            Some(s) => println!(
                "{} trials, best {} ms, mean {:.1} ms, latest {} ms",
                s.count, s.best_ms, s.mean_ms, s.latest_ms
            ),
            None => println!("No records yet."),
        }
    }

    pub async fn print_ranking(&self) {
        match self.session.ranking().await {
            Ok(entries) if entries.is_empty() => println!("The ranking is empty."),
            Ok(entries) => {
                println!("Ranking (lower is better):");
                for (rank, entry) in entries.iter().enumerate() {
                    println!(
                        "  {:>3}. {:<20} {:>5} ms",
                        rank + 1,
                        entry.display_name,
                        entry.reaction_time_ms
                    );
                }
            }
            Err(e) => println!("Failed to fetch ranking: {e}"),
        }
    }

    pub async fn set_name(&self, name: &str) -> Result<()> {
        match self
            .profile
            .set_display_name(name, self.session.validator())
            .await
        {
            Ok(saved) => {
                println!("Display name saved: {saved}");
                Ok(())
            }
            Err(ProfileError::Validation(e)) => {
                println!("Invalid display name: {e}. Choose another one.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn show_name(&self) -> Result<()> {
        let name = self.profile.display_name().await?;
        println!("Current display name: {}", name.as_deref().unwrap_or("(none)"));
        Ok(())
    }

    async fn cleanup(&mut self) {
        self.session.reset();
        self.session.flush().await;
        println!("\nBye. Results saved.");
    }
}

fn print_submit_error(error: &SubmitError) {
    match error {
        SubmitError::Duplicate => println!("This result was already submitted."),
        SubmitError::NotMeasured => println!("Finish a valid trial before submitting."),
        SubmitError::Validation(e) => println!("Invalid display name: {e}."),
        SubmitError::Failed(e) => println!("Submission failed ({e}). Try `submit` again."),
    }
}

fn print_help() {
    println!("ENTER          tap (start / react / retry)");
    println!("r, reset       back to ready");
    println!("s, submit [n]  post the last result under name n (or the saved name)");
    println!("h, history     my records");
    println!("k, ranking     leaderboard");
    println!("q, quit        exit");
}
