pub mod config;
pub mod session;
pub mod state;
pub mod trial;
pub use config::{ConfigError, TimerConfig};
pub use session::{Session, SubmissionDone, SubmissionReceiver};
pub use state::{PressOutcome, ReactionTimer, SubmissionTicket, TriggerOutcome};
pub use trial::{Trial, calibrated_reaction_ms};
