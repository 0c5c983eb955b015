pub mod clock;
pub mod manual;
pub mod scheduler;

pub use clock::{Clock, MonotonicClock};
pub use manual::{ManualClock, ManualScheduler};
pub use scheduler::{Scheduler, TokioScheduler, TriggerReceiver, TriggerToken};
