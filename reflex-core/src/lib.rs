pub mod error;
pub mod leaderboard;
pub mod store;
pub mod trial;

pub use error::{
    LeaderboardError, LeaderboardResult, StoreError, StoreResult, SubmitError, ValidationError,
};
pub use leaderboard::{LeaderboardClient, LeaderboardEntry, NewEntry, UsernameValidator};
pub use store::ResultStore;
pub use trial::{StoredResult, TrialState};
