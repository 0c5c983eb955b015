pub mod memory;
pub mod pocketbase;
pub mod validator;

pub use memory::MemoryLeaderboard;
pub use pocketbase::PocketBaseClient;
pub use validator::{BannedWords, DEFAULT_BANNED_WORDS};
