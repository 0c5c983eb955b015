//! Local persistence for reaction results and the display name

pub mod kv;
pub mod profile;
pub mod results;
pub mod summary;

pub use kv::{FileKv, KvStore, MemoryKv};
pub use profile::{ProfileError, ProfileStore, USERNAME_KEY};
pub use results::{LocalResults, RESULTS_KEY};
pub use summary::{Summary, summarize};
