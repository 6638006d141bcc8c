pub mod composer;
pub mod db;
pub mod delivery;
pub mod fetcher;
pub mod matcher;
pub mod orchestrator;
pub mod parser;
pub mod roster;
pub mod seen;
pub mod types;

pub use composer::DigestComposer;
pub use delivery::{ConsoleDelivery, Delivery};
pub use fetcher::{ContentSource, FeedFetcher};
pub use orchestrator::ReportOrchestrator;
pub use parser::FeedParser;
pub use roster::{Roster, SqliteRoster};
pub use seen::{SeenStore, SqliteSeenStore};
pub use types::*;
