//! Decision and alert persistence for the trade guard.
//!
//! `GuardRepository` is the boundary the pipeline writes through. Two
//! implementations are provided: an in-memory store and a journal that also
//! appends every decision and alert to daily JSON Lines files.

pub mod error;
pub mod journal;
pub mod memory;
pub mod repository;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use journal::JournalRepository;
pub use memory::InMemoryGuardRepository;
pub use repository::{AlertRecord, DailyGuardStats, GuardRepository};
pub use writer::JsonLinesWriter;
