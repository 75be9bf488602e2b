//! Named cache stores holding request/response pairs.
//!
//! A provider opens and deletes stores by name; each store maps a GET
//! request identity to a response. `SqliteStorage` persists stores in a
//! SQLite database between runs; tests use the in-memory `MemoryStorage`.

#[cfg(test)]
mod memory;
mod storage;
mod traits;

#[cfg(test)]
pub use memory::MemoryStorage;
pub use storage::SqliteStorage;
pub use traits::{CacheResult, CacheStore, CacheStoreProvider, Request, Response};
#[cfg(test)]
pub use traits::{CachedEntry, ResponseSource};
