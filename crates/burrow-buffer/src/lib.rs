//! Buffer pool for BurrowDB.
//!
//! Caches a bounded number of pages across all open table files, tracking
//! per-page pin counts and dirty flags. Callers pin a page before touching
//! its bytes and unpin it afterward; only unpinned pages are eviction
//! candidates.

mod frame;
mod pool;

pub use frame::{BufferFrame, FrameId};
pub use pool::{BufferPool, BufferPoolStats, EvictedPage};
