//! Storage engine for BurrowDB.
//!
//! This crate provides:
//! - Page store for per-table file I/O
//! - Pager tying the page store to the buffer pool with pinned-page guards
//! - Node codec for the four page layouts (meta, internal, leaf, data)
//! - Record and value serialization, including overflow chains for strings
//! - B+tree structural operations (traversal, splits, leaf chaining)
//! - Cursor for ordered scans and point mutation
//! - Engine surface: open, create, and drop tables

mod cursor;
mod engine;
pub mod node;
mod pager;
mod record;
mod rows;
mod store;
mod tree;

pub use cursor::{Cursor, RowEvaluator};
pub use engine::Engine;
pub use node::ChainStats;
pub use pager::{PageRef, Pager};
pub use record::{Field, OverflowPtr, Record, Schema};
pub use rows::RowList;
pub use store::PageStore;
pub use tree::Table;
