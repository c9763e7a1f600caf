//! Pager: buffer-pool-backed page access with pinned-page guards.
//!
//! All page I/O above the page store goes through `Pager::get` and
//! `Pager::allocate`, which return a [`PageRef`]. The guard holds the pin
//! for its lifetime and releases it on every exit path, carrying the dirty
//! flag back to the pool on drop. Dirty pages evicted to make room are
//! written back to their file before the caller proceeds.

use crate::store::PageStore;
use burrow_buffer::{BufferFrame, BufferPool, EvictedPage};
use burrow_common::page::{PageId, PAGE_SIZE};
use burrow_common::Result;
use std::cell::Cell;
use std::sync::Arc;

/// Ties the page store to the buffer pool.
pub struct Pager {
    store: Arc<PageStore>,
    pool: Arc<BufferPool>,
}

impl Pager {
    /// Creates a pager over a store and a pool.
    pub fn new(store: Arc<PageStore>, pool: Arc<BufferPool>) -> Self {
        Self { store, pool }
    }

    /// Returns the underlying page store.
    pub fn store(&self) -> &Arc<PageStore> {
        &self.store
    }

    /// Returns the underlying buffer pool.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    fn write_back(&self, evicted: Option<EvictedPage>) -> Result<()> {
        if let Some(page) = evicted {
            self.store.write_page(page.page_id, &page.data)?;
        }
        Ok(())
    }

    /// Pins a page, loading it from its table file on first reference.
    pub fn get(&self, page_id: PageId) -> Result<PageRef<'_>> {
        if let Some(frame) = self.pool.fetch_page(page_id) {
            return Ok(PageRef::new(&self.pool, frame, page_id));
        }

        let bytes = self.store.read_page(page_id)?;
        let (frame, evicted) = self.pool.load_page(page_id, &bytes)?;
        self.write_back(evicted)?;
        Ok(PageRef::new(&self.pool, frame, page_id))
    }

    /// Allocates a fresh zero-filled page at the end of a table file and
    /// pins it.
    pub fn allocate(&self, file_id: u32) -> Result<PageRef<'_>> {
        let page_id = self.store.allocate_page(file_id)?;
        let (frame, evicted) = self.pool.new_page(page_id)?;
        self.write_back(evicted)?;
        Ok(PageRef::new(&self.pool, frame, page_id))
    }

    /// Flushes every dirty cached page to its table file.
    pub fn flush_all(&self) -> Result<usize> {
        let store = &self.store;
        let flushed = self.pool.flush_all(|page_id, data| {
            let mut buf = [0u8; PAGE_SIZE];
            buf.copy_from_slice(data);
            store.write_page(page_id, &buf)
        })?;
        self.store.flush()?;
        Ok(flushed)
    }
}

/// RAII guard for a pinned page.
///
/// Unpins on drop, reporting the page dirty if any write access was taken.
pub struct PageRef<'a> {
    pool: &'a BufferPool,
    frame: &'a BufferFrame,
    page_id: PageId,
    dirty: Cell<bool>,
}

impl<'a> PageRef<'a> {
    fn new(pool: &'a BufferPool, frame: &'a BufferFrame, page_id: PageId) -> Self {
        Self {
            pool,
            frame,
            page_id,
            dirty: Cell::new(false),
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page number within its table file.
    pub fn page_no(&self) -> u32 {
        self.page_id.page_no
    }

    /// Read access to the page bytes.
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }

    /// Write access to the page bytes; marks the page dirty.
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.dirty.set(true);
        self.frame.write_data()
    }
}

impl Drop for PageRef<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.dirty.get());
    }
}
