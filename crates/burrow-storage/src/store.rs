//! Page store: per-table file I/O.
//!
//! Each table is one file in the database directory, named `<table>.tbl`.
//! Pages live at fixed `PAGE_SIZE` offsets; page 0 is the table's meta node.
//! Open tables are assigned a stable numeric file ID used by `PageId` and
//! the buffer pool.

use burrow_common::page::{PageId, PAGE_SIZE};
use burrow_common::{BurrowError, Result, StorageConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// File extension for table files.
const TABLE_EXT: &str = "tbl";

/// Handle for an open table file.
struct FileHandle {
    file: File,
    name: String,
    num_pages: u32,
}

/// Mutable store state behind one lock: open handles plus the name registry.
struct StoreInner {
    files: HashMap<u32, FileHandle>,
    by_name: HashMap<String, u32>,
    next_file_id: u32,
}

/// Manages reading and writing pages across all table files of a database.
pub struct PageStore {
    data_dir: PathBuf,
    fsync_enabled: bool,
    inner: Mutex<StoreInner>,
}

impl PageStore {
    /// Opens a page store rooted at the configured data directory,
    /// creating the directory if needed.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            data_dir: config.data_dir.clone(),
            fsync_enabled: config.fsync_enabled,
            inner: Mutex::new(StoreInner {
                files: HashMap::new(),
                by_name: HashMap::new(),
                next_file_id: 0,
            }),
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the file path for a table name.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", name, TABLE_EXT))
    }

    /// Returns true if a table file exists on disk.
    pub fn table_exists(&self, name: &str) -> bool {
        self.table_path(name).exists()
    }

    fn register(&self, inner: &mut StoreInner, name: &str, file: File) -> Result<u32> {
        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        let file_id = inner.next_file_id;
        inner.next_file_id += 1;
        inner.files.insert(
            file_id,
            FileHandle {
                file,
                name: name.to_string(),
                num_pages,
            },
        );
        inner.by_name.insert(name.to_string(), file_id);
        Ok(file_id)
    }

    /// Creates the file for a new table and returns its file ID.
    ///
    /// Fails with `TableAlreadyExists` if the file is already on disk.
    pub fn create_table(&self, name: &str) -> Result<u32> {
        let mut inner = self.inner.lock();
        if inner.by_name.contains_key(name) || self.table_exists(name) {
            return Err(BurrowError::TableAlreadyExists(name.to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(self.table_path(name))?;
        self.register(&mut inner, name, file)
    }

    /// Opens an existing table file and returns its file ID.
    pub fn open_table(&self, name: &str) -> Result<u32> {
        let mut inner = self.inner.lock();
        if let Some(file_id) = inner.by_name.get(name) {
            return Ok(*file_id);
        }

        let path = self.table_path(name);
        if !path.exists() {
            return Err(BurrowError::TableNotFound(name.to_string()));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        self.register(&mut inner, name, file)
    }

    /// Closes and deletes a table's file, returning its file ID if it was
    /// open so the caller can release cached pages.
    pub fn drop_table(&self, name: &str) -> Result<Option<u32>> {
        let mut inner = self.inner.lock();

        let file_id = inner.by_name.remove(name);
        if let Some(id) = file_id {
            inner.files.remove(&id);
        }

        let path = self.table_path(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        } else if file_id.is_none() {
            return Err(BurrowError::TableNotFound(name.to_string()));
        }

        Ok(file_id)
    }

    /// Reads a page from its table file.
    pub fn read_page(&self, page_id: PageId) -> Result<[u8; PAGE_SIZE]> {
        let mut inner = self.inner.lock();
        let handle = inner
            .files
            .get_mut(&page_id.file_id)
            .ok_or(BurrowError::PageOutOfBounds {
                file_id: page_id.file_id,
                page_no: page_id.page_no,
            })?;

        if page_id.page_no >= handle.num_pages {
            return Err(BurrowError::PageOutOfBounds {
                file_id: page_id.file_id,
                page_no: page_id.page_no,
            });
        }

        let offset = (page_id.page_no as u64) * (PAGE_SIZE as u64);
        handle.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = [0u8; PAGE_SIZE];
        handle.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Writes a page to its table file.
    pub fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();
        let fsync = self.fsync_enabled;
        let handle = inner
            .files
            .get_mut(&page_id.file_id)
            .ok_or(BurrowError::PageOutOfBounds {
                file_id: page_id.file_id,
                page_no: page_id.page_no,
            })?;

        let offset = (page_id.page_no as u64) * (PAGE_SIZE as u64);
        handle.file.seek(SeekFrom::Start(offset))?;
        handle.file.write_all(data)?;

        if fsync {
            handle.file.sync_all()?;
        }

        if page_id.page_no >= handle.num_pages {
            handle.num_pages = page_id.page_no + 1;
        }
        Ok(())
    }

    /// Allocates a fresh zero-filled page at the end of a table file.
    pub fn allocate_page(&self, file_id: u32) -> Result<PageId> {
        let mut inner = self.inner.lock();
        let fsync = self.fsync_enabled;
        let handle = inner
            .files
            .get_mut(&file_id)
            .ok_or(BurrowError::PageOutOfBounds {
                file_id,
                page_no: 0,
            })?;

        let page_no = handle.num_pages;
        let offset = (page_no as u64) * (PAGE_SIZE as u64);
        handle.file.seek(SeekFrom::Start(offset))?;
        handle.file.write_all(&[0u8; PAGE_SIZE])?;

        if fsync {
            handle.file.sync_all()?;
        }

        handle.num_pages = page_no + 1;
        Ok(PageId::new(file_id, page_no))
    }

    /// Returns the number of pages in a table file.
    pub fn num_pages(&self, file_id: u32) -> Result<u32> {
        let inner = self.inner.lock();
        let handle = inner.files.get(&file_id).ok_or(BurrowError::PageOutOfBounds {
            file_id,
            page_no: 0,
        })?;
        Ok(handle.num_pages)
    }

    /// Returns the name of an open table by file ID.
    pub fn table_name(&self, file_id: u32) -> Option<String> {
        let inner = self.inner.lock();
        inner.files.get(&file_id).map(|h| h.name.clone())
    }

    /// Flushes all open files to disk.
    pub fn flush(&self) -> Result<()> {
        let inner = self.inner.lock();
        for handle in inner.files.values() {
            handle.file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for PageStore {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
