use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use tracing::{debug, trace, warn};

use super::clock_replacer::ClockReplacer;
use super::PoolPos;
use crate::catalog::Catalog;
use crate::common::{PageId, TableId, INVALID_PAGE_ID};
use crate::concurrency::{Permissions, TransactionId};
use crate::error::DbError;
use crate::storage::heap::page::HeapPage;
use crate::tuple::Tuple;

/// A page pinned in the buffer pool. The page stays in memory until the guard is dropped.
pub struct PageGuard<'a> {
    buffer_pool: &'a BufferPool,
    frame: &'a Frame,
}

impl<'a> PageGuard<'a> {
    fn new(buffer_pool: &'a BufferPool, frame: &'a Frame) -> Self {
        Self { buffer_pool, frame }
    }

    pub fn read(&self) -> RwLockReadGuard<HeapPage> {
        self.frame.page.read().unwrap()
    }

    pub fn write(&self) -> RwLockWriteGuard<HeapPage> {
        self.frame.page.write().unwrap()
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.buffer_pool.unpin(self.frame)
    }
}

struct Frame {
    pool_pos: PoolPos,
    page: RwLock<HeapPage>,
}

impl Frame {
    fn new(pool_pos: PoolPos) -> Self {
        Self {
            pool_pos,
            page: RwLock::new(HeapPage::unassigned()),
        }
    }
}

/// Caches a fixed number of heap pages in memory and mediates every page access of the
/// storage layer and the executors. Dirty pages are written back when their frame is reused
/// or when they are flushed explicitly.
pub struct BufferPool {
    pool: Box<[Frame]>,
    clock_replacer: Mutex<ClockReplacer>,
    page_id_to_pool_pos: Mutex<HashMap<PageId, PoolPos>>,
    catalog: Catalog,
}

impl BufferPool {
    pub fn new(catalog: Catalog, pool_size: usize) -> Self {
        let clock_replacer = ClockReplacer::new(pool_size);
        let pool = (0..pool_size).map(Frame::new).collect();

        Self {
            pool,
            clock_replacer: Mutex::new(clock_replacer),
            page_id_to_pool_pos: Mutex::new(HashMap::new()),
            catalog,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Returns the page pinned for the caller, reading it from its heap file if it isn't cached.
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        permissions: Permissions,
    ) -> Result<PageGuard> {
        trace!(%tid, ?page_id, ?permissions, "get page");
        match self.fetch(page_id)? {
            Some(guard) => Ok(guard),
            None => {
                warn!(?page_id, pool_size = self.pool.len(), "buffer pool exhausted");
                Err(DbError::BufferPoolExhausted(self.pool.len()).into())
            }
        }
    }

    /// Adds a tuple to a table on behalf of a transaction.
    /// The modified pages are marked dirty by the transaction and their ids are returned.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>> {
        let file = self.catalog.get_table(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        Ok(self.mark_dirty(pages, tid))
    }

    /// Removes a tuple from the table its record id points to.
    /// The modified pages are marked dirty by the transaction and their ids are returned.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<Vec<PageId>> {
        let ((table_id, _), _) = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        let file = self.catalog.get_table(table_id)?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        Ok(self.mark_dirty(pages, tid))
    }

    /// Writes a cached page back to disk if it is dirty.
    /// Must not be called while holding a read or write lock on that page.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let page_id_to_pool_pos = self.page_id_to_pool_pos.lock().unwrap();
        if let Some(&pool_pos) = page_id_to_pool_pos.get(&page_id) {
            self.write_back(&self.pool[pool_pos])?;
            self.clock_replacer.lock().unwrap().set_dirty(pool_pos, false);
        }
        Ok(())
    }

    /// Writes every dirty cached page back to disk
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_id_to_pool_pos = self.page_id_to_pool_pos.lock().unwrap();
        for &pool_pos in page_id_to_pool_pos.values() {
            self.write_back(&self.pool[pool_pos])?;
            self.clock_replacer.lock().unwrap().set_dirty(pool_pos, false);
        }
        Ok(())
    }

    fn fetch(&self, page_id: PageId) -> Result<Option<PageGuard>> {
        let mut page_id_to_pool_pos = self.page_id_to_pool_pos.lock().unwrap();
        let mut clock_replacer = self.clock_replacer.lock().unwrap();

        if let Some(&pool_pos) = page_id_to_pool_pos.get(&page_id) {
            clock_replacer.pin(pool_pos);
            return Ok(Some(PageGuard::new(self, &self.pool[pool_pos])));
        }

        let file = self.catalog.get_table(page_id.0)?;
        if let Some(free_pool_pos) = clock_replacer.find_victim() {
            let frame = &self.pool[free_pool_pos];
            self.remove_page(&mut page_id_to_pool_pos, frame)?;

            let page = file.read_page(page_id.1)?;
            *frame.page.write().unwrap() = page;

            page_id_to_pool_pos.insert(page_id, free_pool_pos);
            clock_replacer.set_dirty(free_pool_pos, false);
            clock_replacer.pin(free_pool_pos);

            Ok(Some(PageGuard::new(self, frame)))
        } else {
            Ok(None)
        }
    }

    fn mark_dirty(&self, pages: Vec<PageGuard>, tid: TransactionId) -> Vec<PageId> {
        pages
            .into_iter()
            .map(|guard| {
                let page_id = {
                    let mut page = guard.write();
                    page.mark_dirty(Some(tid));
                    page.page_id()
                };
                self.clock_replacer
                    .lock()
                    .unwrap()
                    .set_dirty(guard.frame.pool_pos, true);
                page_id
            })
            .collect()
    }

    fn unpin(&self, frame: &Frame) {
        let mut clock_replacer = self.clock_replacer.lock().unwrap();
        clock_replacer.unpin(frame.pool_pos);
    }

    /// Evicts whatever page currently occupies the frame, writing it back first if dirty
    fn remove_page(
        &self,
        page_id_to_pool_pos: &mut MutexGuard<HashMap<PageId, PoolPos>>,
        frame: &Frame,
    ) -> Result<()> {
        let page_id = frame.page.read().unwrap().page_id();
        if page_id != INVALID_PAGE_ID {
            self.write_back(frame)?;
            page_id_to_pool_pos.remove(&page_id);
            debug!(?page_id, "evicted page");
            *frame.page.write().unwrap() = HeapPage::unassigned();
        }
        Ok(())
    }

    fn write_back(&self, frame: &Frame) -> Result<()> {
        let mut page = frame.page.write().unwrap();
        if let Some(dirtier) = page.dirtier() {
            let (table_id, page_no) = page.page_id();
            let file = self.catalog.get_table(table_id)?;
            file.write_page(&page).with_context(|| {
                format!("Failed to write back page {page_no} of table {table_id} dirtied by {dirtier}")
            })?;
            page.mark_dirty(None);
        }
        Ok(())
    }
}
