use std::fs::{File, OpenOptions};
use std::os::unix::prelude::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use super::page::{num_slots, HeapPage};
use crate::buffer::buffer_pool::{BufferPool, PageGuard};
use crate::common::{PageId, PageNo, TableId, PAGE_SIZE};
use crate::concurrency::{Permissions, TransactionId};
use crate::error::DbError;
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

/// A table stored as an unordered sequence of fixed size pages in a single file.
/// Page `n` lives at byte offset `n * PAGE_SIZE`.
///
/// The file never caches pages itself. Every page used by `insert_tuple`, `delete_tuple`
/// and the iterator is borrowed from the buffer pool for the duration of a single call.
#[derive(Debug)]
pub struct HeapFile {
    table_id: TableId,
    path: PathBuf,
    file: File,
    schema: Arc<Schema>,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating an empty one if it does not exist yet.
    /// Fails if not even a single tuple of the schema fits on a page.
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        if num_slots(&schema) == 0 {
            return Err(DbError::TupleTooWide {
                tuple_size: schema.tuple_size(),
                page_size: PAGE_SIZE,
            }
            .into());
        }
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open heap file {}", path.display()))?;
        let path = path
            .canonicalize()
            .with_context(|| format!("Could not resolve path of {}", path.display()))?;

        Ok(Self {
            table_id: table_id_of(&path),
            path,
            file,
            schema: Arc::new(schema),
        })
    }

    /// A stable identifier derived from the absolute path of the file
    pub fn id(&self) -> TableId {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns how many complete pages are stored in the file
    pub fn num_pages(&self) -> Result<PageNo> {
        let size = self
            .file
            .metadata()
            .with_context(|| format!("Could not read size of {}", self.path.display()))?
            .len();
        Ok((size / PAGE_SIZE as u64) as PageNo)
    }

    /// Reads and decodes a single page from disk
    pub fn read_page(&self, page_no: PageNo) -> Result<HeapPage> {
        let page_id = (self.table_id, page_no);
        let offset = page_no as u64 * PAGE_SIZE as u64;
        let size = self
            .file
            .metadata()
            .with_context(|| format!("Could not read size of {}", self.path.display()))?
            .len();
        if offset >= size {
            return Err(DbError::PageOutOfRange {
                table_id: self.table_id,
                page_no,
                num_pages: (size / PAGE_SIZE as u64) as PageNo,
            }
            .into());
        }
        let available = (size - offset).min(PAGE_SIZE as u64) as usize;
        if available < PAGE_SIZE {
            return Err(DbError::ShortRead {
                page_id,
                read: available,
                expected: PAGE_SIZE,
            }
            .into());
        }

        let mut data = vec![0u8; PAGE_SIZE];
        self.file.read_exact_at(&mut data, offset).with_context(|| {
            format!(
                "Could not read page {} at offset {} of {}",
                page_no,
                offset,
                self.path.display()
            )
        })?;
        debug!(table_id = self.table_id, page_no, "read page");

        HeapPage::new(page_id, self.schema.clone(), &data)
    }

    /// Writes a page back to its position. The page may be the one directly after the last page,
    /// which extends the file, but never leaves a gap.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let (table_id, page_no) = page.page_id();
        if table_id != self.table_id {
            return Err(DbError::UnknownTable(table_id).into());
        }
        let num_pages = self.num_pages()?;
        if page_no > num_pages {
            return Err(DbError::PageOutOfRange {
                table_id,
                page_no,
                num_pages,
            }
            .into());
        }

        let offset = page_no as u64 * PAGE_SIZE as u64;
        self.file
            .write_all_at(&page.page_data(), offset)
            .with_context(|| {
                format!(
                    "Failed to write page {} at offset {} of {}",
                    page_no,
                    offset,
                    self.path.display()
                )
            })?;
        self.file.sync_data().with_context(|| {
            format!(
                "Failed to sync page {} of {}",
                page_no,
                self.path.display()
            )
        })?;
        debug!(table_id, page_no, "wrote page");

        Ok(())
    }

    /// Places the tuple on the first page with a free slot, appending a new page if all are full.
    /// Returns the pages that were modified.
    pub fn insert_tuple<'p>(
        &self,
        pool: &'p BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageGuard<'p>>> {
        if !self.schema.matches(tuple) {
            return Err(DbError::SchemaMismatch {
                expected: self.schema.to_string(),
                found: format!("{:?}", tuple.values()),
            }
            .into());
        }

        let num_pages = self.num_pages()?;
        for page_no in 0..num_pages {
            let guard = pool.get_page(tid, (self.table_id, page_no), Permissions::ReadWrite)?;
            let mut page = guard.write();
            if page.num_unused_slots() > 0 {
                page.insert_tuple(tuple.clone())?;
                drop(page);
                return Ok(vec![guard]);
            }
        }

        let page_id = (self.table_id, num_pages);
        let empty_page = HeapPage::new(page_id, self.schema.clone(), &HeapPage::empty_page_data())?;
        self.write_page(&empty_page)?;
        debug!(table_id = self.table_id, page_no = num_pages, "appended page");

        let guard = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
        guard.write().insert_tuple(tuple.clone())?;
        Ok(vec![guard])
    }

    /// Removes the tuple from the slot its record id points to. Returns the modified page.
    pub fn delete_tuple<'p>(
        &self,
        pool: &'p BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageGuard<'p>>> {
        let record_id = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        let (page_id, _slot) = record_id;
        if page_id.0 != self.table_id {
            return Err(DbError::NotInTable {
                record_id,
                table_id: self.table_id,
            }
            .into());
        }

        let guard = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
        guard.write().delete_tuple(tuple)?;
        Ok(vec![guard])
    }

    /// Returns an iterator over all tuples of this file
    pub fn iter<'p>(self: &Arc<Self>, pool: &'p BufferPool, tid: TransactionId) -> HeapFileIterator<'p> {
        HeapFileIterator::new(self.clone(), pool, tid)
    }
}

/// 32 bit FNV-1a over the path, so the same file always maps to the same id
fn table_id_of(path: &Path) -> TableId {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = path
        .as_os_str()
        .to_string_lossy()
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ byte as u32).wrapping_mul(PRIME));
    // 0 is reserved for unassigned pages
    hash.max(1)
}

/// Iterates over the used slots of all pages of a heap file, page by page.
/// Each step fetches the current page from the buffer pool again, so no page stays pinned
/// between calls.
pub struct HeapFileIterator<'a> {
    file: Arc<HeapFile>,
    pool: &'a BufferPool,
    tid: TransactionId,
    curr_page_no: PageNo,
    curr_slot: usize,
    num_pages: PageNo,
}

impl<'a> HeapFileIterator<'a> {
    fn new(file: Arc<HeapFile>, pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            curr_page_no: 0,
            curr_slot: 0,
            num_pages: 0,
        }
    }

    /// Restarts the iteration at the first page
    pub fn rewind(&mut self) {
        self.curr_page_no = 0;
        self.curr_slot = 0;
        self.num_pages = 0;
    }

    fn fetch_next_tuple(&mut self) -> Result<Option<Tuple>> {
        loop {
            if self.curr_page_no >= self.num_pages {
                // the file may have grown since the last look
                self.num_pages = self.file.num_pages()?;
                if self.curr_page_no >= self.num_pages {
                    return Ok(None);
                }
            }
            let page_id: PageId = (self.file.id(), self.curr_page_no);
            let guard = self.pool.get_page(self.tid, page_id, Permissions::ReadOnly)?;
            let page = guard.read();
            match page.next_used_slot(self.curr_slot) {
                Some((slot, tuple)) => {
                    self.curr_slot = slot + 1;
                    return Ok(Some(tuple.clone()));
                }
                None => {
                    self.curr_page_no += 1;
                    self.curr_slot = 0;
                }
            }
        }
    }
}

impl<'a> std::iter::Iterator for HeapFileIterator<'a> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_next_tuple().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use rand::Rng;
    use tempfile::tempdir;

    use super::HeapFile;
    use crate::buffer::buffer_pool::BufferPool;
    use crate::catalog::Catalog;
    use crate::common::PAGE_SIZE;
    use crate::concurrency::TransactionId;
    use crate::error::DbError;
    use crate::storage::heap::page::{num_slots, HeapPage};
    use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnDefinition::new(TypeId::Integer, "id"),
            ColumnDefinition::new(TypeId::Integer, "amount"),
        ])
    }

    fn row(id: i32, amount: i32) -> Tuple {
        Tuple::new(vec![Value::Integer(id), Value::Integer(amount)])
    }

    #[test]
    fn same_path_gives_same_id() -> Result<()> {
        let data_dir = tempdir()?;
        let path = data_dir.path().join("t.dat");
        let f1 = HeapFile::open(&path, schema())?;
        let f2 = HeapFile::open(data_dir.path().join(".").join("t.dat"), schema())?;
        let other = HeapFile::open(data_dir.path().join("u.dat"), schema())?;

        assert_eq!(f1.id(), f2.id());
        assert_ne!(f1.id(), other.id());
        assert_eq!(f1.num_pages()?, 0);
        Ok(())
    }

    #[test]
    fn read_and_write_pages() -> Result<()> {
        let data_dir = tempdir()?;
        let file = HeapFile::open(data_dir.path().join("t.dat"), schema())?;
        let schema = Arc::new(schema());

        let mut page = HeapPage::new((file.id(), 0), schema.clone(), &HeapPage::empty_page_data())?;
        page.insert_tuple(row(1, 10))?;
        file.write_page(&page)?;
        assert_eq!(file.num_pages()?, 1);

        // overwrite in place
        page.insert_tuple(row(2, 20))?;
        file.write_page(&page)?;
        assert_eq!(file.num_pages()?, 1);

        let read = file.read_page(0)?;
        assert_eq!(read.iter().count(), 2);
        assert_eq!(read.page_data(), page.page_data());

        // writing past the end would leave a gap
        let gap = HeapPage::new((file.id(), 5), schema, &HeapPage::empty_page_data())?;
        let err = file.write_page(&gap).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::PageOutOfRange { page_no: 5, .. })
        ));

        let err = file.read_page(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::PageOutOfRange { page_no: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn truncated_file_is_a_short_read() -> Result<()> {
        let data_dir = tempdir()?;
        let path = data_dir.path().join("t.dat");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 10])?;
        let file = HeapFile::open(&path, schema())?;

        assert_eq!(file.num_pages()?, 1);
        assert!(file.read_page(0).is_ok());
        let err = file.read_page(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::ShortRead { read: 10, .. })
        ));
        Ok(())
    }

    #[test]
    fn inserts_fill_pages_densely() -> Result<()> {
        let data_dir = tempdir()?;
        let catalog = Catalog::new();
        let file = Arc::new(HeapFile::open(data_dir.path().join("t.dat"), schema())?);
        catalog.add_table(file.clone(), "t");
        let pool = BufferPool::new(catalog, 4);
        let tid = TransactionId::new();

        let slots_per_page = num_slots(file.schema());
        let count = 2 * slots_per_page + 3;
        let mut rng = rand::thread_rng();
        let mut expected = Vec::with_capacity(count);
        for i in 0..count {
            let tuple = row(i as i32, rng.gen());
            pool.insert_tuple(tid, file.id(), &tuple)?;
            expected.push(tuple);
        }

        assert_eq!(file.num_pages()? as usize, count.div_ceil(slots_per_page));
        let scanned = file.iter(&pool, tid).collect::<Result<Vec<_>>>()?;
        assert_eq!(scanned.len(), count);
        for (tuple, expected) in scanned.iter().zip(expected.iter()) {
            assert_eq!(tuple.values(), expected.values());
        }
        Ok(())
    }

    #[test]
    fn insert_picks_first_page_with_free_slot() -> Result<()> {
        let data_dir = tempdir()?;
        let catalog = Catalog::new();
        let file = Arc::new(HeapFile::open(data_dir.path().join("t.dat"), schema())?);
        catalog.add_table(file.clone(), "t");
        let pool = BufferPool::new(catalog, 2);
        let tid = TransactionId::new();

        let slots_per_page = num_slots(file.schema());
        for i in 0..3 * slots_per_page {
            pool.insert_tuple(tid, file.id(), &row(i as i32, 0))?;
        }
        assert_eq!(file.num_pages()?, 3);

        // free one slot on the middle page
        let victim = file
            .iter(&pool, tid)
            .map(|tuple| tuple.unwrap())
            .find(|tuple| tuple.record_id().unwrap().0 .1 == 1)
            .unwrap();
        pool.delete_tuple(tid, &victim)?;

        let pages = pool.insert_tuple(tid, file.id(), &row(-1, -1))?;
        assert_eq!(pages, vec![(file.id(), 1)]);
        assert_eq!(file.num_pages()?, 3);

        let inserted = file
            .iter(&pool, tid)
            .map(|tuple| tuple.unwrap())
            .find(|tuple| tuple.value(0) == &Value::Integer(-1))
            .unwrap();
        assert_eq!(inserted.record_id(), victim.record_id());
        Ok(())
    }

    #[test]
    fn deleted_tuples_disappear_from_scans() -> Result<()> {
        let data_dir = tempdir()?;
        let catalog = Catalog::new();
        let file = Arc::new(HeapFile::open(data_dir.path().join("t.dat"), schema())?);
        let other = Arc::new(HeapFile::open(data_dir.path().join("u.dat"), schema())?);
        catalog.add_table(file.clone(), "t");
        catalog.add_table(other.clone(), "u");
        let pool = BufferPool::new(catalog, 4);
        let tid = TransactionId::new();

        for i in 0..5 {
            pool.insert_tuple(tid, file.id(), &row(i, i))?;
        }
        pool.insert_tuple(tid, other.id(), &row(100, 100))?;

        let tuples = file.iter(&pool, tid).collect::<Result<Vec<_>>>()?;
        let foreign = other.iter(&pool, tid).next().unwrap()?;

        let err = file.delete_tuple(&pool, tid, &foreign).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::NotInTable { .. })
        ));
        assert_eq!(other.iter(&pool, tid).count(), 1);
        assert_eq!(file.iter(&pool, tid).count(), 5);

        file.delete_tuple(&pool, tid, &tuples[2])?;
        let remaining = file
            .iter(&pool, tid)
            .map(|tuple| tuple.unwrap().value(0).as_i32())
            .collect::<Vec<_>>();
        assert_eq!(remaining, vec![0, 1, 3, 4]);
        Ok(())
    }

    #[test]
    fn rejects_tuples_of_other_schema() -> Result<()> {
        let data_dir = tempdir()?;
        let catalog = Catalog::new();
        let file = Arc::new(HeapFile::open(data_dir.path().join("t.dat"), schema())?);
        catalog.add_table(file.clone(), "t");
        let pool = BufferPool::new(catalog, 2);

        let err = file
            .insert_tuple(&pool, TransactionId::new(), &Tuple::new(vec![Value::Integer(1)]))
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::SchemaMismatch { .. })
        ));
        assert_eq!(file.num_pages()?, 0);
        Ok(())
    }

    #[test]
    fn schemas_wider_than_a_page_are_rejected() -> Result<()> {
        let data_dir = tempdir()?;
        let path = data_dir.path().join("wide.dat");
        let wide = Schema::from_types(&[TypeId::Text; 32]);

        let err = HeapFile::open(&path, wide).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::TupleTooWide {
                tuple_size: 32 * TypeId::Text.len(),
                page_size: PAGE_SIZE,
            })
        );
        assert!(!path.exists());

        let err = HeapFile::open(&path, Schema::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::TupleTooWide { tuple_size: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn iterator_skips_empty_pages_and_rewinds() -> Result<()> {
        let data_dir = tempdir()?;
        let catalog = Catalog::new();
        let file = Arc::new(HeapFile::open(data_dir.path().join("t.dat"), schema())?);
        catalog.add_table(file.clone(), "t");
        let pool = BufferPool::new(catalog, 2);
        let tid = TransactionId::new();

        let schema = Arc::new(schema());
        for page_no in 0..3 {
            let mut page = HeapPage::new((file.id(), page_no), schema.clone(), &HeapPage::empty_page_data())?;
            if page_no != 1 {
                page.insert_tuple(row(page_no as i32, 0))?;
            }
            file.write_page(&page)?;
        }

        let mut iter = file.iter(&pool, tid);
        let first = iter
            .by_ref()
            .map(|tuple| tuple.unwrap().value(0).as_i32())
            .collect::<Vec<_>>();
        assert_eq!(first, vec![0, 2]);
        assert!(iter.next().is_none());

        iter.rewind();
        assert_eq!(iter.next().unwrap()?.value(0), &Value::Integer(0));
        Ok(())
    }
}
