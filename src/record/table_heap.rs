use std::sync::{Arc, Mutex};

use super::error::{RecordError, RecordResult};
use super::table_page::{SlotNum, TablePage, UpdateResult};
use super::RecordId;
use crate::file::{BufferPoolManager, FreeSpaceManager, PageId, INVALID_PAGE_ID};

/// A table stored as a singly linked chain of slotted pages.
///
/// The heap shares the buffer pool with every other component. Pages are
/// pinned for the duration of a single operation and released before it
/// returns, on success and error paths alike; row bytes are copied out under
/// the pin so no view ever outlives it.
pub struct TableHeap {
    pool: Arc<Mutex<BufferPoolManager>>,
    free_space: Option<Arc<FreeSpaceManager>>,
    first_page_id: PageId,
}

impl TableHeap {
    /// `free_space` may be `None` for a heap that must never allocate pages
    pub fn new(
        pool: Arc<Mutex<BufferPoolManager>>,
        free_space: Option<Arc<FreeSpaceManager>>,
        first_page_id: PageId,
    ) -> Self {
        Self {
            pool,
            free_space,
            first_page_id,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Insert into the first page of the chain with room, extending the
    /// chain by one freshly allocated page when every page is full
    pub fn insert_record(&mut self, record: &[u8]) -> RecordResult<RecordId> {
        let mut current = self.first_page_id;
        let mut last = INVALID_PAGE_ID;

        while current != INVALID_PAGE_ID {
            let next;
            {
                let mut pool = self.pool.lock().unwrap();
                let frame_id = pool.fetch_page(current)?;
                let (inserted, next_page) = {
                    let mut page = TablePage::new(pool.frame_data_mut(frame_id));
                    (page.insert_record(record), page.next_page_id())
                };
                if let Some(slot) = inserted {
                    pool.unpin_page(current, true)?;
                    return Ok(RecordId::new(current, slot));
                }
                pool.unpin_page(current, false)?;
                next = next_page;
            }
            last = current;
            current = next;
        }

        // every page is full, or the heap is empty
        let free_space = self.free_space.as_ref().ok_or(RecordError::NotExtendable)?;
        let new_page_id = free_space.allocate_page()?;

        let mut pool = self.pool.lock().unwrap();
        let frame_id = pool.new_page(new_page_id)?;
        let inserted = {
            let mut page = TablePage::new(pool.frame_data_mut(frame_id));
            page.init();
            page.insert_record(record)
        };
        let slot = match inserted {
            Some(slot) => slot,
            None => {
                pool.unpin_page(new_page_id, false)?;
                pool.delete_page(new_page_id)?;
                drop(pool);
                let _ = free_space.deallocate_page(new_page_id);
                return Err(RecordError::RecordTooLarge(record.len()));
            }
        };
        pool.unpin_page(new_page_id, true)?;

        if self.first_page_id == INVALID_PAGE_ID {
            self.first_page_id = new_page_id;
        } else {
            let frame_id = pool.fetch_page(last)?;
            {
                let mut page = TablePage::new(pool.frame_data_mut(frame_id));
                page.set_next_page_id(new_page_id);
            }
            pool.unpin_page(last, true)?;
        }

        Ok(RecordId::new(new_page_id, slot))
    }

    /// Copy out a row's bytes; read-only, the pin is released clean
    pub fn get_record(&self, rid: RecordId) -> RecordResult<Vec<u8>> {
        let mut pool = self.pool.lock().unwrap();
        let frame_id = pool.fetch_page(rid.page_id)?;
        let bytes = {
            let page = TablePage::new(pool.frame_data_mut(frame_id));
            page.get_record(rid.slot).map(|b| b.to_vec())
        };
        pool.unpin_page(rid.page_id, false)?;
        bytes.ok_or(RecordError::RecordNotFound(rid))
    }

    /// Tombstone a row; its slot index stays occupied forever
    pub fn delete_record(&self, rid: RecordId) -> RecordResult<()> {
        let mut pool = self.pool.lock().unwrap();
        let frame_id = pool.fetch_page(rid.page_id)?;
        let deleted = {
            let mut page = TablePage::new(pool.frame_data_mut(frame_id));
            page.delete_record(rid.slot)
        };
        pool.unpin_page(rid.page_id, deleted)?;
        if deleted {
            Ok(())
        } else {
            Err(RecordError::RecordNotFound(rid))
        }
    }

    /// Rewrite a row. When the new bytes no longer fit on their page the row
    /// is deleted and reinserted elsewhere, so the returned RecordId may
    /// differ from `rid`.
    pub fn update_record(&mut self, rid: RecordId, record: &[u8]) -> RecordResult<RecordId> {
        let outcome = {
            let mut pool = self.pool.lock().unwrap();
            let frame_id = pool.fetch_page(rid.page_id)?;
            let outcome = {
                let mut page = TablePage::new(pool.frame_data_mut(frame_id));
                page.update_record(rid.slot, record)
            };
            pool.unpin_page(rid.page_id, outcome == UpdateResult::Updated)?;
            outcome
        };
        match outcome {
            UpdateResult::Updated => Ok(rid),
            UpdateResult::NotFound => Err(RecordError::RecordNotFound(rid)),
            UpdateResult::OutOfSpace => {
                self.delete_record(rid)?;
                self.insert_record(record)
            }
        }
    }

    /// Iterate rows in (page, slot) order, skipping tombstones and
    /// following the chain. The iterator holds no pins between steps; each
    /// step fetches, copies and unpins.
    pub fn iter(&self) -> TableIter {
        TableIter {
            pool: self.pool.clone(),
            current_page: self.first_page_id,
            current_slot: 0,
        }
    }
}

pub struct TableIter {
    pool: Arc<Mutex<BufferPoolManager>>,
    current_page: PageId,
    current_slot: SlotNum,
}

impl Iterator for TableIter {
    type Item = RecordResult<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_page == INVALID_PAGE_ID {
                return None;
            }

            let mut pool = self.pool.lock().unwrap();
            let frame_id = match pool.fetch_page(self.current_page) {
                Ok(frame_id) => frame_id,
                Err(e) => {
                    self.current_page = INVALID_PAGE_ID;
                    return Some(Err(e.into()));
                }
            };
            let (found, next_page) = {
                let page = TablePage::new(pool.frame_data_mut(frame_id));
                let num_records = page.num_records();
                let mut found = None;
                let mut slot = self.current_slot;
                while slot < num_records {
                    if let Some(bytes) = page.get_record(slot) {
                        found = Some((slot, bytes.to_vec()));
                        break;
                    }
                    slot += 1;
                }
                (found, page.next_page_id())
            };
            if let Err(e) = pool.unpin_page(self.current_page, false) {
                self.current_page = INVALID_PAGE_ID;
                return Some(Err(e.into()));
            }

            match found {
                Some((slot, bytes)) => {
                    let rid = RecordId::new(self.current_page, slot);
                    self.current_slot = slot + 1;
                    return Some(Ok((rid, bytes)));
                }
                None => {
                    self.current_page = next_page;
                    self.current_slot = 0;
                }
            }
        }
    }
}
