mod error;
mod schema;
mod table_heap;
mod table_page;
mod value;

pub use error::{RecordError, RecordResult};
pub use schema::{Column, Schema, DEFAULT_VARCHAR_LENGTH};
pub use table_heap::{TableHeap, TableIter};
pub use table_page::{SlotNum, TablePage, UpdateResult};
pub use value::{ColumnType, Value};

use crate::file::PageId;

/// Identifies a row for as long as it lives on its page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotNum,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: SlotNum) -> Self {
        Self { page_id, slot }
    }
}
