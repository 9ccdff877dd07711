use super::{PageId, FREE_SPACE_MAP_PAGE_ID, INVALID_PAGE_ID, PAGE_SIZE};

/// Magic bytes identifying an initialized database file
pub const MAGIC: &[u8; 8] = b"TINYDB01";

const MAGIC_OFFSET: usize = 0;
const PAGE_COUNT_OFFSET: usize = 8;
const CATALOG_ROOT_OFFSET: usize = 12;
const FS_MAP_ROOT_OFFSET: usize = 16;

/// Typed overlay for page 0, the database superblock: magic, the page-count
/// high-water mark, the catalog root and the free-space map root. Fields are
/// read and written little-endian directly on the frame bytes; the rest of
/// the page stays zero.
pub struct DbHeader<'a> {
    data: &'a mut [u8],
}

impl<'a> DbHeader<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Stamp a fresh header: the two reserved pages are accounted for and
    /// no catalog exists yet
    pub fn init(&mut self) {
        self.data.fill(0);
        self.data[MAGIC_OFFSET..MAGIC_OFFSET + 8].copy_from_slice(MAGIC);
        self.set_page_count(2);
        self.set_catalog_root(INVALID_PAGE_ID);
        self.set_fs_map_root(FREE_SPACE_MAP_PAGE_ID);
    }

    pub fn is_valid(&self) -> bool {
        self.data[MAGIC_OFFSET..MAGIC_OFFSET + 8] == MAGIC[..]
    }

    pub fn page_count(&self) -> u32 {
        read_u32(self.data, PAGE_COUNT_OFFSET)
    }

    pub fn set_page_count(&mut self, count: u32) {
        write_u32(self.data, PAGE_COUNT_OFFSET, count);
    }

    pub fn catalog_root(&self) -> PageId {
        read_i32(self.data, CATALOG_ROOT_OFFSET)
    }

    pub fn set_catalog_root(&mut self, page_id: PageId) {
        write_i32(self.data, CATALOG_ROOT_OFFSET, page_id);
    }

    pub fn fs_map_root(&self) -> PageId {
        read_i32(self.data, FS_MAP_ROOT_OFFSET)
    }

    pub fn set_fs_map_root(&mut self, page_id: PageId) {
        write_i32(self.data, FS_MAP_ROOT_OFFSET, page_id);
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_i32(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn write_i32(data: &mut [u8], offset: usize, value: i32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
