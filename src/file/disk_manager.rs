use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::{FileError, FileResult};
use super::{PageId, PAGE_SIZE};

/// Byte-level page I/O on the single database file. A mutex serializes all
/// reads and writes so the manager can be shared; no allocation policy lives
/// here.
pub struct DiskManager {
    file: Mutex<File>,
    path: PathBuf,
}

impl DiskManager {
    /// Open the database file, creating it if it does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one page into `buffer`. A page that was never written (or only
    /// partially exists at the end of the file) reports `PageNotFound`.
    pub fn read_page(&self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
        debug_assert_eq!(buffer.len(), PAGE_SIZE);
        if page_id < 0 {
            return Err(FileError::InvalidPageId(page_id));
        }

        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        match file.read_exact(buffer) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(FileError::PageNotFound(page_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Write one page, extending the file as needed
    pub fn write_page(&self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        debug_assert_eq!(buffer.len(), PAGE_SIZE);
        if page_id < 0 {
            return Err(FileError::InvalidPageId(page_id));
        }

        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        file.write_all(buffer)?;
        Ok(())
    }

    /// Number of whole pages currently in the file
    pub fn file_size_in_pages(&self) -> FileResult<PageId> {
        let file = self.file.lock().unwrap();
        let len = file.metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as PageId)
    }

    /// Flush OS buffers to stable storage
    pub fn sync(&self) -> FileResult<()> {
        let file = self.file.lock().unwrap();
        file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DiskManager) {
        let temp_dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::open(temp_dir.path().join("test.db")).unwrap();
        (temp_dir, disk)
    }

    #[test]
    fn test_open_creates_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("fresh.db");
        assert!(!path.exists());

        let disk = DiskManager::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(disk.file_size_in_pages().unwrap(), 0);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (_temp_dir, disk) = setup();

        let mut page = vec![0u8; PAGE_SIZE];
        page[0] = 42;
        page[100] = 99;
        page[PAGE_SIZE - 1] = 255;
        disk.write_page(0, &page).unwrap();

        let mut read_back = vec![0u8; PAGE_SIZE];
        disk.read_page(0, &mut read_back).unwrap();
        assert_eq!(read_back, page);
    }

    #[test]
    fn test_read_missing_page() {
        let (_temp_dir, disk) = setup();

        let mut buffer = vec![0u8; PAGE_SIZE];
        let result = disk.read_page(7, &mut buffer);
        assert!(matches!(result, Err(FileError::PageNotFound(7))));
    }

    #[test]
    fn test_negative_page_id() {
        let (_temp_dir, disk) = setup();

        let mut buffer = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            disk.read_page(-1, &mut buffer),
            Err(FileError::InvalidPageId(-1))
        ));
        assert!(matches!(
            disk.write_page(-1, &buffer),
            Err(FileError::InvalidPageId(-1))
        ));
    }

    #[test]
    fn test_file_size_in_pages() {
        let (_temp_dir, disk) = setup();
        assert_eq!(disk.file_size_in_pages().unwrap(), 0);

        let page = vec![0u8; PAGE_SIZE];
        disk.write_page(0, &page).unwrap();
        assert_eq!(disk.file_size_in_pages().unwrap(), 1);

        // writing past the end extends the file
        disk.write_page(5, &page).unwrap();
        assert_eq!(disk.file_size_in_pages().unwrap(), 6);
    }

    #[test]
    fn test_write_visible_to_subsequent_read() {
        let (_temp_dir, disk) = setup();

        for i in 0..4 {
            let mut page = vec![0u8; PAGE_SIZE];
            page[0] = i as u8;
            disk.write_page(i, &page).unwrap();
        }
        for i in 0..4 {
            let mut page = vec![0u8; PAGE_SIZE];
            disk.read_page(i, &mut page).unwrap();
            assert_eq!(page[0], i as u8);
        }
    }
}
