use std::io;
use thiserror::Error;

use super::PageId;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Page not found: page_id={0}")]
    PageNotFound(PageId),

    #[error("All buffer pool frames are pinned")]
    PoolExhausted,

    #[error("Page is pinned: page_id={0}")]
    PagePinned(PageId),

    #[error("Page is not pinned: page_id={0}")]
    PageNotPinned(PageId),

    #[error("Invalid page id: {0}")]
    InvalidPageId(PageId),

    #[error("Page id {0} is reserved")]
    ReservedPage(PageId),

    #[error("Page id {0} exceeds the free-space map capacity")]
    PageIdOutOfRange(PageId),
}

pub type FileResult<T> = Result<T, FileError>;
