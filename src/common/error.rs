use thiserror::Error;

use super::types::PageId;

/// Database error types
#[derive(Error, Debug)]
pub enum StratumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Buffer pool exhausted, no free or evictable frame available")]
    PoolExhausted,

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Index name {0:?} exceeds the header record size")]
    IndexNameTooLong(String),

    #[error("Header page is full")]
    HeaderFull,

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),
}

pub type Result<T> = std::result::Result<T, StratumError>;
