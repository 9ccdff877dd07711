use thiserror::Error;

use super::RecordId;
use crate::file::FileError;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Record not found: page_id={} slot={}", .0.page_id, .0.slot)]
    RecordNotFound(RecordId),

    #[error("Record of {0} bytes does not fit in a page")]
    RecordTooLarge(usize),

    #[error("Table heap has no free-space manager and cannot grow")]
    NotExtendable,

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type RecordResult<T> = Result<T, RecordError>;
