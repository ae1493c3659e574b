use thiserror::Error;

use crate::common::{PageId, PageNo, RecordId, TableId};
use crate::executors::aggregator::AggregateOp;
use crate::tuple::schema::TypeId;
use crate::tuple::value::CompareOp;

/// Failures raised by the storage layer and the executors.
/// They travel inside `anyhow::Error` and can be recovered with `downcast_ref`.
#[derive(Error, Debug, PartialEq)]
pub enum DbError {
    #[error("Tuple of shape {found} does not match schema {expected}")]
    SchemaMismatch { expected: String, found: String },

    #[error("Tuple at {record_id:?} does not belong to table {table_id}")]
    NotInTable {
        record_id: RecordId,
        table_id: TableId,
    },

    #[error("Tuple does not carry a record id")]
    MissingRecordId,

    #[error("Slot {slot} on page {page_id:?} is empty")]
    SlotEmpty { page_id: PageId, slot: u16 },

    #[error("Page {0:?} has no free slot")]
    PageFull(PageId),

    #[error("Tuples of {tuple_size} bytes do not fit on a page of {page_size} bytes")]
    TupleTooWide { tuple_size: usize, page_size: usize },

    #[error("Page {page_no} is out of range for table {table_id} with {num_pages} pages")]
    PageOutOfRange {
        table_id: TableId,
        page_no: PageNo,
        num_pages: PageNo,
    },

    #[error("Could only read {read} of {expected} bytes for page {page_id:?}")]
    ShortRead {
        page_id: PageId,
        read: usize,
        expected: usize,
    },

    #[error("Executor is not open")]
    NotOpen,

    #[error("Executor has no more tuples")]
    NoMoreTuples,

    #[error("Aggregate {op} is not supported on {type_id} fields")]
    UnsupportedAggregate { op: AggregateOp, type_id: TypeId },

    #[error("Cannot compare {left} with {right} using {op}")]
    IncomparableValues {
        left: TypeId,
        right: TypeId,
        op: CompareOp,
    },

    #[error("No table with id {0}")]
    UnknownTable(TableId),

    #[error("No column named {0}")]
    UnknownColumn(String),

    #[error("All {0} buffers in the buffer pool are pinned")]
    BufferPoolExhausted(usize),
}
