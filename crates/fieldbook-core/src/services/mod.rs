//! Record-layer services built on the local store.

mod records;

pub use records::RecordService;
