//! 基础设施层：持有存储资源，只暴露能力

pub mod blob_store;
pub mod document_store;
pub mod memory_store;

pub use blob_store::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use document_store::{
    field_str, field_value, get_as, query_as, DocChange, Direction, Document, DocumentStore,
    FieldChange, FieldUpdates, FieldValue, Query, Snapshot,
};
pub use memory_store::MemoryStore;
