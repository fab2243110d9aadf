pub mod error;
pub mod memory_store;

pub use error::StoreError;
pub use memory_store::{MemorySeriesStore, SeriesRecord};
