//! Backing stores for [`Cache`](crate::core::cache::Cache)

pub mod memory;

pub use memory::MemoryCache;
