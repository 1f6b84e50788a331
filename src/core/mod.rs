//! Core module - Target access and memory caching
//!
//! This module contains the process control backend, the memory readers
//! and the paged snapshot cache the traversal engine reads through.

pub mod cache;
pub mod debugger;
pub mod memory;
pub mod pool;

// Re-export common types
pub use cache::{CacheStats, PagedMemoryCache};
pub use debugger::{DebugError, Debugger, TargetState};
pub use memory::{ImageMemory, MemoryError, MemoryReader, ProcessMemory};
pub use pool::BufferPool;
