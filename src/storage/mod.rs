//! Item storage for Seedbed.
//!
//! This module provides the persistence boundary for item collections,
//! supporting file-based and in-memory backends.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileItemStore;
pub use memory::MemoryItemStore;
pub use traits::ItemStore;
