//! Stratum - the storage engine core of a disk-oriented RDBMS
//!
//! This crate provides the paged storage layer a relational database is
//! built on: pages live on disk, a buffer pool caches them in a fixed set
//! of in-memory frames, and an index structure organizes keys on top.
//!
//! # Architecture
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: serves page fetch/new/unpin/flush/delete
//!     requests over a fixed frame array
//!   - `LruKReplacer`: LRU-K eviction policy over frame access history
//!   - `Page`: per-frame metadata, payload and the page rw-latch
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pin + latch guards
//!
//! - **Containers** (`container`): in-memory data structures
//!   - `ExtendibleHashTable`: the page-id to frame-id lookup, with
//!     directory doubling and bucket splits
//!
//! - **Storage** (`storage`): disk I/O and raw page formats
//!   - `DiskManager`: page reads and writes on the backing file
//!   - `DiskScheduler`: background I/O worker thread
//!   - `HeaderPage`: page 0, the index-name to root-page-id registry
//!
//! - **Index** (`index`): a B+Tree built on the buffer pool
//!   - `BPlusTree`: unique-key ordered index with split, merge and
//!     redistribute maintenance
//!   - `BTreeIterator`: ordered scans over the leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratum::buffer::BufferPoolManager;
//! use stratum::common::{PageId, RecordId, SlotId};
//! use stratum::index::BPlusTree;
//! use stratum::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let mut index = BPlusTree::new("orders_pk", Arc::clone(&bpm), 128, 128).unwrap();
//! index.insert(42, RecordId::new(PageId::new(7), SlotId::new(0))).unwrap();
//! assert!(index.get(42).unwrap().is_some());
//!
//! for entry in index.begin().unwrap() {
//!     let (key, rid) = entry.unwrap();
//!     println!("{key} -> {:?}", rid);
//! }
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, StratumError};
