//! Storage Collaborator Module
//!
//! Command handlers never touch persistence directly. They go through the
//! [`UserApi`] / [`Transaction`] interface defined here, which any backend
//! can implement. The crate ships one backend, [`MemoryStore`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Leaf handlers                           │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │ begin(writable)
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  TxGuard  (rolls back on drop unless committed)             │
//! │    get_user / add_user / save_user / commit / rollback      │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MemoryStore                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Discipline
//!
//! 1. Begin a transaction (read-only for lookups, writable for mutations)
//! 2. Fetch the user (or create it)
//! 3. Mutate the in-memory copy
//! 4. Save the user and commit
//! 5. On any failure, roll back (the guard does this on drop)
//!
//! ## Example
//!
//! ```
//! use needbot::storage::{begin, MemoryStore, UserApi};
//!
//! let store = MemoryStore::new();
//!
//! let mut tx = begin(&store, true).unwrap();
//! let mut user = tx.add_user("alice").unwrap();
//! user.add_character("Bob").unwrap();
//! tx.save_user(&user).unwrap();
//! tx.commit().unwrap();
//!
//! let tx = begin(&store, false).unwrap();
//! assert!(tx.get_user("alice").unwrap().character("Bob").is_some());
//! ```

pub mod api;
pub mod memory;
pub mod model;

// Re-export commonly used types
pub use api::{begin, StorageError, Transaction, TxGuard, UserApi};
pub use memory::{MemoryStore, StoreStats};
pub use model::{Character, User};
