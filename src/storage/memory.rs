//! Sharded In-Memory User Store
//!
//! This module implements the storage backend used by the bot binary and by
//! tests. Users are spread across shards, each behind its own `RwLock`, so
//! that commits for different users rarely contend.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Users are distributed across 64 shards by id hash.
//! 2. **Copy-On-Read**: Transactions work on cloned users; nothing is shared
//!    with the store until commit.
//! 3. **Writer Locks**: A writable transaction takes the writer lock of a
//!    user's shard the first time it touches that user and keeps it until
//!    commit, rollback or drop. Concurrent writers for one user wait for each
//!    other instead of failing.
//! 4. **Versions**: Every committed user carries a version. Commit fails with
//!    [`StorageError::Conflict`] if a staged user was read outside the
//!    writer lock (e.g. through a read-only transaction) and is stale.
//! 5. **Ordered Locking**: Commit takes the write locks of all touched shards
//!    in index order, checks every version, then writes. Either all staged
//!    users land or none do.
//!
//! ## Transaction States
//!
//! ```text
//!            commit() ok
//!   Open ───────────────────> Committed
//!    │                            │
//!    │ rollback()                 │ rollback() = no-op
//!    ▼                            ▼
//!  RolledBack <───────────────────┘
//! ```

use crate::storage::api::{StorageError, Transaction, UserApi};
use crate::storage::model::User;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard, TryLockError};
use tracing::{debug, trace};

/// Number of shards for the user store.
const NUM_SHARDS: usize = 64;

type UserMap = HashMap<String, User>;

/// A single shard holding a portion of the users.
#[derive(Debug)]
struct Shard {
    users: RwLock<UserMap>,

    /// Held by the writable transaction working on this shard
    writer: Mutex<()>,
}

impl Shard {
    fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
        }
    }
}

/// Thread-safe in-memory implementation of [`UserApi`].
///
/// Wrap it in an `Arc` and share it between all message tasks.
pub struct MemoryStore {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: number of committed users
    user_count: AtomicU64,

    /// Statistics: transactions begun
    tx_count: AtomicU64,

    /// Statistics: users staged with save_user
    save_count: AtomicU64,

    /// Statistics: successful commits
    commit_count: AtomicU64,

    /// Statistics: transactions rolled back while open
    rollback_count: AtomicU64,

    /// Statistics: commits rejected because of a concurrent update
    conflict_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("users", &self.user_count.load(Ordering::Relaxed))
            .field("commits", &self.commit_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::new()).collect();

        Self {
            shards,
            user_count: AtomicU64::new(0),
            tx_count: AtomicU64::new(0),
            save_count: AtomicU64::new(0),
            commit_count: AtomicU64::new(0),
            rollback_count: AtomicU64::new(0),
            conflict_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a user id belongs to.
    #[inline]
    fn shard_index(&self, id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Returns a committed snapshot of a user.
    pub fn user(&self, id: &str) -> Result<Option<User>, StorageError> {
        let shard = &self.shards[self.shard_index(id)];
        let users = shard.users.read().map_err(|_| poisoned())?;
        Ok(users.get(id).cloned())
    }

    /// Returns the number of committed users.
    pub fn len(&self) -> u64 {
        self.user_count.load(Ordering::Relaxed)
    }

    /// Returns true if no user was ever committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            users: self.user_count.load(Ordering::Relaxed),
            transactions: self.tx_count.load(Ordering::Relaxed),
            saves: self.save_count.load(Ordering::Relaxed),
            commits: self.commit_count.load(Ordering::Relaxed),
            rollbacks: self.rollback_count.load(Ordering::Relaxed),
            conflicts: self.conflict_count.load(Ordering::Relaxed),
        }
    }

    /// Writes all staged users if none of them changed since they were read.
    fn apply(&self, staged: &HashMap<String, User>) -> Result<(), StorageError> {
        let indices: BTreeSet<usize> = staged.keys().map(|id| self.shard_index(id)).collect();

        let mut guards: BTreeMap<usize, RwLockWriteGuard<'_, UserMap>> = BTreeMap::new();
        for index in indices {
            let guard = self.shards[index].users.write().map_err(|_| poisoned())?;
            guards.insert(index, guard);
        }

        for (id, user) in staged {
            let current = guards
                .get(&self.shard_index(id))
                .and_then(|users| users.get(id))
                .map_or(0, |stored| stored.version);

            if current != user.version {
                self.conflict_count.fetch_add(1, Ordering::Relaxed);
                debug!(user = %id, read = user.version, stored = current, "Commit conflict");
                return Err(StorageError::Conflict(id.clone()));
            }
        }

        for (id, user) in staged {
            let Some(users) = guards.get_mut(&self.shard_index(id)) else {
                continue;
            };

            let mut committed = user.clone();
            committed.version += 1;

            if users.insert(id.clone(), committed).is_none() {
                self.user_count.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(())
    }
}

impl UserApi for MemoryStore {
    fn new_transaction(&self, writable: bool) -> Result<Box<dyn Transaction + '_>, StorageError> {
        self.tx_count.fetch_add(1, Ordering::Relaxed);
        trace!(writable, "Transaction started");

        Ok(Box::new(MemoryTransaction {
            store: self,
            writable,
            staged: HashMap::new(),
            writers: RefCell::new(BTreeMap::new()),
            state: TxState::Open,
        }))
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of committed users
    pub users: u64,
    /// Transactions begun
    pub transactions: u64,
    /// Users staged with save_user
    pub saves: u64,
    /// Successful commits
    pub commits: u64,
    /// Open transactions rolled back
    pub rollbacks: u64,
    /// Commits (or writer locks) rejected by a concurrent update
    pub conflicts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    RolledBack,
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    writable: bool,
    staged: HashMap<String, User>,
    writers: RefCell<BTreeMap<usize, MutexGuard<'a, ()>>>,
    state: TxState,
}

impl<'a> MemoryTransaction<'a> {
    /// Takes the writer lock of `id`'s shard for the rest of the transaction.
    ///
    /// Only the first lock blocks. Further shards are tried without waiting
    /// and fail with `Conflict` when busy, so two multi-user transactions can
    /// never deadlock.
    fn lock_writer(&self, id: &str) -> Result<(), StorageError> {
        if !self.writable {
            return Ok(());
        }

        let store: &'a MemoryStore = self.store;
        let index = store.shard_index(id);
        let mut writers = self.writers.borrow_mut();
        if writers.contains_key(&index) {
            return Ok(());
        }

        let writer = &store.shards[index].writer;
        let guard = if writers.is_empty() {
            // The lock guards no data, so poisoning carries no meaning
            writer.lock().unwrap_or_else(PoisonError::into_inner)
        } else {
            match writer.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(e)) => e.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    store.conflict_count.fetch_add(1, Ordering::Relaxed);
                    debug!(user = %id, "Writer lock busy");
                    return Err(StorageError::Conflict(id.to_string()));
                }
            }
        };

        trace!(user = %id, shard = index, "Writer lock taken");
        writers.insert(index, guard);
        Ok(())
    }

    fn release_writers(&mut self) {
        self.writers.get_mut().clear();
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.state != TxState::Open {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StorageError> {
        self.ensure_open()?;
        if !self.writable {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn get_user(&self, id: &str) -> Result<User, StorageError> {
        self.ensure_open()?;
        self.lock_writer(id)?;

        if let Some(user) = self.staged.get(id) {
            return Ok(user.clone());
        }

        self.store
            .user(id)?
            .ok_or_else(|| StorageError::UserNotFound(id.to_string()))
    }

    fn add_user(&mut self, id: &str) -> Result<User, StorageError> {
        self.ensure_writable()?;
        self.lock_writer(id)?;

        if self.staged.contains_key(id) || self.store.user(id)?.is_some() {
            return Err(StorageError::UserExists(id.to_string()));
        }

        Ok(User::new(id))
    }

    fn save_user(&mut self, user: &User) -> Result<(), StorageError> {
        self.ensure_writable()?;
        self.lock_writer(user.id())?;

        self.store.save_count.fetch_add(1, Ordering::Relaxed);
        self.staged.insert(user.id().to_string(), user.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.ensure_writable()?;

        self.store.apply(&self.staged)?;

        self.store.commit_count.fetch_add(1, Ordering::Relaxed);
        trace!(users = self.staged.len(), "Transaction committed");
        self.staged.clear();
        self.state = TxState::Committed;
        self.release_writers();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if self.state == TxState::Open {
            self.store.rollback_count.fetch_add(1, Ordering::Relaxed);
            trace!(discarded = self.staged.len(), "Transaction rolled back");
            self.staged.clear();
            self.state = TxState::RolledBack;
        }
        self.release_writers();
        Ok(())
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("shard lock poisoned".to_string())
}
