//! Storage Interface
//!
//! The traits in this module are the whole surface the command layer sees.
//! Backends hand out boxed transactions so that handlers can stay
//! backend-agnostic and be tested against failing fakes.

use crate::storage::model::User;
use std::ops::{Deref, DerefMut};
use thiserror::Error;
use tracing::warn;

/// Errors reported by a storage backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No user with this id exists
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// `add_user` was called for an id that already exists
    #[error("user '{0}' already exists")]
    UserExists(String),

    /// A character with this name already belongs to the user
    #[error("character '{0}' already exists")]
    CharacterExists(String),

    /// The user has no character with this name
    #[error("character '{0}' not found")]
    CharacterNotFound(String),

    /// A mutation was attempted through a read-only transaction
    #[error("transaction is read-only")]
    ReadOnly,

    /// The transaction was already committed or rolled back
    #[error("transaction is closed")]
    Closed,

    /// Another transaction committed the same user first
    #[error("concurrent update to user '{0}'")]
    Conflict(String),

    /// The backend is unusable (poisoned lock, lost connection, ...)
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Entry point of a storage backend.
pub trait UserApi: Send + Sync {
    /// Begins a transaction. Mutations need `writable == true`.
    fn new_transaction(&self, writable: bool) -> Result<Box<dyn Transaction + '_>, StorageError>;
}

/// A unit of work against a [`UserApi`].
pub trait Transaction {
    /// Fetches a copy of the user.
    fn get_user(&self, id: &str) -> Result<User, StorageError>;

    /// Creates a user. The new user is only visible to other transactions
    /// after it has been saved and committed.
    fn add_user(&mut self, id: &str) -> Result<User, StorageError>;

    /// Stages the user for writing on commit.
    fn save_user(&mut self, user: &User) -> Result<(), StorageError>;

    /// Makes all staged writes visible atomically.
    fn commit(&mut self) -> Result<(), StorageError>;

    /// Discards all staged writes. Must be a no-op after a successful commit.
    fn rollback(&mut self) -> Result<(), StorageError>;
}

/// A transaction that rolls back when dropped.
///
/// Committing first turns the final rollback into a no-op, so callers never
/// need to remember to clean up on error paths.
pub struct TxGuard<'a> {
    tx: Box<dyn Transaction + 'a>,
}

impl<'a> TxGuard<'a> {
    /// Wraps an already started transaction.
    pub fn new(tx: Box<dyn Transaction + 'a>) -> Self {
        Self { tx }
    }
}

impl<'a> Deref for TxGuard<'a> {
    type Target = dyn Transaction + 'a;

    fn deref(&self) -> &Self::Target {
        self.tx.as_ref()
    }
}

impl DerefMut for TxGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.tx.as_mut()
    }
}

impl Drop for TxGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.tx.rollback() {
            warn!(error = %e, "Transaction rollback failed");
        }
    }
}

/// Begins a transaction on `api` wrapped in a [`TxGuard`].
pub fn begin<A>(api: &A, writable: bool) -> Result<TxGuard<'_>, StorageError>
where
    A: UserApi + ?Sized,
{
    api.new_transaction(writable).map(TxGuard::new)
}
