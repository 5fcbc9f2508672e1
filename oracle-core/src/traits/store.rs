use std::fmt::Debug;
use std::future::Future;

use async_trait::async_trait;
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    Chain, MessageId, MessageRecord, MessageUpdate, RecordId, RunnerServiceStatus, StoreResult,
    TransactionRecord, TransactionUpdate, H160,
};

/// Proof of holding the write lock on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockHandle {
    /// Locked resource, see [`transaction_resource`] and [`message_resource`]
    pub resource: String,
    /// Lease token
    pub token: Uuid,
}

/// Lock resource name of a transaction document.
pub fn transaction_resource(id: RecordId) -> String {
    format!("transactions/{id}")
}

/// Lock resource name of a message document.
pub fn message_resource(id: RecordId) -> String {
    format!("messages/{id}")
}

/// Durable state shared by every oracle node, plus the named write lock
/// they coordinate through.
///
/// Inserts are idempotent: inserting a document that collides with an
/// existing one (same chain, hash and recipient for transactions, same
/// message id for messages) stores nothing and returns the existing id.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait OracleStore: Send + Sync + Debug {
    /// Insert a transaction, returning its id or the id of the existing duplicate.
    async fn insert_transaction(&self, tx: TransactionRecord) -> StoreResult<RecordId>;

    /// Apply a partial update to a transaction.
    async fn update_transaction(&self, id: RecordId, update: TransactionUpdate) -> StoreResult<()>;

    /// Fetch a transaction.
    async fn get_transaction(&self, id: RecordId) -> StoreResult<Option<TransactionRecord>>;

    /// Pending transactions on `chain` sent to `to`.
    async fn get_pending_transactions_to(
        &self,
        chain: &Chain,
        to: H160,
    ) -> StoreResult<Vec<TransactionRecord>>;

    /// Confirmed transactions on `chain` sent to `to`.
    async fn get_confirmed_transactions_to(
        &self,
        chain: &Chain,
        to: H160,
    ) -> StoreResult<Vec<TransactionRecord>>;

    /// Insert a message, returning its id or the id of the existing duplicate.
    async fn insert_message(&self, message: MessageRecord) -> StoreResult<RecordId>;

    /// Apply a partial update to a message.
    async fn update_message(&self, id: RecordId, update: MessageUpdate) -> StoreResult<()>;

    /// Apply a partial update to the message with the given message id,
    /// returning its document id.
    async fn update_message_by_message_id(
        &self,
        message_id: MessageId,
        update: MessageUpdate,
    ) -> StoreResult<RecordId>;

    /// Fetch a message.
    async fn get_message(&self, id: RecordId) -> StoreResult<Option<MessageRecord>>;

    /// Fetch a message by its content hash.
    async fn find_message_by_message_id(
        &self,
        message_id: MessageId,
    ) -> StoreResult<Option<MessageRecord>>;

    /// Messages bound for `chain` that `signer` has not signed yet, in
    /// pending or signed state, ordered by nonce.
    async fn get_pending_messages(
        &self,
        signer: &str,
        chain: &Chain,
    ) -> StoreResult<Vec<MessageRecord>>;

    /// Persist a runner status, keyed by name.
    async fn upsert_runner_status(&self, status: RunnerServiceStatus) -> StoreResult<()>;

    /// Last persisted status of a runner.
    async fn get_runner_status(&self, name: &str) -> StoreResult<Option<RunnerServiceStatus>>;

    /// Take the write lock on `resource`. Fails with
    /// [`crate::StoreError::LockContention`] if another holder has an
    /// unexpired lease.
    async fn lock_write(&self, resource: &str) -> StoreResult<LockHandle>;

    /// Release a lock taken with [`OracleStore::lock_write`].
    async fn unlock(&self, lock: LockHandle) -> StoreResult<()>;
}

/// Run `critical_section` while holding the write lock on `resource`.
///
/// The lock is released whatever the section returns. A failed release is
/// logged and left to the lease timeout.
pub async fn with_write_lock<S, F, T>(store: &S, resource: &str, critical_section: F) -> StoreResult<T>
where
    S: OracleStore + ?Sized,
    F: Future<Output = T>,
{
    let lock = store.lock_write(resource).await?;
    let output = critical_section.await;
    if let Err(err) = store.unlock(lock).await {
        warn!(resource, ?err, "Failed to release write lock");
    }
    Ok(output)
}
