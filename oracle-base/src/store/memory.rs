use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use oracle_core::utils::fmt_address;
use oracle_core::{
    Chain, LockHandle, MessageId, MessageRecord, MessageUpdate, OracleStore,
    RecordId, RunnerServiceStatus, StoreError, StoreResult, TransactionRecord, TransactionStatus,
    TransactionUpdate, H160, H256,
};

use crate::settings::StoreConfig;
use crate::LeaseLock;

type TransactionKey = (String, H256, String);

#[derive(Debug, Default)]
struct Collections {
    transactions: HashMap<RecordId, TransactionRecord>,
    transaction_index: HashMap<TransactionKey, RecordId>,
    messages: HashMap<RecordId, MessageRecord>,
    message_index: HashMap<MessageId, RecordId>,
    runner_statuses: HashMap<String, RunnerServiceStatus>,
}

fn transaction_key(tx: &TransactionRecord) -> TransactionKey {
    (tx.chain.chain_id.clone(), tx.hash, tx.to_address.clone())
}

/// Store kept in process memory. Every agent sharing one instance sees the
/// same documents and contends on the same locks.
#[derive(Debug)]
pub struct InMemoryStore {
    collections: RwLock<Collections>,
    locks: LeaseLock,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl InMemoryStore {
    /// An empty store.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            collections: RwLock::new(Collections::default()),
            locks: LeaseLock::new(Duration::from_millis(config.lock_lease_timeout_ms)),
        }
    }

    /// Every stored transaction, in no particular order.
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.collections.read().transactions.values().cloned().collect()
    }

    /// Every stored message, in no particular order.
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.collections.read().messages.values().cloned().collect()
    }

    fn transactions_to(
        &self,
        chain: &Chain,
        to: H160,
        status: TransactionStatus,
    ) -> Vec<TransactionRecord> {
        let to = fmt_address(&to);
        let mut found: Vec<_> = self
            .collections
            .read()
            .transactions
            .values()
            .filter(|tx| tx.chain.chain_id == chain.chain_id && tx.to_address == to && tx.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|tx| (tx.block_height, tx.created_at));
        found
    }
}

#[async_trait]
impl OracleStore for InMemoryStore {
    async fn insert_transaction(&self, tx: TransactionRecord) -> StoreResult<RecordId> {
        let mut collections = self.collections.write();
        let key = transaction_key(&tx);
        if let Some(existing) = collections.transaction_index.get(&key) {
            debug!(tx_hash = ?tx.hash, id = %existing, "Transaction already stored");
            return Ok(*existing);
        }
        let id = tx.id;
        collections.transaction_index.insert(key, id);
        collections.transactions.insert(id, tx);
        Ok(id)
    }

    async fn update_transaction(&self, id: RecordId, update: TransactionUpdate) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let tx = collections
            .transactions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))?;
        update.apply(tx);
        Ok(())
    }

    async fn get_transaction(&self, id: RecordId) -> StoreResult<Option<TransactionRecord>> {
        Ok(self.collections.read().transactions.get(&id).cloned())
    }

    async fn get_pending_transactions_to(
        &self,
        chain: &Chain,
        to: H160,
    ) -> StoreResult<Vec<TransactionRecord>> {
        Ok(self.transactions_to(chain, to, TransactionStatus::Pending))
    }

    async fn get_confirmed_transactions_to(
        &self,
        chain: &Chain,
        to: H160,
    ) -> StoreResult<Vec<TransactionRecord>> {
        Ok(self.transactions_to(chain, to, TransactionStatus::Confirmed))
    }

    async fn insert_message(&self, message: MessageRecord) -> StoreResult<RecordId> {
        if message.message_id != message.content.id() {
            return Err(StoreError::InvalidDocument {
                id: message.id,
                reason: "message id does not match content".to_owned(),
            });
        }
        let mut collections = self.collections.write();
        if let Some(existing) = collections.message_index.get(&message.message_id) {
            debug!(message_id = ?message.message_id, id = %existing, "Message already stored");
            return Ok(*existing);
        }
        let id = message.id;
        collections.message_index.insert(message.message_id, id);
        collections.messages.insert(id, message);
        Ok(id)
    }

    async fn update_message(&self, id: RecordId, update: MessageUpdate) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let message = collections
            .messages
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))?;
        update.apply(message);
        Ok(())
    }

    async fn update_message_by_message_id(
        &self,
        message_id: MessageId,
        update: MessageUpdate,
    ) -> StoreResult<RecordId> {
        let mut collections = self.collections.write();
        let id = *collections
            .message_index
            .get(&message_id)
            .ok_or_else(|| StoreError::NotFound(format!("message id {message_id:?}")))?;
        let message = collections
            .messages
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))?;
        update.apply(message);
        Ok(id)
    }

    async fn get_message(&self, id: RecordId) -> StoreResult<Option<MessageRecord>> {
        Ok(self.collections.read().messages.get(&id).cloned())
    }

    async fn find_message_by_message_id(
        &self,
        message_id: MessageId,
    ) -> StoreResult<Option<MessageRecord>> {
        let collections = self.collections.read();
        Ok(collections
            .message_index
            .get(&message_id)
            .and_then(|id| collections.messages.get(id))
            .cloned())
    }

    async fn get_pending_messages(
        &self,
        signer: &str,
        chain: &Chain,
    ) -> StoreResult<Vec<MessageRecord>> {
        let mut found: Vec<_> = self
            .collections
            .read()
            .messages
            .values()
            .filter(|m| m.content.destination_domain == chain.chain_domain)
            .filter(|m| m.status.is_open())
            .filter(|m| !m.is_signed_by(signer))
            .cloned()
            .collect();
        found.sort_by_key(|m| (m.content.nonce, m.created_at));
        Ok(found)
    }

    async fn upsert_runner_status(&self, status: RunnerServiceStatus) -> StoreResult<()> {
        self.collections
            .write()
            .runner_statuses
            .insert(status.name.clone(), status);
        Ok(())
    }

    async fn get_runner_status(&self, name: &str) -> StoreResult<Option<RunnerServiceStatus>> {
        Ok(self.collections.read().runner_statuses.get(name).cloned())
    }

    async fn lock_write(&self, resource: &str) -> StoreResult<LockHandle> {
        self.locks.acquire(resource)
    }

    async fn unlock(&self, lock: LockHandle) -> StoreResult<()> {
        self.locks.release(&lock)
    }
}
