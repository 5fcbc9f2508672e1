use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{Options, WriteBatch, DB as Rocks};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use oracle_core::utils::fmt_address;
use oracle_core::{
    Chain, LockHandle, MessageId, MessageRecord, MessageUpdate, OracleStore, RecordId,
    RunnerServiceStatus, StoreError, StoreResult, TransactionRecord, TransactionStatus,
    TransactionUpdate, H160,
};

use crate::settings::StoreConfig;
use crate::LeaseLock;

const TRANSACTIONS: &str = "transactions/";
const TRANSACTION_INDEX: &str = "transaction_index/";
const MESSAGES: &str = "messages/";
const MESSAGE_INDEX: &str = "message_index/";
const RUNNER_STATUSES: &str = "runner_statuses/";

/// Failure of the on-disk store
#[derive(thiserror::Error, Debug)]
pub enum DbError {
    /// Rocks DB error
    #[error("{0}")]
    RockError(#[from] rocksdb::Error),
    /// Error opening the database
    #[error("Failed to open {path}, canonicalized as {canonicalized}: {source}")]
    OpeningError {
        /// Rocksdb error during opening
        #[source]
        source: rocksdb::Error,
        /// Raw database path provided
        path: PathBuf,
        /// Parsed path used
        canonicalized: PathBuf,
    },
    /// Could not parse the provided database path
    #[error("Invalid database path supplied {1:?}; {0}")]
    InvalidDbPath(#[source] io::Error, String),
    /// A stored document does not decode
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        StoreError::from_other(err)
    }
}

type Result<T> = std::result::Result<T, DbError>;

fn key(prefix: &str, id: impl std::fmt::Display) -> Vec<u8> {
    format!("{prefix}{id}").into_bytes()
}

fn transaction_index_key(tx: &TransactionRecord) -> Vec<u8> {
    key(
        TRANSACTION_INDEX,
        format_args!("{}/{:?}/{}", tx.chain.chain_id, tx.hash, tx.to_address),
    )
}

fn message_index_key(message_id: MessageId) -> Vec<u8> {
    key(MESSAGE_INDEX, format_args!("{message_id:?}"))
}

/// Store persisted in a local RocksDB. Documents survive restarts, so
/// runners resume from their last recorded height.
///
/// RocksDB allows a single process per directory: nodes running as separate
/// processes each need their own path.
#[derive(Debug)]
pub struct RocksStore {
    db: Rocks,
    // serializes read-modify-write of documents
    write: Mutex<()>,
    locks: LeaseLock,
}

impl RocksStore {
    /// Opens the db at `db_path`, creating it if missing.
    #[tracing::instrument(err, skip(config))]
    pub fn from_path(db_path: &Path, config: &StoreConfig) -> Result<Self> {
        let path = {
            let mut path = db_path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .canonicalize()
                .map_err(|e| DbError::InvalidDbPath(e, db_path.to_string_lossy().into()))?;
            if let Some(file_name) = db_path.file_name() {
                path.push(file_name);
            }
            path
        };

        if path.is_dir() {
            info!(path = %path.to_string_lossy(), "Opening existing db")
        } else {
            info!(path = %path.to_string_lossy(), "Creating db")
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = Rocks::open(&opts, &path).map_err(|e| DbError::OpeningError {
            source: e,
            path: db_path.into(),
            canonicalized: path,
        })?;
        Ok(Self {
            db,
            write: Mutex::new(()),
            locks: LeaseLock::new(Duration::from_millis(config.lock_lease_timeout_ms)),
        })
    }

    fn retrieve<V: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<V>> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store<V: Serialize>(&self, key: &[u8], value: &V) -> Result<()> {
        Ok(self.db.put(key, serde_json::to_vec(value)?)?)
    }

    fn scan<V: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<V>> {
        let mut found = vec![];
        for item in self.db.prefix_iterator(prefix.as_bytes()) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            found.push(serde_json::from_slice(&value)?);
        }
        Ok(found)
    }

    /// Every stored transaction, ordered by id.
    pub fn transactions(&self) -> StoreResult<Vec<TransactionRecord>> {
        Ok(self.scan(TRANSACTIONS)?)
    }

    /// Every stored message, ordered by id.
    pub fn messages(&self) -> StoreResult<Vec<MessageRecord>> {
        Ok(self.scan(MESSAGES)?)
    }

    fn transactions_to(
        &self,
        chain: &Chain,
        to: H160,
        status: TransactionStatus,
    ) -> StoreResult<Vec<TransactionRecord>> {
        let to = fmt_address(&to);
        let mut found: Vec<TransactionRecord> = self
            .transactions()?
            .into_iter()
            .filter(|tx| tx.chain.chain_id == chain.chain_id && tx.to_address == to && tx.status == status)
            .collect();
        found.sort_by_key(|tx| (tx.block_height, tx.created_at));
        Ok(found)
    }

    fn insert_indexed<V: Serialize>(
        &self,
        index_key: Vec<u8>,
        id: RecordId,
        document_key: Vec<u8>,
        document: &V,
    ) -> Result<Option<RecordId>> {
        let _write = self.write.lock();
        if let Some(existing) = self.retrieve::<RecordId>(&index_key)? {
            return Ok(Some(existing));
        }
        let mut batch = WriteBatch::default();
        batch.put(&index_key, serde_json::to_vec(&id)?);
        batch.put(&document_key, serde_json::to_vec(document)?);
        self.db.write(batch)?;
        Ok(None)
    }

    fn update_document<V, F>(
        &self,
        key: &[u8],
        name: impl FnOnce() -> String,
        apply: F,
    ) -> StoreResult<()>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce(&mut V),
    {
        let _write = self.write.lock();
        let mut document: V = self
            .retrieve(key)?
            .ok_or_else(|| StoreError::NotFound(name()))?;
        apply(&mut document);
        self.store(key, &document)?;
        Ok(())
    }
}

#[async_trait]
impl OracleStore for RocksStore {
    async fn insert_transaction(&self, tx: TransactionRecord) -> StoreResult<RecordId> {
        let id = tx.id;
        match self.insert_indexed(transaction_index_key(&tx), id, key(TRANSACTIONS, id), &tx)? {
            Some(existing) => {
                debug!(tx_hash = ?tx.hash, id = %existing, "Transaction already stored");
                Ok(existing)
            }
            None => Ok(id),
        }
    }

    async fn update_transaction(&self, id: RecordId, update: TransactionUpdate) -> StoreResult<()> {
        self.update_document(
            &key(TRANSACTIONS, id),
            || format!("transaction {id}"),
            |tx: &mut TransactionRecord| update.apply(tx),
        )
    }

    async fn get_transaction(&self, id: RecordId) -> StoreResult<Option<TransactionRecord>> {
        Ok(self.retrieve(&key(TRANSACTIONS, id))?)
    }

    async fn get_pending_transactions_to(
        &self,
        chain: &Chain,
        to: H160,
    ) -> StoreResult<Vec<TransactionRecord>> {
        self.transactions_to(chain, to, TransactionStatus::Pending)
    }

    async fn get_confirmed_transactions_to(
        &self,
        chain: &Chain,
        to: H160,
    ) -> StoreResult<Vec<TransactionRecord>> {
        self.transactions_to(chain, to, TransactionStatus::Confirmed)
    }

    async fn insert_message(&self, message: MessageRecord) -> StoreResult<RecordId> {
        if message.message_id != message.content.id() {
            return Err(StoreError::InvalidDocument {
                id: message.id,
                reason: "message id does not match content".to_owned(),
            });
        }
        let id = message.id;
        let index = message_index_key(message.message_id);
        match self.insert_indexed(index, id, key(MESSAGES, id), &message)? {
            Some(existing) => {
                debug!(message_id = ?message.message_id, id = %existing, "Message already stored");
                Ok(existing)
            }
            None => Ok(id),
        }
    }

    async fn update_message(&self, id: RecordId, update: MessageUpdate) -> StoreResult<()> {
        self.update_document(
            &key(MESSAGES, id),
            || format!("message {id}"),
            |message: &mut MessageRecord| update.apply(message),
        )
    }

    async fn update_message_by_message_id(
        &self,
        message_id: MessageId,
        update: MessageUpdate,
    ) -> StoreResult<RecordId> {
        let id: RecordId = self
            .retrieve(&message_index_key(message_id))?
            .ok_or_else(|| StoreError::NotFound(format!("message id {message_id:?}")))?;
        self.update_message(id, update).await?;
        Ok(id)
    }

    async fn get_message(&self, id: RecordId) -> StoreResult<Option<MessageRecord>> {
        Ok(self.retrieve(&key(MESSAGES, id))?)
    }

    async fn find_message_by_message_id(
        &self,
        message_id: MessageId,
    ) -> StoreResult<Option<MessageRecord>> {
        match self.retrieve::<RecordId>(&message_index_key(message_id))? {
            Some(id) => self.get_message(id).await,
            None => Ok(None),
        }
    }

    async fn get_pending_messages(
        &self,
        signer: &str,
        chain: &Chain,
    ) -> StoreResult<Vec<MessageRecord>> {
        let mut found: Vec<MessageRecord> = self
            .messages()?
            .into_iter()
            .filter(|m| m.content.destination_domain == chain.chain_domain)
            .filter(|m| m.status.is_open())
            .filter(|m| !m.is_signed_by(signer))
            .collect();
        found.sort_by_key(|m| (m.content.nonce, m.created_at));
        Ok(found)
    }

    async fn upsert_runner_status(&self, status: RunnerServiceStatus) -> StoreResult<()> {
        Ok(self.store(&key(RUNNER_STATUSES, &status.name), &status)?)
    }

    async fn get_runner_status(&self, name: &str) -> StoreResult<Option<RunnerServiceStatus>> {
        Ok(self.retrieve(&key(RUNNER_STATUSES, name))?)
    }

    async fn lock_write(&self, resource: &str) -> StoreResult<LockHandle> {
        self.locks.acquire(resource)
    }

    async fn unlock(&self, lock: LockHandle) -> StoreResult<()> {
        self.locks.release(&lock)
    }
}
