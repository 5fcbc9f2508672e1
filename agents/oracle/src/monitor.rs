use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

use oracle_base::settings::EthereumConnection;
use oracle_base::{Runnable, SyncCursor};
use oracle_core::utils::fmt_address;
use oracle_core::{
    transaction_resource, with_write_lock, Chain, ChainResult, DispatchEvent, EthereumClient,
    LogMeta, MailboxContract, MessageContent, MessageRecord, OracleProtocolError, OracleStore,
    RunnerServiceStatus, TransactionRecord, TransactionStatus, TransactionUpdate, H160,
    HYPERLANE_VERSION, MAX_QUERY_BLOCKS,
};

use crate::tx::{confirmation_status, parse_receipt_events, TransactionValidator};

/// Why a dispatch event is not one of ours.
#[derive(Debug, thiserror::Error)]
pub enum EventValidationError {
    /// No mint controller is registered for the domain
    #[error("No mint controller registered for domain {0}")]
    UnknownDomain(u32),
    /// The dispatching contract is not this chain's mint controller
    #[error("Sender {actual} is not the mint controller {expected}")]
    Sender {
        /// Registered mint controller
        expected: String,
        /// Event sender
        actual: String,
    },
    /// The recipient is not the destination's mint controller
    #[error("Recipient {actual} is not the destination mint controller {expected}")]
    Recipient {
        /// Destination mint controller
        expected: String,
        /// Low 20 bytes of the event recipient
        actual: String,
    },
    /// The message bytes do not decode
    #[error(transparent)]
    Decode(#[from] OracleProtocolError),
    /// Decoded content disagrees with the event it came with
    #[error("Content mismatch: {0}")]
    Content(String),
}

/// Watches a mailbox for dispatches sent by the local mint controller and
/// turns them into transactions and pending messages.
#[derive(Debug)]
pub struct MessageMonitor {
    chain: Chain,
    client: Arc<dyn EthereumClient>,
    mailbox: Arc<dyn MailboxContract>,
    mint_controllers: Arc<HashMap<u32, H160>>,
    tx_validator: Arc<dyn TransactionValidator>,
    store: Arc<dyn OracleStore>,
    cursor: SyncCursor,
}

impl MessageMonitor {
    /// Resume from `last_status` if one was persisted, else from
    /// `start_block_height`.
    pub async fn new(
        connection: &EthereumConnection,
        mint_controllers: Arc<HashMap<u32, H160>>,
        tx_validator: Arc<dyn TransactionValidator>,
        store: Arc<dyn OracleStore>,
        start_block_height: u64,
        last_status: Option<&RunnerServiceStatus>,
    ) -> ChainResult<Self> {
        let current = connection.client.get_block_height().await?;
        let cursor = SyncCursor::new(start_block_height, last_status, current, MAX_QUERY_BLOCKS);
        Ok(Self {
            chain: connection.client.chain(),
            client: connection.client.clone(),
            mailbox: connection.mailbox.clone(),
            mint_controllers,
            tx_validator,
            store,
            cursor,
        })
    }

    fn mint_controller(&self, domain: u32) -> Result<H160, EventValidationError> {
        self.mint_controllers
            .get(&domain)
            .copied()
            .ok_or(EventValidationError::UnknownDomain(domain))
    }

    /// Refresh the chain head.
    pub async fn update_current_block_height(&mut self) -> ChainResult<u64> {
        let height = self.client.get_block_height().await?;
        self.cursor.update_current(height);
        Ok(height)
    }

    /// Decode the message of `event` and check that it moves funds between
    /// two registered mint controllers, starting from this chain.
    pub fn is_valid_event(&self, event: &DispatchEvent) -> Result<MessageContent, EventValidationError> {
        let domain = self.chain.chain_domain;
        let local = self.mint_controller(domain)?;
        if event.sender != local {
            return Err(EventValidationError::Sender {
                expected: fmt_address(&local),
                actual: fmt_address(&event.sender),
            });
        }

        let content = MessageContent::from_bytes(&event.message)?;
        let remote = self.mint_controller(content.destination_domain)?;
        let recipient = H160::from_slice(&event.recipient.as_bytes()[12..]);
        if recipient != remote {
            return Err(EventValidationError::Recipient {
                expected: fmt_address(&remote),
                actual: fmt_address(&recipient),
            });
        }

        if content.origin_domain != domain {
            return Err(EventValidationError::Content(format!(
                "origin {} is not {domain}",
                content.origin_domain
            )));
        }
        if content.destination_domain != event.destination {
            return Err(EventValidationError::Content(format!(
                "destination {} is not {}",
                content.destination_domain, event.destination
            )));
        }
        if content.version != HYPERLANE_VERSION {
            return Err(EventValidationError::Content(format!(
                "version {}",
                content.version
            )));
        }
        if content.sender != event.sender || content.recipient != recipient {
            return Err(EventValidationError::Content(
                "sender or recipient differs from the event".to_owned(),
            ));
        }
        Ok(content)
    }

    /// Store the transaction that emitted `event` as pending, once it is
    /// known to be mined and successful.
    pub async fn create_tx_for_dispatch_event(&self, meta: &LogMeta) -> bool {
        let hash = meta.transaction_hash;
        let validated = match self.tx_validator.validate_transaction_by_hash(hash).await {
            Ok(validated) => validated,
            Err(err) => {
                warn!(tx_hash = ?hash, ?err, "Dispatch transaction is not usable yet");
                return false;
            }
        };
        let (confirmations, _) = confirmation_status(
            self.cursor.current_block_height(),
            validated.receipt.block_number,
            self.client.confirmations(),
        );
        let tx = TransactionRecord::new_ethereum_transaction(
            hash,
            validated.transaction.from,
            self.mailbox.address(),
            validated.receipt.block_number,
            confirmations,
            self.chain.clone(),
            TransactionStatus::Pending,
        );
        match self.store.insert_transaction(tx).await {
            Ok(id) => {
                debug!(tx_hash = ?hash, %id, "Stored dispatch transaction");
                true
            }
            Err(err) => {
                warn!(tx_hash = ?hash, ?err, "Failed to store dispatch transaction");
                false
            }
        }
    }

    /// Scan one block range for dispatches. A failed query fails the whole
    /// range; logs that do not decode are skipped.
    #[instrument(skip(self), fields(chain = %self.chain))]
    pub async fn sync_blocks(&self, range: RangeInclusive<u64>) -> bool {
        let sender = match self.mint_controller(self.chain.chain_domain) {
            Ok(sender) => sender,
            Err(err) => {
                warn!(?err, "Cannot filter dispatches");
                return false;
            }
        };
        let mut events = match self
            .mailbox
            .filter_dispatch(*range.start(), *range.end(), vec![sender])
            .await
        {
            Ok(events) => events,
            Err(err) => {
                warn!(?err, "Failed to query dispatch events");
                return false;
            }
        };

        let mut success = true;
        while let Some(item) = events.next().await {
            let (event, meta) = match item {
                Ok(item) => item,
                Err(err) => {
                    warn!(?err, "Skipping undecodable dispatch event");
                    continue;
                }
            };
            if meta.removed {
                debug!(tx_hash = ?meta.transaction_hash, "Skipping removed dispatch event");
                continue;
            }
            if let Err(err) = self.is_valid_event(&event) {
                info!(tx_hash = ?meta.transaction_hash, %err, "Ignoring dispatch event");
                continue;
            }
            success &= self.create_tx_for_dispatch_event(&meta).await;
        }
        success
    }

    /// Scan everything between the cursor and the chain head. The cursor
    /// only moves when every range succeeded.
    pub async fn sync_new_blocks(&mut self) -> bool {
        let ranges = self.cursor.pending_ranges();
        if ranges.is_empty() {
            return true;
        }
        let mut success = true;
        for range in ranges {
            success &= self.sync_blocks(range).await;
        }
        if success {
            self.cursor.advance();
        }
        success
    }

    /// Re-read the receipt of a pending dispatch transaction and record its
    /// status and depth.
    pub async fn confirm_tx(&self, tx: &TransactionRecord) -> bool {
        let mailbox = self.mailbox.clone();
        let parsed = match parse_receipt_events(
            self.client.as_ref(),
            tx.hash,
            self.cursor.current_block_height(),
            mailbox.address(),
            |log| mailbox.parse_dispatch(log),
        )
        .await
        {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to fetch dispatch receipt");
                return false;
            }
        };
        let update = TransactionUpdate {
            status: Some(parsed.status),
            confirmations: Some(parsed.confirmations),
            ..Default::default()
        };
        match self.store.update_transaction(tx.id, update).await {
            Ok(()) => true,
            Err(err) => {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to update dispatch transaction");
                false
            }
        }
    }

    /// Confirm every pending transaction sent to the mailbox.
    pub async fn confirm_dispatch_txs(&self) -> bool {
        let txs = match self
            .store
            .get_pending_transactions_to(&self.chain, self.mailbox.address())
            .await
        {
            Ok(txs) => txs,
            Err(err) => {
                warn!(?err, "Failed to load pending dispatch transactions");
                return false;
            }
        };
        let mut success = true;
        for tx in &txs {
            success &= self.confirm_tx(tx).await;
        }
        success
    }

    /// Create one pending message per valid dispatch in a confirmed
    /// transaction's receipt, under the transaction's write lock.
    pub async fn create_messages_for_tx(&self, tx: &TransactionRecord) -> bool {
        let mailbox = self.mailbox.clone();
        let parsed = match parse_receipt_events(
            self.client.as_ref(),
            tx.hash,
            self.cursor.current_block_height(),
            mailbox.address(),
            |log| mailbox.parse_dispatch(log),
        )
        .await
        {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to fetch dispatch receipt");
                return false;
            }
        };
        if parsed.status != TransactionStatus::Confirmed {
            let update = TransactionUpdate {
                status: Some(parsed.status),
                confirmations: Some(parsed.confirmations),
                ..Default::default()
            };
            if let Err(err) = self.store.update_transaction(tx.id, update).await {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to update dispatch transaction");
            }
            return false;
        }

        let store = self.store.as_ref();
        let resource = transaction_resource(tx.id);
        let result = with_write_lock(store, &resource, async {
            let mut success = true;
            let mut created = vec![];
            for event in &parsed.events {
                let content = match self.is_valid_event(event) {
                    Ok(content) => content,
                    Err(err) => {
                        info!(tx_hash = ?tx.hash, %err, "Skipping dispatch log");
                        continue;
                    }
                };
                match store.insert_message(MessageRecord::new(tx, content)).await {
                    Ok(id) => created.push(id),
                    Err(err) => {
                        warn!(tx_hash = ?tx.hash, message_id = ?content.id(), ?err, "Failed to store message");
                        success = false;
                    }
                }
            }
            let existing = match store.get_transaction(tx.id).await {
                Ok(Some(current)) => current.messages,
                Ok(None) => tx.messages.clone(),
                Err(err) => {
                    warn!(tx_hash = ?tx.hash, ?err, "Failed to reload dispatch transaction");
                    return false;
                }
            };
            let messages = existing.into_iter().chain(created).unique().collect_vec();
            let update = TransactionUpdate {
                confirmations: Some(parsed.confirmations),
                messages: Some(messages),
                ..Default::default()
            };
            if let Err(err) = store.update_transaction(tx.id, update).await {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to link messages to transaction");
                return false;
            }
            success
        })
        .await;

        result.unwrap_or_else(|err| {
            warn!(tx_hash = ?tx.hash, ?err, "Could not lock dispatch transaction");
            false
        })
    }

    /// Create messages for every confirmed transaction sent to the mailbox.
    pub async fn create_messages_for_txs(&self) -> bool {
        let txs = match self
            .store
            .get_confirmed_transactions_to(&self.chain, self.mailbox.address())
            .await
        {
            Ok(txs) => txs,
            Err(err) => {
                warn!(?err, "Failed to load confirmed dispatch transactions");
                return false;
            }
        };
        let mut success = true;
        for tx in &txs {
            success &= self.create_messages_for_tx(tx).await;
        }
        success
    }
}

#[async_trait]
impl Runnable for MessageMonitor {
    #[instrument(skip(self), fields(chain = %self.chain))]
    async fn run(&mut self) {
        if let Err(err) = self.update_current_block_height().await {
            warn!(?err, "Failed to fetch block height");
            return;
        }
        let synced = self.sync_new_blocks().await;
        let confirmed = self.confirm_dispatch_txs().await;
        let created = self.create_messages_for_txs().await;
        debug!(synced, confirmed, created, height = self.cursor.start_block_height(), "Monitor tick done");
    }

    fn height(&self) -> u64 {
        self.cursor.start_block_height()
    }
}
