use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use itertools::Itertools;
use tracing::{debug, instrument, warn};

use oracle_base::settings::EthereumConnection;
use oracle_base::{Runnable, SyncCursor};
use oracle_core::{
    message_resource, transaction_resource, with_write_lock, Chain, ChainResult, EthereumClient,
    FulfillmentEvent, LogMeta, MessageId, MessageStatus, MessageUpdate, MintControllerContract,
    OracleStore, RecordId, RunnerServiceStatus, StoreError, StoreResult, TransactionRecord,
    TransactionStatus, TransactionUpdate, MAX_QUERY_BLOCKS,
};

use crate::tx::{confirmation_status, parse_receipt_events, ReceiptEvents, TransactionValidator};

/// Watches the mint controller for fulfillments and closes out the
/// messages they executed.
#[derive(Debug)]
pub struct MessageRelayer {
    chain: Chain,
    client: Arc<dyn EthereumClient>,
    mint_controller: Arc<dyn MintControllerContract>,
    tx_validator: Arc<dyn TransactionValidator>,
    store: Arc<dyn OracleStore>,
    cursor: SyncCursor,
}

impl MessageRelayer {
    /// Resume from `last_status` if one was persisted, else from
    /// `start_block_height`.
    pub async fn new(
        connection: &EthereumConnection,
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
            mint_controller: connection.mint_controller.clone(),
            tx_validator,
            store,
            cursor,
        })
    }

    /// Refresh the chain head.
    pub async fn update_current_block_height(&mut self) -> ChainResult<u64> {
        let height = self.client.get_block_height().await?;
        self.cursor.update_current(height);
        Ok(height)
    }

    /// Store the fulfillment transaction as pending and point the message it
    /// executed at it.
    pub async fn create_tx_for_fulfillment_event(
        &self,
        event: &FulfillmentEvent,
        meta: &LogMeta,
    ) -> bool {
        let hash = meta.transaction_hash;
        let validated = match self.tx_validator.validate_transaction_by_hash(hash).await {
            Ok(validated) => validated,
            Err(err) => {
                warn!(tx_hash = ?hash, ?err, "Fulfillment transaction is not usable yet");
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
            self.mint_controller.address(),
            validated.receipt.block_number,
            confirmations,
            self.chain.clone(),
            TransactionStatus::Pending,
        );
        let id = match self.store.insert_transaction(tx).await {
            Ok(id) => id,
            Err(err) => {
                warn!(tx_hash = ?hash, ?err, "Failed to store fulfillment transaction");
                return false;
            }
        };

        let update = MessageUpdate {
            transaction: Some(id),
            transaction_hash: Some(hash),
            ..Default::default()
        };
        match self
            .store
            .update_message_by_message_id(event.order_id, update)
            .await
        {
            Ok(_) => true,
            // fulfilled messages that never went through this store
            Err(StoreError::NotFound(_)) => {
                warn!(tx_hash = ?hash, order_id = ?event.order_id, "Fulfilled message is unknown");
                true
            }
            Err(err) => {
                warn!(tx_hash = ?hash, order_id = ?event.order_id, ?err, "Failed to link fulfillment");
                false
            }
        }
    }

    /// Scan one block range for fulfillments. A failed query fails the whole
    /// range; logs that do not decode are skipped.
    #[instrument(skip(self), fields(chain = %self.chain))]
    pub async fn sync_blocks(&self, range: RangeInclusive<u64>) -> bool {
        let mut events = match self
            .mint_controller
            .filter_fulfillment(*range.start(), *range.end())
            .await
        {
            Ok(events) => events,
            Err(err) => {
                warn!(?err, "Failed to query fulfillment events");
                return false;
            }
        };

        let mut success = true;
        while let Some(item) = events.next().await {
            let (event, meta) = match item {
                Ok(item) => item,
                Err(err) => {
                    warn!(?err, "Skipping undecodable fulfillment event");
                    continue;
                }
            };
            if meta.removed {
                debug!(tx_hash = ?meta.transaction_hash, "Skipping removed fulfillment event");
                continue;
            }
            success &= self.create_tx_for_fulfillment_event(&event, &meta).await;
        }
        success
    }

    /// Scan everything between the cursor and the chain head. The cursor
    /// only moves when every range succeeded.
    pub async fn sync_new_blocks(&mut self) -> bool {
        let mut success = true;
        for range in self.cursor.pending_ranges() {
            success &= self.sync_blocks(range).await;
        }
        if success {
            self.cursor.advance();
        }
        success
    }

    async fn fulfillment_events(
        &self,
        tx: &TransactionRecord,
    ) -> ChainResult<ReceiptEvents<FulfillmentEvent>> {
        let mint_controller = self.mint_controller.clone();
        parse_receipt_events(
            self.client.as_ref(),
            tx.hash,
            self.cursor.current_block_height(),
            mint_controller.address(),
            |log| mint_controller.parse_fulfillment(log),
        )
        .await
    }

    /// Promote pending fulfillment transactions by depth.
    pub async fn confirm_fulfillment_txs(&self) -> bool {
        let txs = match self
            .store
            .get_pending_transactions_to(&self.chain, self.mint_controller.address())
            .await
        {
            Ok(txs) => txs,
            Err(err) => {
                warn!(?err, "Failed to load pending fulfillment transactions");
                return false;
            }
        };
        let mut success = true;
        for tx in &txs {
            let parsed = match self.fulfillment_events(tx).await {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(tx_hash = ?tx.hash, ?err, "Failed to fetch fulfillment receipt");
                    success = false;
                    continue;
                }
            };
            let update = TransactionUpdate {
                status: Some(parsed.status),
                confirmations: Some(parsed.confirmations),
                ..Default::default()
            };
            if let Err(err) = self.store.update_transaction(tx.id, update).await {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to update fulfillment transaction");
                success = false;
            }
        }
        success
    }

    /// Mark every message a confirmed fulfillment executed, and the
    /// transaction that dispatched it, as successful. The fulfillment is
    /// closed only when every update went through; updates already made are
    /// kept either way.
    pub async fn confirm_messages_for_tx(&self, tx: &TransactionRecord) -> bool {
        let parsed = match self.fulfillment_events(tx).await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to fetch fulfillment receipt");
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
                warn!(tx_hash = ?tx.hash, ?err, "Failed to update fulfillment transaction");
            }
            return false;
        }

        let store = self.store.as_ref();
        let resource = transaction_resource(tx.id);
        let result = with_write_lock(store, &resource, async {
            let mut success = true;
            let mut messages: Vec<RecordId> = vec![];
            for order_id in parsed.events.iter().map(|e| e.order_id).unique() {
                let id = match self.close_message(order_id, tx).await {
                    Ok(id) => id,
                    Err(err) => {
                        warn!(tx_hash = ?tx.hash, ?order_id, ?err, "Failed to close message");
                        success = false;
                        continue;
                    }
                };
                messages.push(id);
                success &= self.close_origin_transaction(id).await;
            }
            if !success {
                return false;
            }
            let update = TransactionUpdate {
                status: Some(TransactionStatus::Success),
                confirmations: Some(parsed.confirmations),
                messages: Some(messages),
                ..Default::default()
            };
            if let Err(err) = store.update_transaction(tx.id, update).await {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to close fulfillment transaction");
                return false;
            }
            true
        })
        .await;

        result.unwrap_or_else(|err| {
            warn!(tx_hash = ?tx.hash, ?err, "Could not lock fulfillment transaction");
            false
        })
    }

    /// Mark the message with `order_id` as executed by `tx`. Takes the
    /// message's write lock so a signer holding an older copy cannot
    /// overwrite the result.
    async fn close_message(&self, order_id: MessageId, tx: &TransactionRecord) -> StoreResult<RecordId> {
        let store = self.store.as_ref();
        let message = store
            .find_message_by_message_id(order_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("message {order_id:?}")))?;
        let update = MessageUpdate {
            status: Some(MessageStatus::Success),
            transaction: Some(tx.id),
            transaction_hash: Some(tx.hash),
            ..Default::default()
        };
        let resource = message_resource(message.id);
        with_write_lock(store, &resource, store.update_message(message.id, update)).await??;
        Ok(message.id)
    }

    async fn close_origin_transaction(&self, message: RecordId) -> bool {
        let origin = match self.store.get_message(message).await {
            Ok(Some(message)) => message.origin_transaction,
            Ok(None) => return true,
            Err(err) => {
                warn!(%message, ?err, "Failed to load message");
                return false;
            }
        };
        let update = TransactionUpdate {
            status: Some(TransactionStatus::Success),
            ..Default::default()
        };
        match self.store.update_transaction(origin, update).await {
            Ok(()) | Err(StoreError::NotFound(_)) => true,
            Err(err) => {
                warn!(%message, %origin, ?err, "Failed to close origin transaction");
                false
            }
        }
    }

    /// Close out every confirmed fulfillment transaction.
    pub async fn confirm_messages(&self) -> bool {
        let txs = match self
            .store
            .get_confirmed_transactions_to(&self.chain, self.mint_controller.address())
            .await
        {
            Ok(txs) => txs,
            Err(err) => {
                warn!(?err, "Failed to load confirmed fulfillment transactions");
                return false;
            }
        };
        let mut success = true;
        for tx in &txs {
            success &= self.confirm_messages_for_tx(tx).await;
        }
        success
    }
}

#[async_trait]
impl Runnable for MessageRelayer {
    #[instrument(skip(self), fields(chain = %self.chain))]
    async fn run(&mut self) {
        if let Err(err) = self.update_current_block_height().await {
            warn!(?err, "Failed to fetch block height");
            return;
        }
        let synced = self.sync_new_blocks().await;
        let confirmed = self.confirm_fulfillment_txs().await;
        let closed = self.confirm_messages().await;
        debug!(synced, confirmed, closed, height = self.cursor.start_block_height(), "Relayer tick done");
    }

    fn height(&self) -> u64 {
        self.cursor.start_block_height()
    }
}

#[cfg(test)]
mod test {
    use oracle_core::test_utils::dummy_content;
    use oracle_core::{Encode, MessageRecord, H160, H256};

    use crate::test_utils::{TestChain, TestNetwork};

    use super::*;

    async fn relayer(network: &TestNetwork, chain: &TestChain) -> MessageRelayer {
        MessageRelayer::new(
            &chain.connection(),
            chain.tx_validator(),
            network.store.clone(),
            1,
            None,
        )
        .await
        .unwrap()
    }

    async fn stored_message(network: &TestNetwork) -> MessageRecord {
        let (one, two) = (&network.chains[0], &network.chains[1]);
        let content = dummy_content(4, 1, one.mint_controller, 2, two.mint_controller, 10);
        let origin = TransactionRecord::new_ethereum_transaction(
            H256::repeat_byte(0x42),
            H160::repeat_byte(1),
            one.mailbox,
            10,
            5,
            one.chain.clone(),
            TransactionStatus::Confirmed,
        );
        network.store.insert_transaction(origin.clone()).await.unwrap();
        let message = MessageRecord::new(&origin, content);
        network.store.insert_message(message.clone()).await.unwrap();
        message
    }

    #[tokio::test]
    async fn fulfillment_closes_message_and_origin() {
        let network = TestNetwork::new();
        let two = &network.chains[1];
        let message = stored_message(&network).await;
        let hash = two.fulfill(message.message_id, message.content.to_vec(), 50);
        two.set_height(50);

        let mut relayer = relayer(&network, two).await;
        relayer.run().await;
        let stored = network.store.get_message(message.id).await.unwrap().unwrap();
        assert_eq!(stored.transaction_hash, Some(hash));
        assert_eq!(stored.status, MessageStatus::Pending);

        two.set_height(51);
        relayer.run().await;
        let stored = network.store.get_message(message.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Success);
        let origin = network
            .store
            .get_transaction(message.origin_transaction)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(origin.status, TransactionStatus::Success);
        let fulfillment = network
            .store
            .transactions()
            .into_iter()
            .find(|tx| tx.hash == hash)
            .unwrap();
        assert_eq!(fulfillment.status, TransactionStatus::Success);
        assert_eq!(fulfillment.messages, vec![message.id]);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn undecodable_log_is_skipped() {
        let network = TestNetwork::new();
        let two = &network.chains[1];
        let message = stored_message(&network).await;
        two.garble(40);
        let hash = two.fulfill(message.message_id, message.content.to_vec(), 50);
        two.set_height(60);

        let mut relayer = relayer(&network, two).await;
        assert!(relayer.sync_new_blocks().await);
        assert_eq!(relayer.height(), 60);
        let stored = network.store.get_message(message.id).await.unwrap().unwrap();
        assert_eq!(stored.transaction_hash, Some(hash));
        assert!(logs_contain("Skipping undecodable fulfillment event"));
    }

    #[tokio::test]
    async fn locked_message_is_closed_on_a_later_tick() {
        let network = TestNetwork::new();
        let two = &network.chains[1];
        let message = stored_message(&network).await;
        let hash = two.fulfill(message.message_id, message.content.to_vec(), 50);
        two.set_height(50);
        let mut relayer = relayer(&network, two).await;
        relayer.run().await;
        two.set_height(60);
        relayer.update_current_block_height().await.unwrap();
        assert!(relayer.confirm_fulfillment_txs().await);

        // a signer is working on the message
        let lock = network
            .store
            .lock_write(&message_resource(message.id))
            .await
            .unwrap();
        assert!(!relayer.confirm_messages().await);
        let stored = network.store.get_message(message.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Pending);
        let fulfillment = network
            .store
            .transactions()
            .into_iter()
            .find(|tx| tx.hash == hash)
            .unwrap();
        assert_eq!(fulfillment.status, TransactionStatus::Confirmed);

        network.store.unlock(lock).await.unwrap();
        assert!(relayer.confirm_messages().await);
        let stored = network.store.get_message(message.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Success);
    }

    #[tokio::test]
    async fn unknown_order_keeps_fulfillment_open() {
        let network = TestNetwork::new();
        let two = &network.chains[1];
        let hash = two.fulfill(H256::repeat_byte(0x99), vec![1, 2, 3], 50);
        two.set_height(60);

        let mut relayer = relayer(&network, two).await;
        relayer.run().await;
        let fulfillment = network
            .store
            .transactions()
            .into_iter()
            .find(|tx| tx.hash == hash)
            .unwrap();
        // confirmed but nothing to close
        assert_eq!(fulfillment.status, TransactionStatus::Confirmed);
        assert!(fulfillment.messages.is_empty());
    }
}
