use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use oracle_base::{Runnable, SyncCursor};
use oracle_core::utils::{
    address_bytes_from_bech32, address_from_bytes, address_from_hex, bech32_from_bytes,
};
use oracle_core::{
    transaction_resource, with_write_lock, Chain, ChainResult, CosmosClient, CosmosTxResponse,
    MessageBody, MessageContent, MessageRecord, OracleProtocolError, OracleStore, RefundInfo,
    RunnerServiceStatus, TransactionRecord, TransactionStatus, TransactionUpdate, H160, H256,
    MAX_QUERY_BLOCKS,
};
use oracle_cosmos::{validate_tx_to_cosmos_multisig, CosmosMultisigConfig, CosmosTxValidation};

/// Why a confirmed deposit cannot become a message.
#[derive(Debug, thiserror::Error)]
pub enum DepositMessageError {
    /// Memo missing or unusable
    #[error("Deposit has no usable memo")]
    NoMemo,
    /// The memo names a domain with no mint controller
    #[error("No mint controller registered for domain {0}")]
    UnknownDomain(String),
    /// Address conversion failed
    #[error(transparent)]
    Address(#[from] OracleProtocolError),
}

/// Nonce of the message minted for a deposit: the first four bytes of the
/// deposit hash, big-endian.
pub fn deposit_nonce(hash: H256) -> u32 {
    let mut nonce = [0u8; 4];
    nonce.copy_from_slice(&hash.as_bytes()[..4]);
    u32::from_be_bytes(nonce)
}

/// Watches the bridge multisig on a Cosmos chain for deposits and turns the
/// valid ones into pending messages towards the EVM chain named in the memo.
#[derive(Debug)]
pub struct CosmosMessageMonitor {
    chain: Chain,
    client: Arc<dyn CosmosClient>,
    config: CosmosMultisigConfig,
    multisig: H160,
    supported_domains: HashSet<u32>,
    mint_controllers: Arc<HashMap<u32, H160>>,
    store: Arc<dyn OracleStore>,
    cursor: SyncCursor,
}

impl CosmosMessageMonitor {
    /// Resume from `last_status` if one was persisted, else from
    /// `start_block_height`. Deposits may only mint on `supported_domains`.
    pub async fn new(
        client: Arc<dyn CosmosClient>,
        config: CosmosMultisigConfig,
        supported_domains: HashSet<u32>,
        mint_controllers: Arc<HashMap<u32, H160>>,
        store: Arc<dyn OracleStore>,
        start_block_height: u64,
        last_status: Option<&RunnerServiceStatus>,
    ) -> eyre::Result<Self> {
        let multisig = address_bytes_from_bech32(&config.bech32_prefix, &config.multisig_address)
            .and_then(|bytes| address_from_bytes(&bytes))?;
        let current = client.get_block_height().await?;
        let cursor = SyncCursor::new(start_block_height, last_status, current, MAX_QUERY_BLOCKS);
        Ok(Self {
            chain: client.chain(),
            client,
            config,
            multisig,
            supported_domains,
            mint_controllers,
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

    fn validate(&self, tx: &CosmosTxResponse) -> Option<CosmosTxValidation> {
        match validate_tx_to_cosmos_multisig(
            tx,
            &self.config,
            &self.supported_domains,
            self.cursor.current_block_height(),
        ) {
            Ok(validation) => Some(validation),
            Err(err) => {
                info!(tx_hash = ?tx.hash, %err, "Ignoring transfer with unknown sender");
                None
            }
        }
    }

    fn refund(validation: &CosmosTxValidation) -> Option<RefundInfo> {
        validation.needs_refund.then(|| RefundInfo {
            reason: "deposit cannot be minted".to_owned(),
            amount: validation.amount,
            refund_tx_hash: None,
        })
    }

    /// Build the message a confirmed deposit asks for.
    pub fn message_content(
        &self,
        tx: &CosmosTxResponse,
        validation: &CosmosTxValidation,
    ) -> Result<MessageContent, DepositMessageError> {
        let memo = validation.memo.as_ref().ok_or(DepositMessageError::NoMemo)?;
        let (destination, recipient) = memo
            .chain_id
            .parse::<u32>()
            .ok()
            .and_then(|domain| Some((domain, *self.mint_controllers.get(&domain)?)))
            .ok_or_else(|| DepositMessageError::UnknownDomain(memo.chain_id.clone()))?;
        let body = MessageBody {
            recipient_address: address_from_hex(&memo.address)?,
            amount: validation.amount,
            sender_address: address_from_bytes(&validation.sender_address)?,
        };
        Ok(MessageContent::new(
            deposit_nonce(tx.hash),
            self.chain.chain_domain,
            self.multisig,
            destination,
            recipient,
            body,
        ))
    }

    /// Store a transfer to the multisig, with its refund reason when it
    /// cannot be minted.
    pub async fn create_tx(&self, tx: &CosmosTxResponse) -> bool {
        let Some(validation) = self.validate(tx) else {
            return true;
        };
        let Ok(from) = bech32_from_bytes(&self.config.bech32_prefix, &validation.sender_address)
        else {
            warn!(tx_hash = ?tx.hash, "Sender bytes do not encode");
            return true;
        };
        let mut record = TransactionRecord::new_cosmos_transaction(
            tx.hash,
            from,
            self.multisig,
            tx.height,
            validation.confirmations,
            self.chain.clone(),
            validation.status,
        );
        record.refund = Self::refund(&validation);
        // depth is rechecked by confirm_txs
        if record.status == TransactionStatus::Confirmed {
            record.status = TransactionStatus::Pending;
        }
        match self.store.insert_transaction(record).await {
            Ok(id) => {
                debug!(tx_hash = ?tx.hash, %id, status = ?validation.status, "Stored deposit transaction");
                true
            }
            Err(err) => {
                warn!(tx_hash = ?tx.hash, ?err, "Failed to store deposit transaction");
                false
            }
        }
    }

    /// Fetch every transfer to the multisig since the cursor. The cursor
    /// only moves when all of them were stored.
    #[instrument(skip(self), fields(chain = %self.chain))]
    pub async fn sync_new_txs(&mut self) -> bool {
        let start = self.cursor.start_block_height();
        let current = self.cursor.current_block_height();
        if current <= start {
            return true;
        }
        let txs = match self
            .client
            .get_txs_sent_to_address_after_height(&self.config.multisig_address, start)
            .await
        {
            Ok(txs) => txs,
            Err(err) => {
                warn!(?err, "Failed to search deposits");
                return false;
            }
        };
        let mut success = true;
        for tx in txs.iter().filter(|tx| tx.height <= current) {
            success &= self.create_tx(tx).await;
        }
        if success {
            self.cursor.advance();
        }
        success
    }

    /// Re-validate a pending deposit and record its status and depth.
    pub async fn confirm_tx(&self, record: &TransactionRecord) -> bool {
        let tx = match self.client.get_tx(record.hash).await {
            Ok(tx) => tx,
            Err(err) => {
                warn!(tx_hash = ?record.hash, ?err, "Failed to fetch deposit");
                return false;
            }
        };
        let update = match self.validate(&tx) {
            Some(validation) => TransactionUpdate {
                status: Some(validation.status),
                confirmations: Some(validation.confirmations),
                refund: Self::refund(&validation),
                ..Default::default()
            },
            None => TransactionUpdate {
                status: Some(TransactionStatus::Invalid),
                ..Default::default()
            },
        };
        match self.store.update_transaction(record.id, update).await {
            Ok(()) => true,
            Err(err) => {
                warn!(tx_hash = ?record.hash, ?err, "Failed to update deposit transaction");
                false
            }
        }
    }

    /// Confirm every pending deposit into the multisig.
    pub async fn confirm_txs(&self) -> bool {
        let txs = match self
            .store
            .get_pending_transactions_to(&self.chain, self.multisig)
            .await
        {
            Ok(txs) => txs,
            Err(err) => {
                warn!(?err, "Failed to load pending deposits");
                return false;
            }
        };
        let mut success = true;
        for tx in &txs {
            success &= self.confirm_tx(tx).await;
        }
        success
    }

    /// Create the message of a confirmed deposit under the transaction's
    /// write lock. Deposits awaiting a refund never get one.
    pub async fn create_message_for_tx(&self, record: &TransactionRecord) -> bool {
        if record.refund.is_some() || !record.messages.is_empty() {
            return true;
        }
        let tx = match self.client.get_tx(record.hash).await {
            Ok(tx) => tx,
            Err(err) => {
                warn!(tx_hash = ?record.hash, ?err, "Failed to fetch deposit");
                return false;
            }
        };
        let Some(validation) = self.validate(&tx) else {
            return true;
        };
        if validation.status != TransactionStatus::Confirmed || validation.needs_refund {
            let update = TransactionUpdate {
                status: Some(validation.status),
                confirmations: Some(validation.confirmations),
                refund: Self::refund(&validation),
                ..Default::default()
            };
            if let Err(err) = self.store.update_transaction(record.id, update).await {
                warn!(tx_hash = ?record.hash, ?err, "Failed to update deposit transaction");
            }
            return false;
        }
        let content = match self.message_content(&tx, &validation) {
            Ok(content) => content,
            Err(err) => {
                info!(tx_hash = ?record.hash, %err, "Deposit cannot be minted");
                return true;
            }
        };

        let store = self.store.as_ref();
        let resource = transaction_resource(record.id);
        let result = with_write_lock(store, &resource, async {
            let current = match store.get_transaction(record.id).await {
                Ok(Some(current)) => current,
                Ok(None) => return false,
                Err(err) => {
                    warn!(tx_hash = ?record.hash, ?err, "Failed to reload deposit transaction");
                    return false;
                }
            };
            if !current.messages.is_empty() {
                return true;
            }
            let id = match store.insert_message(MessageRecord::new(&current, content)).await {
                Ok(id) => id,
                Err(err) => {
                    warn!(tx_hash = ?record.hash, ?err, "Failed to store deposit message");
                    return false;
                }
            };
            let update = TransactionUpdate {
                confirmations: Some(validation.confirmations),
                messages: Some(vec![id]),
                ..Default::default()
            };
            if let Err(err) = store.update_transaction(record.id, update).await {
                warn!(tx_hash = ?record.hash, ?err, "Failed to link message to deposit");
                return false;
            }
            true
        })
        .await;

        result.unwrap_or_else(|err| {
            warn!(tx_hash = ?record.hash, ?err, "Could not lock deposit transaction");
            false
        })
    }

    /// Create messages for every confirmed deposit into the multisig.
    pub async fn create_messages_for_txs(&self) -> bool {
        let txs = match self
            .store
            .get_confirmed_transactions_to(&self.chain, self.multisig)
            .await
        {
            Ok(txs) => txs,
            Err(err) => {
                warn!(?err, "Failed to load confirmed deposits");
                return false;
            }
        };
        let mut success = true;
        for tx in &txs {
            success &= self.create_message_for_tx(tx).await;
        }
        success
    }
}

#[async_trait]
impl Runnable for CosmosMessageMonitor {
    #[instrument(skip(self), fields(chain = %self.chain))]
    async fn run(&mut self) {
        if let Err(err) = self.update_current_block_height().await {
            warn!(?err, "Failed to fetch block height");
            return;
        }
        let synced = self.sync_new_txs().await;
        let confirmed = self.confirm_txs().await;
        let created = self.create_messages_for_txs().await;
        debug!(synced, confirmed, created, height = self.cursor.start_block_height(), "Monitor tick done");
    }

    fn height(&self) -> u64 {
        self.cursor.start_block_height()
    }
}

#[cfg(test)]
mod test {
    use oracle_base::InMemoryStore;
    use oracle_core::{MessageStatus, U256};

    use crate::test_utils::{TestCosmos, TestNetwork, COSMOS_FEE};

    use super::*;

    async fn monitor(
        network: &TestNetwork,
        cosmos: &TestCosmos,
        store: Arc<InMemoryStore>,
    ) -> CosmosMessageMonitor {
        let mut mint_controllers = (*network.mint_controllers()).clone();
        mint_controllers.insert(cosmos.chain.chain_domain, cosmos.multisig);
        CosmosMessageMonitor::new(
            cosmos.client(),
            cosmos.multisig_config(),
            HashSet::from([1, 2]),
            Arc::new(mint_controllers),
            store,
            1,
            None,
        )
        .await
        .unwrap()
    }

    #[test]
    fn nonce_is_hash_prefix() {
        let mut bytes = [0xffu8; 32];
        bytes[..4].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        let hash = H256::from(bytes);
        assert_eq!(deposit_nonce(hash), 0x1234_5678);
    }

    #[tokio::test]
    async fn confirmed_deposit_becomes_message() {
        let network = TestNetwork::new();
        let two = &network.chains[1];
        let cosmos = TestCosmos::new();
        let recipient = H160::repeat_byte(0x44);
        let hash = cosmos.deposit(5, 500, &TestCosmos::memo(recipient, 2), 100);
        cosmos.set_height(102);
        let mut monitor = monitor(&network, &cosmos, network.store.clone()).await;

        monitor.run().await;
        let tx = network.store.transactions().pop().unwrap();
        assert_eq!(tx.hash, hash);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.from_address, TestCosmos::account(5));
        assert!(network.store.messages().is_empty());
        assert_eq!(monitor.height(), 102);

        cosmos.set_height(110);
        monitor.run().await;
        let tx = network.store.transactions().pop().unwrap();
        assert_eq!(tx.status, TransactionStatus::Confirmed);
        let messages = network.store.messages();
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(tx.messages, vec![message.id]);
        assert_eq!(message.status, MessageStatus::Pending);
        assert_eq!(message.origin_transaction_hash, hash);
        let content = &message.content;
        assert_eq!(content.nonce, deposit_nonce(hash));
        assert_eq!(content.origin_domain, cosmos.chain.chain_domain);
        assert_eq!(content.sender, cosmos.multisig);
        assert_eq!(content.destination_domain, 2);
        assert_eq!(content.recipient, two.mint_controller);
        assert_eq!(content.message_body.recipient_address, recipient);
        assert_eq!(content.message_body.amount, U256::from(500));
        assert_eq!(content.message_body.sender_address, H160::repeat_byte(5));

        // a later tick does not mint twice
        monitor.run().await;
        assert_eq!(network.store.messages().len(), 1);
    }

    #[tokio::test]
    async fn unusable_deposits_are_flagged_for_refund() {
        let network = TestNetwork::new();
        let cosmos = TestCosmos::new();
        let bad_memo = cosmos.deposit(5, 500, "not json", 100);
        let mismatched = cosmos.transfer(
            6,
            500,
            400,
            Some(&TestCosmos::memo(H160::repeat_byte(0x44), 2)),
            100,
            0,
        );
        let dust = cosmos.deposit(7, COSMOS_FEE, &TestCosmos::memo(H160::repeat_byte(0x44), 2), 100);
        cosmos.set_height(120);
        let mut monitor = monitor(&network, &cosmos, network.store.clone()).await;

        monitor.run().await;
        monitor.run().await;
        assert!(network.store.messages().is_empty());
        let txs = network.store.transactions();
        let find = |hash| txs.iter().find(|tx| tx.hash == hash).unwrap();
        let refund = find(bad_memo).refund.clone().unwrap();
        assert_eq!(refund.reason, "deposit cannot be minted");
        assert_eq!(refund.amount, U256::from(500));
        assert!(find(mismatched).refund.is_some());
        assert_eq!(find(dust).status, TransactionStatus::Invalid);
        assert!(find(dust).refund.is_none());
    }

    #[tokio::test]
    async fn failed_and_future_transfers_are_not_minted() {
        let network = TestNetwork::new();
        let cosmos = TestCosmos::new();
        let memo = TestCosmos::memo(H160::repeat_byte(0x44), 2);
        let failed = cosmos.transfer(5, 500, 500, Some(&memo), 100, 5);
        cosmos.deposit(6, 500, &memo, 130);
        cosmos.set_height(120);
        let mut monitor = monitor(&network, &cosmos, network.store.clone()).await;

        monitor.run().await;
        let txs = network.store.transactions();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].hash, failed);
        assert_eq!(txs[0].status, TransactionStatus::Failed);
        assert!(network.store.messages().is_empty());
    }
}
