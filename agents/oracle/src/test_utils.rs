//! A pair of simulated EVM chains sharing one in-memory store, plus a
//! simulated Cosmos chain receiving deposits into the bridge multisig.
//!
//! Mock contracts decode logs by a fixed topic layout: `Dispatch` is
//! `[DISPATCH, sender, destination, recipient]` with the message as data,
//! `DispatchId` is `[DISPATCH_ID, message_id]` and `Fulfillment` is
//! `[FULFILLMENT, order_id]` with the message as data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use oracle_base::settings::EthereumConnection;
use oracle_base::InMemoryStore;
use oracle_core::test_utils::{dummy_domain, test_wallet};
use oracle_core::utils::{bech32_from_bytes, fmt_address};
use oracle_core::{
    Bytes, Chain, ChainCommunicationError, ChainResult, CosmosEvent, CosmosTxResponse,
    DispatchEvent, DispatchIdEvent, Encode, EthereumLog, EthereumReceipt, EthereumTransaction,
    FulfillmentEvent, LogMeta, MessageContent, MessageId, OracleSigner, H160, H256, U256,
};
use oracle_cosmos::CosmosMultisigConfig;
use oracle_test::mocks::{
    MockCosmosClient, MockEthereumClient, MockMailboxContract, MockMintControllerContract,
    MockWarpIsmContract,
};

use crate::tx::{ReceiptTransactionValidator, TransactionValidator};

const DISPATCH: H256 = H256::repeat_byte(0xd1);
const DISPATCH_ID: H256 = H256::repeat_byte(0xd2);
const FULFILLMENT: H256 = H256::repeat_byte(0xf1);

pub(crate) fn dispatch_event(content: &MessageContent) -> DispatchEvent {
    DispatchEvent {
        sender: content.sender,
        destination: content.destination_domain,
        recipient: H256::from(content.recipient),
        message: Bytes::from(content.to_vec()),
    }
}

fn parse_dispatch(log: &EthereumLog) -> Result<DispatchEvent, ChainCommunicationError> {
    match log.topics.as_slice() {
        [topic, sender, destination, recipient] if *topic == DISPATCH => Ok(DispatchEvent {
            sender: H160::from_slice(&sender.as_bytes()[12..]),
            destination: destination.to_low_u64_be() as u32,
            recipient: *recipient,
            message: log.data.clone(),
        }),
        _ => Err(ChainCommunicationError::from_other_str("not a Dispatch log")),
    }
}

fn parse_dispatch_id(log: &EthereumLog) -> Result<DispatchIdEvent, ChainCommunicationError> {
    match log.topics.as_slice() {
        [topic, message_id] if *topic == DISPATCH_ID => Ok(DispatchIdEvent {
            message_id: *message_id,
        }),
        _ => Err(ChainCommunicationError::from_other_str("not a DispatchId log")),
    }
}

fn parse_fulfillment(log: &EthereumLog) -> Result<FulfillmentEvent, ChainCommunicationError> {
    match log.topics.as_slice() {
        [topic, order_id] if *topic == FULFILLMENT => Ok(FulfillmentEvent {
            order_id: *order_id,
            message: log.data.clone(),
        }),
        _ => Err(ChainCommunicationError::from_other_str("not a Fulfillment log")),
    }
}

#[derive(Debug, Default)]
struct ChainState {
    height: AtomicU64,
    next_hash: AtomicU64,
    transactions: Mutex<HashMap<H256, (EthereumTransaction, EthereumReceipt)>>,
    dispatches: Mutex<Vec<(DispatchEvent, LogMeta)>>,
    fulfillments: Mutex<Vec<(FulfillmentEvent, LogMeta)>>,
    validators: Mutex<(U256, U256)>,
    garbled: Mutex<Vec<u64>>,
}

fn garbled_logs<E>(state: &ChainState, from: u64, to: u64) -> Vec<ChainResult<(E, LogMeta)>> {
    state
        .garbled
        .lock()
        .unwrap()
        .iter()
        .filter(|block| (from..=to).contains(*block))
        .map(|block| {
            Err(ChainCommunicationError::from_other_str(&format!(
                "undecodable log at block {block}"
            )))
        })
        .collect()
}

/// One simulated chain. Every connection built from it sees the same state.
#[derive(Debug, Clone)]
pub(crate) struct TestChain {
    pub chain: Chain,
    pub mailbox: H160,
    pub mint_controller: H160,
    pub warp_ism: H160,
    state: Arc<ChainState>,
}

impl TestChain {
    fn new(domain: u32, name: &str) -> Self {
        let byte = domain as u8;
        let state = ChainState::default();
        *state.validators.lock().unwrap() = (U256::from(2), U256::from(2));
        Self {
            chain: Chain::ethereum(domain, name),
            mailbox: H160::repeat_byte(0x10 + byte),
            mint_controller: H160::repeat_byte(0x20 + byte),
            warp_ism: H160::repeat_byte(0x30 + byte),
            state: Arc::new(state),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.state.height.store(height, Ordering::SeqCst);
    }

    pub fn set_validators(&self, count: u64, threshold: u64) {
        self.set_raw_validators(U256::from(count), U256::from(threshold));
    }

    /// Validator set as the WarpISM reports it, unchecked.
    pub fn set_raw_validators(&self, count: U256, threshold: U256) {
        *self.state.validators.lock().unwrap() = (count, threshold);
    }

    fn next_hash(&self) -> H256 {
        let n = self.state.next_hash.fetch_add(1, Ordering::SeqCst) + 1;
        H256::from_low_u64_be(((self.chain.chain_domain as u64) << 32) | n)
    }

    fn mine(&self, hash: H256, to: H160, block: u64, logs: Vec<EthereumLog>) {
        let transaction = EthereumTransaction {
            hash,
            from: H160::repeat_byte(0xfe),
            to: Some(to),
            block_number: Some(block),
        };
        let receipt = EthereumReceipt {
            transaction_hash: hash,
            block_number: block,
            success: true,
            logs,
        };
        self.state
            .transactions
            .lock()
            .unwrap()
            .insert(hash, (transaction, receipt));
    }

    fn meta(&self, address: H160, hash: H256, block: u64) -> LogMeta {
        LogMeta {
            address,
            block_number: block,
            transaction_hash: hash,
            ..Default::default()
        }
    }

    /// Mine a mailbox dispatch of `content` at `block`, returning the tx hash.
    pub fn dispatch(&self, content: &MessageContent, block: u64) -> H256 {
        let hash = self.next_hash();
        let event = dispatch_event(content);
        let logs = vec![
            EthereumLog {
                address: self.mailbox,
                topics: vec![
                    DISPATCH,
                    H256::from(event.sender),
                    H256::from_low_u64_be(event.destination as u64),
                    event.recipient,
                ],
                data: event.message.clone(),
                removed: false,
            },
            EthereumLog {
                address: self.mailbox,
                topics: vec![DISPATCH_ID, content.id()],
                data: Bytes::default(),
                removed: false,
            },
        ];
        self.mine(hash, self.mailbox, block, logs);
        let meta = self.meta(self.mailbox, hash, block);
        self.state.dispatches.lock().unwrap().push((event, meta));
        hash
    }

    /// Mine a mint controller fulfillment of `order_id` at `block`,
    /// returning the tx hash.
    pub fn fulfill(&self, order_id: MessageId, message: Vec<u8>, block: u64) -> H256 {
        let hash = self.next_hash();
        let event = FulfillmentEvent {
            order_id,
            message: Bytes::from(message),
        };
        let logs = vec![EthereumLog {
            address: self.mint_controller,
            topics: vec![FULFILLMENT, order_id],
            data: event.message.clone(),
            removed: false,
        }];
        self.mine(hash, self.mint_controller, block, logs);
        let meta = self.meta(self.mint_controller, hash, block);
        self.state.fulfillments.lock().unwrap().push((event, meta));
        hash
    }

    /// Emit a log at `block` that neither the mailbox nor the mint
    /// controller can decode.
    pub fn garble(&self, block: u64) {
        self.state.garbled.lock().unwrap().push(block);
    }

    /// Make a mined transaction look reverted.
    pub fn revert(&self, hash: H256) {
        if let Some((_, receipt)) = self.state.transactions.lock().unwrap().get_mut(&hash) {
            receipt.success = false;
        }
    }

    fn client(&self) -> MockEthereumClient {
        let mut client = MockEthereumClient::new();
        let chain = self.chain.clone();
        client.expect__chain().returning(move || chain.clone());
        client.expect__confirmations().return_const(1u64);
        let state = self.state.clone();
        client
            .expect__get_block_height()
            .returning(move || Ok(state.height.load(Ordering::SeqCst)));
        let domain = self.chain.chain_domain;
        client
            .expect__get_chain_id()
            .returning(move || Ok(U256::from(domain)));
        let state = self.state.clone();
        client.expect__get_transaction_by_hash().returning(move |hash| {
            Ok(state
                .transactions
                .lock()
                .unwrap()
                .get(&hash)
                .map(|(tx, _)| tx.clone()))
        });
        let state = self.state.clone();
        client.expect__get_transaction_receipt().returning(move |hash| {
            Ok(state
                .transactions
                .lock()
                .unwrap()
                .get(&hash)
                .map(|(_, receipt)| receipt.clone()))
        });
        client
    }

    fn mailbox_contract(&self) -> MockMailboxContract {
        let mut mailbox = MockMailboxContract::new();
        mailbox.expect__address().return_const(self.mailbox);
        let state = self.state.clone();
        mailbox
            .expect__filter_dispatch()
            .returning(move |from, to, senders| {
                let mut events = garbled_logs(&state, from, to);
                events.extend(
                    state
                        .dispatches
                        .lock()
                        .unwrap()
                        .iter()
                        .filter(|(event, meta)| {
                            (from..=to).contains(&meta.block_number)
                                && senders.contains(&event.sender)
                        })
                        .cloned()
                        .map(Ok),
                );
                Ok(events)
            });
        mailbox
            .expect__parse_dispatch()
            .returning(|log| parse_dispatch(log));
        mailbox
            .expect__parse_dispatch_id()
            .returning(|log| parse_dispatch_id(log));
        mailbox
    }

    fn mint_controller_contract(&self) -> MockMintControllerContract {
        let mut mint_controller = MockMintControllerContract::new();
        mint_controller
            .expect__address()
            .return_const(self.mint_controller);
        let state = self.state.clone();
        mint_controller
            .expect__filter_fulfillment()
            .returning(move |from, to| {
                let mut events = garbled_logs(&state, from, to);
                events.extend(
                    state
                        .fulfillments
                        .lock()
                        .unwrap()
                        .iter()
                        .filter(|(_, meta)| (from..=to).contains(&meta.block_number))
                        .cloned()
                        .map(Ok),
                );
                Ok(events)
            });
        mint_controller
            .expect__parse_fulfillment()
            .returning(|log| parse_fulfillment(log));
        mint_controller
            .expect__max_mint_limit()
            .returning(|| Ok(U256::from(1_000_000u64)));
        mint_controller
    }

    fn warp_ism_contract(&self) -> MockWarpIsmContract {
        let mut warp_ism = MockWarpIsmContract::new();
        warp_ism.expect__address().return_const(self.warp_ism);
        let state = self.state.clone();
        warp_ism
            .expect__validator_count()
            .returning(move || Ok(state.validators.lock().unwrap().0));
        let state = self.state.clone();
        warp_ism
            .expect__signer_threshold()
            .returning(move || Ok(state.validators.lock().unwrap().1));
        let domain = dummy_domain(self.chain.chain_domain, self.warp_ism);
        warp_ism
            .expect__eip712_domain()
            .returning(move || Ok(domain.clone()));
        warp_ism
    }

    /// Fresh mocks over the shared chain state.
    pub fn connection(&self) -> EthereumConnection {
        EthereumConnection {
            client: Arc::new(self.client()),
            mailbox: Arc::new(self.mailbox_contract()),
            mint_controller: Arc::new(self.mint_controller_contract()),
            warp_ism: Arc::new(self.warp_ism_contract()),
        }
    }

    pub fn tx_validator(&self) -> Arc<dyn TransactionValidator> {
        Arc::new(ReceiptTransactionValidator::new(Arc::new(self.client())))
    }
}

/// Chains `one` (domain 1) and `two` (domain 2) validated by wallets 1 and 2.
#[derive(Debug)]
pub(crate) struct TestNetwork {
    pub store: Arc<InMemoryStore>,
    pub chains: Vec<TestChain>,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::default()),
            chains: vec![TestChain::new(1, "one"), TestChain::new(2, "two")],
        }
    }

    pub fn mint_controllers(&self) -> Arc<HashMap<u32, H160>> {
        Arc::new(
            self.chains
                .iter()
                .map(|c| (c.chain.chain_domain, c.mint_controller))
                .collect(),
        )
    }

    pub fn oracle_addresses(&self) -> Vec<H160> {
        vec![test_wallet(1).eth_address(), test_wallet(2).eth_address()]
    }
}

pub(crate) const COSMOS_PREFIX: &str = "pokt";
pub(crate) const COSMOS_DENOM: &str = "upokt";
pub(crate) const COSMOS_FEE: u64 = 100;

fn cosmos_event(kind: &str, attributes: &[(&str, &str)]) -> CosmosEvent {
    CosmosEvent {
        kind: kind.to_owned(),
        attributes: attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

/// A Cosmos chain whose multisig receives bridge deposits. Confirmations
/// required are 5.
#[derive(Debug, Clone)]
pub(crate) struct TestCosmos {
    pub chain: Chain,
    /// Raw account bytes of the multisig
    pub multisig: H160,
    height: Arc<AtomicU64>,
    next_hash: Arc<AtomicU64>,
    txs: Arc<Mutex<Vec<CosmosTxResponse>>>,
}

impl TestCosmos {
    pub fn new() -> Self {
        Self {
            chain: Chain::cosmos("poktroll", "Poktroll"),
            multisig: H160::repeat_byte(9),
            height: Arc::new(AtomicU64::new(0)),
            next_hash: Arc::new(AtomicU64::new(0)),
            txs: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn multisig_address(&self) -> String {
        bech32_from_bytes(COSMOS_PREFIX, self.multisig.as_bytes()).unwrap()
    }

    /// Bech32 address of the account whose bytes are all `seed`
    pub fn account(seed: u8) -> String {
        bech32_from_bytes(COSMOS_PREFIX, &[seed; 20]).unwrap()
    }

    pub fn multisig_config(&self) -> CosmosMultisigConfig {
        CosmosMultisigConfig {
            confirmations: 5,
            tx_fee: U256::from(COSMOS_FEE),
            bech32_prefix: COSMOS_PREFIX.to_owned(),
            coin_denom: COSMOS_DENOM.to_owned(),
            multisig_address: self.multisig_address(),
        }
    }

    /// Memo asking for a mint to `recipient` on `domain`
    pub fn memo(recipient: H160, domain: u32) -> String {
        format!(
            r#"{{"address":"{}","chain_id":"{domain}"}}"#,
            fmt_address(&recipient)
        )
    }

    /// Deliver a transfer of `amount` from account `seed` to the multisig at
    /// `height`, returning the tx hash.
    pub fn deposit(&self, seed: u8, amount: u64, memo: &str, height: u64) -> H256 {
        self.transfer(seed, amount, amount, Some(memo), height, 0)
    }

    /// Deliver a transfer whose spent and received amounts, memo and result
    /// code are chosen by the caller.
    pub fn transfer(
        &self,
        seed: u8,
        spent: u64,
        received: u64,
        memo: Option<&str>,
        height: u64,
        code: u32,
    ) -> H256 {
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = H256::from_low_u64_be(0xc0c0_0000 | n);
        let sender = Self::account(seed);
        let multisig = self.multisig_address();
        let spent = format!("{spent}{COSMOS_DENOM}");
        let received = format!("{received}{COSMOS_DENOM}");
        self.txs.lock().unwrap().push(CosmosTxResponse {
            hash,
            height,
            code,
            events: vec![
                cosmos_event("message", &[("sender", &sender)]),
                cosmos_event("coin_spent", &[("spender", &sender), ("amount", &spent)]),
                cosmos_event("coin_received", &[("receiver", &multisig), ("amount", &received)]),
            ],
            memo: memo.map(ToOwned::to_owned),
        });
        hash
    }

    pub fn client(&self) -> Arc<MockCosmosClient> {
        let mut client = MockCosmosClient::new();
        let chain = self.chain.clone();
        client.expect__chain().returning(move || chain.clone());
        client.expect__confirmations().return_const(5u64);
        let height = self.height.clone();
        client
            .expect__get_block_height()
            .returning(move || Ok(height.load(Ordering::SeqCst)));
        let txs = self.txs.clone();
        client.expect__get_tx().returning(move |hash| {
            txs.lock()
                .unwrap()
                .iter()
                .find(|tx| tx.hash == hash)
                .cloned()
                .ok_or(ChainCommunicationError::TransactionNotFound(hash))
        });
        let txs = self.txs.clone();
        client
            .expect__get_txs_sent_to_address_after_height()
            .returning(move |_, from| {
                Ok(txs
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|tx| tx.height >= from)
                    .cloned()
                    .collect())
            });
        Arc::new(client)
    }
}
