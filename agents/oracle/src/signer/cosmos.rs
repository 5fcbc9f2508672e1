use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use oracle_core::utils::{address_from_bytes, address_from_hex};
use oracle_core::{ChainResult, CosmosClient, MessageRecord, TransactionStatus};
use oracle_cosmos::{validate_tx_to_cosmos_multisig, CosmosMultisigConfig};

use super::origin::OriginCheck;

/// Checks messages minted from deposits into the bridge multisig.
#[derive(Debug, Clone)]
pub struct CosmosOriginValidator {
    client: Arc<dyn CosmosClient>,
    config: CosmosMultisigConfig,
    supported_domains: HashSet<u32>,
}

impl CosmosOriginValidator {
    /// Deposits may only name a chain among `supported_domains` in their
    /// memo.
    pub fn new(
        client: Arc<dyn CosmosClient>,
        config: CosmosMultisigConfig,
        supported_domains: HashSet<u32>,
    ) -> Self {
        Self {
            client,
            config,
            supported_domains,
        }
    }

    /// Domain of the Cosmos chain
    pub fn domain(&self) -> u32 {
        self.client.chain().chain_domain
    }

    /// Latest Cosmos block height
    pub async fn get_block_height(&self) -> ChainResult<u64> {
        self.client.get_block_height().await
    }

    /// The origin tx must be a clean deposit into the multisig whose amount,
    /// sender and memo recipient are exactly what the message carries.
    pub async fn validate(
        &self,
        message: &MessageRecord,
        current_height: u64,
    ) -> ChainResult<OriginCheck> {
        let tx = self.client.get_tx(message.origin_transaction_hash).await?;
        let validation = match validate_tx_to_cosmos_multisig(
            &tx,
            &self.config,
            &self.supported_domains,
            current_height,
        ) {
            Ok(validation) => validation,
            Err(err) => return Ok(OriginCheck::Invalid(err.to_string())),
        };
        if validation.needs_refund {
            return Ok(OriginCheck::Invalid("deposit needs a refund".to_owned()));
        }

        let body = &message.content.message_body;
        if validation.amount != body.amount {
            return Ok(OriginCheck::Invalid(format!(
                "amount {} is not {}",
                validation.amount, body.amount
            )));
        }
        match address_from_bytes(&validation.sender_address) {
            Ok(sender) if sender == body.sender_address => {}
            _ => return Ok(OriginCheck::Invalid("sender mismatch".to_owned())),
        }
        let recipient = validation
            .memo
            .as_ref()
            .and_then(|memo| address_from_hex(&memo.address).ok());
        if recipient != Some(body.recipient_address) {
            return Ok(OriginCheck::Invalid("recipient mismatch".to_owned()));
        }

        debug!(tx_hash = ?tx.hash, confirmations = validation.confirmations, status = ?validation.status, "Deposit matches message");
        Ok(match validation.status {
            TransactionStatus::Confirmed => OriginCheck::Confirmed,
            TransactionStatus::Pending => OriginCheck::Pending,
            status => OriginCheck::Invalid(format!("deposit is {status:?}")),
        })
    }
}

#[cfg(test)]
mod test {
    use oracle_core::utils::{bech32_from_bytes, fmt_address};
    use oracle_core::{
        Chain, CosmosEvent, CosmosTxResponse, MessageBody, MessageContent, TransactionRecord,
        H160, H256, U256,
    };
    use oracle_test::mocks::MockCosmosClient;

    use super::*;

    const DENOM: &str = "upokt";

    fn multisig() -> String {
        bech32_from_bytes("pokt", &[9u8; 20]).unwrap()
    }

    fn depositor() -> String {
        bech32_from_bytes("pokt", &[5u8; 20]).unwrap()
    }

    fn event(kind: &str, attributes: &[(&str, &str)]) -> CosmosEvent {
        CosmosEvent {
            kind: kind.to_owned(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn deposit(received: u64, spent: u64, memo: &str) -> CosmosTxResponse {
        let received = format!("{received}{DENOM}");
        let spent = format!("{spent}{DENOM}");
        CosmosTxResponse {
            hash: H256::repeat_byte(0xc0),
            height: 90,
            code: 0,
            events: vec![
                event("message", &[("sender", &depositor())]),
                event("coin_received", &[("receiver", &multisig()), ("amount", &received)]),
                event("coin_spent", &[("spender", &depositor()), ("amount", &spent)]),
            ],
            memo: Some(memo.to_owned()),
        }
    }

    fn memo(recipient: H160) -> String {
        format!(r#"{{"address":"{}","chain_id":"1"}}"#, fmt_address(&recipient))
    }

    fn validator(tx: CosmosTxResponse) -> CosmosOriginValidator {
        let mut client = MockCosmosClient::new();
        client
            .expect__get_tx()
            .returning(move |_| Ok(tx.clone()));
        client
            .expect__chain()
            .returning(|| Chain::cosmos("poktroll", "Poktroll"));
        CosmosOriginValidator::new(
            Arc::new(client),
            CosmosMultisigConfig {
                confirmations: 5,
                tx_fee: U256::from(100),
                bech32_prefix: "pokt".to_owned(),
                coin_denom: DENOM.to_owned(),
                multisig_address: multisig(),
            },
            HashSet::from([1]),
        )
    }

    fn message(amount: u64, recipient: H160, sender: H160) -> MessageRecord {
        let chain = Chain::cosmos("poktroll", "Poktroll");
        let origin = TransactionRecord::new_ethereum_transaction(
            H256::repeat_byte(0xc0),
            H160::zero(),
            H160::zero(),
            90,
            10,
            chain.clone(),
            TransactionStatus::Confirmed,
        );
        let content = MessageContent::new(
            1,
            chain.chain_domain,
            H160::repeat_byte(0x10),
            1,
            H160::repeat_byte(0x11),
            MessageBody::new(recipient, U256::from(amount), sender),
        );
        MessageRecord::new(&origin, content)
    }

    #[tokio::test]
    async fn matching_deposit_is_confirmed() {
        let recipient = H160::repeat_byte(0xee);
        let sender = H160::repeat_byte(5);
        let validator = validator(deposit(1000, 1000, &memo(recipient)));
        let msg = message(1000, recipient, sender);
        assert_eq!(validator.validate(&msg, 100).await.unwrap(), OriginCheck::Confirmed);
        assert_eq!(validator.validate(&msg, 92).await.unwrap(), OriginCheck::Pending);
    }

    #[tokio::test]
    async fn mismatches_are_invalid() {
        let recipient = H160::repeat_byte(0xee);
        let sender = H160::repeat_byte(5);

        let skimmed = validator(deposit(1000, 900, &memo(recipient)));
        assert!(matches!(
            skimmed.validate(&message(900, recipient, sender), 100).await.unwrap(),
            OriginCheck::Invalid(_)
        ));

        let honest = validator(deposit(1000, 1000, &memo(recipient)));
        for msg in [
            message(999, recipient, sender),
            message(1000, H160::repeat_byte(0xef), sender),
            message(1000, recipient, H160::repeat_byte(6)),
        ] {
            assert!(matches!(
                honest.validate(&msg, 100).await.unwrap(),
                OriginCheck::Invalid(_)
            ));
        }

        let bad_memo = validator(deposit(1000, 1000, "mint please"));
        assert!(matches!(
            bad_memo.validate(&message(1000, recipient, sender), 100).await.unwrap(),
            OriginCheck::Invalid(_)
        ));
    }
}
