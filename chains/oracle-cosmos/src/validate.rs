use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use oracle_core::utils::{address_bytes_from_bech32, address_from_hex};
use oracle_core::{
    CosmosTxResponse, MintMemo, OracleProtocolError, TransactionStatus, H160, U256,
};

use crate::{parse_coins_received, parse_coins_spent, parse_message_sender, CoinEventError};

/// What the oracle needs to know about the bridge multisig to judge a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmosMultisigConfig {
    /// Blocks required on top of a deposit
    pub confirmations: u64,
    /// Fixed network fee; deposits must exceed it
    pub tx_fee: U256,
    /// Account address prefix
    pub bech32_prefix: String,
    /// Bridged coin denomination
    pub coin_denom: String,
    /// Bech32 address of the multisig receiving deposits
    pub multisig_address: String,
}

/// Outcome of checking a Cosmos tx against the multisig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosmosTxValidation {
    /// `Invalid` and `Failed` are terminal, `Pending` needs more blocks
    pub status: TransactionStatus,
    /// Blocks on top of the tx at the time of the check
    pub confirmations: u64,
    /// Amount spent by the depositor
    pub amount: U256,
    /// Raw account bytes of the tx sender
    pub sender_address: Vec<u8>,
    /// Mint instruction, set only when the memo is well formed
    pub memo: Option<MintMemo>,
    /// The deposit moved funds but cannot be minted
    pub needs_refund: bool,
}

impl CosmosTxValidation {
    fn invalid(sender_address: Vec<u8>) -> Self {
        Self {
            status: TransactionStatus::Invalid,
            confirmations: 0,
            amount: U256::zero(),
            sender_address,
            memo: None,
            needs_refund: false,
        }
    }
}

/// The tx sender could not be determined, so nothing about the tx can be
/// attributed or refunded.
#[derive(Debug, thiserror::Error)]
pub enum CosmosTxValidationError {
    /// No sender event
    #[error(transparent)]
    Sender(#[from] CoinEventError),
    /// The sender is not an address of this chain
    #[error(transparent)]
    SenderAddress(#[from] OracleProtocolError),
}

/// Check that `memo` is `{"address": "0x..", "chain_id": ".."}` naming a
/// non-zero Ethereum recipient on one of `supported_domains`.
pub fn validate_memo(
    memo: &str,
    supported_domains: &HashSet<u32>,
) -> Result<MintMemo, OracleProtocolError> {
    let mut memo: MintMemo = serde_json::from_str(memo)?;
    memo.address = memo.address.trim().to_lowercase();
    memo.chain_id = memo.chain_id.trim().to_lowercase();

    if !memo.address.starts_with("0x") {
        return Err(OracleProtocolError::InvalidMemo(format!(
            "address {} is not 0x-prefixed",
            memo.address
        )));
    }
    let address = address_from_hex(&memo.address)?;
    if address == H160::zero() {
        return Err(OracleProtocolError::InvalidMemo("zero address".to_owned()));
    }

    let supported = memo
        .chain_id
        .parse::<u32>()
        .map(|domain| supported_domains.contains(&domain))
        .unwrap_or(false);
    if !supported {
        return Err(OracleProtocolError::InvalidMemo(format!(
            "unsupported chain id {}",
            memo.chain_id
        )));
    }
    Ok(memo)
}

/// Judge a Cosmos tx as a deposit into the bridge multisig.
///
/// Checks run in order and the first failure decides the outcome: a non-zero
/// result code is `Failed`; undecodable bodies, missing or mismatched coin
/// movements, amounts not above the fee and bad heights are `Invalid`. A
/// deposit that passes those is `Pending` or `Confirmed` by depth, and is
/// flagged for refund when the amounts disagree or the memo is unusable.
pub fn validate_tx_to_cosmos_multisig(
    tx: &CosmosTxResponse,
    config: &CosmosMultisigConfig,
    supported_domains: &HashSet<u32>,
    current_height: u64,
) -> Result<CosmosTxValidation, CosmosTxValidationError> {
    let sender = parse_message_sender(&tx.events)?;
    let sender_address = address_bytes_from_bech32(&config.bech32_prefix, &sender)?;

    if tx.code != 0 {
        debug!(tx_hash = ?tx.hash, code = tx.code, "Found tx with non-zero code");
        return Ok(CosmosTxValidation {
            status: TransactionStatus::Failed,
            ..CosmosTxValidation::invalid(sender_address)
        });
    }

    let mut result = CosmosTxValidation::invalid(sender_address);

    let Some(memo) = tx.memo.as_deref() else {
        warn!(tx_hash = ?tx.hash, "Found tx without a decodable body");
        return Ok(result);
    };

    let coins_received =
        match parse_coins_received(&config.coin_denom, &config.multisig_address, &tx.events) {
            Ok(coins) => coins,
            Err(err) => {
                warn!(tx_hash = ?tx.hash, ?err, "Error parsing coins received events");
                return Ok(result);
            }
        };
    let (spender, coins_spent) = match parse_coins_spent(&config.coin_denom, &tx.events) {
        Ok(spent) => spent,
        Err(err) => {
            warn!(tx_hash = ?tx.hash, ?err, "Error parsing coins spent events");
            return Ok(result);
        }
    };

    if coins_received.is_zero() || coins_spent.is_zero() {
        debug!(tx_hash = ?tx.hash, "Found tx with zero coins");
        return Ok(result);
    }
    if coins_received <= config.tx_fee {
        debug!(tx_hash = ?tx.hash, %coins_received, "Found tx with amount too low");
        return Ok(result);
    }

    let spender_address = spender
        .as_deref()
        .map(|spender| address_bytes_from_bech32(&config.bech32_prefix, spender));
    match spender_address {
        Some(Ok(spender_address)) if spender_address == result.sender_address => {}
        _ => {
            warn!(tx_hash = ?tx.hash, ?spender, %sender, "Sender address does not match spender address");
            return Ok(result);
        }
    }

    if tx.height == 0 || tx.height > current_height {
        warn!(tx_hash = ?tx.hash, height = tx.height, current_height, "Found tx with invalid height");
        return Ok(result);
    }

    result.amount = coins_spent;
    result.confirmations = current_height - tx.height;
    result.status = if result.confirmations >= config.confirmations {
        TransactionStatus::Confirmed
    } else {
        TransactionStatus::Pending
    };

    if coins_spent != coins_received {
        debug!(tx_hash = ?tx.hash, %coins_spent, %coins_received, "Found tx with mismatched coins");
        result.needs_refund = true;
        return Ok(result);
    }

    match validate_memo(memo, supported_domains) {
        Ok(memo) => {
            debug!(tx_hash = ?tx.hash, ?memo, "Found valid memo");
            result.memo = Some(memo);
        }
        Err(err) => {
            debug!(tx_hash = ?tx.hash, %memo, ?err, "Found invalid memo");
            result.needs_refund = true;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use oracle_core::utils::bech32_from_bytes;
    use oracle_core::{CosmosEvent, H256};

    use super::*;

    const PREFIX: &str = "pokt";
    const RECIPIENT: &str = "0xAb5801a7D398351b8bE11C439e05C5b3259aec9B";

    fn bech32(byte: u8) -> String {
        bech32_from_bytes(PREFIX, &[byte; 20]).unwrap()
    }

    fn config() -> CosmosMultisigConfig {
        CosmosMultisigConfig {
            confirmations: 10,
            tx_fee: U256::from(100),
            bech32_prefix: PREFIX.to_owned(),
            coin_denom: "upokt".to_owned(),
            multisig_address: bech32(1),
        }
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

    fn deposit(received: &str, spent: &str, memo: &str) -> CosmosTxResponse {
        let multisig = bech32(1);
        let sender = bech32(2);
        CosmosTxResponse {
            hash: H256::repeat_byte(0x12),
            height: 90,
            code: 0,
            events: vec![
                event("message", &[("sender", &sender)]),
                event("coin_received", &[("receiver", &multisig), ("amount", received)]),
                event("coin_spent", &[("spender", &sender), ("amount", spent)]),
            ],
            memo: Some(memo.to_owned()),
        }
    }

    fn valid_memo() -> String {
        format!(r#"{{"address": "{RECIPIENT}", "chain_id": "1"}}"#)
    }

    fn domains() -> HashSet<u32> {
        HashSet::from([1])
    }

    #[test]
    fn confirmed_deposit() {
        let tx = deposit("1000upokt", "1000upokt", &valid_memo());
        let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).unwrap();
        assert_eq!(result.status, TransactionStatus::Confirmed);
        assert_eq!(result.confirmations, 10);
        assert_eq!(result.amount, U256::from(1000));
        assert_eq!(result.sender_address, vec![2u8; 20]);
        assert!(!result.needs_refund);
        let memo = result.memo.unwrap();
        assert_eq!(memo.address, RECIPIENT.to_lowercase());
        assert_eq!(memo.chain_id, "1");
    }

    #[test]
    fn shallow_deposit_is_pending() {
        let tx = deposit("1000upokt", "1000upokt", &valid_memo());
        let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 95).unwrap();
        assert_eq!(result.status, TransactionStatus::Pending);
        assert_eq!(result.confirmations, 5);
    }

    #[test]
    fn missing_sender_is_an_error() {
        let mut tx = deposit("1000upokt", "1000upokt", &valid_memo());
        tx.events.clear();
        assert!(validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).is_err());

        let mut tx = deposit("1000upokt", "1000upokt", &valid_memo());
        tx.events[0] = event("message", &[("sender", "invalid_sender")]);
        assert!(validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).is_err());
    }

    #[test]
    fn non_zero_code_is_failed() {
        let mut tx = deposit("1000upokt", "1000upokt", &valid_memo());
        tx.code = 5;
        let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).unwrap();
        assert_eq!(result.status, TransactionStatus::Failed);
    }

    #[test]
    fn undecodable_body_is_invalid() {
        let mut tx = deposit("1000upokt", "1000upokt", &valid_memo());
        tx.memo = None;
        let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).unwrap();
        assert_eq!(result.status, TransactionStatus::Invalid);
    }

    #[test]
    fn bad_coin_movements_are_invalid() {
        for (received, spent) in [
            ("0upokt", "1000upokt"),
            ("1000upokt", "0upokt"),
            ("100upokt", "100upokt"),
            ("1000uatom", "1000upokt"),
        ] {
            let tx = deposit(received, spent, &valid_memo());
            let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).unwrap();
            assert_eq!(result.status, TransactionStatus::Invalid, "{received} / {spent}");
        }
    }

    #[test]
    fn spender_must_be_sender() {
        let mut tx = deposit("1000upokt", "1000upokt", &valid_memo());
        tx.events[2] = event("coin_spent", &[("spender", &bech32(3)), ("amount", "1000upokt")]);
        let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).unwrap();
        assert_eq!(result.status, TransactionStatus::Invalid);
    }

    #[test]
    fn height_must_be_known() {
        let tx = deposit("1000upokt", "1000upokt", &valid_memo());
        let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 80).unwrap();
        assert_eq!(result.status, TransactionStatus::Invalid);

        let mut tx = deposit("1000upokt", "1000upokt", &valid_memo());
        tx.height = 0;
        let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).unwrap();
        assert_eq!(result.status, TransactionStatus::Invalid);
    }

    #[test]
    fn mismatched_amounts_need_refund() {
        let mut tx = deposit("1000upokt", "1000upokt", &valid_memo());
        tx.events.push(event("coin_spent", &[("spender", &bech32(2)), ("amount", "50upokt")]));
        let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).unwrap();
        assert_eq!(result.status, TransactionStatus::Confirmed);
        assert!(result.needs_refund);
        assert!(result.memo.is_none());
    }

    #[test]
    fn bad_memo_needs_refund() {
        for memo in [
            "not json".to_owned(),
            r#"{"address": "0x0000000000000000000000000000000000000000", "chain_id": "1"}"#.to_owned(),
            format!(r#"{{"address": "{RECIPIENT}", "chain_id": "5"}}"#),
            r#"{"address": "0x1234", "chain_id": "1"}"#.to_owned(),
        ] {
            let tx = deposit("1000upokt", "1000upokt", &memo);
            let result = validate_tx_to_cosmos_multisig(&tx, &config(), &domains(), 100).unwrap();
            assert!(result.needs_refund, "{memo}");
            assert!(result.memo.is_none());
        }
    }

    #[test]
    fn memo_is_normalised() {
        let memo = format!(r#"{{"address": "  {RECIPIENT} ", "chain_id": " 1 "}}"#);
        let memo = validate_memo(&memo, &domains()).unwrap();
        assert_eq!(memo.address, RECIPIENT.to_lowercase());
        assert_eq!(memo.chain_id, "1");
        let bare = format!(r#"{{"address": "{}", "chain_id": "1"}}"#, &RECIPIENT[2..]);
        assert!(validate_memo(&bare, &domains()).is_err());
    }
}
