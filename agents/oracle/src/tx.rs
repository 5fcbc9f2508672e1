use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use auto_impl::auto_impl;
use derive_new::new;

use oracle_core::{
    ChainCommunicationError, ChainResult, EthereumClient, EthereumLog, EthereumReceipt,
    EthereumTransaction, TransactionStatus, H160, H256,
};

/// A transaction that is mined and did not revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    /// The transaction
    pub transaction: EthereumTransaction,
    /// Its successful receipt
    pub receipt: EthereumReceipt,
}

/// Decides whether a transaction an event points at may be recorded.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait TransactionValidator: Send + Sync + Debug {
    /// The transaction must exist, be mined and have succeeded.
    async fn validate_transaction_by_hash(&self, hash: H256) -> ChainResult<ValidatedTransaction>;
}

/// Validates transactions against a chain node.
#[derive(Debug, Clone, new)]
pub struct ReceiptTransactionValidator {
    client: Arc<dyn EthereumClient>,
}

#[async_trait]
impl TransactionValidator for ReceiptTransactionValidator {
    async fn validate_transaction_by_hash(&self, hash: H256) -> ChainResult<ValidatedTransaction> {
        let transaction = self
            .client
            .get_transaction_by_hash(hash)
            .await?
            .ok_or(ChainCommunicationError::TransactionNotFound(hash))?;
        if transaction.block_number.is_none() {
            return Err(ChainCommunicationError::TransactionPending(hash));
        }
        match self.client.get_transaction_receipt(hash).await? {
            Some(receipt) if receipt.success => Ok(ValidatedTransaction {
                transaction,
                receipt,
            }),
            _ => Err(ChainCommunicationError::TransactionFailed(hash)),
        }
    }
}

/// Blocks on top of `block_height` and whether that meets `required`.
pub fn confirmation_status(
    current_height: u64,
    block_height: u64,
    required: u64,
) -> (u64, TransactionStatus) {
    let confirmations = current_height.saturating_sub(block_height);
    let status = if confirmations >= required {
        TransactionStatus::Confirmed
    } else {
        TransactionStatus::Pending
    };
    (confirmations, status)
}

/// Events a stored transaction emitted, re-read from its receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptEvents<E> {
    /// Events decoded from logs at the watched address
    pub events: Vec<E>,
    /// Blocks on top of the receipt's block
    pub confirmations: u64,
    /// `Failed` without a successful receipt, `Invalid` without events,
    /// otherwise `Pending` or `Confirmed` by depth
    pub status: TransactionStatus,
}

/// Refetch the receipt of `hash` and decode every log emitted by `address`
/// with `parse`. Logs that do not decode are skipped.
pub async fn parse_receipt_events<E, F>(
    client: &dyn EthereumClient,
    hash: H256,
    current_height: u64,
    address: H160,
    parse: F,
) -> ChainResult<ReceiptEvents<E>>
where
    F: Fn(&EthereumLog) -> ChainResult<E>,
{
    let receipt = match client.get_transaction_receipt(hash).await? {
        Some(receipt) if receipt.success => receipt,
        _ => {
            return Ok(ReceiptEvents {
                events: vec![],
                confirmations: 0,
                status: TransactionStatus::Failed,
            })
        }
    };
    let events: Vec<E> = receipt
        .logs_at(address)
        .filter_map(|log| parse(log).ok())
        .collect();
    let (confirmations, mut status) =
        confirmation_status(current_height, receipt.block_number, client.confirmations());
    if events.is_empty() {
        status = TransactionStatus::Invalid;
    }
    Ok(ReceiptEvents {
        events,
        confirmations,
        status,
    })
}
