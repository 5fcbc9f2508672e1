use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use ethers_core::types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::{address_from_hex, fmt_address};
use crate::{Chain, MessageContent, MessageId};

/// Key of a document in the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a [`TransactionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Seen but not yet deep enough
    Pending,
    /// Final and successful
    Confirmed,
    /// Reverted on chain, or the receipt is gone
    Failed,
    /// The event that justified storing it is not there
    Invalid,
    /// Closed out by the relayer
    Success,
}

/// Lifecycle of a [`MessageRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Waiting for signatures
    Pending,
    /// Carries at least the signer threshold of signatures
    Signed,
    /// Submitted to the destination chain
    Broadcasted,
    /// Fulfilled on the destination chain
    Success,
    /// Failed origin validation
    Invalid,
}

impl MessageStatus {
    /// Signers may still add signatures or mark the message invalid.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Signed)
    }
}

/// One validator signature over a message digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Lower-case `0x`-prefixed signer address
    pub signer: String,
    /// `0x`-prefixed 65-byte `r || s || v` signature
    pub signature: String,
}

impl Signature {
    fn signer_key(&self) -> Option<H160> {
        address_from_hex(&self.signer).ok()
    }
}

/// Compare signatures by the numeric value of the signer address. Entries
/// whose signer does not parse sort last, by string.
pub fn cmp_signatures(a: &Signature, b: &Signature) -> Ordering {
    match (a.signer_key(), b.signer_key()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.signer.cmp(&b.signer),
    }
}

/// Sort ascending by signer address so every node produces the same array.
pub fn sort_signatures(signatures: &mut [Signature]) {
    signatures.sort_by(cmp_signatures);
}

/// Why and how much should be returned to a depositor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundInfo {
    /// Human readable reason
    pub reason: String,
    /// Amount to return
    pub amount: U256,
    /// Hash of the refund transaction once sent
    pub refund_tx_hash: Option<H256>,
}

/// An on-chain transaction the bridge cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub hash: H256,
    pub from_address: String,
    pub to_address: String,
    pub block_height: u64,
    pub confirmations: u64,
    pub chain: Chain,
    pub status: TransactionStatus,
    pub messages: Vec<RecordId>,
    pub refund: Option<RefundInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// A new document for an EVM transaction sent to `to`.
    pub fn new_ethereum_transaction(
        hash: H256,
        from: H160,
        to: H160,
        block_height: u64,
        confirmations: u64,
        chain: Chain,
        status: TransactionStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            hash,
            from_address: fmt_address(&from),
            to_address: fmt_address(&to),
            block_height,
            confirmations,
            chain,
            status,
            messages: vec![],
            refund: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A new document for a Cosmos deposit. `from` is the depositor's bech32
    /// address, `to` the raw account bytes of the multisig so deposits are
    /// found by the same address queries as EVM transactions.
    pub fn new_cosmos_transaction(
        hash: H256,
        from: String,
        to: H160,
        block_height: u64,
        confirmations: u64,
        chain: Chain,
        status: TransactionStatus,
    ) -> Self {
        Self {
            from_address: from,
            ..Self::new_ethereum_transaction(
                hash,
                H160::zero(),
                to,
                block_height,
                confirmations,
                chain,
                status,
            )
        }
    }
}

/// A cross-chain message and the signatures collected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MessageRecord {
    pub id: RecordId,
    pub origin_transaction: RecordId,
    pub origin_transaction_hash: H256,
    pub message_id: MessageId,
    pub content: MessageContent,
    pub signatures: Vec<Signature>,
    pub transaction: Option<RecordId>,
    pub transaction_hash: Option<H256>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageRecord {
    /// A new pending message derived from `origin`.
    pub fn new(origin: &TransactionRecord, content: MessageContent) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            origin_transaction: origin.id,
            origin_transaction_hash: origin.hash,
            message_id: content.id(),
            content,
            signatures: vec![],
            transaction: None,
            transaction_hash: None,
            status: MessageStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `signer` (any case) already signed this message.
    pub fn is_signed_by(&self, signer: &str) -> bool {
        self.signatures
            .iter()
            .any(|s| s.signer.eq_ignore_ascii_case(signer))
    }
}

/// Partial update of a [`TransactionRecord`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct TransactionUpdate {
    pub status: Option<TransactionStatus>,
    pub confirmations: Option<u64>,
    pub messages: Option<Vec<RecordId>>,
    pub refund: Option<RefundInfo>,
}

impl TransactionUpdate {
    /// Write the set fields into `record` and bump `updated_at`.
    pub fn apply(self, record: &mut TransactionRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(confirmations) = self.confirmations {
            record.confirmations = confirmations;
        }
        if let Some(messages) = self.messages {
            record.messages = messages;
        }
        if let Some(refund) = self.refund {
            record.refund = Some(refund);
        }
        record.updated_at = Utc::now();
    }
}

/// Partial update of a [`MessageRecord`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MessageUpdate {
    pub status: Option<MessageStatus>,
    pub signatures: Option<Vec<Signature>>,
    pub transaction: Option<RecordId>,
    pub transaction_hash: Option<H256>,
}

impl MessageUpdate {
    /// Write the set fields into `record` and bump `updated_at`.
    pub fn apply(self, record: &mut MessageRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(signatures) = self.signatures {
            record.signatures = signatures;
        }
        if let Some(transaction) = self.transaction {
            record.transaction = Some(transaction);
        }
        if let Some(hash) = self.transaction_hash {
            record.transaction_hash = Some(hash);
        }
        record.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sig(signer: &str) -> Signature {
        Signature {
            signer: signer.to_owned(),
            signature: "0x00".to_owned(),
        }
    }

    #[test]
    fn signatures_sort_by_numeric_address() {
        let low = format!("0x{}", "0a".repeat(20));
        let high = format!("0x{}", "b0".repeat(20));
        let mut ab = vec![sig(&high), sig(&low)];
        let mut ba = vec![sig(&low), sig(&high)];
        sort_signatures(&mut ab);
        sort_signatures(&mut ba);
        assert_eq!(ab, ba);
        assert_eq!(ab[0].signer, low);
    }

    #[test]
    fn unparseable_signers_sort_last() {
        let mut sigs = vec![sig("garbage"), sig(&format!("0x{}", "ff".repeat(20)))];
        sort_signatures(&mut sigs);
        assert_eq!(sigs[1].signer, "garbage");
    }

    #[test]
    fn updates_only_touch_given_fields() {
        let mut tx = TransactionRecord::new_ethereum_transaction(
            H256::repeat_byte(1),
            H160::repeat_byte(2),
            H160::repeat_byte(3),
            10,
            0,
            Chain::ethereum(1, "ethereum"),
            TransactionStatus::Pending,
        );
        TransactionUpdate {
            confirmations: Some(4),
            ..Default::default()
        }
        .apply(&mut tx);
        assert_eq!(tx.confirmations, 4);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.to_address, format!("0x{}", "03".repeat(20)));
    }
}
