use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::{Bytes, ChainResult, MessageId, H160, H256, U256};

/// Where an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogMeta {
    /// Contract that emitted the log
    pub address: H160,
    /// Block the log was included in
    pub block_number: u64,
    /// Hash of that block
    pub block_hash: H256,
    /// Transaction that emitted the log
    pub transaction_hash: H256,
    /// Index of the transaction in the block
    pub transaction_index: u64,
    /// Index of the log in the block
    pub log_index: U256,
    /// The log was dropped by a reorg
    pub removed: bool,
}

/// Mailbox `Dispatch(address indexed sender, uint32 indexed destination,
/// bytes32 indexed recipient, bytes message)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEvent {
    /// Contract that called dispatch
    pub sender: H160,
    /// Destination domain
    pub destination: u32,
    /// Left-padded recipient contract
    pub recipient: H256,
    /// Encoded [`crate::MessageContent`]
    pub message: Bytes,
}

/// Mailbox `DispatchId(bytes32 indexed messageId)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchIdEvent {
    /// ID of the dispatched message
    pub message_id: MessageId,
}

/// MintController `Fulfillment(bytes32 indexed orderId, bytes message)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentEvent {
    /// ID of the fulfilled message
    pub order_id: MessageId,
    /// The fulfilled message
    pub message: Bytes,
}

/// Lazily decoded events over a block range. Dropping the stream releases
/// the underlying query.
pub type EventStream<'a, E> = BoxStream<'a, ChainResult<(E, LogMeta)>>;
