use serde::{Deserialize, Serialize};

use crate::H256;

/// The parts of a Cosmos tx query the oracle inspects.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CosmosTxResponse {
    /// Tx hash
    pub hash: H256,
    /// Block height, zero if unknown
    pub height: u64,
    /// ABCI result code, zero on success
    pub code: u32,
    /// Events emitted during delivery
    pub events: Vec<CosmosEvent>,
    /// Body memo, `None` if the tx bytes did not decode
    pub memo: Option<String>,
}

impl CosmosTxResponse {
    /// Events of the given type.
    pub fn events_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a CosmosEvent> + 'a {
        self.events.iter().filter(move |e| e.kind == kind)
    }
}

/// An ABCI event with its attributes decoded to strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CosmosEvent {
    /// Event type, e.g. `coin_received`
    pub kind: String,
    /// Key/value pairs in emission order
    pub attributes: Vec<(String, String)>,
}

impl CosmosEvent {
    /// First value for `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Memo a depositor attaches to a Cosmos transfer to request a mint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MintMemo {
    /// Ethereum recipient, hex
    pub address: String,
    /// Destination chain id, decimal
    pub chain_id: String,
}
