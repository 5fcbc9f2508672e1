use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::utils::keccak256;

/// Family of a chain the oracle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// EVM chains: receipts and logs
    Ethereum,
    /// Cosmos SDK chains: tx results and bank events
    Cosmos,
}

/// A configured chain. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chain {
    /// Native chain identifier, `"1"` or `"poktroll"`
    pub chain_id: String,
    /// Human readable name used in logs
    pub chain_name: String,
    /// Routing key used inside messages
    pub chain_domain: u32,
    /// Chain family
    pub chain_type: ChainType,
}

impl Chain {
    /// An EVM chain routes by its numeric chain id.
    pub fn ethereum(chain_id: u32, chain_name: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            chain_name: chain_name.into(),
            chain_domain: chain_id,
            chain_type: ChainType::Ethereum,
        }
    }

    /// A Cosmos chain routes by a domain derived from its string id, see
    /// [`cosmos_chain_domain`].
    pub fn cosmos(chain_id: impl Into<String>, chain_name: impl Into<String>) -> Self {
        let chain_id = chain_id.into();
        Self {
            chain_domain: cosmos_chain_domain(&chain_id),
            chain_id,
            chain_name: chain_name.into(),
            chain_type: ChainType::Cosmos,
        }
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.chain_name, self.chain_domain)
    }
}

/// Low 32 bits of `keccak256(chain_id)`, read big-endian.
pub fn cosmos_chain_domain(chain_id: &str) -> u32 {
    let hash = keccak256(chain_id.as_bytes());
    let mut low = [0u8; 4];
    low.copy_from_slice(&hash.as_bytes()[28..32]);
    u32::from_be_bytes(low)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cosmos_domain_is_derived_from_chain_id() {
        let a = Chain::cosmos("poktroll", "Poktroll");
        let b = Chain::cosmos("poktroll", "renamed");
        assert_eq!(a.chain_domain, b.chain_domain);
        assert_ne!(a.chain_domain, Chain::cosmos("pocket", "Pocket").chain_domain);
        assert_eq!(a.chain_type, ChainType::Cosmos);
    }

    #[test]
    fn ethereum_domain_is_chain_id() {
        let chain = Chain::ethereum(11155111, "sepolia");
        assert_eq!(chain.chain_domain, 11155111);
        assert_eq!(chain.chain_id, "11155111");
    }
}
