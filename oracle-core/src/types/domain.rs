use ethers_core::abi::{encode, Token};
use ethers_core::types::{H160, H256, U256};
use serde::{Deserialize, Serialize};

use crate::utils::keccak256;
use crate::{Encode, MessageContent};

const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

const MESSAGE_TYPE: &str = "Message(uint8 version,uint32 nonce,uint32 originDomain,bytes32 sender,uint32 destinationDomain,bytes32 recipient,bytes messageBody)";

/// EIP-712 domain read from the destination chain's WarpISM. Signing input
/// only, refreshed every signer tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainData {
    /// Domain name
    pub name: String,
    /// Domain version
    pub version: String,
    /// Chain the verifying contract lives on
    pub chain_id: U256,
    /// The contract that checks signatures
    pub verifying_contract: H160,
    /// Unused by the current domain type, carried for completeness
    pub salt: H256,
    /// ERC-5267 extension identifiers
    pub extensions: Vec<U256>,
}

impl DomainData {
    /// `hashStruct(EIP712Domain)`.
    pub fn separator(&self) -> H256 {
        keccak256(encode(&[
            Token::FixedBytes(keccak256(EIP712_DOMAIN_TYPE).as_bytes().to_vec()),
            Token::FixedBytes(keccak256(&self.name).as_bytes().to_vec()),
            Token::FixedBytes(keccak256(&self.version).as_bytes().to_vec()),
            Token::Uint(self.chain_id),
            Token::Address(self.verifying_contract),
        ]))
    }

    /// The digest a validator signs for `content` under this domain.
    pub fn signing_hash(&self, content: &MessageContent) -> H256 {
        let mut preimage = Vec::with_capacity(2 + 32 + 32);
        preimage.extend_from_slice(&[0x19, 0x01]);
        preimage.extend_from_slice(self.separator().as_bytes());
        preimage.extend_from_slice(message_struct_hash(content).as_bytes());
        keccak256(preimage)
    }
}

/// `hashStruct(Message)` for the typed-data form of `content`.
pub fn message_struct_hash(content: &MessageContent) -> H256 {
    keccak256(encode(&[
        Token::FixedBytes(keccak256(MESSAGE_TYPE).as_bytes().to_vec()),
        Token::Uint(content.version.into()),
        Token::Uint(content.nonce.into()),
        Token::Uint(content.origin_domain.into()),
        Token::FixedBytes(H256::from(content.sender).as_bytes().to_vec()),
        Token::Uint(content.destination_domain.into()),
        Token::FixedBytes(H256::from(content.recipient).as_bytes().to_vec()),
        Token::FixedBytes(keccak256(content.message_body.to_vec()).as_bytes().to_vec()),
    ]))
}
